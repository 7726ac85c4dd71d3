use thiserror::Error;

/// DTBO image error types
#[derive(Error, Debug)]
pub enum DtboError {
    /// Malformed numeric or property argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A required entry field was not supplied
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Image does not start with a DTBO or ACPIO magic
    #[error("Invalid magic number {0:#x} in DTBO/ACPIO image")]
    InvalidMagic(u32),

    /// Header size field does not match the wire format
    #[error("Invalid header size ({0}) in DTBO/ACPIO image")]
    InvalidHeaderSize(u32),

    /// Entry header size field does not match the wire format
    #[error("Invalid DT entry header size ({0}) in DTBO/ACPIO image")]
    InvalidEntryHeaderSize(u32),

    /// Entry table would overlap the image header
    #[error("Invalid DT entries offset ({0}) in DTBO/ACPIO image")]
    InvalidEntriesOffset(u32),

    /// Image is shorter than its declared metadata
    #[error("Invalid or truncated image of size {actual}, expected at least {expected}")]
    TruncatedImage { actual: usize, expected: usize },

    /// Operation not allowed in the container's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Entry index past the end of the entry table
    #[error("Invalid index {index} of DT entry (image has {count} entries)")]
    IndexOutOfRange { index: usize, count: u32 },

    /// Compression format code outside none/zlib/gzip
    #[error("Unsupported compression format {0}")]
    UnsupportedFormat(u32),

    /// Malformed configuration file
    #[error("Configuration error at line {line}: {message}")]
    ConfigError { line: usize, message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for DTBO image operations
pub type Result<T> = std::result::Result<T, DtboError>;
