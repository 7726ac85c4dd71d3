//! DTBO Core - DTBO/ACPIO image format
//!
//! Packs device tree blobs (or ACPI table overlays) into a single image
//! with an indexed entry table, optional per-entry zlib/gzip compression
//! and payload sharing between identical entries.

pub mod codec;
pub mod config;
pub mod container;
pub mod entry;
pub mod error;
pub mod image;

// Re-export commonly used types
pub use codec::CompressionFormat;
pub use config::{DtType, ImageConfig, ImageSpec};
pub use container::{DtTableHeader, Dtbo};
pub use entry::{DtEntry, EntryArgs, EntryMetadata, TableEntry};
pub use error::{DtboError, Result};
