//! DT entry model.
//!
//! An entry starts out detached ([`DtEntry`]): a source file plus its
//! identity fields. Attaching it to a container produces a [`TableEntry`]
//! that additionally knows where its payload lives in the image.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::codec::CompressionFormat;
use crate::error::{DtboError, Result};

/// Low bits of `flags` carrying the compression format (version >= 1).
const COMPRESSION_FORMAT_MASK: u32 = 0x0f;

/// Number of 32-bit words in an on-disk entry header.
pub(crate) const ENTRY_HEADER_WORDS: usize = 8;

/// Parse a numeric entry argument.
///
/// Accepts decimal, `0x`-prefixed hex and `0`-prefixed octal. Arguments
/// starting with `/` name a device tree property; those are reserved and
/// always rejected.
pub fn parse_number(arg: &str) -> Result<u32> {
    let invalid = || DtboError::InvalidArgument(format!("'{arg}' is not a valid number"));

    if arg.is_empty() || arg.starts_with('+') || arg.starts_with('-') {
        return Err(invalid());
    }
    if arg.starts_with('/') {
        return Err(DtboError::InvalidArgument(format!(
            "device tree property references are not supported: '{arg}'"
        )));
    }

    let hex = arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X"));
    let (digits, radix) = if let Some(hex) = hex {
        (hex, 16)
    } else if arg.len() > 1 && arg.starts_with('0') {
        (&arg[1..], 8)
    } else {
        (arg, 10)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid());
    }

    u32::from_str_radix(digits, radix).map_err(|_| invalid())
}

/// Identity fields of a DT entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub id: u32,
    pub rev: u32,
    pub flags: u32,
    pub custom0: u32,
    pub custom1: u32,
    pub custom2: u32,
}

impl EntryMetadata {
    /// Compression format of the entry payload.
    ///
    /// Version 0 images predate compression tagging, so their flags are
    /// never interpreted.
    pub fn compression_info(&self, version: u32) -> Result<CompressionFormat> {
        if version == 0 {
            return Ok(CompressionFormat::None);
        }
        CompressionFormat::try_from(self.flags & COMPRESSION_FORMAT_MASK)
    }
}

/// Untyped entry options as they arrive from the command line or a
/// configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryArgs {
    pub id: Option<String>,
    pub rev: Option<String>,
    pub flags: Option<String>,
    pub custom0: Option<String>,
    pub custom1: Option<String>,
    pub custom2: Option<String>,
}

impl EntryArgs {
    /// All options set to `0`.
    pub fn zeroed() -> Self {
        let zero = || Some("0".to_string());
        Self {
            id: zero(),
            rev: zero(),
            flags: zero(),
            custom0: zero(),
            custom1: zero(),
            custom2: zero(),
        }
    }

    /// Set an option by name. Returns `false` if the name is not an entry option.
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> bool {
        let slot = match key {
            "id" => &mut self.id,
            "rev" => &mut self.rev,
            "flags" => &mut self.flags,
            "custom0" => &mut self.custom0,
            "custom1" => &mut self.custom1,
            "custom2" => &mut self.custom2,
            _ => return false,
        };
        *slot = Some(value.into());
        true
    }

    /// Fill every unset option from `defaults`.
    pub fn or(self, defaults: &EntryArgs) -> Self {
        Self {
            id: self.id.or_else(|| defaults.id.clone()),
            rev: self.rev.or_else(|| defaults.rev.clone()),
            flags: self.flags.or_else(|| defaults.flags.clone()),
            custom0: self.custom0.or_else(|| defaults.custom0.clone()),
            custom1: self.custom1.or_else(|| defaults.custom1.clone()),
            custom2: self.custom2.or_else(|| defaults.custom2.clone()),
        }
    }

    /// Parse every option into typed metadata.
    pub fn resolve(&self) -> Result<EntryMetadata> {
        fn field(value: &Option<String>, name: &'static str) -> Result<u32> {
            let value = value.as_deref().ok_or(DtboError::MissingField(name))?;
            parse_number(value)
        }

        Ok(EntryMetadata {
            id: field(&self.id, "id")?,
            rev: field(&self.rev, "rev")?,
            flags: field(&self.flags, "flags")?,
            custom0: field(&self.custom0, "custom0")?,
            custom1: field(&self.custom1, "custom1")?,
            custom2: field(&self.custom2, "custom2")?,
        })
    }
}

/// A DT entry that has not been placed in an image yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtEntry {
    source: PathBuf,
    metadata: EntryMetadata,
}

impl DtEntry {
    pub fn new(source: impl Into<PathBuf>, metadata: EntryMetadata) -> Self {
        Self {
            source: source.into(),
            metadata,
        }
    }

    /// Build an entry from untyped options; every option must be present.
    pub fn from_args(source: impl Into<PathBuf>, args: &EntryArgs) -> Result<Self> {
        Ok(Self::new(source, args.resolve()?))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }
}

/// A DT entry as recorded in an image's entry table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableEntry {
    /// Payload size in bytes, after compression.
    pub size: u32,
    /// Absolute payload offset within the image.
    pub offset: u32,
    #[serde(flatten)]
    pub metadata: EntryMetadata,
    /// Resolved source file; only known for entries added in this process.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl TableEntry {
    pub fn compression_info(&self, version: u32) -> Result<CompressionFormat> {
        self.metadata.compression_info(version)
    }

    pub(crate) fn from_words(words: [u32; ENTRY_HEADER_WORDS]) -> Self {
        let [size, offset, id, rev, flags, custom0, custom1, custom2] = words;
        Self {
            size,
            offset,
            metadata: EntryMetadata {
                id,
                rev,
                flags,
                custom0,
                custom1,
                custom2,
            },
            source: None,
        }
    }

    pub(crate) fn to_words(&self) -> [u32; ENTRY_HEADER_WORDS] {
        let m = &self.metadata;
        [
            self.size,
            self.offset,
            m.id,
            m.rev,
            m.flags,
            m.custom0,
            m.custom1,
            m.custom2,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- parse_number tests ---

    #[test]
    fn test_parse_number_decimal() {
        assert_eq!(parse_number("0").unwrap(), 0);
        assert_eq!(parse_number("42").unwrap(), 42);
        assert_eq!(parse_number("4294967295").unwrap(), u32::MAX);
    }

    #[test]
    fn test_parse_number_hex() {
        assert_eq!(parse_number("0x1").unwrap(), 1);
        assert_eq!(parse_number("0XdeadBEEF").unwrap(), 0xdeadbeef);
    }

    #[test]
    fn test_parse_number_octal() {
        assert_eq!(parse_number("010").unwrap(), 8);
        assert_eq!(parse_number("00").unwrap(), 0);
        assert!(parse_number("08").is_err());
    }

    #[test]
    fn test_parse_number_rejects_signs() {
        assert!(matches!(parse_number("-1"), Err(DtboError::InvalidArgument(_))));
        assert!(matches!(parse_number("+1"), Err(DtboError::InvalidArgument(_))));
    }

    #[test]
    fn test_parse_number_rejects_empty() {
        assert!(matches!(parse_number(""), Err(DtboError::InvalidArgument(_))));
        assert!(matches!(parse_number("0x"), Err(DtboError::InvalidArgument(_))));
    }

    #[test]
    fn test_parse_number_rejects_property_reference() {
        let err = parse_number("/board/id").unwrap_err();
        assert!(matches!(err, DtboError::InvalidArgument(_)));
        assert!(err.to_string().contains("property"));
    }

    #[test]
    fn test_parse_number_rejects_garbage() {
        assert!(parse_number("12abc").is_err());
        assert!(parse_number("0x+5").is_err());
        assert!(parse_number("4294967296").is_err());
    }

    // --- compression_info tests ---

    #[test]
    fn test_compression_info_version_zero_ignores_flags() {
        for flags in [0, 1, 2, 0xf, 0xffff_ffff] {
            let metadata = EntryMetadata {
                flags,
                ..Default::default()
            };
            assert_eq!(metadata.compression_info(0).unwrap(), CompressionFormat::None);
        }
    }

    #[test]
    fn test_compression_info_uses_low_nibble() {
        let metadata = EntryMetadata {
            flags: 0xabcd_0012,
            ..Default::default()
        };
        assert_eq!(metadata.compression_info(1).unwrap(), CompressionFormat::Gzip);

        let metadata = EntryMetadata {
            flags: 0x11,
            ..Default::default()
        };
        assert_eq!(metadata.compression_info(1).unwrap(), CompressionFormat::Zlib);
    }

    #[test]
    fn test_compression_info_unknown_format() {
        let metadata = EntryMetadata {
            flags: 0x7,
            ..Default::default()
        };
        assert!(matches!(
            metadata.compression_info(1),
            Err(DtboError::UnsupportedFormat(7))
        ));
    }

    // --- EntryArgs tests ---

    #[test]
    fn test_entry_args_resolve() {
        let mut args = EntryArgs::zeroed();
        assert!(args.set("id", "0x100"));
        assert!(args.set("custom2", "017"));

        let metadata = args.resolve().unwrap();
        assert_eq!(metadata.id, 0x100);
        assert_eq!(metadata.custom2, 0o17);
        assert_eq!(metadata.flags, 0);
    }

    #[test]
    fn test_entry_args_missing_field() {
        let mut args = EntryArgs::zeroed();
        args.custom1 = None;
        assert!(matches!(args.resolve(), Err(DtboError::MissingField("custom1"))));
    }

    #[test]
    fn test_entry_args_unknown_key() {
        let mut args = EntryArgs::default();
        assert!(!args.set("page_size", "4096"));
        assert_eq!(args, EntryArgs::default());
    }

    #[test]
    fn test_entry_args_or_keeps_explicit_values() {
        let mut defaults = EntryArgs::zeroed();
        defaults.set("rev", "3");

        let mut args = EntryArgs::default();
        args.set("id", "7");

        let metadata = args.or(&defaults).resolve().unwrap();
        assert_eq!(metadata.id, 7);
        assert_eq!(metadata.rev, 3);
    }

    #[test]
    fn test_dt_entry_from_args() {
        let entry = DtEntry::from_args("board.dtbo", &EntryArgs::zeroed()).unwrap();
        assert_eq!(entry.source(), Path::new("board.dtbo"));
        assert_eq!(*entry.metadata(), EntryMetadata::default());
    }

    #[test]
    fn test_table_entry_words_order() {
        let entry = TableEntry::from_words([10, 20, 1, 2, 3, 4, 5, 6]);
        assert_eq!(entry.size, 10);
        assert_eq!(entry.offset, 20);
        assert_eq!(entry.metadata.id, 1);
        assert_eq!(entry.metadata.custom2, 6);
        assert_eq!(entry.to_words(), [10, 20, 1, 2, 3, 4, 5, 6]);
    }
}
