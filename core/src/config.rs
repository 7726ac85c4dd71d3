//! Image configuration and the `cfg_create` configuration file format.
//!
//! A configuration file lists global options first, then one unindented
//! line per DT file followed by its indented entry options:
//!
//! ```text
//! # global options
//!   page_size=4096
//!   version=1
//!   flags=0x1          # default flags for every entry
//! board1.dtbo
//!   id=0x100
//! board2.dtbo
//!   id=0x200
//!   flags=0x0
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::container::{ACPIO_MAGIC, DTBO_MAGIC};
use crate::entry::{parse_number, DtEntry, EntryArgs};
use crate::error::{DtboError, Result};

/// Default page size written into new image headers.
pub const DEFAULT_PAGE_SIZE: u32 = 2048;

/// Highest header version understood by this crate.
pub const MAX_VERSION: u32 = 1;

/// Kind of blobs carried by an image; selects the header magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtType {
    /// Device tree blobs / overlays
    #[default]
    Dtb,
    /// ACPI table overlays
    Acpi,
}

impl DtType {
    pub fn magic(self) -> u32 {
        match self {
            Self::Dtb => DTBO_MAGIC,
            Self::Acpi => ACPIO_MAGIC,
        }
    }

    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            DTBO_MAGIC => Some(Self::Dtb),
            ACPIO_MAGIC => Some(Self::Acpi),
            _ => None,
        }
    }
}

impl std::fmt::Display for DtType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Dtb => write!(f, "dtb"),
            Self::Acpi => write!(f, "acpi"),
        }
    }
}

impl std::str::FromStr for DtType {
    type Err = DtboError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dtb" => Ok(Self::Dtb),
            "acpi" => Ok(Self::Acpi),
            _ => Err(DtboError::InvalidArgument(format!(
                "unknown dt_type: '{}' (supported: dtb, acpi)",
                s
            ))),
        }
    }
}

/// Image-wide options for a new image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Blob kind (header magic)
    pub dt_type: DtType,

    /// Page size hint recorded in the header
    pub page_size: u32,

    /// Header version (0 or 1); version 1 enables compressed entries
    pub version: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            dt_type: DtType::Dtb,
            page_size: DEFAULT_PAGE_SIZE,
            version: 0,
        }
    }
}

impl ImageConfig {
    /// Set an option by name. Returns `Ok(false)` if the name is not an image option.
    pub fn set(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "page_size" => self.page_size = parse_number(value)?,
            "version" => self.version = parse_number(value)?,
            "dt_type" => self.dt_type = value.parse()?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version > MAX_VERSION {
            return Err(DtboError::InvalidArgument(format!(
                "unsupported image version {} (max {})",
                self.version, MAX_VERSION
            )));
        }
        Ok(())
    }
}

/// One DT file listed in a configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntrySpec {
    pub file: PathBuf,
    pub args: EntryArgs,
}

/// Parsed configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
    pub config: ImageConfig,
    /// Entry options given in the global section
    pub defaults: EntryArgs,
    pub entries: Vec<EntrySpec>,
}

impl ImageSpec {
    /// Parse configuration file text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut spec = ImageSpec {
            config: ImageConfig::default(),
            defaults: EntryArgs::zeroed(),
            entries: Vec::new(),
        };

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = match raw.find('#') {
                Some(pos) => &raw[..pos],
                None => raw,
            }
            .trim_end();
            if line.trim().is_empty() {
                continue;
            }

            if !line.starts_with(char::is_whitespace) {
                spec.entries.push(EntrySpec {
                    file: PathBuf::from(line),
                    args: EntryArgs::default(),
                });
                continue;
            }

            let (key, value) = split_option(line.trim()).ok_or_else(|| DtboError::ConfigError {
                line: line_no,
                message: format!("expected key=value, found '{}'", line.trim()),
            })?;
            let at_line = |e: DtboError| DtboError::ConfigError {
                line: line_no,
                message: e.to_string(),
            };

            let known = match spec.entries.last_mut() {
                Some(entry) => entry.args.set(key, value),
                None => spec.config.set(key, value).map_err(at_line)? || spec.defaults.set(key, value),
            };
            if !known {
                return Err(DtboError::ConfigError {
                    line: line_no,
                    message: format!("unknown option '{key}'"),
                });
            }
        }

        Ok(spec)
    }

    /// Read and parse a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Resolve every listed file into a detached entry.
    ///
    /// Relative file names are joined onto `base_dir` when one is given.
    pub fn into_entries(self, base_dir: Option<&Path>) -> Result<Vec<DtEntry>> {
        let defaults = self.defaults;
        self.entries
            .into_iter()
            .map(|spec| {
                let file = match base_dir {
                    Some(dir) if spec.file.is_relative() => dir.join(&spec.file),
                    _ => spec.file,
                };
                DtEntry::from_args(file, &spec.args.or(&defaults))
            })
            .collect()
    }
}

/// Split `--key=value` (any number of leading dashes) into its parts.
pub fn split_option(option: &str) -> Option<(&str, &str)> {
    let (key, value) = option.trim_start_matches('-').split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, value.trim()))
}
