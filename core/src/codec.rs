//! Entry payload compression.
//!
//! Each DT entry may be stored raw, as a zlib stream or as a gzip stream.
//! Decompression sniffs the framing instead of trusting the format tag, so a
//! zlib-tagged entry holding a gzip stream (or the reverse) still decodes.

use std::io::{Read, Write};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::{DtboError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Compression format of a DT entry, as encoded in the low nibble of its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionFormat {
    #[default]
    None,
    Zlib,
    Gzip,
}

impl CompressionFormat {
    /// Wire code stored in the entry flags.
    pub fn code(self) -> u32 {
        match self {
            Self::None => 0x00,
            Self::Zlib => 0x01,
            Self::Gzip => 0x02,
        }
    }

    pub fn is_compressed(self) -> bool {
        self != Self::None
    }
}

impl TryFrom<u32> for CompressionFormat {
    type Error = DtboError;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            0x00 => Ok(Self::None),
            0x01 => Ok(Self::Zlib),
            0x02 => Ok(Self::Gzip),
            other => Err(DtboError::UnsupportedFormat(other)),
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Zlib => write!(f, "zlib"),
            Self::Gzip => write!(f, "gzip"),
        }
    }
}

/// Compress a single entry payload.
///
/// `None` hands the input back unchanged. A fresh encoder is used per call.
pub fn compress(format: CompressionFormat, raw: &[u8]) -> Result<Vec<u8>> {
    let compressed = match format {
        CompressionFormat::None => raw.to_vec(),
        CompressionFormat::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(raw)?;
            encoder.finish()?
        }
        CompressionFormat::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(raw)?;
            encoder.finish()?
        }
    };

    Ok(compressed)
}

/// Decompress a single entry payload.
///
/// For any compressed format the zlib/gzip framing is detected from the
/// stream header. Corrupt streams are reported as I/O errors.
pub fn decompress(format: CompressionFormat, data: &[u8]) -> Result<Vec<u8>> {
    if !format.is_compressed() {
        return Ok(data.to_vec());
    }

    let mut raw = Vec::new();
    if data.starts_with(&GZIP_MAGIC) {
        GzDecoder::new(data).read_to_end(&mut raw)?;
    } else {
        ZlibDecoder::new(data).read_to_end(&mut raw)?;
    }

    Ok(raw)
}
