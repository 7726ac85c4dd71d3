//! DTBO/ACPIO container.
//!
//! Image layout, all fields big-endian 32-bit words:
//!
//! ```text
//! ┌──────────────────────────────┐ 0
//! │ DtTableHeader (8 words)      │
//! ├──────────────────────────────┤ dt_entries_offset
//! │ TableEntry × dt_entry_count  │
//! ├──────────────────────────────┤
//! │ entry payloads               │
//! └──────────────────────────────┘ total_size
//! ```
//!
//! A [`Dtbo`] is either being built from detached entries
//! ([`Dtbo::create`]) or has been parsed from an existing image
//! ([`Dtbo::parse`]); only parsed images can be extracted from.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::codec;
use crate::config::{DtType, ImageConfig};
use crate::entry::{DtEntry, TableEntry, ENTRY_HEADER_WORDS};
use crate::error::{DtboError, Result};

/// Device tree table header magic.
pub const DTBO_MAGIC: u32 = 0xd7b7ab1e;
/// ACPI table header magic ("ACPI").
pub const ACPIO_MAGIC: u32 = 0x41435049;
/// Size of the image header in bytes.
pub const DT_TABLE_HEADER_SIZE: u32 = 32;
/// Size of one entry header in bytes.
pub const DT_ENTRY_HEADER_SIZE: u32 = 32;

const DT_TABLE_HEADER_WORDS: usize = 8;

/// Decode big-endian words from a buffer of exactly `N * 4` bytes.
fn read_words<const N: usize>(buf: &[u8]) -> [u32; N] {
    let mut words = [0u32; N];
    for (word, chunk) in words.iter_mut().zip(buf.chunks_exact(4)) {
        *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }
    words
}

fn write_words(buf: &mut [u8], words: &[u32]) {
    for (chunk, word) in buf.chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_be_bytes());
    }
}

fn too_large() -> DtboError {
    DtboError::InvalidArgument("image would exceed 4 GiB".to_string())
}

/// The header at the start of every DTBO/ACPIO image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DtTableHeader {
    pub magic: u32,
    /// Size of the whole image in bytes
    pub total_size: u32,
    pub header_size: u32,
    pub dt_entry_size: u32,
    pub dt_entry_count: u32,
    /// Offset of the first entry header
    pub dt_entries_offset: u32,
    pub page_size: u32,
    pub version: u32,
}

impl DtTableHeader {
    /// Header of an image that does not hold any entries yet.
    pub fn empty(config: &ImageConfig) -> Self {
        Self {
            magic: config.dt_type.magic(),
            total_size: DT_TABLE_HEADER_SIZE,
            header_size: DT_TABLE_HEADER_SIZE,
            dt_entry_size: DT_ENTRY_HEADER_SIZE,
            dt_entry_count: 0,
            dt_entries_offset: DT_TABLE_HEADER_SIZE,
            page_size: config.page_size,
            version: config.version,
        }
    }

    /// Decode and validate a header from the start of `buf`.
    pub fn read_from_buffer(buf: &[u8]) -> Result<Self> {
        let header_len = DT_TABLE_HEADER_SIZE as usize;
        if buf.len() < header_len {
            return Err(DtboError::TruncatedImage {
                actual: buf.len(),
                expected: header_len,
            });
        }

        let [
            magic,
            total_size,
            header_size,
            dt_entry_size,
            dt_entry_count,
            dt_entries_offset,
            page_size,
            version,
        ] = read_words::<DT_TABLE_HEADER_WORDS>(&buf[..header_len]);

        if DtType::from_magic(magic).is_none() {
            return Err(DtboError::InvalidMagic(magic));
        }
        if header_size != DT_TABLE_HEADER_SIZE {
            return Err(DtboError::InvalidHeaderSize(header_size));
        }
        if dt_entry_size != DT_ENTRY_HEADER_SIZE {
            return Err(DtboError::InvalidEntryHeaderSize(dt_entry_size));
        }
        if dt_entries_offset < header_size {
            return Err(DtboError::InvalidEntriesOffset(dt_entries_offset));
        }

        Ok(Self {
            magic,
            total_size,
            header_size,
            dt_entry_size,
            dt_entry_count,
            dt_entries_offset,
            page_size,
            version,
        })
    }

    fn to_words(&self) -> [u32; DT_TABLE_HEADER_WORDS] {
        [
            self.magic,
            self.total_size,
            self.header_size,
            self.dt_entry_size,
            self.dt_entry_count,
            self.dt_entries_offset,
            self.page_size,
            self.version,
        ]
    }

    /// Bytes occupied by the header and the entry table.
    pub fn metadata_size(&self) -> u64 {
        self.dt_entries_offset as u64 + self.dt_entry_count as u64 * self.dt_entry_size as u64
    }
}

#[derive(Debug)]
enum Mode {
    /// Entries come from files and are written out by the caller.
    Build,
    /// Entries were decoded from this image.
    Parse { image: Vec<u8> },
}

/// A DTBO/ACPIO image.
#[derive(Debug)]
pub struct Dtbo {
    header: DtTableHeader,
    entries: Vec<TableEntry>,
    mode: Mode,
}

impl Dtbo {
    /// Start a new, empty image.
    pub fn create(config: &ImageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            header: DtTableHeader::empty(config),
            entries: Vec::new(),
            mode: Mode::Build,
        })
    }

    /// Parse an image held in memory.
    pub fn parse(image: Vec<u8>) -> Result<Self> {
        let header = DtTableHeader::read_from_buffer(&image)?;

        let metadata_size =
            header.header_size as u64 + header.dt_entry_count as u64 * header.dt_entry_size as u64;
        let table_end = header.metadata_size().max(metadata_size);
        if (image.len() as u64) < table_end {
            return Err(DtboError::TruncatedImage {
                actual: image.len(),
                expected: usize::try_from(table_end).unwrap_or(usize::MAX),
            });
        }
        if (header.total_size as u64) < metadata_size {
            tracing::warn!(
                total_size = header.total_size,
                metadata_size,
                "Image total_size is smaller than its metadata"
            );
        }

        let mut dtbo = Self {
            header,
            entries: Vec::new(),
            mode: Mode::Parse { image },
        };
        dtbo.read_entries()?;

        tracing::debug!(
            entries = dtbo.header.dt_entry_count,
            version = dtbo.header.version,
            "Parsed DTBO image"
        );

        Ok(dtbo)
    }

    /// Read and parse an image file.
    pub fn open(path: &Path) -> Result<Self> {
        let image = std::fs::read(path).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!("Failed to read image {}: {}", path.display(), e),
            )
        })?;
        Self::parse(image)
    }

    /// Decode the entry table of a parsed image.
    fn read_entries(&mut self) -> Result<()> {
        if !self.entries.is_empty() {
            return Err(DtboError::InvalidState(
                "DT entries can be read only once".to_string(),
            ));
        }
        let Mode::Parse { image } = &self.mode else {
            return Err(DtboError::InvalidState(
                "image was not parsed from a file".to_string(),
            ));
        };

        let entry_len = self.header.dt_entry_size as usize;
        let mut offset = self.header.dt_entries_offset as usize;
        let mut entries = Vec::with_capacity(self.header.dt_entry_count as usize);
        for _ in 0..self.header.dt_entry_count {
            let words = read_words::<ENTRY_HEADER_WORDS>(&image[offset..offset + entry_len]);
            entries.push(TableEntry::from_words(words));
            offset += entry_len;
        }

        self.entries = entries;
        Ok(())
    }

    /// Attach entries to a new image and compress their payloads.
    ///
    /// Entries are laid out in the given order. An entry whose resolved
    /// source file and compression format match an earlier one reuses that
    /// entry's payload. Returns the payload area, which belongs right after
    /// [`Dtbo::metadata`] in the output. On error the image is left untouched.
    pub fn add_entries(&mut self, entries: Vec<DtEntry>) -> Result<Vec<u8>> {
        if entries.is_empty() {
            return Err(DtboError::InvalidArgument(
                "attempted to add empty list of DT entries".to_string(),
            ));
        }
        if matches!(self.mode, Mode::Parse { .. }) || !self.entries.is_empty() {
            return Err(DtboError::InvalidState(
                "DT entries can be added only once".to_string(),
            ));
        }

        let mut header = self.header.clone();
        let count = u32::try_from(entries.len()).map_err(|_| too_large())?;
        let mut cursor = count
            .checked_mul(header.dt_entry_size)
            .and_then(|table| table.checked_add(header.header_size))
            .ok_or_else(too_large)?;

        let mut attached: Vec<TableEntry> = Vec::with_capacity(entries.len());
        let mut payload = Vec::new();

        for entry in entries {
            let format = entry.metadata().compression_info(header.version)?;
            let source = resolve_source(entry.source())?;

            let alias = attached.iter().find(|other| {
                other.source.as_deref() == Some(source.as_path())
                    && matches!(other.compression_info(header.version), Ok(f) if f == format)
            });

            let (offset, size) = match alias {
                Some(other) => {
                    tracing::debug!(
                        source = %source.display(),
                        offset = other.offset,
                        "Reusing payload of identical DT entry"
                    );
                    (other.offset, other.size)
                }
                None => {
                    let raw = std::fs::read(&source)?;
                    let compressed = codec::compress(format, &raw)?;
                    let size = u32::try_from(compressed.len()).map_err(|_| too_large())?;
                    let offset = cursor;
                    cursor = cursor.checked_add(size).ok_or_else(too_large)?;
                    header.total_size = header.total_size.checked_add(size).ok_or_else(too_large)?;
                    payload.extend_from_slice(&compressed);

                    tracing::debug!(
                        source = %source.display(),
                        %format,
                        raw_size = raw.len(),
                        size,
                        offset,
                        "Added DT entry"
                    );
                    (offset, size)
                }
            };

            attached.push(TableEntry {
                size,
                offset,
                metadata: *entry.metadata(),
                source: Some(source),
            });
            header.dt_entry_count += 1;
            header.total_size = header
                .total_size
                .checked_add(header.dt_entry_size)
                .ok_or_else(too_large)?;
        }

        self.header = header;
        self.entries = attached;
        Ok(payload)
    }

    /// Serialize the header and entry table.
    pub fn metadata(&self) -> Vec<u8> {
        let entry_len = self.header.dt_entry_size as usize;
        let table_start = self.header.dt_entries_offset as usize;
        let mut buf = vec![0u8; table_start + self.entries.len() * entry_len];

        write_words(&mut buf[..DT_TABLE_HEADER_SIZE as usize], &self.header.to_words());
        for (i, entry) in self.entries.iter().enumerate() {
            let start = table_start + i * entry_len;
            write_words(&mut buf[start..start + entry_len], &entry.to_words());
        }
        buf
    }

    /// Write the metadata followed by the payload area returned from
    /// [`Dtbo::add_entries`].
    pub fn write_to<W: Write>(&self, mut out: W, payload: &[u8]) -> Result<()> {
        out.write_all(&self.metadata())?;
        out.write_all(payload)?;
        out.flush()?;
        Ok(())
    }

    /// Payload of the entry at `index` (0-based) in a parsed image.
    ///
    /// With `decompress`, compressed entries are inflated first.
    pub fn extract(&self, index: usize, decompress: bool) -> Result<Vec<u8>> {
        let Mode::Parse { image } = &self.mode else {
            return Err(DtboError::InvalidState(
                "only parsed images can be extracted from".to_string(),
            ));
        };
        let entry = self
            .entries
            .get(index)
            .ok_or(DtboError::IndexOutOfRange {
                index,
                count: self.header.dt_entry_count,
            })?;

        let start = entry.offset as usize;
        let end = start + entry.size as usize;
        let data = image.get(start..end).ok_or(DtboError::TruncatedImage {
            actual: image.len(),
            expected: end,
        })?;

        if decompress {
            let format = entry.compression_info(self.header.version)?;
            if format.is_compressed() {
                tracing::debug!(index, %format, "Decompressing DT entry");
                return codec::decompress(format, data);
            }
        }
        Ok(data.to_vec())
    }

    pub fn header(&self) -> &DtTableHeader {
        &self.header
    }

    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }
}

/// Resolve symlinks and relative components so identical files compare equal.
fn resolve_source(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|e| {
        DtboError::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to open DT file {}: {}", path.display(), e),
        ))
    })
}
