//! Build images from DT files and extract DT files from images.

use std::ffi::OsString;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::config::ImageConfig;
use crate::container::Dtbo;
use crate::entry::DtEntry;
use crate::error::Result;

/// Pack `entries` into a new image at `output`.
///
/// The output file is only created once every entry has been read and
/// compressed, so a failed build never leaves a partial image behind.
pub fn create_image(output: &Path, config: &ImageConfig, entries: Vec<DtEntry>) -> Result<Dtbo> {
    let mut dtbo = Dtbo::create(config)?;
    let payload = dtbo.add_entries(entries)?;

    let file = File::create(output).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("Failed to create {}: {}", output.display(), e),
        )
    })?;
    dtbo.write_to(BufWriter::new(file), &payload)?;

    tracing::info!(
        output = %output.display(),
        entries = dtbo.header().dt_entry_count,
        total_size = dtbo.header().total_size,
        "Created DTBO image"
    );

    Ok(dtbo)
}

/// Path entry `index` is extracted to: `<prefix>.<index>`.
pub fn entry_path(prefix: &Path, index: usize) -> PathBuf {
    let mut name = OsString::from(prefix.as_os_str());
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

/// Write the payload of entry `index` to `path`.
pub fn extract_entry(dtbo: &Dtbo, index: usize, path: &Path, decompress: bool) -> Result<()> {
    let data = dtbo.extract(index, decompress)?;
    std::fs::write(path, &data).map_err(|e| {
        std::io::Error::new(
            e.kind(),
            format!("Failed to write {}: {}", path.display(), e),
        )
    })?;

    tracing::debug!(index, path = %path.display(), size = data.len(), "Extracted DT entry");
    Ok(())
}

/// Extract every entry to `<prefix>.<index>`, returning the written paths.
pub fn extract_image(dtbo: &Dtbo, prefix: &Path, decompress: bool) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(dtbo.entries().len());
    for index in 0..dtbo.entries().len() {
        let path = entry_path(prefix, index);
        extract_entry(dtbo, index, &path, decompress)?;
        written.push(path);
    }
    Ok(written)
}
