//! `mkdtboimg dump` command — Inspect an image and extract its entries.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use dtbo_core::image::extract_image;
use dtbo_core::Dtbo;

use crate::output;

#[derive(Args)]
pub struct DumpArgs {
    /// Image to inspect
    pub image: PathBuf,

    /// Write the dump to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Extract every entry to <PREFIX>.<index>
    #[arg(short = 'b', long, value_name = "PREFIX")]
    pub dtb: Option<PathBuf>,

    /// Decompress compressed entries while extracting
    #[arg(long)]
    pub decompress: bool,

    /// Print the header and entry table as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: DumpArgs) -> Result<(), Box<dyn std::error::Error>> {
    let dtbo = Dtbo::open(&args.image)?;

    let mut text = if args.json {
        output::dump_json(&dtbo)?
    } else {
        output::format_dump(&dtbo)
    };
    text.push('\n');

    match args.output {
        Some(ref path) => std::fs::write(path, &text)
            .map_err(|e| format!("Failed to write {}: {e}", path.display()))?,
        None => std::io::stdout().write_all(text.as_bytes())?,
    }

    if let Some(ref prefix) = args.dtb {
        let written = extract_image(&dtbo, prefix, args.decompress)?;
        tracing::debug!(count = written.len(), "Extracted DT entries");
    }

    Ok(())
}
