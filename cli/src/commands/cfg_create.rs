//! `mkdtboimg cfg_create` command — Pack DT files listed in a configuration file.

use std::path::PathBuf;

use clap::Args;
use dtbo_core::image::create_image;
use dtbo_core::ImageSpec;

use crate::output;

#[derive(Args)]
pub struct CfgCreateArgs {
    /// Output image path
    pub output: PathBuf,

    /// Configuration file listing global options and DT files
    pub config: PathBuf,

    /// Directory relative DT file names are resolved against
    #[arg(short, long = "dtb-dir", value_name = "DIR")]
    pub dtb_dir: Option<PathBuf>,
}

pub fn execute(args: CfgCreateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let spec = ImageSpec::load(&args.config)
        .map_err(|e| format!("Failed to load {}: {e}", args.config.display()))?;

    let config = spec.config.clone();
    let entries = spec.into_entries(args.dtb_dir.as_deref())?;
    if entries.is_empty() {
        return Err(format!("No DT files listed in {}", args.config.display()).into());
    }

    let dtbo = create_image(&args.output, &config, entries)?;

    println!(
        "Created {} ({} entries, {})",
        args.output.display(),
        dtbo.header().dt_entry_count,
        output::format_bytes(dtbo.header().total_size as u64)
    );
    Ok(())
}
