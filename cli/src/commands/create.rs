//! `mkdtboimg create` command — Pack DT files into a new image.
//!
//! Options before the first DT file apply to the whole image (`page_size`,
//! `version`, `dt_type`) or act as defaults for every entry. Options after a
//! DT file apply to that entry only:
//!
//! ```text
//! mkdtboimg create dtbo.img --version=1 --flags=0x1 \
//!     board1.dtbo --id=0x100 \
//!     board2.dtbo --id=0x200 --flags=0x0
//! ```

use std::path::PathBuf;

use clap::Args;
use dtbo_core::config::split_option;
use dtbo_core::image::create_image;
use dtbo_core::{DtEntry, DtboError, EntryArgs, ImageConfig};

use crate::output;

#[derive(Args)]
pub struct CreateArgs {
    /// Output image path
    pub output: PathBuf,

    /// Global options, then DT files each followed by their entry options
    #[arg(
        required = true,
        num_args = 1..,
        allow_hyphen_values = true,
        trailing_var_arg = true,
        value_name = "ARGS"
    )]
    pub args: Vec<String>,
}

pub fn execute(args: CreateArgs) -> Result<(), Box<dyn std::error::Error>> {
    let (config, entries) = parse_image_args(&args.args)?;
    let dtbo = create_image(&args.output, &config, entries)?;

    println!(
        "Created {} ({} entries, {})",
        args.output.display(),
        dtbo.header().dt_entry_count,
        output::format_bytes(dtbo.header().total_size as u64)
    );
    Ok(())
}

/// Split `--key=value` / `--key value` options and DT file names into an
/// image configuration and its entries.
pub(crate) fn parse_image_args(args: &[String]) -> Result<(ImageConfig, Vec<DtEntry>), DtboError> {
    let mut config = ImageConfig::default();
    let mut defaults = EntryArgs::zeroed();
    let mut files: Vec<(PathBuf, EntryArgs)> = Vec::new();

    let mut tokens = args.iter();
    while let Some(token) = tokens.next() {
        if !token.starts_with('-') {
            files.push((PathBuf::from(token), EntryArgs::default()));
            continue;
        }

        let (key, value) = match split_option(token) {
            Some((key, value)) => (key, value),
            None => {
                let key = token.trim_start_matches('-');
                let value = tokens.next().ok_or_else(|| {
                    DtboError::InvalidArgument(format!("option '{token}' needs a value"))
                })?;
                (key, value.as_str())
            }
        };

        let known = match files.last_mut() {
            Some((_, entry)) => entry.set(key, value),
            None => config.set(key, value)? || defaults.set(key, value),
        };
        if !known {
            return Err(DtboError::InvalidArgument(format!("unknown option '{token}'")));
        }
    }

    if files.is_empty() {
        return Err(DtboError::InvalidArgument("no DT files given".to_string()));
    }

    let entries = files
        .into_iter()
        .map(|(file, args)| DtEntry::from_args(file, &args.or(&defaults)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((config, entries))
}
