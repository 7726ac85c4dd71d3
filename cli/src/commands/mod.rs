//! CLI command definitions and dispatch.

mod cfg_create;
mod create;
mod dump;

use clap::{Parser, Subcommand};

/// mkdtboimg — pack DTB/DTBO files into a DTBO/ACPIO image.
#[derive(Parser)]
#[command(name = "mkdtboimg", version, about)]
pub struct Cli {
    /// Log debug details to stderr (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Create an image from DT files given on the command line
    Create(create::CreateArgs),
    /// Create an image from a configuration file
    #[command(name = "cfg_create", alias = "cfg-create")]
    CfgCreate(cfg_create::CfgCreateArgs),
    /// Print the header and entry table of an image, optionally extracting entries
    Dump(dump::DumpArgs),
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Create(args) => create::execute(args),
        Command::CfgCreate(args) => cfg_create::execute(args),
        Command::Dump(args) => dump::execute(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create() {
        let cli = Cli::try_parse_from([
            "mkdtboimg",
            "create",
            "out.img",
            "--page_size=4096",
            "a.dtbo",
            "--id=0x1",
        ])
        .unwrap();
        match cli.command {
            Command::Create(args) => {
                assert_eq!(args.output.to_str(), Some("out.img"));
                assert_eq!(args.args, vec!["--page_size=4096", "a.dtbo", "--id=0x1"]);
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_parse_cfg_create_alias() {
        for name in ["cfg_create", "cfg-create"] {
            let cli = Cli::try_parse_from(["mkdtboimg", name, "out.img", "image.cfg"]).unwrap();
            assert!(matches!(cli.command, Command::CfgCreate(_)));
        }
    }

    #[test]
    fn test_parse_dump_flags() {
        let cli = Cli::try_parse_from([
            "mkdtboimg",
            "-v",
            "dump",
            "dtbo.img",
            "-b",
            "dt",
            "--decompress",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Command::Dump(args) => {
                assert!(args.decompress);
                assert_eq!(args.dtb.as_deref().and_then(|p| p.to_str()), Some("dt"));
                assert!(args.output.is_none());
                assert!(!args.json);
            }
            _ => panic!("expected dump"),
        }
    }

    #[test]
    fn test_create_requires_files() {
        assert!(Cli::try_parse_from(["mkdtboimg", "create", "out.img"]).is_err());
    }
}
