//! The `emu-resolve` binary: inspect how the resolvers serve libraries and
//! paths without running an emulator.

mod commands;
mod logging;
mod opts;

use anyhow::Result;
use clap::{ArgAction, Parser};

use crate::commands::{Bundle, Library, Open};

#[derive(Debug, Parser)]
#[clap(name = "emu-resolve", version, about)]
struct Cli {
    /// Log more (repeat for even more detail). `$RUST_LOG` takes precedence.
    #[clap(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Debug, clap::Subcommand)]
enum Cmd {
    /// Resolve an Android platform library.
    Library(Library),
    /// Resolve a path opened by an Android process.
    Open(Open),
    /// Load an iOS application bundle and resolve its dependencies.
    Bundle(Bundle),
}

impl Cmd {
    fn execute(&self) -> Result<()> {
        match self {
            Cmd::Library(cmd) => cmd.execute(),
            Cmd::Open(cmd) => cmd.execute(),
            Cmd::Bundle(cmd) => cmd.execute(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::set_up_logging(cli.verbose);

    cli.cmd.execute()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn verbosity_is_global() {
        let cli = Cli::try_parse_from(["emu-resolve", "open", "-vv", "/proc/cpuinfo"]).unwrap();

        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.cmd, Cmd::Open(_)));
    }
}
