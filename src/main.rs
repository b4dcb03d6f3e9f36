//! `reloc` - journaled, rollback-able media file relocation.

use anyhow::Result;
use clap::Parser;

use reloc::cli::{Cli, Command};
use reloc::config::Config;

fn main() -> Result<()> {
    let cli = Cli::parse();
    reloc::logging::init(cli.verbose);

    let exit_code = match cli.command {
        Command::Schema => {
            let schema = reloc::model::generate_schema()?;
            println!("{}", schema);
            0
        }
        Command::Organize(args) => {
            let config = Config::load(cli.config.as_deref())?;
            reloc::engine::organize(args, &config)?
        }
        Command::Rollback(args) => {
            let config = Config::load(cli.config.as_deref())?;
            reloc::engine::rollback(args, &config)?
        }
    };
    std::process::exit(exit_code);
}
