use anyhow::Result;

use super::{build, clean, hatch, info, languages, verify};
use crate::cli::args::{Cli, Command};
use crate::exit_codes::EXIT_SUCCESS;

pub fn dispatch(cli: Cli) -> Result<i32> {
    match cli.cmd {
        Command::Build(args) => build::run(args)?,
        Command::Hatch(args) => hatch::run(args)?,
        Command::Verify(args) => verify::run(args)?,
        Command::Info(args) => info::run(args)?,
        Command::Languages => languages::run()?,
        Command::Clean(args) => clean::run(args)?,
    }
    Ok(EXIT_SUCCESS)
}
