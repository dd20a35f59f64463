mod prepare;
mod run;

use prepare::{run_clean, run_make};
use run::run_all;

use anyhow::Result;

use crate::cli::Command;
use crate::display::Context;

pub fn dispatch(command: Command, ctx: Context) -> Result<()> {
    match command {
        Command::Run(args) => run_all(args, ctx),
        Command::Make(args) => run_make(args, ctx),
        Command::Clean(args) => run_clean(args, ctx),
    }
}
