//! errorck's CLI.

pub mod analyze;
pub mod check;
pub mod dump;

use anyhow::Result;
use clap::{Parser, Subcommand};
use enum_dispatch::enum_dispatch;

#[derive(Parser)]
#[command(name = "errorck")]
#[command(version)]
#[command(about = "Classify how C/C++ code handles errors from watched functions")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
#[enum_dispatch(Run)]
pub enum Command {
    /// Analyze a compilation database and record every watched call.
    Analyze(analyze::Args),

    /// Validate a notable-functions file.
    Check(check::Args),

    /// Print the rows of an existing sink.
    Dump(dump::Args),
}

#[enum_dispatch]
pub trait Run {
    fn run(self) -> Result<()>;
}
