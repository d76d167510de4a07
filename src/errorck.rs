//! The main errorck executable.

use clap::Parser;
use errorck::cli::{Cli, Run};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    cli.command.run()
}
