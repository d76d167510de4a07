//! Validate a notable-functions file without analyzing anything.

use crate::shared::notable::{Registry, Role};
use anyhow::Result;
use std::path::PathBuf;

#[derive(clap::Args, Default)]
pub struct Args {
    /// Path to the notable-functions JSON file.
    pub functions: PathBuf,
}

impl super::Run for Args {
    fn run(self) -> Result<()> {
        let registry = Registry::load(&self.functions)?;
        let (mut returns, mut errnos, mut handlers, mut loggers) = (0, 0, 0, 0);
        for (_, role) in registry.iter() {
            match role {
                Role::WatchedReturnValue => returns += 1,
                Role::WatchedErrno => errnos += 1,
                Role::Handler => handlers += 1,
                Role::Logger => loggers += 1,
            }
        }
        println!(
            "{}: {returns} watched (return value), {errnos} watched (errno), \
             {handlers} handlers, {loggers} loggers",
            self.functions.display()
        );
        Ok(())
    }
}
