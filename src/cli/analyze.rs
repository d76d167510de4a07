//! Analyze every translation unit of a compilation database and persist one
//! handling category per watched call.

use crate::{
    classify::{self, Record},
    shared::{compdb, notable::Registry, sink::Sink},
};
use anyhow::{Context, Result, bail};
use log::{debug, error, info};
use rayon::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(clap::Args, Default)]
pub struct Args {
    /// Path to the notable-functions JSON file.
    pub functions: PathBuf,

    /// Path of the SQLite sink to create.
    pub output: PathBuf,

    /// Directory containing compile_commands.json, or the file itself.
    pub compilations: PathBuf,

    /// Replace the sink if it already exists.
    #[arg(long, default_value_t = false)]
    pub overwrite_if_needed: bool,
}

impl super::Run for Args {
    fn run(self) -> Result<()> {
        let registry = Registry::load(&self.functions)?;
        let sources = compdb::sources(&self.compilations)?;
        let mut sink = Sink::create(&self.output, self.overwrite_if_needed)?;
        info!("Analyzing {} translation units", sources.len());

        // Classification is pure per translation unit; fan the units across
        // the pool and funnel the records through the single writer below.
        let units: Vec<(PathBuf, Result<Vec<Record>>)> = sources
            .into_par_iter()
            .map(|source| {
                let outcome = analyze_source(&source, &registry);
                (source, outcome)
            })
            .collect();

        let mut failed = 0usize;
        for (source, outcome) in units {
            match outcome {
                Ok(records) => {
                    debug!("{}: {} watched calls", source.display(), records.len());
                    for record in &records {
                        sink.insert(record);
                    }
                }
                Err(e) => {
                    error!("{}: {e:#}", source.display());
                    failed += 1;
                }
            }
        }
        sink.finish()?;
        if failed > 0 {
            bail!("{failed} translation unit(s) could not be analyzed");
        }
        Ok(())
    }
}

/// Parse and classify one translation unit. A unit that fails here emits
/// nothing at all.
fn analyze_source(source: &Path, registry: &Registry) -> Result<Vec<Record>> {
    let content = fs::read_to_string(source).context("reading source")?;
    let ast = cfront::parse(source.to_string_lossy(), &content)?;
    Ok(classify::analyze_unit(&ast, registry))
}
