//! The persistent sink: one SQLite database per run, owned exclusively,
//! holding one row per (name, filename, line, column, handling_type).

use crate::{
    classify::{Category, Record},
    shared::Set,
};
use log::error;
use rusqlite::{Connection, params};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// An error for issues around the sink.
#[derive(Debug, Error)]
pub enum Error {
    /// The destination exists and overwriting was not requested.
    #[error("Output {0} already exists; pass --overwrite-if-needed to replace it")]
    Exists(PathBuf),

    /// Misc IO errors.
    #[error("I/O Error: {0}: {1}")]
    Io(&'static str, io::Error),

    /// Database Errors.
    #[error("Database Error: {0}")]
    Database(#[from] rusqlite::Error),

    /// An insert failed earlier in the run; the sink is incomplete.
    #[error("The sink is incomplete: an insertion failed earlier in the run")]
    Poisoned,
}

/// Dedup key within one run. The database enforces the same constraint.
type Key = (String, String, u32, u32, Category);

pub struct Sink {
    conn: Connection,
    seen: Set<Key>,
    poisoned: bool,
}

impl Sink {
    /// Create the sink, taking ownership of `path`. An existing file is
    /// refused unless `overwrite` is set, in which case it is truncated.
    pub fn create(path: &Path, overwrite: bool) -> Result<Self, Error> {
        if path.exists() {
            if !overwrite {
                return Err(Error::Exists(path.to_path_buf()));
            }
            fs::remove_file(path).map_err(|e| Error::Io("truncating sink", e))?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
                CREATE TABLE watched_calls (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    filename TEXT NOT NULL,
                    line INTEGER NOT NULL,
                    "column" INTEGER NOT NULL,
                    handling_type TEXT NOT NULL,
                    assigned_filename TEXT,
                    assigned_line INTEGER,
                    assigned_column INTEGER,
                    UNIQUE (name, filename, line, "column", handling_type)
                );
                "#,
        )?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;
        conn.set_prepared_statement_cache_capacity(16);
        Ok(Self {
            conn,
            seen: Set::default(),
            poisoned: false,
        })
    }

    /// Insert one record. Duplicates are dropped. Failures latch: after the
    /// first, inserts become no-ops and [`Self::finish`] reports the run as
    /// failed.
    pub fn insert(&mut self, record: &Record) {
        if self.poisoned {
            return;
        }
        let key = (
            record.name.clone(),
            record.file.clone(),
            record.line,
            record.column,
            record.category,
        );
        if !self.seen.insert(key) {
            return;
        }
        let assigned = record.assigned.as_ref();
        let result = self
            .conn
            .prepare_cached(
                r#"
                INSERT OR IGNORE INTO watched_calls
                    (name, filename, line, "column", handling_type,
                     assigned_filename, assigned_line, assigned_column)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .and_then(|mut stmt| {
                stmt.execute(params![
                    record.name,
                    record.file,
                    record.line,
                    record.column,
                    record.category.as_str(),
                    assigned.map(|site| site.file.as_str()),
                    assigned.map(|site| site.line),
                    assigned.map(|site| site.column),
                ])
            });
        if let Err(e) = result {
            error!(
                "Failed to record {} at {}:{}:{}: {e}",
                record.name, record.file, record.line, record.column
            );
            self.poisoned = true;
        }
    }

    /// Close out the run; an earlier insert failure surfaces here.
    pub fn finish(self) -> Result<(), Error> {
        if self.poisoned {
            Err(Error::Poisoned)
        } else {
            Ok(())
        }
    }
}
