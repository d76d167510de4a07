//! Compilation-database ingestion. Only `directory` and `file` are consumed;
//! the compiler invocation itself plays no part in the analysis.

use crate::shared::Set;
use serde::Deserialize;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// An error for issues reading the compilation database.
#[derive(Debug, Error)]
pub enum Error {
    /// No `compile_commands.json` at the given location.
    #[error("No compilation database at {0}")]
    NotFound(PathBuf),

    /// Misc IO errors.
    #[error("I/O Error: {0}: {1}")]
    Io(&'static str, io::Error),

    /// When the database is not the expected JSON shape.
    #[error("Failed to deserialize compilation database: {0}")]
    Deserialize(#[from] serde_json::Error),
}

/// One compile command. Extra fields (`command`, `arguments`, `output`) are
/// accepted and ignored.
#[derive(Deserialize)]
struct Entry {
    directory: PathBuf,
    file: PathBuf,
}

/// The translation units of a compilation database, resolved and deduped in
/// first-seen order. `path` may be the conventional directory containing
/// `compile_commands.json`, or the JSON file itself.
pub fn sources(path: &Path) -> Result<Vec<PathBuf>, Error> {
    let database = if path.is_dir() {
        path.join("compile_commands.json")
    } else {
        path.to_path_buf()
    };
    if !database.exists() {
        return Err(Error::NotFound(database));
    }
    let content =
        fs::read_to_string(&database).map_err(|e| Error::Io("reading compilation database", e))?;
    let entries: Vec<Entry> = serde_json::from_str(&content)?;

    let mut seen = Set::default();
    let mut files = Vec::new();
    for entry in entries {
        let resolved = if entry.file.is_absolute() {
            entry.file
        } else {
            entry.directory.join(entry.file)
        };
        if seen.insert(resolved.clone()) {
            files.push(resolved);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_and_dedupes() {
        let dir = tempfile::tempdir().expect("no tempdir");
        let db = dir.path().join("compile_commands.json");
        fs::write(
            &db,
            r#"[
                {"directory": "/src", "file": "a.c", "command": "cc -c a.c"},
                {"directory": "/src", "file": "/src/a.c", "command": "cc -c a.c"},
                {"directory": "/other", "file": "b.c", "arguments": ["cc", "-c", "b.c"]}
            ]"#,
        )
        .expect("write failed");

        let files = sources(dir.path()).expect("load failed");
        assert_eq!(
            files,
            vec![PathBuf::from("/src/a.c"), PathBuf::from("/other/b.c")]
        );
    }

    #[test]
    fn missing_database_is_an_error() {
        let dir = tempfile::tempdir().expect("no tempdir");
        assert!(matches!(sources(dir.path()), Err(Error::NotFound(_))));
    }
}
