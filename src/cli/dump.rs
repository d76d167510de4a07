//! Print the rows of an existing sink in a stable order.

use anyhow::{Result, bail};
use rusqlite::{Connection, OpenFlags};
use std::path::PathBuf;

#[derive(clap::Args, Default)]
pub struct Args {
    /// Path to a sink produced by `analyze`.
    pub output: PathBuf,
}

impl super::Run for Args {
    fn run(self) -> Result<()> {
        if !self.output.exists() {
            bail!("No sink at {}", self.output.display());
        }
        let conn =
            Connection::open_with_flags(&self.output, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT name, filename, line, "column", handling_type,
                   assigned_filename, assigned_line, assigned_column
            FROM watched_calls
            ORDER BY filename, line, "column", name, handling_type
            "#,
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let filename: String = row.get(1)?;
            let line: u32 = row.get(2)?;
            let column: u32 = row.get(3)?;
            let handling: String = row.get(4)?;
            print!("{filename}:{line}:{column}: {name} {handling}");
            if let Some(assigned) = row.get::<_, Option<String>>(5)? {
                let assigned_line: u32 = row.get(6)?;
                let assigned_column: u32 = row.get(7)?;
                print!(" (assigned at {assigned}:{assigned_line}:{assigned_column})");
            }
            println!();
        }
        Ok(())
    }
}
