//! Table output: every table is encoded before any byte is written.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use flock_core::{OutputFormat, Table};

/// One encoded table and its destination (`None` for stdout).
pub struct Encoded<'a> {
    bytes: Vec<u8>,
    path: Option<&'a Path>,
}

/// Encode `table` in memory.
pub fn encode<'a>(table: &Table, format: OutputFormat, path: Option<&'a Path>) -> Result<Encoded<'a>> {
    let mut bytes = Vec::new();
    format.write(table, &mut bytes)?;
    Ok(Encoded { bytes, path })
}

/// Write encoded tables in order. When a file fails to write, files
/// already written by this call are removed again.
pub fn write_all(outputs: &[Encoded<'_>]) -> Result<()> {
    let mut written: Vec<&Path> = Vec::new();
    for out in outputs {
        let result = match out.path {
            Some(p) => fs::write(p, &out.bytes).with_context(|| format!("writing {}", p.display())),
            None => io::stdout()
                .lock()
                .write_all(&out.bytes)
                .context("writing stdout"),
        };
        if let Err(e) = result {
            for p in written {
                let _ = fs::remove_file(p);
            }
            return Err(e);
        }
        if let Some(p) = out.path {
            written.push(p);
        }
    }
    Ok(())
}
