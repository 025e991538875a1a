//! Tabular exports. Append-only; the header is written when a file is
//! created or found empty.

use std::fs::{self, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use eobr_schemas::{OutputRow, EXPORT_HEADERS};

pub fn append_row(path: &Path, row: &OutputRow) -> Result<()> {
    let needs_header = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open export failed: {}", path.display()))?;

    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    if needs_header {
        debug!(path = %path.display(), "starting export");
        w.write_record(EXPORT_HEADERS)
            .with_context(|| format!("write export header failed: {}", path.display()))?;
    }
    w.write_record(row.to_record())
        .with_context(|| format!("write export row failed: {}", path.display()))?;
    w.flush()
        .with_context(|| format!("flush export failed: {}", path.display()))?;
    Ok(())
}

/// Raw cells of every data row, header excluded. A missing file has none.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open export failed: {}", path.display()))?;

    let mut rows = Vec::new();
    for rec in rdr.records() {
        let rec = rec.with_context(|| format!("read export row failed: {}", path.display()))?;
        rows.push(rec.iter().map(String::from).collect());
    }
    Ok(rows)
}
