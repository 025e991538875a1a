//! Output sink: the engine's only way to write rows and documents.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::warn;

use eobr_schemas::{CanonicalRecord, OutputRow};

use crate::document::{render_json, render_pdf, EobrDocument};
use crate::export::append_row;

/// Where one run writes.
#[derive(Debug, Clone)]
pub struct OutputPaths {
    pub run_export: PathBuf,
    pub historical_export: PathBuf,
    pub docs_dir: PathBuf,
    pub pdf_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub json_path: PathBuf,
    pub pdf_path: PathBuf,
}

pub trait OutputSink {
    /// Append `row` to the tabular export at `path`.
    fn append_row(&mut self, path: &Path, row: &OutputRow) -> Result<()>;

    /// Produce both document forms for `record`. On error neither form is
    /// left behind.
    fn render(
        &mut self,
        record: &CanonicalRecord,
        row: &OutputRow,
        paths: &OutputPaths,
    ) -> Result<RenderedDocument>;
}

/// Filesystem sink: CSV rows, `docs/<n>.json` and `pdf/<n>.pdf`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsOutputSink;

impl OutputSink for FsOutputSink {
    fn append_row(&mut self, path: &Path, row: &OutputRow) -> Result<()> {
        append_row(path, row)
    }

    fn render(
        &mut self,
        record: &CanonicalRecord,
        row: &OutputRow,
        paths: &OutputPaths,
    ) -> Result<RenderedDocument> {
        let doc = EobrDocument::new(record, row);
        let json_path = paths.docs_dir.join(format!("{}.json", doc.document_number));
        let pdf_path = paths.pdf_dir.join(format!("{}.pdf", doc.document_number));

        render_json(&doc, &json_path)?;
        if let Err(e) = render_pdf(&doc, &pdf_path) {
            discard(&pdf_path);
            discard(&json_path);
            return Err(e);
        }

        Ok(RenderedDocument {
            json_path,
            pdf_path,
        })
    }
}

fn discard(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "orphaned document not removed"),
    }
}
