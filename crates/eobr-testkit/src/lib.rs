//! eobr-testkit
//!
//! Fixtures for end-to-end scenarios: raw record builders, an in-memory
//! ledger, and an output sink that records calls instead of writing files.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde_json::{json, Value};

use eobr_artifacts::{OutputPaths, OutputSink, RenderedDocument};
use eobr_config::PipelineConfig;
use eobr_db::Ledger;
use eobr_ingest::{InputItem, RawRecord};
use eobr_reconcile::DuplicateIndex;
use eobr_runtime::{Engine, EngineParts};
use eobr_schemas::{CanonicalRecord, OutputRow};

/// Bill date used by every fixture engine.
pub fn fixture_bill_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 5).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Service-lines record with one line item keyed `(line_item_id, order_id)`.
pub fn service_lines_record(order_id: &str, line_item_id: i64, cpt: &str, rate: f64) -> Value {
    json!({
        "order_id": order_id,
        "service_lines": [{
            "date_of_service": "2025-03-01",
            "cpt_code": cpt,
            "modifiers": ["26"],
            "place_of_service": "11",
            "units": 1,
            "charge_amount": 100.0,
            "assigned_rate": rate,
            "payment_id": { "line_item_id": line_item_id }
        }],
        "order_details": { "PatientName": "Jane Doe" },
        "provider_details": { "Billing_Name": "Acme Clinic" }
    })
}

/// The canonical end-to-end example: order A1, line 42, rate 80.00.
pub fn example_record() -> Value {
    service_lines_record("A1", 42, "99213", 80.0)
}

pub fn item(source: &str, value: Value) -> InputItem {
    InputItem {
        source: source.to_string(),
        parsed: RawRecord::from_value(value, source),
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

pub async fn memory_ledger() -> Result<Ledger> {
    Ledger::connect("sqlite::memory:").await
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Records every call. Rendering fails for the listed order ids, or for
/// everything when `fail_all_renders` is set.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub appended: Vec<(PathBuf, OutputRow)>,
    pub rendered: Vec<String>,
    pub fail_render_for: BTreeSet<String>,
    pub fail_all_renders: bool,
    pub fail_appends: bool,
}

impl RecordingSink {
    pub fn failing_renders() -> Self {
        Self {
            fail_all_renders: true,
            ..Self::default()
        }
    }

    pub fn failing_render_for(order_ids: &[&str]) -> Self {
        Self {
            fail_render_for: order_ids.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Rows appended to `path`, in order.
    pub fn rows_for(&self, path: &Path) -> Vec<&OutputRow> {
        self.appended
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, r)| r)
            .collect()
    }
}

impl OutputSink for RecordingSink {
    fn append_row(&mut self, path: &Path, row: &OutputRow) -> Result<()> {
        if self.fail_appends {
            bail!("simulated export failure");
        }
        self.appended.push((path.to_path_buf(), row.clone()));
        Ok(())
    }

    fn render(
        &mut self,
        record: &CanonicalRecord,
        row: &OutputRow,
        paths: &OutputPaths,
    ) -> Result<RenderedDocument> {
        let order = record.order_id.clone().unwrap_or_default();
        if self.fail_all_renders || self.fail_render_for.contains(&order) {
            bail!("simulated render failure for {order}");
        }
        self.rendered.push(row.document_number.clone());
        Ok(RenderedDocument {
            json_path: paths.docs_dir.join(format!("{}.json", row.document_number)),
            pdf_path: paths.pdf_dir.join(format!("{}.pdf", row.document_number)),
        })
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub fn fixture_paths(root: &Path) -> OutputPaths {
    OutputPaths {
        run_export: root.join("run.csv"),
        historical_export: root.join("historical.csv"),
        docs_dir: root.join("docs"),
        pdf_dir: root.join("pdf"),
    }
}

/// Engine with default config, no audit trail, and fixed bill date.
pub fn fixture_engine<S: OutputSink>(sink: S, ledger: Ledger, index: DuplicateIndex) -> Engine<S> {
    Engine::new(EngineParts {
        config: PipelineConfig::default(),
        ledger,
        index,
        sink,
        paths: fixture_paths(Path::new("fixture")),
        audit: None,
        bill_date: fixture_bill_date(),
    })
}
