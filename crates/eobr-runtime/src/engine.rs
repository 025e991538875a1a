use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, info, warn};

use eobr_artifacts::{OutputPaths, OutputSink};
use eobr_audit::{decision, AuditWriter};
use eobr_config::PipelineConfig;
use eobr_db::{Ledger, PaymentUpdate};
use eobr_ingest::{normalize, validate, InputItem, ValidationFailure};
use eobr_reconcile::{
    build_output_row, duplicate_key, DocumentNumberAllocator, DuplicateIndex, RecordOutcome,
    RowContext, RunSummary, SkipReason,
};
use eobr_schemas::{CanonicalRecord, OutputRow};

/// Everything the engine needs, handed over explicitly at construction.
pub struct EngineParts<S> {
    pub config: PipelineConfig,
    pub ledger: Ledger,
    pub index: DuplicateIndex,
    pub sink: S,
    pub paths: OutputPaths,
    /// `None` disables the decision trail.
    pub audit: Option<AuditWriter>,
    /// Bill date on every row, date part of every document number.
    pub bill_date: NaiveDate,
}

pub struct Engine<S> {
    config: PipelineConfig,
    ledger: Ledger,
    index: DuplicateIndex,
    numbers: DocumentNumberAllocator,
    sink: S,
    paths: OutputPaths,
    audit: Option<AuditWriter>,
    bill_date: NaiveDate,
    summary: RunSummary,
}

impl<S: OutputSink> Engine<S> {
    pub fn new(parts: EngineParts<S>) -> Self {
        let numbers =
            DocumentNumberAllocator::new(parts.config.documents.number_prefix.clone(), parts.bill_date);
        Self {
            config: parts.config,
            ledger: parts.ledger,
            index: parts.index,
            numbers,
            sink: parts.sink,
            paths: parts.paths,
            audit: parts.audit,
            bill_date: parts.bill_date,
            summary: RunSummary::default(),
        }
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn index(&self) -> &DuplicateIndex {
        &self.index
    }

    /// Hand back the ledger (for closing) and the sink.
    pub fn into_parts(self) -> (Ledger, S, RunSummary) {
        (self.ledger, self.sink, self.summary)
    }

    /// Process every item in order and return the totals.
    pub async fn run(&mut self, items: &[InputItem]) -> RunSummary {
        self.audit_event(
            decision::RUN_STARTED,
            None,
            json!({ "items": items.len(), "bill_date": self.bill_date.to_string() }),
        );

        for item in items {
            self.process_item(item).await;
        }

        self.audit_event(
            decision::RUN_FINISHED,
            None,
            json!({ "processed": self.summary.processed, "skipped": self.summary.skipped }),
        );
        self.summary.clone()
    }

    /// One record through the state machine. Never fails; the outcome is
    /// also counted and audited.
    pub async fn process_item(&mut self, item: &InputItem) -> RecordOutcome {
        let outcome = self.decide(item).await;

        match &outcome {
            RecordOutcome::Processed {
                order_id,
                document_number,
                duplicate,
                ledger_writes,
                ledger_write_failures,
            } => {
                info!(
                    source = %item.source,
                    order_id = %order_id,
                    document_number = %document_number,
                    duplicate = *duplicate,
                    "record processed"
                );
                self.audit_event(
                    decision::PROCESSED,
                    Some(item.source.as_str()),
                    json!({
                        "order_id": order_id,
                        "document_number": document_number,
                        "duplicate": duplicate,
                        "ledger_writes": ledger_writes,
                        "ledger_write_failures": ledger_write_failures,
                    }),
                );
            }
            RecordOutcome::Skipped { source, reason } => {
                match reason {
                    SkipReason::InputError(_) | SkipReason::DocumentFailed { .. } => {
                        warn!(source = %source, reason = reason.code(), "record skipped: {reason}")
                    }
                    _ => info!(source = %source, reason = reason.code(), "record skipped: {reason}"),
                }
                let name = match reason {
                    SkipReason::DocumentFailed { .. } => decision::DOCUMENT_FAILED,
                    _ => decision::SKIPPED,
                };
                self.audit_event(
                    name,
                    Some(source.as_str()),
                    json!({ "reason": reason.code(), "detail": reason.to_string() }),
                );
            }
        }

        self.summary.record(&outcome);
        outcome
    }

    async fn decide(&mut self, item: &InputItem) -> RecordOutcome {
        let skip = |reason: SkipReason| RecordOutcome::Skipped {
            source: item.source.clone(),
            reason,
        };

        // Received
        let raw = match &item.parsed {
            Ok(raw) => raw,
            Err(e) => return skip(SkipReason::InputError(e.to_string())),
        };

        if !raw.passed_upstream_validation() {
            let status = raw.validation_status.clone().unwrap_or_default();
            return skip(SkipReason::NotPassed(status));
        }

        // AlreadyPaid: any paid line skips the whole record.
        for key in raw.ledger_keys() {
            if self.ledger.is_paid(&key).await {
                return skip(SkipReason::AlreadyPaid(key));
            }
        }

        // Normalized -> Invalid | Ready
        let record = normalize(raw, &item.source);
        if let Err(v) = validate(&record) {
            return skip(SkipReason::Invalid(v));
        }

        // OutputComputed
        let Some(row) = self.compute_row(&record) else {
            return skip(SkipReason::Invalid(ValidationFailure::TotalOutOfRange));
        };

        // Persisted
        if let Err(e) = self.persist(&row) {
            return skip(SkipReason::DocumentFailed {
                document_number: row.document_number.clone(),
                message: format!("export failed: {e:#}"),
            });
        }

        // DocumentGenerated | DocumentFailed
        match self.sink.render(&record, &row, &self.paths) {
            Ok(doc) => debug!(
                json = %doc.json_path.display(),
                pdf = %doc.pdf_path.display(),
                "document rendered"
            ),
            Err(e) => {
                return skip(SkipReason::DocumentFailed {
                    document_number: row.document_number.clone(),
                    message: format!("{e:#}"),
                })
            }
        }

        let (ledger_writes, ledger_write_failures) = self.record_payments(&record, &row).await;

        RecordOutcome::Processed {
            order_id: record.order_label().to_string(),
            document_number: row.document_number,
            duplicate: row.duplicate,
            ledger_writes,
            ledger_write_failures,
        }
    }

    fn compute_row(&mut self, record: &CanonicalRecord) -> Option<OutputRow> {
        let key = duplicate_key(record);
        let duplicate = self.index.is_duplicate(&key);

        let index = &self.index;
        let document_number = self.numbers.allocate(|n| index.is_seen_control_number(n));

        build_output_row(
            record,
            RowContext {
                rules: &self.config.rules,
                defaults: &self.config.defaults,
                bill_date: self.bill_date,
            },
            &document_number,
            duplicate,
        )
    }

    /// Same row to the run export and the historical export, then the key
    /// joins the running set.
    fn persist(&mut self, row: &OutputRow) -> anyhow::Result<()> {
        self.sink.append_row(&self.paths.run_export, row)?;
        self.sink.append_row(&self.paths.historical_export, row)?;
        self.index.register(row.duplicate_key.clone());
        Ok(())
    }

    /// Upsert every keyed line item; returns (writes, failures).
    async fn record_payments(&mut self, record: &CanonicalRecord, row: &OutputRow) -> (u64, u64) {
        let mut writes = 0u64;
        let mut failures = 0u64;

        for li in &record.line_items {
            let (Some(key), Some(rate)) = (li.ledger_key.as_ref(), li.validated_rate) else {
                continue;
            };
            let update = PaymentUpdate {
                key: key.clone(),
                cpt: li.cpt.clone(),
                paid: rate,
                rate,
                document_number: row.document_number.clone(),
                processed_date: self.bill_date,
            };

            if self.ledger.upsert_payment(&update).await {
                writes += 1;
            } else {
                failures += 1;
                self.audit_event(
                    decision::LEDGER_WRITE_FAILED,
                    Some(record.source_file.as_str()),
                    json!({ "key": key.to_string(), "document_number": row.document_number }),
                );
            }
        }

        (writes, failures)
    }

    fn audit_event(&mut self, name: &str, source: Option<&str>, payload: serde_json::Value) {
        if let Some(audit) = self.audit.as_mut() {
            if let Err(e) = audit.append(name, source, payload) {
                warn!(error = %format!("{e:#}"), decision = name, "audit append failed");
            }
        }
    }
}
