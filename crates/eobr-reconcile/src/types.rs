use std::fmt;

use serde::Serialize;

use eobr_ingest::ValidationFailure;
use eobr_schemas::LedgerKey;

/// Why a record produced no billed output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Unreadable file, bad JSON, or unknown shape.
    InputError(String),
    /// Upstream `validation_status` was present and not `PASS`.
    NotPassed(String),
    /// At least one line item's ledger key is already paid.
    AlreadyPaid(LedgerKey),
    Invalid(ValidationFailure),
    /// Row persisted, document rendering failed; no ledger write.
    DocumentFailed {
        document_number: String,
        message: String,
    },
}

impl SkipReason {
    /// Stable code for logs and the audit trail.
    pub fn code(&self) -> &'static str {
        match self {
            SkipReason::InputError(_) => "input_error",
            SkipReason::NotPassed(_) => "not_passed",
            SkipReason::AlreadyPaid(_) => "already_paid",
            SkipReason::Invalid(_) => "invalid",
            SkipReason::DocumentFailed { .. } => "document_failed",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::InputError(msg) => write!(f, "input error: {msg}"),
            SkipReason::NotPassed(status) => write!(f, "validation_status is '{status}', not PASS"),
            SkipReason::AlreadyPaid(key) => write!(f, "line item {key} already paid"),
            SkipReason::Invalid(v) => write!(f, "invalid record: {v}"),
            SkipReason::DocumentFailed {
                document_number,
                message,
            } => write!(f, "document {document_number} failed: {message}"),
        }
    }
}

/// Terminal state of one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Processed {
        order_id: String,
        document_number: String,
        duplicate: bool,
        ledger_writes: u64,
        ledger_write_failures: u64,
    },
    Skipped {
        source: String,
        reason: SkipReason,
    },
}

impl RecordOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, RecordOutcome::Processed { .. })
    }
}

/// Run totals. `processed + skipped` equals the number of input items.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: u64,
    pub skipped: u64,
    pub already_paid: u64,
    pub invalid: u64,
    pub input_errors: u64,
    pub not_passed: u64,
    pub document_failures: u64,
    pub duplicates: u64,
    pub ledger_writes: u64,
    pub ledger_write_failures: u64,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &RecordOutcome) {
        match outcome {
            RecordOutcome::Processed {
                duplicate,
                ledger_writes,
                ledger_write_failures,
                ..
            } => {
                self.processed += 1;
                if *duplicate {
                    self.duplicates += 1;
                }
                self.ledger_writes += ledger_writes;
                self.ledger_write_failures += ledger_write_failures;
            }
            RecordOutcome::Skipped { reason, .. } => {
                self.skipped += 1;
                match reason {
                    SkipReason::InputError(_) => self.input_errors += 1,
                    SkipReason::NotPassed(_) => self.not_passed += 1,
                    SkipReason::AlreadyPaid(_) => self.already_paid += 1,
                    SkipReason::Invalid(_) => self.invalid += 1,
                    SkipReason::DocumentFailed { .. } => self.document_failures += 1,
                }
            }
        }
    }

    /// `key=value` lines in a fixed order.
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("processed={}", self.processed),
            format!("skipped={}", self.skipped),
            format!("already_paid={}", self.already_paid),
            format!("invalid={}", self.invalid),
            format!("input_errors={}", self.input_errors),
            format!("not_passed={}", self.not_passed),
            format!("document_failures={}", self.document_failures),
            format!("duplicates={}", self.duplicates),
            format!("ledger_writes={}", self.ledger_writes),
            format!("ledger_write_failures={}", self.ledger_write_failures),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_buckets_every_outcome() {
        let mut s = RunSummary::default();
        s.record(&RecordOutcome::Processed {
            order_id: "A1".into(),
            document_number: "EOBR-20250101-0001".into(),
            duplicate: true,
            ledger_writes: 2,
            ledger_write_failures: 1,
        });
        for reason in [
            SkipReason::InputError("bad".into()),
            SkipReason::NotPassed("FAIL".into()),
            SkipReason::AlreadyPaid(LedgerKey::new(1, "A1")),
            SkipReason::Invalid(ValidationFailure::NoLineItems),
            SkipReason::DocumentFailed {
                document_number: "D".into(),
                message: "disk full".into(),
            },
        ] {
            s.record(&RecordOutcome::Skipped {
                source: "x.json".into(),
                reason,
            });
        }

        assert_eq!(s.processed, 1);
        assert_eq!(s.skipped, 5);
        assert_eq!(s.duplicates, 1);
        assert_eq!(s.ledger_writes, 2);
        assert_eq!(s.ledger_write_failures, 1);
        assert_eq!(
            (s.input_errors, s.not_passed, s.already_paid, s.invalid, s.document_failures),
            (1, 1, 1, 1, 1)
        );
        assert_eq!(s.lines()[0], "processed=1");
        assert_eq!(s.lines()[1], "skipped=5");
    }
}
