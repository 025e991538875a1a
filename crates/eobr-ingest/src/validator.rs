//! Completeness gate over the canonical shape. Pure: no I/O, no logging.

use std::fmt;

use eobr_schemas::{CanonicalRecord, Cents};

/// The first rule a record broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    NoLineItems,
    /// Zero-based index of the first line without a validated rate.
    MissingValidatedRate { line: usize },
    /// The validated rates do not fit in one total.
    TotalOutOfRange,
    MissingDateOfService,
    MissingPatientName,
    MissingBillingName,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationFailure::NoLineItems => write!(f, "record has no line items"),
            ValidationFailure::MissingValidatedRate { line } => {
                write!(f, "line item {line} has no validated rate")
            }
            ValidationFailure::TotalOutOfRange => {
                write!(f, "sum of validated rates is out of range")
            }
            ValidationFailure::MissingDateOfService => {
                write!(f, "no date of service on the record or any line item")
            }
            ValidationFailure::MissingPatientName => write!(f, "patient name is missing"),
            ValidationFailure::MissingBillingName => write!(f, "provider billing name is missing"),
        }
    }
}

impl std::error::Error for ValidationFailure {}

/// Check every rule; the whole record fails on the first broken one.
pub fn validate(record: &CanonicalRecord) -> Result<(), ValidationFailure> {
    if record.line_items.is_empty() {
        return Err(ValidationFailure::NoLineItems);
    }

    if let Some(line) = record
        .line_items
        .iter()
        .position(|li| li.validated_rate.is_none())
    {
        return Err(ValidationFailure::MissingValidatedRate { line });
    }

    let rates = record.line_items.iter().filter_map(|li| li.validated_rate);
    if Cents::checked_sum(rates).is_none() {
        return Err(ValidationFailure::TotalOutOfRange);
    }

    if record.service_date().is_none() {
        return Err(ValidationFailure::MissingDateOfService);
    }

    if record.patient_name().is_none() {
        return Err(ValidationFailure::MissingPatientName);
    }

    if record.billing_name().is_none() {
        return Err(ValidationFailure::MissingBillingName);
    }

    Ok(())
}

pub fn is_valid(record: &CanonicalRecord) -> bool {
    validate(record).is_ok()
}
