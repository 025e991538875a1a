//! eobr-reconcile
//!
//! Decision logic of the billing pipeline:
//! - duplicate detection against history plus the running set
//! - document-number allocation
//! - output-row computation
//! - per-record outcomes and the run summary
//!
//! Deterministic. The only I/O is reading the historical export once at
//! run start.

mod document_number;
mod duplicate;
mod row;
mod types;

pub use document_number::{format_document_number, DocumentNumberAllocator};
pub use duplicate::DuplicateIndex;
pub use row::{build_output_row, describe_line, duplicate_key, record_total, RowContext};
pub use types::*;
