//! eobr-runtime
//!
//! The reconciliation engine and the run driver around it.
//!
//! Per record, strictly in input order:
//!
//! ```text
//! Received -> AlreadyPaid (skip)
//!          -> Normalized -> Invalid (skip)
//!                        -> Ready -> OutputComputed -> Persisted
//!                                 -> DocumentFailed (skip, no ledger write)
//!                                 -> DocumentGenerated -> ledger upsert
//! ```
//!
//! Nothing that goes wrong with one record escapes [`Engine::process_item`].

mod engine;
mod pipeline;

pub use engine::{Engine, EngineParts};
pub use pipeline::{load_all_inputs, run_pipeline, RunReport, RunRequest};

pub use eobr_reconcile::{RecordOutcome, RunSummary, SkipReason};
