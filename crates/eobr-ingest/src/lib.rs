//! eobr-ingest
//!
//! Input boundary of the billing pipeline: load JSON records, identify
//! their shape, normalize them into [`eobr_schemas::CanonicalRecord`], and
//! validate the result.
//!
//! Nothing here touches the ledger or writes output.

mod lenient;
pub mod loader;
pub mod normalizer;
pub mod raw;
pub mod validator;

pub use loader::{discover_input_files, load_input, read_input_file, InputItem};
pub use normalizer::{normalize, ShapeNormalizer};
pub use raw::{CanonicalShape, IngestError, RawRecord, RawShape, ServiceLinesShape};
pub use validator::{is_valid, validate, ValidationFailure};
