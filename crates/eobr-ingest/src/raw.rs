//! Raw input boundary.
//!
//! This module defines the supported input shapes and decides which one a
//! JSON value is. It does **not** normalize (see `normalizer.rs`) or judge
//! completeness (see `validator.rs`).
//!
//! Supported shapes:
//! - [`CanonicalShape`]: `line_items` + `patient_info` + `provider_info`,
//!   either flat or wrapped in a `data` envelope.
//! - [`ServiceLinesShape`]: `service_lines` + `order_details` +
//!   `provider_details`.
//!
//! A new upstream format is a new [`RawShape`] variant plus a
//! `ShapeNormalizer` impl; nothing downstream changes.

use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

use eobr_schemas::LedgerKey;

use crate::lenient;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Why an input item could not become a [`RawRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The file could not be read.
    Io { source: String, message: String },
    /// The file is not valid JSON.
    Json { source: String, message: String },
    /// The item is valid JSON but not an object.
    NotAnObject { source: String },
    /// The object matches none of the supported shapes.
    UnknownShape { source: String },
    /// The object matches a shape but a nested structure has the wrong type.
    Malformed { source: String, message: String },
}

impl IngestError {
    pub fn source_name(&self) -> &str {
        match self {
            IngestError::Io { source, .. }
            | IngestError::Json { source, .. }
            | IngestError::NotAnObject { source }
            | IngestError::UnknownShape { source }
            | IngestError::Malformed { source, .. } => source,
        }
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestError::Io { source, message } => write!(f, "{source}: read failed: {message}"),
            IngestError::Json { source, message } => write!(f, "{source}: invalid json: {message}"),
            IngestError::NotAnObject { source } => {
                write!(f, "{source}: record is not a JSON object")
            }
            IngestError::UnknownShape { source } => write!(
                f,
                "{source}: unrecognised record shape (expected line_items or service_lines)"
            ),
            IngestError::Malformed { source, message } => {
                write!(f, "{source}: malformed record: {message}")
            }
        }
    }
}

impl std::error::Error for IngestError {}

// ---------------------------------------------------------------------------
// Shapes
// ---------------------------------------------------------------------------

/// Already-canonical input.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CanonicalShape {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub order_id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub date_of_service: Option<String>,
    #[serde(deserialize_with = "lenient::object")]
    pub patient_info: Map<String, Value>,
    #[serde(deserialize_with = "lenient::object")]
    pub provider_info: Map<String, Value>,
    pub line_items: Vec<CanonicalLine>,
}

/// One canonical line item. Older exports spell some fields differently;
/// both spellings may appear on the same line and the canonical one wins.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CanonicalLine {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub date_of_service: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub cpt: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub cpt_code: Option<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub modifier: Vec<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub modifiers: Vec<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub pos: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub place_of_service: Option<String>,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub units: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub charge: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub charge_amount: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub validated_rate: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub assigned_rate: Option<f64>,
    pub payment_id: Option<Value>,
    pub line_item_id: Option<Value>,
}

impl CanonicalLine {
    pub fn cpt(&self) -> Option<&String> {
        self.cpt.as_ref().or(self.cpt_code.as_ref())
    }

    pub fn modifiers(&self) -> &[String] {
        if self.modifier.is_empty() {
            &self.modifiers
        } else {
            &self.modifier
        }
    }

    pub fn pos(&self) -> Option<&String> {
        self.pos.as_ref().or(self.place_of_service.as_ref())
    }

    pub fn charge(&self) -> Option<f64> {
        self.charge.or(self.charge_amount)
    }

    pub fn validated_rate(&self) -> Option<f64> {
        self.validated_rate.or(self.assigned_rate)
    }

    pub fn payment_ref(&self) -> Option<&Value> {
        self.payment_id.as_ref().or(self.line_item_id.as_ref())
    }
}

/// The `service_lines + order_details + provider_details` export.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceLinesShape {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub order_id: Option<String>,
    pub service_lines: Vec<ServiceLine>,
    #[serde(deserialize_with = "lenient::object")]
    pub order_details: Map<String, Value>,
    #[serde(deserialize_with = "lenient::object")]
    pub provider_details: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceLine {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub date_of_service: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub cpt_code: Option<String>,
    #[serde(deserialize_with = "lenient::string_list")]
    pub modifiers: Vec<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub place_of_service: Option<String>,
    #[serde(deserialize_with = "lenient::opt_i64")]
    pub units: Option<i64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub charge_amount: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub assigned_rate: Option<f64>,
    pub payment_id: Option<Value>,
}

/// Discriminated set of supported input shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum RawShape {
    Canonical(CanonicalShape),
    ServiceLines(ServiceLinesShape),
}

/// One input record, shape identified, not yet normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// Upstream validator verdict; absent means "not reported".
    pub validation_status: Option<String>,
    pub shape: RawShape,
}

impl RawRecord {
    /// Identify the shape of `value` and decode it.
    pub fn from_value(value: Value, source: &str) -> Result<Self, IngestError> {
        let Value::Object(mut obj) = value else {
            return Err(IngestError::NotAnObject {
                source: source.to_string(),
            });
        };

        let validation_status = obj.get("validation_status").and_then(lenient::value_to_string);
        let malformed = |e: serde_json::Error| IngestError::Malformed {
            source: source.to_string(),
            message: e.to_string(),
        };

        let shape = if obj.contains_key("service_lines") {
            RawShape::ServiceLines(
                serde_json::from_value(Value::Object(obj)).map_err(malformed)?,
            )
        } else if let Some(Value::Object(data)) = obj.remove("data") {
            let mut shape: CanonicalShape =
                serde_json::from_value(Value::Object(data)).map_err(malformed)?;
            // The envelope may carry the order id beside `data` rather than inside it.
            if shape.order_id.is_none() {
                shape.order_id = obj.get("order_id").and_then(lenient::value_to_string);
            }
            RawShape::Canonical(shape)
        } else if obj.contains_key("line_items") {
            RawShape::Canonical(serde_json::from_value(Value::Object(obj)).map_err(malformed)?)
        } else {
            return Err(IngestError::UnknownShape {
                source: source.to_string(),
            });
        };

        Ok(RawRecord {
            validation_status,
            shape,
        })
    }

    /// `true` unless the upstream validator reported something other than `PASS`.
    pub fn passed_upstream_validation(&self) -> bool {
        self.validation_status
            .as_deref()
            .map(|s| s == "PASS")
            .unwrap_or(true)
    }

    pub fn order_id(&self) -> Option<&str> {
        match &self.shape {
            RawShape::Canonical(s) => s.order_id.as_deref(),
            RawShape::ServiceLines(s) => s.order_id.as_deref(),
        }
    }

    /// Ledger keys carried explicitly by the raw line items.
    pub fn ledger_keys(&self) -> Vec<LedgerKey> {
        let order_id = self.order_id();
        let refs: Vec<Option<&Value>> = match &self.shape {
            RawShape::Canonical(s) => s.line_items.iter().map(CanonicalLine::payment_ref).collect(),
            RawShape::ServiceLines(s) => {
                s.service_lines.iter().map(|l| l.payment_id.as_ref()).collect()
            }
        };
        refs.into_iter()
            .filter_map(|r| r.and_then(|v| ledger_key_from_payment_ref(v, order_id)))
            .collect()
    }
}

/// Resolve a payment reference into a ledger key.
///
/// Accepts a bare id (`42`, `"42"`) or an object
/// `{ "line_item_id": 42, "order_id": "A1" }`; the record's order id fills
/// in when the object has none. No key without both halves.
pub(crate) fn ledger_key_from_payment_ref(v: &Value, record_order_id: Option<&str>) -> Option<LedgerKey> {
    let (id, order) = match v {
        Value::Object(m) => (
            m.get("line_item_id")
                .or_else(|| m.get("id"))
                .and_then(lenient::value_to_i64),
            m.get("order_id").and_then(lenient::value_to_string),
        ),
        other => (lenient::value_to_i64(other), None),
    };

    let order = order.or_else(|| record_order_id.map(String::from))?;
    Some(LedgerKey::new(id?, order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn service_lines_shape_is_detected() {
        let v = json!({ "order_id": "A1", "service_lines": [] });
        let r = RawRecord::from_value(v, "a.json").unwrap();
        assert!(matches!(r.shape, RawShape::ServiceLines(_)));
        assert_eq!(r.order_id(), Some("A1"));
    }

    #[test]
    fn data_envelope_is_canonical_and_inherits_order_id() {
        let v = json!({ "order_id": "B2", "data": { "line_items": [] } });
        let r = RawRecord::from_value(v, "b.json").unwrap();
        assert!(matches!(r.shape, RawShape::Canonical(_)));
        assert_eq!(r.order_id(), Some("B2"));
    }

    #[test]
    fn unknown_shape_and_non_object_are_errors() {
        let e = RawRecord::from_value(json!({ "foo": 1 }), "c.json").unwrap_err();
        assert!(matches!(e, IngestError::UnknownShape { .. }));

        let e = RawRecord::from_value(json!([1, 2]), "d.json").unwrap_err();
        assert!(matches!(e, IngestError::NotAnObject { .. }));
        assert_eq!(e.source_name(), "d.json");
    }

    #[test]
    fn wrong_nested_type_is_malformed() {
        let e = RawRecord::from_value(json!({ "service_lines": "nope" }), "e.json").unwrap_err();
        assert!(matches!(e, IngestError::Malformed { .. }));
    }

    #[test]
    fn validation_status_gate() {
        let pass = RawRecord::from_value(
            json!({ "validation_status": "PASS", "line_items": [] }),
            "p",
        )
        .unwrap();
        let fail = RawRecord::from_value(
            json!({ "validation_status": "FAIL", "line_items": [] }),
            "f",
        )
        .unwrap();
        let absent = RawRecord::from_value(json!({ "line_items": [] }), "a").unwrap();

        assert!(pass.passed_upstream_validation());
        assert!(!fail.passed_upstream_validation());
        assert!(absent.passed_upstream_validation());
    }

    #[test]
    fn payment_refs_resolve_to_ledger_keys() {
        assert_eq!(
            ledger_key_from_payment_ref(&json!({ "line_item_id": 42 }), Some("A1")),
            Some(LedgerKey::new(42, "A1"))
        );
        assert_eq!(
            ledger_key_from_payment_ref(&json!({ "line_item_id": "7", "order_id": "Z9" }), Some("A1")),
            Some(LedgerKey::new(7, "Z9"))
        );
        assert_eq!(
            ledger_key_from_payment_ref(&json!(5), Some("A1")),
            Some(LedgerKey::new(5, "A1"))
        );
        assert_eq!(ledger_key_from_payment_ref(&json!({ "line_item_id": 42 }), None), None);
        assert_eq!(ledger_key_from_payment_ref(&json!({}), Some("A1")), None);
    }
}
