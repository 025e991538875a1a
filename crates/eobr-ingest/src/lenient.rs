//! Forgiving field decoders for upstream JSON.
//!
//! Validation logs are produced by several tools and do not agree on
//! types: CPT and POS codes arrive as numbers or strings, amounts as
//! numbers or `"$1,200.00"`, modifiers as a list or a comma string. These
//! helpers never fail on a wrong type; an unusable value becomes `None`
//! (or empty) and the validator decides what that means.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

pub(crate) fn value_to_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let t = s.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn value_to_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .trim_start_matches('$')
                .chars()
                .filter(|c| *c != ',')
                .collect();
            cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
        }
        _ => None,
    }
}

pub(crate) fn value_to_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let t = s.trim();
            t.parse::<i64>().ok().or_else(|| {
                t.parse::<f64>()
                    .ok()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

pub(crate) fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(value_to_string))
}

pub(crate) fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(value_to_f64))
}

pub(crate) fn opt_i64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.as_ref().and_then(value_to_i64))
}

/// `["26","59"]`, `"26,59"`, `26` and `null` are all accepted.
pub(crate) fn string_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::Array(items)) => items.iter().filter_map(value_to_string).collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(other) => value_to_string(&other).into_iter().collect(),
        None => Vec::new(),
    })
}

/// Any non-object (including `null`) becomes an empty map.
pub(crate) fn object<'de, D: Deserializer<'de>>(d: D) -> Result<Map<String, Value>, D::Error> {
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::Object(m)) => m,
        _ => Map::new(),
    })
}

/// First non-blank string among `keys` in `obj`.
pub(crate) fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find_map(value_to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn amounts_accept_numbers_and_currency_strings() {
        assert_eq!(value_to_f64(&json!(80)), Some(80.0));
        assert_eq!(value_to_f64(&json!("$1,200.50")), Some(1200.5));
        assert_eq!(value_to_f64(&json!("n/a")), None);
        assert_eq!(value_to_f64(&json!(null)), None);
    }

    #[test]
    fn codes_stringify_numbers() {
        assert_eq!(value_to_string(&json!(99213)), Some("99213".to_string()));
        assert_eq!(value_to_string(&json!("  11 ")), Some("11".to_string()));
        assert_eq!(value_to_string(&json!("")), None);
        assert_eq!(value_to_string(&json!(true)), None);
    }

    #[test]
    fn integers_accept_integral_floats_and_strings() {
        assert_eq!(value_to_i64(&json!(2)), Some(2));
        assert_eq!(value_to_i64(&json!(2.0)), Some(2));
        assert_eq!(value_to_i64(&json!(2.5)), None);
        assert_eq!(value_to_i64(&json!("42")), Some(42));
    }

    #[test]
    fn first_string_respects_key_priority() {
        let obj = json!({ "name": "b", "PatientName": "a" });
        let m = obj.as_object().unwrap();
        assert_eq!(first_string(m, &["PatientName", "name"]), Some("a".to_string()));
        assert_eq!(first_string(m, &["missing"]), None);
    }
}
