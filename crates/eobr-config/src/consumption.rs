//! Unused-key report.
//!
//! The keys the pipeline reads are exactly the leaves of a serialized
//! default [`PipelineConfig`], so the registry follows the struct. A leaf of
//! the merged document is "used" when it equals one of those pointers or
//! sits below one (list entries such as `/rules/acceptable_pos/0`).
//! Anything else is reported, so a typo in an override file
//! (`defaults/term`) does not silently fall back to a default.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pipeline::PipelineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Pointers the pipeline reads, sorted.
    pub consumed_prefixes: Vec<String>,
    /// Leaves of the document that nothing reads, sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// JSON pointers of every field `PipelineConfig` deserializes.
pub fn consumed_pointers() -> Vec<String> {
    match serde_json::to_value(PipelineConfig::default()) {
        Ok(defaults) => leaf_pointers(&defaults, false),
        Err(_) => Vec::new(),
    }
}

/// With [`UnusedKeyPolicy::Fail`], any unused key is an error.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let consumed = consumed_pointers();

    let unused: Vec<String> = leaf_pointers(config_json, true)
        .into_iter()
        .filter(|leaf| !consumed.iter().any(|c| covers(c, leaf)))
        .collect();

    let report = UnusedKeyReport {
        consumed_prefixes: consumed,
        unused_leaf_pointers: unused,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} config key(s) are not read by the pipeline: {:?}",
            report.unused_leaf_pointers.len(),
            report.unused_leaf_pointers.iter().take(12).collect::<Vec<_>>()
        );
    }

    Ok(report)
}

/// `/rules/acceptable_pos` covers itself and `/rules/acceptable_pos/0`, not
/// `/rules/acceptable_pos_extra`.
fn covers(pointer: &str, leaf: &str) -> bool {
    match leaf.strip_prefix(pointer) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Sorted, unique leaf pointers. Non-empty objects are always walked;
/// arrays only when `into_arrays` is set. The root itself is never a leaf.
fn leaf_pointers(root: &Value, into_arrays: bool) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack: Vec<(String, &Value)> = vec![(String::new(), root)];

    while let Some((pointer, v)) = stack.pop() {
        match v {
            Value::Object(map) if !map.is_empty() => {
                for (k, child) in map {
                    let token = k.replace('~', "~0").replace('/', "~1");
                    stack.push((format!("{pointer}/{token}"), child));
                }
            }
            Value::Array(items) if into_arrays && !items.is_empty() => {
                for (i, child) in items.iter().enumerate() {
                    stack.push((format!("{pointer}/{i}"), child));
                }
            }
            _ if pointer.is_empty() => {}
            _ => out.push(pointer),
        }
    }

    out.sort();
    out.dedup();
    out
}
