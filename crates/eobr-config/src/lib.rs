//! eobr-config
//!
//! Layered YAML configuration for the billing pipeline.
//!
//! Layers are merged in order (base first, site and local overrides after),
//! converted to JSON, canonicalised and hashed. The merged JSON is then read
//! into a typed [`PipelineConfig`] that the CLI hands to the reconciliation
//! engine explicitly; nothing here is process-global.

mod consumption;
mod pipeline;

pub use consumption::{consumed_pointers, report_unused_keys, UnusedKeyPolicy, UnusedKeyReport};
pub use pipeline::{
    AuditConfig, DefaultsConfig, DocumentsConfig, InputConfig, LedgerConfig, OutputConfig,
    PipelineConfig, RulesConfig, DEFAULT_INPUT_DIR, ENV_LEDGER_URL, MAX_NET_DAYS,
};

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Merged configuration plus its identity. The hash goes into every run
/// manifest so two runs can be compared by configuration.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Lowercase hex SHA-256 of `canonical_json`.
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed view of the merged document. Missing keys take their defaults.
    pub fn pipeline(&self) -> Result<PipelineConfig> {
        PipelineConfig::from_json(&self.config_json)
    }
}

/// Read and merge YAML files. No paths means pure defaults.
pub fn load_layered_yaml<P: AsRef<Path>>(paths: &[P]) -> Result<LoadedConfig> {
    let layers = paths
        .iter()
        .map(|p| {
            let p = p.as_ref();
            fs::read_to_string(p).with_context(|| format!("read config layer failed: {}", p.display()))
        })
        .collect::<Result<Vec<String>>>()?;

    let refs: Vec<&str> = layers.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

pub fn load_layered_yaml_from_strings(layers: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Map::new());

    for (idx, layer) in layers.iter().enumerate() {
        let doc: serde_yaml::Value = serde_yaml::from_str(layer)
            .with_context(|| format!("config layer {idx} is not valid yaml"))?;
        // An empty document parses as null: no overrides.
        if doc.is_null() {
            continue;
        }
        let doc = serde_json::to_value(doc)
            .with_context(|| format!("config layer {idx} has no json form"))?;
        overlay(&mut merged, doc);
    }

    // serde_json's default Map is key-ordered, so compact output is canonical.
    let canonical_json = serde_json::to_string(&merged).context("serialize merged config failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));

    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Objects merge key by key; anything else in `top` replaces `base`.
fn overlay(base: &mut Value, top: Value) {
    match top {
        Value::Object(top_map) if base.is_object() => {
            if let Value::Object(base_map) = base {
                for (key, top_val) in top_map {
                    match base_map.get_mut(&key) {
                        Some(slot) => overlay(slot, top_val),
                        None => {
                            base_map.insert(key, top_val);
                        }
                    }
                }
            }
        }
        other => *base = other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_layer_overrides_nested_key_only() {
        let base = "defaults:\n  terms: Net 45\n  category: Base\n";
        let overlay = "defaults:\n  terms: Net 30\n";
        let loaded = load_layered_yaml_from_strings(&[base, overlay]).unwrap();

        assert_eq!(
            loaded.config_json.pointer("/defaults/terms").and_then(|v| v.as_str()),
            Some("Net 30")
        );
        assert_eq!(
            loaded.config_json.pointer("/defaults/category").and_then(|v| v.as_str()),
            Some("Base")
        );
    }

    #[test]
    fn empty_overlay_is_ignored() {
        let base = "ledger:\n  url: sqlite://x.db\n";
        let a = load_layered_yaml_from_strings(&[base]).unwrap();
        let b = load_layered_yaml_from_strings(&[base, ""]).unwrap();
        assert_eq!(a.config_hash, b.config_hash);
    }
}
