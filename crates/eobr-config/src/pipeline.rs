//! Typed pipeline configuration.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Overrides `ledger.url` when set (dev: via `.env.local`).
pub const ENV_LEDGER_URL: &str = "EOBR_LEDGER_URL";

/// Read when neither `input.json_path` nor `input.json_dir` is set.
pub const DEFAULT_INPUT_DIR: &str = "EOBR/input";

/// Upper bound on `Net N` terms (ten years).
pub const MAX_NET_DAYS: i64 = 3_650;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// A single JSON file holding an array of records.
    pub json_path: Option<PathBuf>,
    /// A directory of per-record JSON files.
    pub json_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root under which each run gets a timestamped folder.
    pub base_path: PathBuf,
    /// Long-lived export every run appends to; seeds duplicate detection.
    pub historical_export: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("EOBR"),
            historical_export: PathBuf::from("EOBR/Historical_EOBR_Data.csv"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub url: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://EOBR/database/eobr_records.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub acceptable_modifiers: BTreeSet<String>,
    pub acceptable_pos: BTreeSet<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            acceptable_modifiers: ["26", "25", "TC", "RT", "LT", "59"]
                .into_iter()
                .map(String::from)
                .collect(),
            acceptable_pos: ["49", "11"].into_iter().map(String::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub terms: String,
    pub category: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            terms: "Net 45".to_string(),
            category: "Subcontracted Services:Provider Services".to_string(),
        }
    }
}

impl DefaultsConfig {
    /// Days until due for `Net N` terms; 0 when the terms carry no number.
    pub fn net_days(&self) -> i64 {
        self.terms
            .split_whitespace()
            .filter_map(|tok| tok.parse::<i64>().ok())
            .next()
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentsConfig {
    pub number_prefix: String,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            number_prefix: "EOBR-".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub hash_chain: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { hash_chain: true }
    }
}

/// Everything the reconciliation engine and CLI read from configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub ledger: LedgerConfig,
    pub rules: RulesConfig,
    pub defaults: DefaultsConfig,
    pub documents: DocumentsConfig,
    pub audit: AuditConfig,
}

impl PipelineConfig {
    pub fn from_json(v: &Value) -> Result<Self> {
        let cfg: PipelineConfig =
            serde_json::from_value(v.clone()).context("config does not match pipeline schema")?;
        cfg.check()?;
        Ok(cfg)
    }

    /// Ledger URL with the environment override applied.
    pub fn ledger_url(&self) -> String {
        match std::env::var(ENV_LEDGER_URL) {
            Ok(v) if !v.trim().is_empty() => v,
            _ => self.ledger.url.clone(),
        }
    }

    /// Configured input locations, array file first. Falls back to
    /// [`DEFAULT_INPUT_DIR`] when none is configured.
    pub fn input_paths(&self) -> Vec<PathBuf> {
        let paths: Vec<PathBuf> = self
            .input
            .json_path
            .iter()
            .chain(self.input.json_dir.iter())
            .cloned()
            .collect();
        if paths.is_empty() {
            vec![PathBuf::from(DEFAULT_INPUT_DIR)]
        } else {
            paths
        }
    }

    fn check(&self) -> Result<()> {
        if self.documents.number_prefix.trim().is_empty() {
            bail!("documents.number_prefix must not be empty");
        }
        let days = self.defaults.net_days();
        if days < 0 {
            bail!("defaults.terms must not yield a negative day count");
        }
        if days > MAX_NET_DAYS {
            bail!("defaults.terms allows at most Net {MAX_NET_DAYS}, got Net {days}");
        }
        Ok(())
    }
}
