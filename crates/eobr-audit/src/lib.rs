//! eobr-audit
//!
//! Append-only JSONL trail of per-record decisions for one run. With the
//! hash chain enabled every line carries `hash_prev` (the previous line's
//! `hash_self`) and `hash_self` (SHA-256 over the line's canonical JSON
//! without `hash_self`), so edits and deletions are detectable.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Decision names used by the reconciliation engine.
pub mod decision {
    pub const RUN_STARTED: &str = "run_started";
    pub const PROCESSED: &str = "processed";
    pub const SKIPPED: &str = "skipped";
    pub const DOCUMENT_FAILED: &str = "document_failed";
    pub const LEDGER_WRITE_FAILED: &str = "ledger_write_failed";
    pub const RUN_FINISHED: &str = "run_finished";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub seq: u64,
    pub run_id: Uuid,
    pub ts_utc: DateTime<Utc>,
    pub decision: String,
    /// Input item the decision is about; `None` for run-level events.
    pub source: Option<String>,
    pub payload: Value,
    pub hash_prev: Option<String>,
    pub hash_self: Option<String>,
}

/// Writer for one run's `audit.jsonl`. Each line is flushed on append.
pub struct AuditWriter {
    path: PathBuf,
    out: BufWriter<File>,
    run_id: Uuid,
    hash_chain: bool,
    last_hash: Option<String>,
    seq: u64,
}

impl AuditWriter {
    /// Open `path` for appending, creating parent directories.
    pub fn open(path: impl AsRef<Path>, run_id: Uuid, hash_chain: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create audit dir failed: {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open audit log failed: {}", path.display()))?;

        Ok(Self {
            path,
            out: BufWriter::new(file),
            run_id,
            hash_chain,
            last_hash: None,
            seq: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Events appended so far.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    pub fn append(&mut self, decision: &str, source: Option<&str>, payload: Value) -> Result<AuditEvent> {
        let mut ev = AuditEvent {
            seq: self.seq,
            run_id: self.run_id,
            ts_utc: Utc::now(),
            decision: decision.to_string(),
            source: source.map(String::from),
            payload,
            hash_prev: None,
            hash_self: None,
        };

        if self.hash_chain {
            ev.hash_prev = self.last_hash.clone();
            let h = compute_event_hash(&ev)?;
            ev.hash_self = Some(h.clone());
            self.last_hash = Some(h);
        }

        let line = canonical_json(&ev)?;
        self.out
            .write_all(line.as_bytes())
            .and_then(|_| self.out.write_all(b"\n"))
            .and_then(|_| self.out.flush())
            .with_context(|| format!("append audit line failed: {}", self.path.display()))?;

        self.seq += 1;
        Ok(ev)
    }
}

/// Compact JSON with object keys sorted at every level.
fn canonical_json<T: Serialize>(v: &T) -> Result<String> {
    let raw = serde_json::to_value(v).context("serialize audit event failed")?;
    serde_json::to_string(&sort_keys(raw)).context("json stringify failed")
}

fn sort_keys(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_keys(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// SHA-256 over the canonical JSON of `ev` with `hash_self` cleared.
pub fn compute_event_hash(ev: &AuditEvent) -> Result<String> {
    let mut unsigned = ev.clone();
    unsigned.hash_self = None;

    let mut hasher = Sha256::new();
    hasher.update(canonical_json(&unsigned)?.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Outcome of checking one run's trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Valid(TrailSummary),
    Broken(TrailBreak),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrailSummary {
    pub events: usize,
    pub run_id: Option<Uuid>,
    /// Event count per decision name.
    pub decisions: BTreeMap<String, u64>,
}

/// The first event that does not fit the trail, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrailBreak {
    /// 1-based line in the file.
    pub line: usize,
    pub seq: u64,
    pub decision: String,
    pub source: Option<String>,
    pub fault: TrailFault,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrailFault {
    /// A gap or reordering in `seq`: an event was removed or moved.
    OutOfOrder { expected: u64 },
    /// The event names a different run than the first line.
    ForeignRun { expected: Uuid, found: Uuid },
    /// `hash_prev` does not match the previous event's `hash_self`.
    Unlinked { expected: Option<String>, found: Option<String> },
    /// The event's content no longer hashes to its `hash_self`.
    Altered { claimed: String, recomputed: String },
}

impl fmt::Display for TrailFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrailFault::OutOfOrder { expected } => write!(f, "expected seq {expected}"),
            TrailFault::ForeignRun { expected, found } => {
                write!(f, "run_id {found} in a trail for run {expected}")
            }
            TrailFault::Unlinked { expected, found } => write!(
                f,
                "hash_prev is {}, previous hash_self is {}",
                found.as_deref().unwrap_or("none"),
                expected.as_deref().unwrap_or("none")
            ),
            TrailFault::Altered { claimed, recomputed } => {
                write!(f, "content hashes to {recomputed}, line claims {claimed}")
            }
        }
    }
}

impl fmt::Display for TrailBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} (seq {}, {}", self.line, self.seq, self.decision)?;
        if let Some(src) = &self.source {
            write!(f, " for {src}")?;
        }
        write!(f, "): {}", self.fault)
    }
}

pub fn verify_hash_chain(path: impl AsRef<Path>) -> Result<VerifyResult> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("read audit log failed: {}", path.as_ref().display()))?;
    verify_hash_chain_str(&content)
}

/// Walk the trail in file order and stop at the first event that breaks it.
///
/// Every trail must number its events from 0 without gaps and carry one
/// run id. Chained trails must also link and self-hash. Unparseable lines
/// are an error rather than a break.
pub fn verify_hash_chain_str(content: &str) -> Result<VerifyResult> {
    let mut summary = TrailSummary::default();
    let mut prev_hash: Option<String> = None;

    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let ev: AuditEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("parse audit event at line {}", i + 1))?;

        if let Some(fault) = trail_fault(&ev, &summary, prev_hash.as_deref())? {
            return Ok(VerifyResult::Broken(TrailBreak {
                line: i + 1,
                seq: ev.seq,
                decision: ev.decision,
                source: ev.source,
                fault,
            }));
        }

        summary.events += 1;
        summary.run_id.get_or_insert(ev.run_id);
        *summary.decisions.entry(ev.decision).or_default() += 1;
        prev_hash = ev.hash_self;
    }

    Ok(VerifyResult::Valid(summary))
}

fn trail_fault(ev: &AuditEvent, so_far: &TrailSummary, prev_hash: Option<&str>) -> Result<Option<TrailFault>> {
    let expected = so_far.events as u64;
    if ev.seq != expected {
        return Ok(Some(TrailFault::OutOfOrder { expected }));
    }
    if let Some(run_id) = so_far.run_id.filter(|r| *r != ev.run_id) {
        return Ok(Some(TrailFault::ForeignRun {
            expected: run_id,
            found: ev.run_id,
        }));
    }
    if ev.hash_prev.as_deref() != prev_hash {
        return Ok(Some(TrailFault::Unlinked {
            expected: prev_hash.map(String::from),
            found: ev.hash_prev.clone(),
        }));
    }
    if let Some(claimed) = ev.hash_self.as_deref() {
        let recomputed = compute_event_hash(ev)?;
        if claimed != recomputed {
            return Ok(Some(TrailFault::Altered {
                claimed: claimed.to_string(),
                recomputed,
            }));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unchained_events_carry_no_hashes() {
        let dir = tempfile::tempdir().unwrap();
        let mut w = AuditWriter::open(dir.path().join("audit.jsonl"), Uuid::new_v4(), false).unwrap();
        let ev = w.append(decision::PROCESSED, Some("a.json"), json!({"order_id": "A1"})).unwrap();
        assert_eq!(ev.seq, 0);
        assert!(ev.hash_prev.is_none() && ev.hash_self.is_none());
        assert_eq!(w.seq(), 1);
        assert!(w.last_hash().is_none());
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let s = canonical_json(&json!({"b": {"z": 1, "a": 2}, "a": [ {"y": 1, "x": 2} ]})).unwrap();
        assert_eq!(s, r#"{"a":[{"x":2,"y":1}],"b":{"a":2,"z":1}}"#);
    }
}
