//! Command handlers for the `eobr` binary.
//!
//! Shared helpers live here; command-specific logic lives in the submodules.

pub mod ledger;
pub mod run;

use anyhow::{bail, Result};
use eobr_audit::{verify_hash_chain, VerifyResult};
use eobr_config::{report_unused_keys, LoadedConfig, PipelineConfig, UnusedKeyPolicy};

/// Merge `paths` (defaults only when empty), warn on keys nothing reads,
/// and return the typed view alongside the merged document.
pub fn load_pipeline_config(paths: &[String]) -> Result<(LoadedConfig, PipelineConfig)> {
    let loaded = eobr_config::load_layered_yaml(paths)?;

    let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !report.is_clean() {
        eprintln!(
            "WARN: CONFIG_UNUSED_KEYS unused_leaf_keys={}",
            report.unused_leaf_pointers.len()
        );
        for p in report.unused_leaf_pointers.iter().take(50) {
            eprintln!("  unused={}", p);
        }
        let extra = report.unused_leaf_pointers.len().saturating_sub(50);
        if extra > 0 {
            eprintln!("  ... and {} more", extra);
        }
    }

    let cfg = loaded.pipeline()?;
    Ok((loaded, cfg))
}

pub fn audit_verify(path: &str) -> Result<()> {
    match verify_hash_chain(path)? {
        VerifyResult::Valid(trail) => {
            println!("audit_valid=true events={}", trail.events);
            if let Some(run_id) = trail.run_id {
                println!("run_id={}", run_id);
            }
            for (decision, n) in &trail.decisions {
                println!("{}={}", decision, n);
            }
            Ok(())
        }
        VerifyResult::Broken(b) => {
            println!(
                "audit_valid=false line={} seq={} decision={} source={}",
                b.line,
                b.seq,
                b.decision,
                b.source.as_deref().unwrap_or("-")
            );
            bail!("audit trail broken at {}", b)
        }
    }
}
