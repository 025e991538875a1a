//! Whole-run driver used by the CLI.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use tracing::info;
use uuid::Uuid;

use eobr_artifacts::{init_run_folder, FsOutputSink, InitRunFolderArgs, RunFolder};
use eobr_audit::AuditWriter;
use eobr_config::PipelineConfig;
use eobr_db::Ledger;
use eobr_ingest::{load_input, InputItem};
use eobr_reconcile::{DuplicateIndex, RunSummary};

use crate::engine::{Engine, EngineParts};

pub struct RunRequest {
    pub config: PipelineConfig,
    pub config_hash: String,
    /// Manifest timestamp and run-folder stamp.
    pub started_at: DateTime<Utc>,
    /// Calendar date printed as Bill Date and used in document numbers.
    pub bill_date: NaiveDate,
}

impl RunRequest {
    /// Starts now; the bill date is today on the local clock.
    pub fn starting_now(config: PipelineConfig, config_hash: String) -> Self {
        let started_at = Utc::now();
        Self {
            config,
            config_hash,
            started_at,
            bill_date: started_at.with_timezone(&Local).date_naive(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub run_folder: RunFolder,
    pub summary: RunSummary,
}

/// Precondition check and load for every input location.
/// Fails before any processing if a location is missing.
pub fn load_all_inputs(cfg: &PipelineConfig) -> Result<Vec<InputItem>> {
    let mut items = Vec::new();
    for p in &cfg.input_paths() {
        items.extend(load_input(p).with_context(|| format!("input precondition failed: {}", p.display()))?);
    }
    Ok(items)
}

/// Run the pipeline end to end: inputs, history, run folder, ledger,
/// engine, summary. The ledger is closed before returning.
pub async fn run_pipeline(req: RunRequest) -> Result<RunReport> {
    let cfg = req.config;
    let items = load_all_inputs(&cfg)?;
    info!(items = items.len(), "inputs loaded");

    let index = DuplicateIndex::load(&cfg.output.historical_export)?;
    info!(historical_keys = index.historical_len(), "duplicate index loaded");

    let run_id = Uuid::new_v4();
    let folder = init_run_folder(InitRunFolderArgs {
        base_path: &cfg.output.base_path,
        historical_export: &cfg.output.historical_export,
        run_id,
        started_at: req.started_at,
        config_hash: &req.config_hash,
    })?;
    info!(run_id = %run_id, run_dir = %folder.run_dir.display(), "run folder ready");

    let audit = AuditWriter::open(&folder.audit_path, run_id, cfg.audit.hash_chain)?;
    let paths = folder.output_paths(&cfg.output.historical_export);
    let ledger = Ledger::open_or_degraded(&cfg.ledger_url()).await;

    let mut engine = Engine::new(EngineParts {
        config: cfg,
        ledger,
        index,
        sink: FsOutputSink,
        paths,
        audit: Some(audit),
        bill_date: req.bill_date,
    });
    let summary = engine.run(&items).await;

    let (ledger, _, _) = engine.into_parts();
    ledger.close().await;

    folder.write_summary(&summary)?;

    Ok(RunReport {
        run_id,
        run_folder: folder,
        summary,
    })
}
