//! `eobr run`

use anyhow::Result;
use tracing::info;

use eobr_runtime::{run_pipeline, RunRequest};

use super::load_pipeline_config;

pub async fn run(config_paths: Vec<String>) -> Result<()> {
    let (loaded, cfg) = load_pipeline_config(&config_paths)?;
    info!(config_hash = %loaded.config_hash, "config loaded");

    let report = run_pipeline(RunRequest::starting_now(cfg, loaded.config_hash.clone())).await?;

    println!("run_id={}", report.run_id);
    println!("run_dir={}", report.run_folder.run_dir.display());
    println!("config_hash={}", loaded.config_hash);
    for line in report.summary.lines() {
        println!("{}", line);
    }
    Ok(())
}
