//! Full run against the filesystem and a file-backed ledger, then a second
//! run over the same input that changes nothing.

use std::path::Path;

use chrono::{NaiveDate, TimeZone, Utc};
use eobr_artifacts::{read_manifest, read_rows};
use eobr_audit::{verify_hash_chain, VerifyResult};
use eobr_config::PipelineConfig;
use eobr_runtime::{run_pipeline, RunRequest};
use eobr_schemas::LedgerKey;
use eobr_testkit::*;
use serde_json::json;

fn config_for(root: &Path) -> PipelineConfig {
    let mut cfg = PipelineConfig::default();
    cfg.input.json_dir = Some(root.join("in"));
    cfg.output.base_path = root.join("EOBR");
    cfg.output.historical_export = root.join("EOBR/Historical_EOBR_Data.csv");
    cfg.ledger.url = format!("sqlite://{}", root.join("EOBR/database/eobr_records.db").display());
    cfg
}

fn write_inputs(root: &Path) {
    let dir = root.join("in");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("a1.json"), example_record().to_string()).unwrap();
    std::fs::write(
        dir.join("batch.json"),
        json!([
            service_lines_record("B2", 7, "70450", 120.0),
            { "validation_status": "FAIL", "line_items": [] }
        ])
        .to_string(),
    )
    .unwrap();
    std::fs::write(dir.join("broken.json"), "{ not json").unwrap();
}

#[tokio::test]
async fn run_writes_rows_documents_audit_and_ledger() {
    let tmp = tempfile::tempdir().unwrap();
    write_inputs(tmp.path());
    let cfg = config_for(tmp.path());

    let report = run_pipeline(RunRequest {
        config: cfg.clone(),
        config_hash: "abc123".into(),
        // Late evening west of UTC: the local date is still the 5th.
        started_at: Utc.with_ymd_and_hms(2025, 3, 6, 2, 30, 0).unwrap(),
        bill_date: NaiveDate::from_ymd_opt(2025, 3, 5).unwrap(),
    })
    .await
    .unwrap();

    let s = &report.summary;
    assert_eq!(s.processed, 2);
    assert_eq!(s.not_passed, 1);
    assert_eq!(s.input_errors, 1);
    assert_eq!(s.processed + s.skipped, 4);

    let folder = &report.run_folder;
    let rows = read_rows(&folder.run_export).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r[8] == "03/05/2025"));
    assert_eq!(read_rows(&cfg.output.historical_export).unwrap().len(), 2);
    assert!(folder.docs_dir.join("EOBR-20250305-0001.json").exists());
    assert!(folder.pdf_dir.join("EOBR-20250305-0002.pdf").exists());
    assert!(folder.summary_path.exists());

    let manifest = read_manifest(&folder.manifest_path).unwrap();
    assert_eq!(manifest.run_id, report.run_id);
    assert_eq!(manifest.config_hash, "abc123");

    match verify_hash_chain(&folder.audit_path).unwrap() {
        VerifyResult::Valid(trail) => {
            assert!(trail.events >= 6);
            assert_eq!(trail.run_id, Some(report.run_id));
            assert_eq!(trail.decisions.get("processed"), Some(&2));
        }
        VerifyResult::Broken(b) => panic!("audit broken at {b}"),
    }

    let ledger = eobr_db::Ledger::connect(&cfg.ledger.url).await.unwrap();
    assert!(ledger.is_paid(&LedgerKey::new(42, "A1")).await);
    assert!(ledger.is_paid(&LedgerKey::new(7, "B2")).await);
    ledger.close().await;

    let again = run_pipeline(RunRequest {
        config: cfg.clone(),
        config_hash: "abc123".into(),
        started_at: Utc.with_ymd_and_hms(2025, 3, 6, 9, 30, 0).unwrap(),
        bill_date: NaiveDate::from_ymd_opt(2025, 3, 6).unwrap(),
    })
    .await
    .unwrap();

    assert_eq!(again.summary.processed, 0);
    assert_eq!(again.summary.already_paid, 2);
    assert_eq!(read_rows(&cfg.output.historical_export).unwrap().len(), 2);
    assert!(read_rows(&again.run_folder.run_export).unwrap_or_default().is_empty());
}

#[tokio::test]
async fn missing_input_location_fails_before_any_output() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config_for(tmp.path());

    let err = run_pipeline(RunRequest::starting_now(cfg.clone(), "h".into()))
        .await
        .unwrap_err();

    assert!(format!("{err:#}").contains("input precondition failed"));
    assert!(!cfg.output.base_path.exists());
}
