//! eobr-artifacts
//!
//! Everything the pipeline leaves on disk for a run:
//!
//! ```text
//! <base>/<YYYYMMDD_HHMMSS>/
//!   manifest.json
//!   audit.jsonl
//!   summary.json
//!   docs/<document_number>.json
//!   pdf/<document_number>.pdf
//!   excel/EOBR_Data_<stamp>.csv
//! ```
//!
//! plus rows appended to the long-lived historical export.

mod document;
mod export;
mod sink;

pub use document::{render_json, render_pdf, DocumentLine, EobrDocument};
pub use export::{append_row, read_rows};
pub use sink::{FsOutputSink, OutputPaths, OutputSink, RenderedDocument};

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MANIFEST_SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: i32,
    pub run_id: Uuid,
    pub stamp: String,
    pub config_hash: String,
    pub created_at_utc: DateTime<Utc>,
    pub historical_export: String,
    pub artifacts: ArtifactList,
}

/// Paths relative to the run folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactList {
    pub manifest_json: String,
    pub audit_jsonl: String,
    pub summary_json: String,
    pub run_export_csv: String,
    pub docs_dir: String,
    pub pdf_dir: String,
}

/// A scaffolded run folder.
#[derive(Debug, Clone)]
pub struct RunFolder {
    pub run_id: Uuid,
    pub stamp: String,
    pub run_dir: PathBuf,
    pub docs_dir: PathBuf,
    pub pdf_dir: PathBuf,
    pub excel_dir: PathBuf,
    pub run_export: PathBuf,
    pub manifest_path: PathBuf,
    pub audit_path: PathBuf,
    pub summary_path: PathBuf,
}

pub struct InitRunFolderArgs<'a> {
    pub base_path: &'a Path,
    pub historical_export: &'a Path,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub config_hash: &'a str,
}

/// `%Y%m%d_%H%M%S` of the run start.
pub fn run_stamp(started_at: DateTime<Utc>) -> String {
    started_at.format("%Y%m%d_%H%M%S").to_string()
}

/// Create the run folder and its sub-folders and write `manifest.json`.
pub fn init_run_folder(args: InitRunFolderArgs<'_>) -> Result<RunFolder> {
    let (stamp, run_dir) = unused_run_dir(args.base_path, &run_stamp(args.started_at));
    let docs_dir = run_dir.join("docs");
    let pdf_dir = run_dir.join("pdf");
    let excel_dir = run_dir.join("excel");

    for d in [&docs_dir, &pdf_dir, &excel_dir] {
        fs::create_dir_all(d).with_context(|| format!("create run dir failed: {}", d.display()))?;
    }
    if let Some(parent) = args.historical_export.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create historical export dir failed: {}", parent.display()))?;
    }

    let export_name = format!("EOBR_Data_{stamp}.csv");
    let folder = RunFolder {
        run_id: args.run_id,
        stamp: stamp.clone(),
        docs_dir,
        pdf_dir,
        run_export: excel_dir.join(&export_name),
        excel_dir,
        manifest_path: run_dir.join("manifest.json"),
        audit_path: run_dir.join("audit.jsonl"),
        summary_path: run_dir.join("summary.json"),
        run_dir,
    };

    let manifest = RunManifest {
        schema_version: MANIFEST_SCHEMA_VERSION,
        run_id: args.run_id,
        stamp,
        config_hash: args.config_hash.to_string(),
        created_at_utc: args.started_at,
        historical_export: args.historical_export.display().to_string(),
        artifacts: ArtifactList {
            manifest_json: "manifest.json".to_string(),
            audit_jsonl: "audit.jsonl".to_string(),
            summary_json: "summary.json".to_string(),
            run_export_csv: format!("excel/{export_name}"),
            docs_dir: "docs".to_string(),
            pdf_dir: "pdf".to_string(),
        },
    };
    write_json_pretty(&folder.manifest_path, &manifest).context("write manifest failed")?;

    Ok(folder)
}

/// `<base>/<stamp>`, or `<stamp>_2`, `<stamp>_3`... when a run started in
/// the same second already owns that folder.
fn unused_run_dir(base: &Path, stamp: &str) -> (String, PathBuf) {
    let mut candidate = stamp.to_string();
    let mut n = 1u32;
    while base.join(&candidate).exists() {
        n += 1;
        candidate = format!("{stamp}_{n}");
    }
    let dir = base.join(&candidate);
    (candidate, dir)
}

impl RunFolder {
    pub fn output_paths(&self, historical_export: &Path) -> OutputPaths {
        OutputPaths {
            run_export: self.run_export.clone(),
            historical_export: historical_export.to_path_buf(),
            docs_dir: self.docs_dir.clone(),
            pdf_dir: self.pdf_dir.clone(),
        }
    }

    /// Overwrites any previous summary for this run.
    pub fn write_summary<T: Serialize>(&self, summary: &T) -> Result<()> {
        write_json_pretty(&self.summary_path, summary).context("write summary failed")
    }
}

pub fn read_manifest(path: &Path) -> Result<RunManifest> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read manifest failed: {}", path.display()))?;
    serde_json::from_str(&raw).context("parse manifest failed")
}

pub(crate) fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize json failed")?;
    fs::write(path, format!("{json}\n")).with_context(|| format!("write failed: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn run_folder_layout_and_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let started_at = Utc.with_ymd_and_hms(2025, 3, 1, 14, 5, 9).unwrap();
        let run_id = Uuid::new_v4();
        let hist = tmp.path().join("hist").join("Historical_EOBR_Data.csv");

        let folder = init_run_folder(InitRunFolderArgs {
            base_path: tmp.path(),
            historical_export: &hist,
            run_id,
            started_at,
            config_hash: "abc123",
        })
        .unwrap();

        assert_eq!(folder.stamp, "20250301_140509");
        assert!(folder.docs_dir.is_dir());
        assert!(folder.pdf_dir.is_dir());
        assert!(folder.excel_dir.is_dir());
        assert!(hist.parent().unwrap().is_dir());
        assert!(folder
            .run_export
            .ends_with("20250301_140509/excel/EOBR_Data_20250301_140509.csv"));

        let m = read_manifest(&folder.manifest_path).unwrap();
        assert_eq!(m.run_id, run_id);
        assert_eq!(m.config_hash, "abc123");
        assert_eq!(m.artifacts.run_export_csv, "excel/EOBR_Data_20250301_140509.csv");
    }

    #[test]
    fn same_second_runs_get_distinct_folders() {
        let tmp = tempfile::tempdir().unwrap();
        let started_at = Utc.with_ymd_and_hms(2025, 3, 1, 14, 5, 9).unwrap();
        let hist = tmp.path().join("Historical_EOBR_Data.csv");
        let args = || InitRunFolderArgs {
            base_path: tmp.path(),
            historical_export: &hist,
            run_id: Uuid::new_v4(),
            started_at,
            config_hash: "h",
        };

        let a = init_run_folder(args()).unwrap();
        let b = init_run_folder(args()).unwrap();
        assert_ne!(a.run_dir, b.run_dir);
        assert_eq!(b.stamp, "20250301_140509_2");
        assert!(b.run_export.ends_with("excel/EOBR_Data_20250301_140509_2.csv"));
    }
}
