//! Input loading.
//!
//! Turns a configured input location into an ordered list of
//! [`InputItem`]s. A location is either a single JSON file (an array of
//! records, or one record) or a directory of `*.json` files, listed in
//! file-name order. Per-file problems become `Err` items so the engine can
//! count them; only a missing location is fatal.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::debug;

use crate::raw::{IngestError, RawRecord};

/// One input record, or the reason it could not be read.
#[derive(Debug, Clone)]
pub struct InputItem {
    /// File name, or `file#index` for elements of an array file.
    pub source: String,
    pub parsed: Result<RawRecord, IngestError>,
}

/// Precondition check plus listing: every JSON file `path` stands for.
pub fn discover_input_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        bail!("input path does not exist: {}", path.display());
    }

    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files: Vec<PathBuf> = fs::read_dir(path)
        .with_context(|| format!("failed to list input dir: {}", path.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && has_json_extension(p))
        .collect();
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Load every record under `path` in processing order.
pub fn load_input(path: &Path) -> Result<Vec<InputItem>> {
    let files = discover_input_files(path)?;
    debug!(path = %path.display(), files = files.len(), "input discovered");

    Ok(files.iter().flat_map(|f| read_input_file(f)).collect())
}

/// Read one file. Never fails: problems become `Err` items.
pub fn read_input_file(path: &Path) -> Vec<InputItem> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            return vec![InputItem {
                parsed: Err(IngestError::Io {
                    source: name.clone(),
                    message: e.to_string(),
                }),
                source: name,
            }]
        }
    };

    let value: Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            return vec![InputItem {
                parsed: Err(IngestError::Json {
                    source: name.clone(),
                    message: e.to_string(),
                }),
                source: name,
            }]
        }
    };

    match value {
        Value::Array(elements) => elements
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                let source = format!("{name}#{i}");
                InputItem {
                    parsed: RawRecord::from_value(v, &source),
                    source,
                }
            })
            .collect(),
        single => vec![InputItem {
            parsed: RawRecord::from_value(single, &name),
            source: name,
        }],
    }
}

fn has_json_extension(p: &Path) -> bool {
    p.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_is_a_precondition_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_input(&dir.path().join("nope")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn array_file_yields_indexed_sources() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("batch.json");
        fs::write(&f, r#"[{"line_items": []}, 7]"#).unwrap();

        let items = load_input(&f).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].source, "batch.json#0");
        assert!(items[0].parsed.is_ok());
        assert_eq!(items[1].source, "batch.json#1");
        assert!(matches!(items[1].parsed, Err(IngestError::NotAnObject { .. })));
    }

    #[test]
    fn directory_is_listed_by_name_and_skips_non_json() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.json"), r#"{"service_lines": []}"#).unwrap();
        fs::write(dir.path().join("a.json"), "{ not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let items = load_input(dir.path()).unwrap();
        let sources: Vec<&str> = items.iter().map(|i| i.source.as_str()).collect();
        assert_eq!(sources, vec!["a.json", "b.json"]);
        assert!(matches!(items[0].parsed, Err(IngestError::Json { .. })));
        assert!(items[1].parsed.is_ok());
    }
}
