use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use eobr_schemas::{COL_DOCUMENT_NUMBER, COL_DUPLICATE_KEY};

/// Duplicate keys seen in history plus those registered during this run.
///
/// First-seen wins: a key is a duplicate only if it was exported before or
/// registered earlier in the same run.
#[derive(Debug, Clone, Default)]
pub struct DuplicateIndex {
    historical: HashSet<String>,
    seen_control_numbers: HashSet<String>,
    run: HashSet<String>,
}

impl DuplicateIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_parts(
        historical: impl IntoIterator<Item = String>,
        seen_control_numbers: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            historical: historical.into_iter().collect(),
            seen_control_numbers: seen_control_numbers.into_iter().collect(),
            run: HashSet::new(),
        }
    }

    /// Seed from the historical export. A missing file is a first run.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no historical export; starting empty");
            return Ok(Self::empty());
        }

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .with_context(|| format!("failed to open historical export: {}", path.display()))?;

        let headers = rdr
            .headers()
            .with_context(|| format!("failed to read header of {}", path.display()))?
            .clone();
        let key_col = headers.iter().position(|h| h.trim() == COL_DUPLICATE_KEY);
        let doc_col = headers.iter().position(|h| h.trim() == COL_DOCUMENT_NUMBER);

        if key_col.is_none() {
            warn!(path = %path.display(), column = COL_DUPLICATE_KEY, "historical export has no duplicate-key column");
        }

        let mut historical = HashSet::new();
        let mut seen_control_numbers = HashSet::new();
        for (i, rec) in rdr.records().enumerate() {
            let rec = match rec {
                Ok(r) => r,
                Err(e) => {
                    warn!(row = i + 1, error = %e, "unreadable historical row skipped");
                    continue;
                }
            };
            if let Some(v) = key_col.and_then(|c| rec.get(c)).map(str::trim) {
                if !v.is_empty() {
                    historical.insert(v.to_string());
                }
            }
            if let Some(v) = doc_col.and_then(|c| rec.get(c)).map(str::trim) {
                if !v.is_empty() {
                    seen_control_numbers.insert(v.to_string());
                }
            }
        }

        debug!(
            keys = historical.len(),
            control_numbers = seen_control_numbers.len(),
            "duplicate index loaded"
        );
        Ok(Self {
            historical,
            seen_control_numbers,
            run: HashSet::new(),
        })
    }

    pub fn is_duplicate(&self, key: &str) -> bool {
        self.historical.contains(key) || self.run.contains(key)
    }

    pub fn register(&mut self, key: impl Into<String>) {
        self.run.insert(key.into());
    }

    pub fn is_seen_control_number(&self, number: &str) -> bool {
        self.seen_control_numbers.contains(number)
    }

    pub fn historical_len(&self) -> usize {
        self.historical.len()
    }

    pub fn run_len(&self) -> usize {
        self.run.len()
    }
}
