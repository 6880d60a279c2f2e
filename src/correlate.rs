//! Post-hoc join of an external sample sheet onto collection records.
//!
//! Each row names a container (puck) and a slot (position). The row is
//! attached to the first dataset key `{container}_{position}` whose
//! position matches the slot (numerically when both are plain numbers), and only to the first record
//! under that key. Rows that match nothing are skipped.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::models::Dataset;

/// Header names looked up in the correlation table.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CorrelationColumns {
    #[serde(default = "default_container_column")]
    pub container: String,
    #[serde(default = "default_slot_column")]
    pub slot: String,
    #[serde(default = "default_project_column")]
    pub project: String,
    #[serde(default = "default_comment_column")]
    pub comment: String,
}

impl Default for CorrelationColumns {
    fn default() -> Self {
        Self {
            container: default_container_column(),
            slot: default_slot_column(),
            project: default_project_column(),
            comment: default_comment_column(),
        }
    }
}

fn default_container_column() -> String {
    "container".to_string()
}
fn default_slot_column() -> String {
    "slot".to_string()
}
fn default_project_column() -> String {
    "project".to_string()
}
fn default_comment_column() -> String {
    "comment".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationRow {
    pub container: String,
    pub slot: String,
    pub project: Option<String>,
    pub comment: Option<String>,
}

/// Read a CSV sample sheet. Header matching ignores case and surrounding
/// whitespace; project and comment columns are optional.
pub fn read_correlation_table(path: &Path, columns: &CorrelationColumns) -> Result<Vec<CorrelationRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open correlation table: {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read header row of {}", path.display()))?
        .clone();
    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
    };

    let container_idx = find(&columns.container).with_context(|| {
        format!(
            "Correlation table {} has no '{}' column",
            path.display(),
            columns.container
        )
    })?;
    let slot_idx = find(&columns.slot).with_context(|| {
        format!(
            "Correlation table {} has no '{}' column",
            path.display(),
            columns.slot
        )
    })?;
    let project_idx = find(&columns.project);
    let comment_idx = find(&columns.comment);

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record
            .with_context(|| format!("Malformed row {} in {}", line + 2, path.display()))?;
        let cell = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        rows.push(CorrelationRow {
            container: cell(Some(container_idx)).unwrap_or_default(),
            slot: cell(Some(slot_idx)).unwrap_or_default(),
            project: cell(project_idx),
            comment: cell(comment_idx),
        });
    }
    Ok(rows)
}

/// Attach project and comment from each row. Returns whether any row matched.
pub fn merge_correlation(dataset: &mut Dataset, rows: &[CorrelationRow]) -> bool {
    let mut matched_any = false;

    for row in rows {
        if row.container.is_empty() || row.slot.is_empty() {
            continue;
        }
        let key = dataset
            .keys()
            .find(|key| key_matches(key, &row.container, &row.slot))
            .cloned();
        let Some(key) = key else {
            debug!("No collection for {} slot {}", row.container, row.slot);
            continue;
        };
        if let Some(first) = dataset.get_mut(&key).and_then(|entries| entries.first_mut()) {
            if row.project.is_some() {
                first.project = row.project.clone();
            }
            if row.comment.is_some() {
                first.comment = row.comment.clone();
            }
            matched_any = true;
        }
    }

    if matched_any {
        info!("Correlation table merged");
    }
    matched_any
}

fn key_matches(key: &str, container: &str, slot: &str) -> bool {
    let Some(position) = key
        .strip_prefix(container)
        .and_then(|rest| rest.strip_prefix('_'))
    else {
        return false;
    };
    match (slot_number(position), slot_number(slot)) {
        (Some(a), Some(b)) => a == b,
        _ => position == slot,
    }
}

/// A slot name made only of decimal digits: `"03"` → 3. Anything else is
/// compared as an exact string.
fn slot_number(s: &str) -> Option<u32> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
