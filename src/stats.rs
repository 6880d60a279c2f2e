//! Processing statistics for one collection run.
//!
//! [`ProcessingStats`] is owned by a single traversal. Parallel walks give
//! each worker its own accumulator and fold them together with
//! [`ProcessingStats::merge`] at the join point.

use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::Path;

/// One recovered failure: where it happened and what went wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingStats {
    pub total_pucks: u64,
    pub processed_pucks: u64,
    pub skipped_pucks: u64,
    pub total_collections: u64,
    pub processed_collections: u64,
    pub skipped_collections: u64,
    pub errors: Vec<ErrorRecord>,
}

impl ProcessingStats {
    pub fn record_error(&mut self, path: &Path, error: impl Display) {
        self.errors.push(ErrorRecord {
            path: path.display().to_string(),
            error: error.to_string(),
        });
    }

    /// Add another accumulator's counts and append its errors after ours.
    pub fn merge(&mut self, other: ProcessingStats) {
        self.total_pucks += other.total_pucks;
        self.processed_pucks += other.processed_pucks;
        self.skipped_pucks += other.skipped_pucks;
        self.total_collections += other.total_collections;
        self.processed_collections += other.processed_collections;
        self.skipped_collections += other.skipped_collections;
        self.errors.extend(other.errors);
    }

    /// Every visited puck and collection was either processed or skipped.
    pub fn is_balanced(&self) -> bool {
        self.processed_pucks + self.skipped_pucks == self.total_pucks
            && self.processed_collections + self.skipped_collections == self.total_collections
    }

    /// Human summary printed at the end of a run.
    pub fn summary(&self, trip_name: &str, samples: usize) -> String {
        let mut out = String::new();
        out.push_str(&format!("Trip Report: {}\n", trip_name));
        out.push_str(&format!("{}\n", "=".repeat(13 + trip_name.chars().count())));
        out.push('\n');
        out.push_str(&format!("  Samples:      {}\n", samples));
        out.push_str(&format!(
            "  Pucks:        {} total, {} processed, {} skipped\n",
            self.total_pucks, self.processed_pucks, self.skipped_pucks
        ));
        out.push_str(&format!(
            "  Collections:  {} total, {} processed, {} skipped ({}%)\n",
            self.total_collections,
            self.processed_collections,
            self.skipped_collections,
            percent(self.processed_collections, self.total_collections)
        ));
        out.push_str(&format!("  Errors:       {}\n", self.errors.len()));

        if !self.errors.is_empty() {
            out.push('\n');
            out.push_str(&format!("  {:<48} {}\n", "PATH", "ERROR"));
            out.push_str(&format!("  {}\n", "-".repeat(76)));
            for e in &self.errors {
                out.push_str(&format!("  {:<48} {}\n", e.path, e.error));
            }
        }
        out
    }
}

fn percent(part: u64, total: u64) -> u64 {
    if total > 0 {
        (part * 100) / total
    } else {
        0
    }
}
