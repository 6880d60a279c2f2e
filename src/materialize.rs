//! Stages each collection's side-files under the report directory.
//!
//! Output layout, relative to the output root:
//!
//! ```text
//! camera/{puck_key}/<original jpg name>
//! summary/{puck_key}_summary.html
//! results/{puck_key}_zx_result.html
//! results/{puck_key}_zy_result.html
//! ```
//!
//! Files are either symlinked or copied. The destination is cleared first,
//! so re-running over the same output root is idempotent. Each file is
//! transferred independently: a failure is logged and counted, never
//! propagated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info, warn};

use crate::error::CollectError;
use crate::models::{CameraFragment, CollectionRecord, Dataset, SummaryRecord};
use crate::scan;

pub const CAMERA_DIR: &str = "camera";
pub const SUMMARY_DIR: &str = "summary";
pub const RESULTS_DIR: &str = "results";

/// How a side-file reaches the output directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMethod {
    /// Symbolic link to the original file.
    Symlink,
    /// Byte copy preserving permissions and timestamps.
    #[default]
    Copy,
}

impl FromStr for TransferMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "symlink" => Ok(TransferMethod::Symlink),
            "copy" => Ok(TransferMethod::Copy),
            other => Err(format!(
                "unknown file method '{}'. Must be copy or symlink.",
                other
            )),
        }
    }
}

impl fmt::Display for TransferMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMethod::Symlink => write!(f, "symlink"),
            TransferMethod::Copy => write!(f, "copy"),
        }
    }
}

/// Totals for one [`Materializer::materialize_dataset`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeSummary {
    pub entries: usize,
    pub transferred: usize,
    pub failed: usize,
}

pub struct Materializer {
    output_root: PathBuf,
    method: TransferMethod,
}

impl Materializer {
    pub fn new(output_root: impl Into<PathBuf>, method: TransferMethod) -> Self {
        Self {
            output_root: output_root.into(),
            method,
        }
    }

    pub fn materialize_dataset(&self, dataset: &mut Dataset) -> MaterializeSummary {
        let mut summary = MaterializeSummary::default();
        for (puck_key, entries) in dataset.iter_mut() {
            for entry in entries.iter_mut() {
                let entry_summary = self.materialize_entry(entry, puck_key);
                summary.entries += 1;
                summary.transferred += entry_summary.transferred;
                summary.failed += entry_summary.failed;
            }
        }
        info!(
            "Staged {} files for {} entries in {} ({} failed)",
            summary.transferred,
            summary.entries,
            self.output_root.display(),
            summary.failed
        );
        summary
    }

    /// Stage camera images, the summary page and diff-center results for
    /// one entry, recording the output-relative paths on it.
    pub fn materialize_entry(
        &self,
        entry: &mut CollectionRecord,
        puck_key: &str,
    ) -> MaterializeSummary {
        let mut summary = MaterializeSummary {
            entries: 1,
            ..Default::default()
        };
        self.stage_camera_files(entry, puck_key, &mut summary);
        self.stage_summary(entry, puck_key, &mut summary);
        self.stage_diff_center_results(entry, puck_key, &mut summary);
        summary
    }

    fn stage_camera_files(
        &self,
        entry: &mut CollectionRecord,
        puck_key: &str,
        summary: &mut MaterializeSummary,
    ) {
        let camera_files = find_camera_files(&entry.collection_path);
        if camera_files.is_empty() {
            return;
        }

        let dest_dir = self.output_root.join(CAMERA_DIR).join(puck_key);
        let mut staged = Vec::with_capacity(camera_files.len());
        for file in &camera_files {
            let Some(name) = file.file_name() else {
                continue;
            };
            match self.transfer(file, &dest_dir, &name.to_string_lossy()) {
                Ok(rel) => {
                    staged.push(rel);
                    summary.transferred += 1;
                }
                Err(e) => {
                    error!("{}", e);
                    summary.failed += 1;
                }
            }
        }

        entry
            .camera
            .get_or_insert_with(CameraFragment::default)
            .camera_files = staged;
    }

    fn stage_summary(
        &self,
        entry: &mut CollectionRecord,
        puck_key: &str,
        summary: &mut MaterializeSummary,
    ) {
        let Some(source) = entry.processing.as_ref().map(|p| p.summary_html_pth.clone()) else {
            return;
        };
        info!("Processing summary file: {}", source.display());
        if !source.is_file() {
            warn!("Summary file not found: {}", source.display());
            return;
        }

        let dest_dir = self.output_root.join(SUMMARY_DIR);
        match self.transfer(&source, &dest_dir, &format!("{}_summary.html", puck_key)) {
            Ok(rel) => {
                info!("Summary file processed: {}", rel.display());
                entry.summary = Some(SummaryRecord { summary_file: rel });
                summary.transferred += 1;
            }
            Err(e) => {
                error!("Error processing summary file {}: {}", source.display(), e);
                summary.failed += 1;
            }
        }
    }

    fn stage_diff_center_results(
        &self,
        entry: &mut CollectionRecord,
        puck_key: &str,
        summary: &mut MaterializeSummary,
    ) {
        let Some(diff_center) = entry.diff_center.as_mut() else {
            return;
        };
        let dest_dir = self.output_root.join(RESULTS_DIR);

        let zx_name = format!("{}_zx_result.html", puck_key);
        let staged = self.stage_result(
            diff_center.zx_result.as_deref(),
            &dest_dir,
            &zx_name,
            summary,
        );
        if let Some(rel) = staged {
            diff_center.zx_result_local = Some(rel);
        }
        let zy_name = format!("{}_zy_result.html", puck_key);
        let staged = self.stage_result(
            diff_center.zy_result.as_deref(),
            &dest_dir,
            &zy_name,
            summary,
        );
        if let Some(rel) = staged {
            diff_center.zy_result_local = Some(rel);
        }
    }

    fn stage_result(
        &self,
        source: Option<&Path>,
        dest_dir: &Path,
        filename: &str,
        summary: &mut MaterializeSummary,
    ) -> Option<PathBuf> {
        let source = source.filter(|p| p.is_file())?;
        match self.transfer(source, dest_dir, filename) {
            Ok(rel) => {
                summary.transferred += 1;
                Some(rel)
            }
            Err(e) => {
                error!("Error processing result file {}: {}", source.display(), e);
                summary.failed += 1;
                None
            }
        }
    }

    /// Place `source` at `dest_dir/filename`, replacing whatever is there,
    /// and return the destination relative to the output root.
    pub fn transfer(
        &self,
        source: &Path,
        dest_dir: &Path,
        filename: &str,
    ) -> Result<PathBuf, CollectError> {
        let dest = dest_dir.join(filename);
        let fail = |message: String| CollectError::FileTransfer {
            from: source.to_path_buf(),
            to: dest.clone(),
            message,
        };

        fs::create_dir_all(dest_dir).map_err(|e| fail(e.to_string()))?;
        if fs::symlink_metadata(&dest).is_ok() {
            fs::remove_file(&dest).map_err(|e| fail(e.to_string()))?;
        }

        match self.method {
            TransferMethod::Symlink => {
                let target = source.canonicalize().map_err(|e| fail(e.to_string()))?;
                symlink_file(&target, &dest).map_err(|e| fail(e.to_string()))?;
            }
            TransferMethod::Copy => {
                copy_with_times(source, &dest).map_err(|e| fail(e.to_string()))?;
            }
        }

        dest.strip_prefix(&self.output_root)
            .map(Path::to_path_buf)
            .map_err(|e| fail(e.to_string()))
    }
}

/// JPEG images under `{collection}/camera`: `before` shots first, then
/// `after` shots, then the rest, each group ordered by full path.
pub fn find_camera_files(collection_path: &Path) -> Vec<PathBuf> {
    let camera_dir = collection_path.join(CAMERA_DIR);
    if !camera_dir.is_dir() {
        return Vec::new();
    }

    let mut files = Vec::new();
    for pattern in ["*.jpg", "*.jpeg"] {
        match scan::files_matching(&camera_dir, pattern) {
            Ok(found) => files.extend(found),
            Err(e) => warn!("Cannot list camera files in {}: {}", camera_dir.display(), e),
        }
    }
    files.sort_by_cached_key(|p| camera_sort_key(p));
    files
}

fn camera_sort_key(path: &Path) -> (bool, bool, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    (
        !name.contains("before"),
        !name.contains("after"),
        path.to_string_lossy().into_owned(),
    )
}

fn copy_with_times(source: &Path, dest: &Path) -> std::io::Result<()> {
    fs::copy(source, dest)?;
    let meta = fs::metadata(source)?;
    filetime::set_file_times(
        dest,
        filetime::FileTime::from_last_access_time(&meta),
        filetime::FileTime::from_last_modification_time(&meta),
    )
}

#[cfg(unix)]
fn symlink_file(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_file(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}
