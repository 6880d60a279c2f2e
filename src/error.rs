//! Failure taxonomy for collection and materialization.
//!
//! Only [`CollectError::InvalidRoot`] ends a run. Every other variant is
//! caught at the nearest traversal node, logged, and recorded in
//! [`ProcessingStats`](crate::stats::ProcessingStats) or dropped.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error("invalid trip root (not a directory): {}", path.display())]
    InvalidRoot { path: PathBuf },

    #[error("failed to extract {}: {message}", path.display())]
    Extraction { path: PathBuf, message: String },

    #[error("archive expansion failed for {}: {message}", path.display())]
    ArchiveExpansion { path: PathBuf, message: String },

    #[error("failed to read XML file {}: {message}", path.display())]
    XmlRead { path: PathBuf, message: String },

    #[error("XML parsing error in {}: {message}", path.display())]
    XmlParse { path: PathBuf, message: String },

    #[error("file transfer {} -> {} failed: {message}", from.display(), to.display())]
    FileTransfer {
        from: PathBuf,
        to: PathBuf,
        message: String,
    },

    #[error("cannot read directory {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl CollectError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        CollectError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
