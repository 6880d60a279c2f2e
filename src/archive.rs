//! In-place expansion of tar archives shipped inside puck directories.
//!
//! Instruments sometimes deliver a puck's positions as `*.tar`, `*.tar.gz`,
//! `*.tar.bz2` or `*.tar.xz` bundles next to (or instead of) the position
//! directories. Before a puck is walked every archive directly under it is
//! unpacked into the puck directory itself. Expansion is best-effort: a
//! corrupt or unsupported archive is logged and the walk carries on as if
//! it were not there.

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{error, info};
use xz2::read::XzDecoder;

use crate::error::CollectError;
use crate::scan;

/// Name pattern for archives considered under a puck.
pub const ARCHIVE_PATTERN: &str = "*.tar*";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const BZIP2_MAGIC: [u8; 3] = *b"BZh";
const XZ_MAGIC: [u8; 6] = [0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00];

/// Outcome counts of one [`expand_archives`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionSummary {
    pub expanded: usize,
    pub failed: usize,
}

/// Unpack every archive directly under `puck_dir` into `puck_dir`.
///
/// Never fails: listing and extraction errors are logged and counted.
pub fn expand_archives(puck_dir: &Path) -> ExpansionSummary {
    let mut summary = ExpansionSummary::default();

    let archives = match scan::files_matching(puck_dir, ARCHIVE_PATTERN) {
        Ok(found) => found,
        Err(e) => {
            error!("Archive lookup failed for {}: {}", puck_dir.display(), e);
            return summary;
        }
    };

    for archive in archives {
        match expand_archive(&archive) {
            Ok(()) => summary.expanded += 1,
            Err(e) => {
                error!("{}", e);
                summary.failed += 1;
            }
        }
    }
    summary
}

/// Stream compression detected from an archive's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
    Xz,
    None,
}

impl Compression {
    pub fn sniff(header: &[u8]) -> Self {
        if header.starts_with(&GZIP_MAGIC) {
            Compression::Gzip
        } else if header.starts_with(&BZIP2_MAGIC) {
            Compression::Bzip2
        } else if header.starts_with(&XZ_MAGIC) {
            Compression::Xz
        } else {
            Compression::None
        }
    }
}

/// Unpack one archive next to itself. Compression (gzip, bzip2, xz) is
/// detected from the stream header, anything else is read as a plain tar.
pub fn expand_archive(archive: &Path) -> Result<(), CollectError> {
    let fail = |message: String| CollectError::ArchiveExpansion {
        path: archive.to_path_buf(),
        message,
    };
    let dest = archive
        .parent()
        .ok_or_else(|| fail("archive has no parent directory".to_string()))?;

    let mut file = File::open(archive).map_err(|e| fail(e.to_string()))?;
    let compression = sniff_file(&mut file).map_err(|e| fail(e.to_string()))?;
    let reader = BufReader::new(file);

    info!(
        "Extracting compressed file: {}",
        archive.file_name().unwrap_or_default().to_string_lossy()
    );

    let unpacked = match compression {
        Compression::Gzip => tar::Archive::new(GzDecoder::new(reader)).unpack(dest),
        Compression::Bzip2 => tar::Archive::new(BzDecoder::new(reader)).unpack(dest),
        Compression::Xz => tar::Archive::new(XzDecoder::new(reader)).unpack(dest),
        Compression::None => tar::Archive::new(reader).unpack(dest),
    };
    unpacked.map_err(|e| fail(e.to_string()))
}

fn sniff_file(file: &mut File) -> std::io::Result<Compression> {
    let mut header = Vec::with_capacity(XZ_MAGIC.len());
    file.by_ref()
        .take(XZ_MAGIC.len() as u64)
        .read_to_end(&mut header)?;
    file.seek(SeekFrom::Start(0))?;
    Ok(Compression::sniff(&header))
}
