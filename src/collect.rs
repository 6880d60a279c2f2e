//! Trip tree walker.
//!
//! Walks `root/site/puck/position/collection/<leaf>` depth-first and builds
//! the [`Dataset`]. Only an invalid root aborts the walk. Every failure
//! below it is caught at the nearest node, logged, recorded in the
//! [`ProcessingStats`] error list, and the walk moves on to the next
//! sibling.
//!
//! Counting rules:
//! - each puck directory increments `total_pucks`, then exactly one of
//!   `processed_pucks` (its position loop finished) or `skipped_pucks`
//!   (its positions could not be listed);
//! - each collection directory increments `total_collections`, then
//!   exactly one of `processed_collections` (at least one leaf fragment) or
//!   `skipped_collections`.

use std::path::{Path, PathBuf};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::archive;
use crate::error::CollectError;
use crate::extract;
use crate::models::{dataset_key, CollectionRecord, Dataset, TripData};
use crate::scan;
use crate::stats::ProcessingStats;

/// Partial result for one site. Parallel walks produce one per worker.
#[derive(Debug, Default)]
pub struct SiteOutcome {
    pub stats: ProcessingStats,
    pub dataset: Dataset,
}

impl SiteOutcome {
    fn absorb(&mut self, other: SiteOutcome) {
        self.stats.merge(other.stats);
        self.dataset.merge(other.dataset);
    }
}

/// Walk the trip rooted at `root` on the current thread.
pub fn collect(root: &Path) -> Result<TripData, CollectError> {
    let trip_name = validate_root(root)?;
    info!("Starting data collection from: {}", root.display());

    let mut outcome = SiteOutcome::default();
    match scan::children(root) {
        Ok(sites) => {
            for site in sites {
                collect_site(&site, &mut outcome);
            }
        }
        Err(e) => record(&mut outcome.stats, root, e),
    }

    Ok(finish(trip_name, outcome))
}

/// Walk the trip with one blocking worker per site.
///
/// Site outcomes are merged in site enumeration order, so records under a
/// key shared by several sites keep per-site order.
pub async fn collect_parallel(root: &Path) -> Result<TripData, CollectError> {
    let trip_name = validate_root(root)?;
    info!("Starting parallel data collection from: {}", root.display());

    let mut outcome = SiteOutcome::default();
    let sites = match scan::children(root) {
        Ok(sites) => sites,
        Err(e) => {
            record(&mut outcome.stats, root, e);
            Vec::new()
        }
    };

    let mut workers = JoinSet::new();
    for (index, site) in sites.iter().cloned().enumerate() {
        workers.spawn_blocking(move || {
            let mut partial = SiteOutcome::default();
            collect_site(&site, &mut partial);
            (index, partial)
        });
    }

    let mut partials: Vec<Option<SiteOutcome>> = sites.iter().map(|_| None).collect();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((index, partial)) => partials[index] = Some(partial),
            Err(e) => error!("Site worker failed: {}", e),
        }
    }

    for (site, partial) in sites.iter().zip(partials) {
        match partial {
            Some(partial) => outcome.absorb(partial),
            None => outcome
                .stats
                .record_error(site, "site worker terminated abnormally"),
        }
    }

    Ok(finish(trip_name, outcome))
}

fn validate_root(root: &Path) -> Result<String, CollectError> {
    if !root.is_dir() {
        error!("Invalid base path: {}", root.display());
        return Err(CollectError::InvalidRoot {
            path: root.to_path_buf(),
        });
    }
    Ok(trip_name(root))
}

/// Last path component, resolving `.`/`..` when the path has none.
fn trip_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .or_else(|| {
            root.canonicalize()
                .ok()
                .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| root.display().to_string())
}

fn finish(trip_name: String, outcome: SiteOutcome) -> TripData {
    let SiteOutcome { stats, dataset } = outcome;
    info!("Data collection summary: {:?}", stats);
    info!(
        "Data collection completed. Total Samples: {} ({} collections)",
        dataset.len(),
        dataset.record_count()
    );
    TripData {
        trip_name,
        trip_data: dataset,
        processing_stats: stats,
    }
}

fn record(stats: &mut ProcessingStats, path: &Path, err: CollectError) {
    error!("{}", err);
    stats.record_error(path, err);
}

fn collect_site(site: &Path, out: &mut SiteOutcome) {
    if !site.is_dir() {
        info!("Skipping {}, not a directory", site.display());
        return;
    }

    let pucks = match scan::child_dirs(site) {
        Ok(pucks) => pucks,
        Err(e) => {
            record(&mut out.stats, site, e);
            return;
        }
    };

    for puck in pucks {
        out.stats.total_pucks += 1;
        match collect_puck(&puck, out) {
            Ok(()) => out.stats.processed_pucks += 1,
            Err(e) => {
                out.stats.skipped_pucks += 1;
                error!("Error processing puck path {}: {}", puck.display(), e);
                out.stats.record_error(&puck, e);
            }
        }
    }
}

fn collect_puck(puck: &Path, out: &mut SiteOutcome) -> Result<(), CollectError> {
    let puck_name = dir_name(puck);
    info!("Processing puck: {}", puck_name);

    let expansion = archive::expand_archives(puck);
    if expansion.expanded + expansion.failed > 0 {
        info!(
            "Expanded {} archives in puck {} ({} failed)",
            expansion.expanded, puck_name, expansion.failed
        );
    }

    let positions = scan::child_dirs(puck)?;
    if positions.is_empty() {
        warn!("No position directories found in puck: {}", puck_name);
    }

    for position in positions {
        if let Err(e) = collect_position(&position, &puck_name, out) {
            error!("Error processing position {}: {}", dir_name(&position), e);
            out.stats.record_error(&position, e);
        }
    }
    Ok(())
}

fn collect_position(
    position: &Path,
    puck_name: &str,
    out: &mut SiteOutcome,
) -> Result<(), CollectError> {
    let pos_name = dir_name(position);
    let key = dataset_key(puck_name, &pos_name);

    for collection in scan::child_dirs(position)? {
        out.stats.total_collections += 1;
        info!("Processing collection: {}", collection.display());

        match collect_collection(&collection, puck_name, &pos_name, &mut out.stats) {
            Some(rec) => {
                out.stats.processed_collections += 1;
                out.dataset.push(key.clone(), rec);
            }
            None => out.stats.skipped_collections += 1,
        }
    }
    Ok(())
}

/// Merge every recognized leaf under `collection` into one record.
/// `None` when no leaf produced a fragment.
fn collect_collection(
    collection: &Path,
    puck_name: &str,
    pos_name: &str,
    stats: &mut ProcessingStats,
) -> Option<CollectionRecord> {
    let mut rec = CollectionRecord::new(
        puck_name,
        pos_name,
        &dir_name(collection),
        collection.to_path_buf(),
    );

    let leaves: Vec<PathBuf> = match scan::child_dirs(collection) {
        Ok(leaves) => leaves,
        Err(e) => {
            warn!("Error processing {}: {}", collection.display(), e);
            stats.record_error(collection, e);
            return None;
        }
    };

    for leaf in leaves {
        match extract::extract_leaf(&leaf) {
            Ok(Some(fragment)) => rec.merge(fragment),
            Ok(None) => {}
            Err(e) => {
                warn!("Error processing {}: {}", leaf.display(), e);
                stats.record_error(&leaf, e);
            }
        }
    }

    (rec.fragment_count() > 0).then_some(rec)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn mkdirs(root: &Path, rel: &str) -> PathBuf {
        let p = root.join(rel);
        fs::create_dir_all(&p).unwrap();
        p
    }

    #[test]
    fn file_root_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("trip.txt");
        fs::write(&file, b"x").unwrap();
        assert!(matches!(
            collect(&file),
            Err(CollectError::InvalidRoot { .. })
        ));
        assert!(matches!(
            collect(&tmp.path().join("missing")),
            Err(CollectError::InvalidRoot { .. })
        ));
    }

    #[test]
    fn collection_without_leaves_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let root = mkdirs(tmp.path(), "T1");
        mkdirs(&root, "S1/P1/1/empty/unknown");
        let images = mkdirs(&root, "S1/P1/1/full/images");
        fs::write(images.join("a.h5"), b"x").unwrap();

        let trip = collect(&root).unwrap();
        assert_eq!(trip.trip_name, "T1");
        let stats = &trip.processing_stats;
        assert_eq!(stats.total_collections, 2);
        assert_eq!(stats.processed_collections, 1);
        assert_eq!(stats.skipped_collections, 1);
        assert!(stats.is_balanced());

        let recs = trip.trip_data.get("P1_1").unwrap();
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].collection, "full");
        assert_eq!(recs[0].images.as_ref().unwrap().num_images, 1);
    }

    #[test]
    fn site_files_and_puck_files_are_ignored() {
        let tmp = TempDir::new().unwrap();
        let root = mkdirs(tmp.path(), "T2");
        fs::write(root.join("README"), b"x").unwrap();
        mkdirs(&root, "S1");
        fs::write(root.join("S1/manifest.csv"), b"x").unwrap();
        mkdirs(&root, "S1/P1");

        let trip = collect(&root).unwrap();
        let stats = &trip.processing_stats;
        assert_eq!(stats.total_pucks, 1);
        assert_eq!(stats.processed_pucks, 1);
        assert!(stats.errors.is_empty());
        assert!(trip.trip_data.is_empty());
    }

    #[test]
    fn dataset_key_joins_puck_and_position() {
        let tmp = TempDir::new().unwrap();
        let root = mkdirs(tmp.path(), "T3");
        mkdirs(&root, "S1/PUCK7/12/c1/camera");

        let trip = collect(&root).unwrap();
        let recs = trip.trip_data.get("PUCK7_12").unwrap();
        assert_eq!(recs[0].puck, "PUCK7");
        assert_eq!(recs[0].pos, "12");
        assert_eq!(recs[0].collection_path, root.join("S1/PUCK7/12/c1"));
    }
}
