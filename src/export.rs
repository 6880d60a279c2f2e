//! JSON hand-off documents.
//!
//! Two files are written into the report directory: the collected trip
//! data as-is (`data.json` by default, which `--json` can read back) and
//! `materialized.json`, the same data after side-files were staged plus
//! the report title and generation time, for the page renderer.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::TripData;

pub const MATERIALIZED_FILE: &str = "materialized.json";

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportDocument {
    pub report_title: String,
    pub generated_at: DateTime<Utc>,
    pub csv_loaded: bool,
    #[serde(flatten)]
    pub data: TripData,
}

pub fn write_trip_data(path: &Path, data: &TripData) -> Result<()> {
    write_json(path, data)
}

pub fn read_trip_data(path: &Path) -> Result<TripData> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read trip data: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse trip data: {}", path.display()))
}

pub fn write_report_document(path: &Path, doc: &ReportDocument) -> Result<()> {
    write_json(path, doc)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollectionRecord, Dataset, ImageSetFragment, LeafFragment};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample() -> TripData {
        let mut rec = CollectionRecord::new("P1", "2", "c1", PathBuf::from("/trip/S/P1/2/c1"));
        rec.merge(LeafFragment::Images(ImageSetFragment {
            images_path: PathBuf::from("/trip/S/P1/2/c1/images"),
            num_images: 900,
        }));
        let mut ds = Dataset::new();
        ds.push("P1_2".into(), rec);
        let mut data = TripData {
            trip_name: "T1".into(),
            trip_data: ds,
            ..Default::default()
        };
        data.processing_stats.total_collections = 1;
        data.processing_stats.processed_collections = 1;
        data
    }

    #[test]
    fn written_trip_data_reads_back_equal() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("out/data.json");
        let data = sample();

        write_trip_data(&path, &data).unwrap();
        let back = read_trip_data(&path).unwrap();
        assert_eq!(back, data);

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["trip_data"]["P1_2"][0]["images"]["num_images"], 900);
        assert_eq!(raw["processing_stats"]["errors"], serde_json::json!([]));
    }

    #[test]
    fn report_document_flattens_trip_data() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(MATERIALIZED_FILE);
        let doc = ReportDocument {
            report_title: "T1 Trip Report".into(),
            generated_at: Utc::now(),
            csv_loaded: false,
            data: sample(),
        };
        write_report_document(&path, &doc).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["report_title"], "T1 Trip Report");
        assert_eq!(raw["trip_name"], "T1");
        assert!(raw["generated_at"].as_str().unwrap().contains('T'));
        assert!(raw["trip_data"]["P1_2"].is_array());
    }

    #[test]
    fn unreadable_trip_data_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(read_trip_data(&path).is_err());
    }
}
