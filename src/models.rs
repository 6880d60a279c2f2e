//! Core data model for a collected trip.
//!
//! A trip is walked as `site/puck/position/collection/<leaf>`. Only the
//! collections survive into the output: each becomes a [`CollectionRecord`]
//! carrying copies of its puck and position names plus up to six leaf
//! fragments. Records are grouped in a [`Dataset`] under the key
//! `{puck}_{position}`.
//!
//! Every type here serializes to plain JSON. Paths become strings and
//! absent optional fragments are omitted.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use crate::stats::ProcessingStats;

/// One collection directory with the fragments its leaf directories produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub puck: String,
    pub pos: String,
    pub collection: String,
    #[serde(serialize_with = "lossy_path::serialize")]
    pub collection_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<CameraFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<ImageSetFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing: Option<ProcessingFragment>,
    #[serde(
        rename = "diff-center",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub diff_center: Option<DiffCenterFragment>,
    #[serde(
        rename = "diff-center2",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub diff_center2: Option<DiffCenterFragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen: Option<ImageSetFragment>,
    /// Set by the materializer once the summary document has been staged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryRecord>,
    /// Attached from a correlation table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl CollectionRecord {
    pub fn new(puck: &str, pos: &str, collection: &str, collection_path: PathBuf) -> Self {
        Self {
            puck: puck.to_string(),
            pos: pos.to_string(),
            collection: collection.to_string(),
            collection_path,
            ..Default::default()
        }
    }

    /// Store a fragment in the slot named by its leaf directory.
    /// A second fragment for the same slot replaces the first.
    pub fn merge(&mut self, fragment: LeafFragment) {
        match fragment {
            LeafFragment::Camera(f) => self.camera = Some(f),
            LeafFragment::Images(f) => self.images = Some(f),
            LeafFragment::Screen(f) => self.screen = Some(f),
            LeafFragment::Processing(f) => self.processing = Some(f),
            LeafFragment::DiffCenter(f) => self.diff_center = Some(f),
            LeafFragment::DiffCenter2(f) => self.diff_center2 = Some(f),
        }
    }

    /// Number of populated leaf fragments.
    pub fn fragment_count(&self) -> usize {
        [
            self.camera.is_some(),
            self.images.is_some(),
            self.processing.is_some(),
            self.diff_center.is_some(),
            self.diff_center2.is_some(),
            self.screen.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

pub fn dataset_key(puck: &str, pos: &str) -> String {
    format!("{}_{}", puck, pos)
}

/// Output of a single leaf extractor, tagged by the directory it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafFragment {
    Camera(CameraFragment),
    Images(ImageSetFragment),
    Screen(ImageSetFragment),
    Processing(ProcessingFragment),
    DiffCenter(DiffCenterFragment),
    DiffCenter2(DiffCenterFragment),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraFragment {
    #[serde(serialize_with = "lossy_path::serialize_vec")]
    pub camera_files: Vec<PathBuf>,
}

/// Shared by `images` and `screen`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageSetFragment {
    #[serde(serialize_with = "lossy_path::serialize")]
    pub images_path: PathBuf,
    pub num_images: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingFragment {
    #[serde(serialize_with = "lossy_path::serialize")]
    pub processing_path: PathBuf,
    #[serde(serialize_with = "lossy_path::serialize")]
    pub summary_html_pth: PathBuf,
    #[serde(serialize_with = "lossy_path::serialize")]
    pub autoproc_xml_pth: PathBuf,
    pub autoproc_xml: AutoprocRecord,
}

/// Normalized view of an `autoPROC.xml` report.
///
/// `fields` holds every top-level `AutoProc` field that is not a cell
/// parameter, unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutoprocRecord {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub cell_data: IndexMap<String, String>,
    #[serde(default)]
    pub scale_data: Map<String, Value>,
}

impl AutoprocRecord {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.cell_data.is_empty() && self.scale_data.is_empty()
    }
}

/// Shared by `diff-center` and `diff-center2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffCenterFragment {
    #[serde(serialize_with = "lossy_path::serialize")]
    pub diff_center_path: PathBuf,
    #[serde(serialize_with = "lossy_path::serialize_vec")]
    pub diff_center_files: Vec<PathBuf>,
    #[serde(rename = "imcadr-ZX-result", serialize_with = "lossy_path::serialize_opt")]
    pub zx_result: Option<PathBuf>,
    #[serde(rename = "imcadr-ZY-result", serialize_with = "lossy_path::serialize_opt")]
    pub zy_result: Option<PathBuf>,
    #[serde(
        rename = "imcadr-ZX-result_local",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "lossy_path::serialize_opt"
    )]
    pub zx_result_local: Option<PathBuf>,
    #[serde(
        rename = "imcadr-ZY-result_local",
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "lossy_path::serialize_opt"
    )]
    pub zy_result_local: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    #[serde(serialize_with = "lossy_path::serialize")]
    pub summary_file: PathBuf,
}

/// Paths serialize as strings. A name that is not valid UTF-8 is written
/// lossily instead of failing the whole document.
mod lossy_path {
    use serde::Serializer;
    use std::path::{Path, PathBuf};

    pub fn serialize<S: Serializer>(path: &Path, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&path.to_string_lossy())
    }

    pub fn serialize_opt<S: Serializer>(path: &Option<PathBuf>, s: S) -> Result<S::Ok, S::Error> {
        match path {
            Some(p) => s.serialize_some(p.to_string_lossy().as_ref()),
            None => s.serialize_none(),
        }
    }

    pub fn serialize_vec<S: Serializer>(paths: &[PathBuf], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(paths.iter().map(|p| p.to_string_lossy()))
    }
}

/// Collection records grouped by `{puck}_{position}`, in first-seen key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset(IndexMap<String, Vec<CollectionRecord>>);

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: String, record: CollectionRecord) {
        self.0.entry(key).or_default().push(record);
    }

    /// Append every list of `other` after the records already held under
    /// the same key. New keys keep `other`'s order.
    pub fn merge(&mut self, other: Dataset) {
        for (key, records) in other.0 {
            self.0.entry(key).or_default().extend(records);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Vec<CollectionRecord>> {
        self.0.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Vec<CollectionRecord>> {
        self.0.get_mut(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Vec<CollectionRecord>)> {
        self.0.iter_mut()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total records across all keys.
    pub fn record_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

/// Everything one collection run produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripData {
    pub trip_name: String,
    pub trip_data: Dataset,
    pub processing_stats: ProcessingStats,
}
