//! Leaf-directory extractors.
//!
//! Each collection directory holds a handful of subdirectories whose names
//! come from a closed vocabulary. [`LeafKind`] maps a directory name to the
//! rule that turns that directory's contents into a [`LeafFragment`].
//! Unrecognized names produce nothing and are not an error.
//!
//! | Directory | Fragment |
//! |-----------|----------|
//! | `camera` | `*.jpg` paths |
//! | `images`, `screen` | image directory and count (`*.h5`, else `*.cbf`) |
//! | `processing` | `summary.html` / `autoPROC.xml` paths plus the normalized XML |
//! | `diff-center`, `diff-center2` | image files and the two `imcadr` result pages |

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::autoproc;
use crate::error::CollectError;
use crate::models::{
    CameraFragment, DiffCenterFragment, ImageSetFragment, LeafFragment, ProcessingFragment,
};
use crate::scan;

pub const SUMMARY_HTML: &str = "summary.html";
pub const AUTOPROC_XML: &str = "autoPROC.xml";
pub const ZX_RESULT: &str = "imcadr-ZX-result.html";
pub const ZY_RESULT: &str = "imcadr-ZY-result.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafKind {
    Camera,
    Images,
    Processing,
    DiffCenter,
    DiffCenter2,
    Screen,
}

impl LeafKind {
    pub const ALL: [LeafKind; 6] = [
        LeafKind::Camera,
        LeafKind::Images,
        LeafKind::Processing,
        LeafKind::DiffCenter,
        LeafKind::DiffCenter2,
        LeafKind::Screen,
    ];

    /// Case-sensitive lookup of a leaf directory name.
    pub fn from_dir_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.dir_name() == name)
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            LeafKind::Camera => "camera",
            LeafKind::Images => "images",
            LeafKind::Processing => "processing",
            LeafKind::DiffCenter => "diff-center",
            LeafKind::DiffCenter2 => "diff-center2",
            LeafKind::Screen => "screen",
        }
    }

    /// Run this kind's rule over `dir`.
    pub fn extract(self, dir: &Path) -> Result<LeafFragment, CollectError> {
        let fragment = match self {
            LeafKind::Camera => LeafFragment::Camera(extract_camera(dir)?),
            LeafKind::Images => LeafFragment::Images(extract_image_set(dir)?),
            LeafKind::Screen => LeafFragment::Screen(extract_image_set(dir)?),
            LeafKind::Processing => LeafFragment::Processing(extract_processing(dir)),
            LeafKind::DiffCenter => LeafFragment::DiffCenter(extract_diff_center(dir)?),
            LeafKind::DiffCenter2 => LeafFragment::DiffCenter2(extract_diff_center(dir)?),
        };
        Ok(fragment)
    }
}

/// Dispatch on the directory's base name. `Ok(None)` for names outside the
/// vocabulary.
pub fn extract_leaf(dir: &Path) -> Result<Option<LeafFragment>, CollectError> {
    let Some(kind) = dir
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(LeafKind::from_dir_name)
    else {
        return Ok(None);
    };

    let fragment = kind.extract(dir).map_err(|e| match e {
        CollectError::Io { path, message } => CollectError::Extraction { path, message },
        other => other,
    })?;
    debug!("Processed {} directory: {:?}", kind.dir_name(), fragment);
    Ok(Some(fragment))
}

fn extract_camera(dir: &Path) -> Result<CameraFragment, CollectError> {
    Ok(CameraFragment {
        camera_files: scan::files_matching(dir, "*.jpg")?,
    })
}

/// HDF5 frames win; CBF is only looked at when there are none.
fn image_files(dir: &Path) -> Result<Vec<PathBuf>, CollectError> {
    let h5 = scan::files_matching(dir, "*.h5")?;
    if !h5.is_empty() {
        return Ok(h5);
    }
    scan::files_matching(dir, "*.cbf")
}

fn extract_image_set(dir: &Path) -> Result<ImageSetFragment, CollectError> {
    Ok(ImageSetFragment {
        images_path: dir.to_path_buf(),
        num_images: image_files(dir)?.len(),
    })
}

fn extract_processing(dir: &Path) -> ProcessingFragment {
    let summary_html = dir.join(SUMMARY_HTML);
    let autoproc_xml = dir.join(AUTOPROC_XML);
    let record = autoproc::read_autoproc(&autoproc_xml);

    ProcessingFragment {
        processing_path: dir.to_path_buf(),
        summary_html_pth: summary_html,
        autoproc_xml_pth: autoproc_xml,
        autoproc_xml: record,
    }
}

fn extract_diff_center(dir: &Path) -> Result<DiffCenterFragment, CollectError> {
    Ok(DiffCenterFragment {
        diff_center_path: dir.to_path_buf(),
        diff_center_files: image_files(dir)?,
        zx_result: find_file(&dir.join(ZX_RESULT)),
        zy_result: find_file(&dir.join(ZY_RESULT)),
        zx_result_local: None,
        zy_result_local: None,
    })
}

fn find_file(path: &Path) -> Option<PathBuf> {
    if path.exists() {
        Some(path.to_path_buf())
    } else {
        debug!("File not found: {}", path.display());
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn leaf(tmp: &TempDir, name: &str, files: &[&str]) -> PathBuf {
        let dir = tmp.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        for f in files {
            fs::write(dir.join(f), b"x").unwrap();
        }
        dir
    }

    #[test]
    fn vocabulary_is_closed_and_case_sensitive() {
        for kind in LeafKind::ALL {
            assert_eq!(LeafKind::from_dir_name(kind.dir_name()), Some(kind));
        }
        assert_eq!(LeafKind::from_dir_name("Camera"), None);
        assert_eq!(LeafKind::from_dir_name("diff-center3"), None);
    }

    #[test]
    fn unrecognized_directory_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        let dir = leaf(&tmp, "scratch", &["a.h5"]);
        assert!(extract_leaf(&dir).unwrap().is_none());
    }

    #[test]
    fn camera_lists_jpgs_only() {
        let tmp = TempDir::new().unwrap();
        let dir = leaf(&tmp, "camera", &["b.jpg", "a.jpg", "c.png"]);
        match extract_leaf(&dir).unwrap() {
            Some(LeafFragment::Camera(f)) => {
                assert_eq!(f.camera_files, vec![dir.join("a.jpg"), dir.join("b.jpg")]);
            }
            other => panic!("unexpected fragment: {:?}", other),
        }
    }

    #[test]
    fn images_prefer_h5_over_cbf() {
        let tmp = TempDir::new().unwrap();
        let dir = leaf(&tmp, "images", &["1.h5", "2.h5", "1.cbf", "2.cbf", "3.cbf"]);
        match extract_leaf(&dir).unwrap() {
            Some(LeafFragment::Images(f)) => {
                assert_eq!(f.num_images, 2);
                assert_eq!(f.images_path, dir);
            }
            other => panic!("unexpected fragment: {:?}", other),
        }
    }

    #[test]
    fn screen_falls_back_to_cbf() {
        let tmp = TempDir::new().unwrap();
        let dir = leaf(&tmp, "screen", &["1.cbf", "2.cbf", "3.cbf"]);
        match extract_leaf(&dir).unwrap() {
            Some(LeafFragment::Screen(f)) => assert_eq!(f.num_images, 3),
            other => panic!("unexpected fragment: {:?}", other),
        }
    }

    #[test]
    fn processing_records_paths_even_when_files_are_missing() {
        let tmp = TempDir::new().unwrap();
        let dir = leaf(&tmp, "processing", &[]);
        match extract_leaf(&dir).unwrap() {
            Some(LeafFragment::Processing(f)) => {
                assert_eq!(f.summary_html_pth, dir.join("summary.html"));
                assert_eq!(f.autoproc_xml_pth, dir.join("autoPROC.xml"));
                assert!(f.autoproc_xml.is_empty());
            }
            other => panic!("unexpected fragment: {:?}", other),
        }
    }

    #[test]
    fn diff_center_finds_result_pages() {
        let tmp = TempDir::new().unwrap();
        let dir = leaf(&tmp, "diff-center2", &["a.cbf", ZX_RESULT]);
        match extract_leaf(&dir).unwrap() {
            Some(LeafFragment::DiffCenter2(f)) => {
                assert_eq!(f.diff_center_files, vec![dir.join("a.cbf")]);
                assert_eq!(f.zx_result, Some(dir.join(ZX_RESULT)));
                assert_eq!(f.zy_result, None);
            }
            other => panic!("unexpected fragment: {:?}", other),
        }
    }
}
