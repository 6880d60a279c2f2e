//! Run orchestration: collect (or load) → correlate → export → materialize.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::collect;
use crate::config::Config;
use crate::correlate;
use crate::export::{self, ReportDocument, MATERIALIZED_FILE};
use crate::materialize::{MaterializeSummary, Materializer, TransferMethod};
use crate::models::TripData;

/// Per-run inputs. `None` fields fall back to the configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Trip directory, or a data JSON file when `json_input` is set.
    pub base: PathBuf,
    pub json_input: bool,
    pub output: Option<PathBuf>,
    pub report_name: Option<String>,
    pub file_method: Option<TransferMethod>,
    pub correlation: Option<PathBuf>,
    pub parallel: bool,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub report_dir: PathBuf,
    pub data: TripData,
    pub csv_loaded: bool,
    pub materialized: MaterializeSummary,
}

pub async fn run_report(config: &Config, opts: RunOptions) -> Result<RunOutcome> {
    let mut data = load_trip(config, &opts).await?;

    let csv_loaded = match &opts.correlation {
        Some(table) => {
            let rows = correlate::read_correlation_table(table, &config.correlation)?;
            correlate::merge_correlation(&mut data.trip_data, &rows)
        }
        None => false,
    };

    let report_dir = report_dir(config, &opts, &data.trip_name)?;
    std::fs::create_dir_all(&report_dir).with_context(|| {
        format!("Failed to create report directory: {}", report_dir.display())
    })?;

    let json_path = report_dir.join(&config.report.json_file);
    export::write_trip_data(&json_path, &data)?;
    info!("Data written to {}", json_path.display());

    let method = opts.file_method.unwrap_or(config.report.file_method);
    let materializer = Materializer::new(&report_dir, method);
    let materialized = materializer.materialize_dataset(&mut data.trip_data);

    let report_title = config
        .report
        .title
        .clone()
        .unwrap_or_else(|| format!("{} Trip Report", data.trip_name));
    let doc = ReportDocument {
        report_title,
        generated_at: chrono::Utc::now(),
        csv_loaded,
        data,
    };
    export::write_report_document(&report_dir.join(MATERIALIZED_FILE), &doc)?;
    info!("Reports generated in {}", report_dir.display());

    Ok(RunOutcome {
        report_dir,
        data: doc.data,
        csv_loaded,
        materialized,
    })
}

async fn load_trip(config: &Config, opts: &RunOptions) -> Result<TripData> {
    if opts.json_input {
        return export::read_trip_data(&opts.base);
    }
    let collected = if opts.parallel || config.report.parallel {
        collect::collect_parallel(&opts.base).await
    } else {
        collect::collect(&opts.base)
    };
    collected.map_err(|e| {
        error!("{}", e);
        anyhow::Error::new(e)
    })
}

/// `{output}/{report_name}`, defaulting to `./{trip}_Trip_Report`.
fn report_dir(config: &Config, opts: &RunOptions, trip_name: &str) -> Result<PathBuf> {
    let name = opts
        .report_name
        .clone()
        .unwrap_or_else(|| format!("{}_Trip_Report", trip_name));
    let parent = match opts.output.as_ref().or(config.report.output_dir.as_ref()) {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Cannot determine working directory")?,
    };
    Ok(absolute(&parent)?.join(name))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()
            .context("Cannot determine working directory")?
            .join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn trip(tmp: &TempDir) -> PathBuf {
        let root = tmp.path().join("T9");
        let camera = root.join("S1/P1/1/c1/camera");
        fs::create_dir_all(&camera).unwrap();
        fs::write(camera.join("before.jpg"), b"jpg").unwrap();
        let processing = root.join("S1/P1/1/c1/processing");
        fs::create_dir_all(&processing).unwrap();
        fs::write(processing.join("summary.html"), b"<html/>").unwrap();
        root
    }

    #[tokio::test]
    async fn run_writes_json_and_stages_files() {
        let tmp = TempDir::new().unwrap();
        let root = trip(&tmp);
        let opts = RunOptions {
            base: root,
            output: Some(tmp.path().join("out")),
            ..Default::default()
        };

        let outcome = run_report(&Config::default(), opts).await.unwrap();
        assert_eq!(outcome.report_dir, tmp.path().join("out/T9_Trip_Report"));
        assert!(outcome.report_dir.join("data.json").is_file());
        assert!(outcome.report_dir.join(MATERIALIZED_FILE).is_file());
        assert!(outcome.report_dir.join("camera/P1_1/before.jpg").is_file());
        assert!(outcome.report_dir.join("summary/P1_1_summary.html").is_file());
        assert_eq!(outcome.materialized.transferred, 2);
        assert!(!outcome.csv_loaded);

        // data.json keeps the source paths; only the staged copy is rewritten.
        let saved = export::read_trip_data(&outcome.report_dir.join("data.json")).unwrap();
        let rec = &saved.trip_data.get("P1_1").unwrap()[0];
        assert!(rec.camera.as_ref().unwrap().camera_files[0].is_absolute());
        let staged = &outcome.data.trip_data.get("P1_1").unwrap()[0];
        assert_eq!(
            staged.camera.as_ref().unwrap().camera_files,
            vec![PathBuf::from("camera/P1_1/before.jpg")]
        );
    }

    #[tokio::test]
    async fn json_input_skips_collection() {
        let tmp = TempDir::new().unwrap();
        let root = trip(&tmp);
        let data = collect::collect(&root).unwrap();
        let json = tmp.path().join("saved.json");
        export::write_trip_data(&json, &data).unwrap();

        let opts = RunOptions {
            base: json,
            json_input: true,
            output: Some(tmp.path().join("out")),
            report_name: Some("again".into()),
            ..Default::default()
        };
        let outcome = run_report(&Config::default(), opts).await.unwrap();
        assert_eq!(outcome.report_dir, tmp.path().join("out/again"));
        assert_eq!(outcome.data.trip_name, "T9");
    }

    #[tokio::test]
    async fn correlation_table_sets_flag() {
        let tmp = TempDir::new().unwrap();
        let root = trip(&tmp);
        let table = tmp.path().join("samples.csv");
        fs::write(&table, "container,slot,project,comment\nP1,1,LYSO,soaked\n").unwrap();

        let opts = RunOptions {
            base: root,
            output: Some(tmp.path().join("out")),
            correlation: Some(table),
            ..Default::default()
        };
        let outcome = run_report(&Config::default(), opts).await.unwrap();
        assert!(outcome.csv_loaded);
        let rec = &outcome.data.trip_data.get("P1_1").unwrap()[0];
        assert_eq!(rec.project.as_deref(), Some("LYSO"));
        assert_eq!(rec.comment.as_deref(), Some("soaked"));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn non_utf8_file_name_does_not_fail_the_run() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        let root = trip(&tmp);
        let camera = root.join("S1/P1/1/c1/camera");
        fs::write(camera.join(OsStr::from_bytes(b"\xc5loop.jpg")), b"jpg").unwrap();
        fs::write(camera.join("ok.jpg"), b"jpg").unwrap();

        let opts = RunOptions {
            base: root,
            output: Some(tmp.path().join("out")),
            ..Default::default()
        };
        let outcome = run_report(&Config::default(), opts).await.unwrap();

        let saved = export::read_trip_data(&outcome.report_dir.join("data.json")).unwrap();
        let files = &saved.trip_data.get("P1_1").unwrap()[0]
            .camera
            .as_ref()
            .unwrap()
            .camera_files;
        assert_eq!(files.len(), 3);
        assert!(files
            .iter()
            .any(|p| p.to_string_lossy().ends_with("\u{fffd}loop.jpg")));
        assert!(outcome.report_dir.join(MATERIALIZED_FILE).is_file());
        assert_eq!(outcome.materialized.failed, 0);
    }

    #[tokio::test]
    async fn invalid_root_fails_the_run() {
        let tmp = TempDir::new().unwrap();
        let opts = RunOptions {
            base: tmp.path().join("missing"),
            output: Some(tmp.path().join("out")),
            ..Default::default()
        };
        assert!(run_report(&Config::default(), opts).await.is_err());
    }
}
