//! # Trip Report
//!
//! Collects a synchrotron trip directory into one hierarchical dataset and
//! stages the side-files a report needs.
//!
//! ## Architecture
//!
//! ```text
//! root/site/puck/position/collection/<leaf>
//!        │
//!        ▼
//! ┌──────────────┐   ┌─────────────┐   ┌──────────────┐
//! │   collect    │──▶│   Dataset   │──▶│  materialize │──▶ report dir
//! │ archive+leaf │   │ + stats     │   │ copy/symlink │
//! └──────────────┘   └─────────────┘   └──────────────┘
//!                          ▲
//!                    correlate (CSV)
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`collect`] | Tree walker, serial and per-site parallel |
//! | [`archive`] | In-place tar expansion under pucks |
//! | [`extract`] | Leaf-directory extractors |
//! | [`autoproc`] | `autoPROC.xml` normalization |
//! | [`models`] | Collection records and the dataset |
//! | [`stats`] | Processing statistics |
//! | [`materialize`] | Side-file staging |
//! | [`correlate`] | Sample-sheet merge |
//! | [`export`] | JSON hand-off files |
//! | [`config`] | TOML configuration |
//! | [`report`] | End-to-end run |

pub mod archive;
pub mod autoproc;
pub mod collect;
pub mod config;
pub mod correlate;
pub mod error;
pub mod export;
pub mod extract;
pub mod logging;
pub mod materialize;
pub mod models;
pub mod report;
pub mod scan;
pub mod stats;

pub use collect::{collect, collect_parallel};
pub use error::CollectError;
pub use models::{CollectionRecord, Dataset, TripData};
pub use stats::ProcessingStats;
