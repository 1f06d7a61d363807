//! Collector configuration: host paths and helper names.
//!
//! These are deployment facts, not per-run parameters, so they live apart
//! from `CollectionRequest`. Tests point `proc_root` and `musl_marker` at a
//! temp directory.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Mount point of procfs; debug-container paths go through `<proc_root>/<pid>/root`.
    pub proc_root: PathBuf,

    /// Working directory of the collector in a debug container.
    pub scratch_dir: PathBuf,

    /// Its presence marks a musl-based distribution.
    pub musl_marker: PathBuf,

    /// Program used to fetch the collector.
    pub download_helper: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            scratch_dir: PathBuf::from("/tmp"),
            musl_marker: PathBuf::from("/etc/alpine-release"),
            download_helper: "curl".to_string(),
        }
    }
}
