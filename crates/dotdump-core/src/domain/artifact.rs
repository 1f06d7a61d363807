//! Dump artifact: the published `latest_dump` and what we know about it.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::request::{DumpType, Strategy, TargetPid};

/// Result of a successful collection.
///
/// `path` is where this process can read the file; `published_as` is the
/// same file in the target's filesystem, which is what the retrieval side
/// asks the cluster for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DumpArtifact {
    pub path: PathBuf,
    pub published_as: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
    pub dump_type: DumpType,
    pub target_pid: TargetPid,
    pub strategy: Strategy,
    pub collected_at: DateTime<Utc>,

    /// Dump directory contents right after collection.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub listing: Vec<ListingEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size_bytes: u64,
}
