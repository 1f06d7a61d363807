//! ExecutionPlan - where each file goes and how the collector is launched.
//!
//! The plan is derived once from the request and the configuration. It is
//! the only place that knows the difference between the two strategies:
//!
//! | | same-container | debug-container |
//! |---|---|---|
//! | tool cache | `<dump_dir>` | `<dump_dir>` (sidecar filesystem) |
//! | output, as seen by us | `<dump_dir>` | `<proc_root>/<pid>/root<dump_dir>` |
//! | output, as passed to the collector | `<dump_dir>/latest_dump` | `<dump_dir>/latest_dump` |
//! | working dir | `<dump_dir>` | `<scratch_dir>` |
//! | env | none | `TMPDIR`, `DOTNET_BUNDLE_EXTRACT_BASE_DIR` under the target root |
//!
//! The collector path is written by the target runtime itself, so it is
//! always expressed in the target's filesystem namespace.

use std::path::{Path, PathBuf};

use super::config::CollectorConfig;
use super::request::{CollectionRequest, Strategy, TargetPid};

pub const TOOL_NAME: &str = "dotnet-dump";
pub const LATEST_LINK_NAME: &str = "latest_dump";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    working_dir: PathBuf,
    tool_dir: PathBuf,
    output_dir: PathBuf,
    collector_output: PathBuf,
    env: Vec<(String, String)>,
}

impl ExecutionPlan {
    pub fn for_request(request: &CollectionRequest, config: &CollectorConfig) -> Self {
        let dump_dir = request.dump_dir().to_path_buf();
        let collector_output = dump_dir.join(LATEST_LINK_NAME);

        match request.strategy() {
            Strategy::SameContainer => Self {
                working_dir: dump_dir.clone(),
                tool_dir: dump_dir.clone(),
                output_dir: dump_dir,
                collector_output,
                env: Vec::new(),
            },
            Strategy::DebugContainer => {
                let target_root = target_root(&config.proc_root, request.target_pid());
                let target_tmp = target_root.join("tmp");
                let env = vec![
                    ("TMPDIR".to_string(), target_tmp.display().to_string()),
                    (
                        "DOTNET_BUNDLE_EXTRACT_BASE_DIR".to_string(),
                        target_tmp.join(".dotnet-bundle").display().to_string(),
                    ),
                ];
                Self {
                    working_dir: config.scratch_dir.clone(),
                    output_dir: reroot(&target_root, &dump_dir),
                    tool_dir: dump_dir,
                    collector_output,
                    env,
                }
            }
        }
    }

    /// Working directory of the collector process.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Directory caching the collector binary.
    pub fn tool_dir(&self) -> &Path {
        &self.tool_dir
    }

    pub fn tool_path(&self) -> PathBuf {
        self.tool_dir.join(TOOL_NAME)
    }

    /// The dump directory as this process sees it.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `latest_dump` as this process sees it.
    pub fn latest_link(&self) -> PathBuf {
        self.output_dir.join(LATEST_LINK_NAME)
    }

    /// `latest_dump` as the target process sees it.
    pub fn collector_output(&self) -> &Path {
        &self.collector_output
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }
}

/// `<proc_root>/<pid>/root`: the target's filesystem seen through procfs.
pub fn target_root(proc_root: &Path, pid: TargetPid) -> PathBuf {
    proc_root.join(pid.get().to_string()).join("root")
}

fn reroot(root: &Path, path: &Path) -> PathBuf {
    root.join(path.strip_prefix("/").unwrap_or(path))
}
