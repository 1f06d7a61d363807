//! Collection request: what to dump, from which process, where, and how.
//!
//! Raw parameters arrive as optional strings (`CollectionParams`) and are
//! validated exactly once into an immutable `CollectionRequest`. Nothing
//! downstream looks at the environment or re-parses strings.

use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DumpError;

pub const DEFAULT_DUMP_TYPE: &str = "full";
pub const DEFAULT_TARGET_PID: &str = "1";
pub const DEFAULT_DUMP_DIR: &str = "/dump";
pub const DEFAULT_STRATEGY: &str = "same-container";

/// Kind of dump the collector is asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpType {
    Full,
    Heap,
    Mini,
    Triage,
}

impl DumpType {
    /// Value passed to `dotnet-dump collect --type`.
    pub fn collector_arg(self) -> &'static str {
        match self {
            DumpType::Full => "Full",
            DumpType::Heap => "Heap",
            DumpType::Mini => "Mini",
            DumpType::Triage => "Triage",
        }
    }
}

impl FromStr for DumpType {
    type Err = DumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(DumpType::Full),
            "heap" => Ok(DumpType::Heap),
            "mini" => Ok(DumpType::Mini),
            "triage" => Ok(DumpType::Triage),
            _ => Err(DumpError::UnsupportedDumpType(s.to_string())),
        }
    }
}

impl fmt::Display for DumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.collector_arg().to_ascii_lowercase())
    }
}

/// Where the collector runs relative to the target process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Same filesystem namespace as the target.
    SameContainer,
    /// Sidecar sharing the process namespace; target files live under `/proc/<pid>/root`.
    DebugContainer,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::SameContainer => "same-container",
            Strategy::DebugContainer => "debug-container",
        }
    }
}

impl FromStr for Strategy {
    type Err = DumpError;

    // Exact match only: a typo must not fall back to some default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "same-container" => Ok(Strategy::SameContainer),
            "debug-container" => Ok(Strategy::DebugContainer),
            _ => Err(DumpError::UnsupportedStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Positive process identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetPid(NonZeroU32);

impl TargetPid {
    pub fn new(pid: u32) -> Option<Self> {
        NonZeroU32::new(pid).map(TargetPid)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl FromStr for TargetPid {
    type Err = DumpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<NonZeroU32>()
            .map(TargetPid)
            .map_err(|_| DumpError::InvalidPid(s.to_string()))
    }
}

impl fmt::Display for TargetPid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unvalidated invocation parameters. `None` means "use the default".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionParams {
    #[serde(default)]
    pub dump_type: Option<String>,
    #[serde(default)]
    pub target_pid: Option<String>,
    #[serde(default)]
    pub dump_dir: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
}

/// A validated, immutable request for one collection run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionRequest {
    dump_type: DumpType,
    target_pid: TargetPid,
    dump_dir: PathBuf,
    strategy: Strategy,
}

impl CollectionRequest {
    pub fn new(
        dump_type: DumpType,
        target_pid: TargetPid,
        dump_dir: impl Into<PathBuf>,
        strategy: Strategy,
    ) -> Result<Self, DumpError> {
        let dump_dir = dump_dir.into();
        if !dump_dir.is_absolute() {
            return Err(DumpError::InvalidDumpDir(dump_dir.display().to_string()));
        }
        Ok(Self {
            dump_type,
            target_pid,
            dump_dir,
            strategy,
        })
    }

    pub fn dump_type(&self) -> DumpType {
        self.dump_type
    }

    pub fn target_pid(&self) -> TargetPid {
        self.target_pid
    }

    pub fn dump_dir(&self) -> &Path {
        &self.dump_dir
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Flags that reproduce this request on another `dotdump collect` invocation.
    pub fn to_cli_args(&self) -> Vec<String> {
        vec![
            "--dump-type".to_string(),
            self.dump_type.to_string(),
            "--target-pid".to_string(),
            self.target_pid.to_string(),
            "--dump-dir".to_string(),
            self.dump_dir.display().to_string(),
            "--strategy".to_string(),
            self.strategy.to_string(),
        ]
    }
}

impl TryFrom<CollectionParams> for CollectionRequest {
    type Error = DumpError;

    fn try_from(params: CollectionParams) -> Result<Self, Self::Error> {
        // Strategy is validated before anything else.
        let strategy: Strategy = params
            .strategy
            .as_deref()
            .unwrap_or(DEFAULT_STRATEGY)
            .parse()?;
        let dump_type: DumpType = params
            .dump_type
            .as_deref()
            .unwrap_or(DEFAULT_DUMP_TYPE)
            .parse()?;
        let target_pid: TargetPid = params
            .target_pid
            .as_deref()
            .unwrap_or(DEFAULT_TARGET_PID)
            .parse()?;
        let dump_dir = params.dump_dir.as_deref().unwrap_or(DEFAULT_DUMP_DIR);
        if dump_dir.trim().is_empty() {
            return Err(DumpError::InvalidDumpDir(dump_dir.to_string()));
        }
        CollectionRequest::new(dump_type, target_pid, dump_dir, strategy)
    }
}
