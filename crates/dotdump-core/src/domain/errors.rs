//! Errors - error type and its operational classification.

use std::path::PathBuf;

use super::platform::Libc;

/// ErrorKind classifies a failure for the operator.
///
/// - Configuration: bad parameter or unsupported platform; fix the input
/// - Environment: the container lacks something we need (package manager)
/// - Transient: a tool, the network or the filesystem failed
///
/// Every kind is terminal for the run. Nothing is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Environment,
    Transient,
}

#[derive(Debug, thiserror::Error)]
pub enum DumpError {
    #[error("unsupported strategy '{0}' (expected same-container or debug-container)")]
    UnsupportedStrategy(String),

    #[error("unsupported dump type '{0}' (expected full, heap, mini or triage)")]
    UnsupportedDumpType(String),

    #[error("invalid target pid '{0}': must be a positive integer")]
    InvalidPid(String),

    #[error("invalid dump dir '{0}': must be an absolute path")]
    InvalidDumpDir(String),

    #[error("unsupported platform: machine={machine} libc={libc}")]
    UnsupportedPlatform { machine: String, libc: Libc },

    #[error("no supported package manager found to install {helper}")]
    NoPackageManager { helper: String },

    #[error("{manager} failed to install {helper} ({})", describe_exit(.code))]
    PackageInstallFailed {
        manager: String,
        helper: String,
        code: Option<i32>,
    },

    #[error("{program} failed ({})", describe_exit(.code))]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("collector finished but no dump was found at {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("pod not found: {0}")]
    PodNotFound(String),

    #[error("debug container {name} did not start after {attempts} checks")]
    DebugContainerNotReady { name: String, attempts: u32 },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("exit status {c}"),
        None => "terminated by signal".to_string(),
    }
}

impl DumpError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        DumpError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DumpError::UnsupportedStrategy(_)
            | DumpError::UnsupportedDumpType(_)
            | DumpError::InvalidPid(_)
            | DumpError::InvalidDumpDir(_)
            | DumpError::UnsupportedPlatform { .. } => ErrorKind::Configuration,
            DumpError::NoPackageManager { .. }
            | DumpError::PackageInstallFailed { .. }
            | DumpError::PodNotFound(_) => ErrorKind::Environment,
            DumpError::CommandFailed { .. }
            | DumpError::Spawn { .. }
            | DumpError::Io { .. }
            | DumpError::MissingArtifact(_)
            | DumpError::DebugContainerNotReady { .. } => ErrorKind::Transient,
        }
    }

    /// Process exit status to report for this error.
    ///
    /// A failing external command hands its own status through; everything
    /// else exits with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            DumpError::CommandFailed {
                code: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}
