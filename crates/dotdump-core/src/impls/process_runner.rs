//! TokioCommandRunner - spawns real child processes.

use std::ffi::OsString;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::domain::errors::DumpError;
use crate::ports::{CommandOutput, CommandRunner, CommandSpec, OutputMode};

/// Runs commands with `tokio::process`, looking programs up on a search path
/// captured at construction time.
pub struct TokioCommandRunner {
    search_path: Option<OsString>,
}

impl TokioCommandRunner {
    /// Uses the `PATH` of the current process.
    pub fn new() -> Self {
        Self {
            search_path: std::env::var_os("PATH"),
        }
    }

    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
        }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, DumpError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null());
        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir);
        }

        debug!(command = %spec.display_line(), "spawning");
        let spawn_err = |source: std::io::Error| DumpError::Spawn {
            program: spec.program.clone(),
            source,
        };

        let output = match spec.output {
            OutputMode::Capture => {
                let out = cmd
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .output()
                    .await
                    .map_err(spawn_err)?;
                CommandOutput {
                    code: out.status.code(),
                    stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                }
            }
            OutputMode::Inherit => {
                let status = cmd
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit())
                    .status()
                    .await
                    .map_err(spawn_err)?;
                CommandOutput {
                    code: status.code(),
                    ..CommandOutput::default()
                }
            }
        };

        debug!(program = %spec.program, code = ?output.code, "finished");
        Ok(output)
    }

    fn is_available(&self, program: &str) -> bool {
        if program.contains('/') {
            return is_executable(Path::new(program));
        }
        match &self.search_path {
            Some(paths) => std::env::split_paths(paths).any(|dir| is_executable(&dir.join(program))),
            None => false,
        }
    }
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
