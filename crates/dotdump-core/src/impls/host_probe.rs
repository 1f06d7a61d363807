//! HostProbe - platform detection for the container we are running in.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::DumpError;
use crate::domain::platform::Libc;
use crate::ports::{CommandRunner, CommandSpec, PlatformProbe};

/// Asks `uname -m` for the machine and checks a distribution marker file
/// for musl.
pub struct HostProbe {
    runner: Arc<dyn CommandRunner>,
    musl_marker: PathBuf,
}

impl HostProbe {
    pub fn new(runner: Arc<dyn CommandRunner>, musl_marker: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            musl_marker: musl_marker.into(),
        }
    }
}

#[async_trait]
impl PlatformProbe for HostProbe {
    async fn machine(&self) -> Result<String, DumpError> {
        let out = self
            .runner
            .run(&CommandSpec::new("uname").arg("-m"))
            .await?
            .check("uname")?;
        Ok(out.stdout.trim().to_string())
    }

    async fn libc(&self) -> Libc {
        match tokio::fs::try_exists(&self.musl_marker).await {
            Ok(true) => Libc::Musl,
            _ => Libc::Glibc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::ScriptedRunner;
    use crate::ports::CommandOutput;

    #[tokio::test]
    async fn machine_comes_from_uname() {
        let runner = Arc::new(
            ScriptedRunner::new().on("uname", |_| Ok(CommandOutput::with_stdout("aarch64\n"))),
        );
        let probe = HostProbe::new(runner.clone(), "/nonexistent/alpine-release");

        assert_eq!(probe.machine().await.unwrap(), "aarch64");
        assert_eq!(runner.calls_to("uname")[0].args, vec!["-m"]);
    }

    #[tokio::test]
    async fn marker_file_selects_musl() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("alpine-release");
        let probe = HostProbe::new(Arc::new(ScriptedRunner::new()), &marker);

        assert_eq!(probe.libc().await, Libc::Glibc);
        std::fs::write(&marker, "3.19.1\n").unwrap();
        assert_eq!(probe.libc().await, Libc::Musl);
    }

    #[tokio::test]
    async fn failing_uname_is_reported() {
        let runner = ScriptedRunner::new().on("uname", |_| Ok(CommandOutput::failed(127, "")));
        let probe = HostProbe::new(Arc::new(runner), "/nonexistent");
        let err = probe.machine().await.unwrap_err();
        assert_eq!(err.exit_code(), 127);
    }
}
