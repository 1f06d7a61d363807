//! ToolProvisioner - makes sure a runnable `dotnet-dump` is on disk.
//!
//! # Flow
//! 1. Binary already present → done, no commands issued
//! 2. Detect platform (`uname -m` + musl marker); unknown machine is fatal
//! 3. Ensure the download helper, installing it with the first package
//!    manager found (apt-get, apk, yum, microdnf)
//! 4. Download the platform's collector and make it executable

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::errors::DumpError;
use crate::domain::platform::Platform;
use crate::ports::{CommandRunner, CommandSpec, PlatformProbe};

/// A package manager and the commands that install the download helper with it.
/// `{helper}` in an argument is replaced by the helper's name.
#[derive(Debug, Clone, Copy)]
pub struct PackageManager {
    pub name: &'static str,
    pub install: &'static [&'static [&'static str]],
}

/// Tried in this order; the first one on the search path wins.
pub const PACKAGE_MANAGERS: [PackageManager; 4] = [
    PackageManager {
        name: "apt-get",
        install: &[&["apt-get", "update"], &["apt-get", "install", "-y", "{helper}"]],
    },
    PackageManager {
        name: "apk",
        install: &[&["apk", "add", "--no-cache", "{helper}"]],
    },
    PackageManager {
        name: "yum",
        install: &[&["yum", "install", "-y", "{helper}"]],
    },
    PackageManager {
        name: "microdnf",
        install: &[&["microdnf", "install", "-y", "{helper}"]],
    },
];

const TOOL_MODE: u32 = 0o755;

pub struct ToolProvisioner {
    runner: Arc<dyn CommandRunner>,
    probe: Arc<dyn PlatformProbe>,
    download_helper: String,
}

impl ToolProvisioner {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        probe: Arc<dyn PlatformProbe>,
        download_helper: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            probe,
            download_helper: download_helper.into(),
        }
    }

    pub async fn detect_platform(&self) -> Result<Platform, DumpError> {
        let machine = self.probe.machine().await?;
        let libc = self.probe.libc().await;
        let platform = Platform::resolve(&machine, libc)?;
        debug!(%machine, %libc, %platform, "platform detected");
        Ok(platform)
    }

    /// Make the download helper available, installing it if needed.
    pub async fn ensure_downloader(&self) -> Result<(), DumpError> {
        let helper = self.download_helper.as_str();
        if self.runner.is_available(helper) {
            debug!(helper, "download helper present");
            return Ok(());
        }

        let manager = PACKAGE_MANAGERS
            .iter()
            .find(|pm| self.runner.is_available(pm.name))
            .ok_or_else(|| DumpError::NoPackageManager {
                helper: helper.to_string(),
            })?;

        info!(manager = manager.name, helper, "installing download helper");
        for step in manager.install {
            let Some((program, args)) = step.split_first() else {
                continue;
            };
            let spec = CommandSpec::new(*program)
                .args(args.iter().map(|a| a.replace("{helper}", helper)));
            let out = self.runner.run(&spec).await?;
            if !out.is_success() {
                warn!(manager = manager.name, stderr = %out.stderr.trim(), "install failed");
                return Err(DumpError::PackageInstallFailed {
                    manager: manager.name.to_string(),
                    helper: helper.to_string(),
                    code: out.code,
                });
            }
        }
        Ok(())
    }

    /// Return `tool_path`, downloading the collector first if it is missing.
    pub async fn ensure_collector_binary(&self, tool_path: &Path) -> Result<PathBuf, DumpError> {
        let present = tokio::fs::try_exists(tool_path)
            .await
            .map_err(|e| DumpError::io(format!("checking {}", tool_path.display()), e))?;
        if present {
            info!(path = %tool_path.display(), "collector already provisioned");
            return Ok(tool_path.to_path_buf());
        }

        let platform = self.detect_platform().await?;
        self.fetch_collector(platform, tool_path).await?;
        Ok(tool_path.to_path_buf())
    }

    /// Download the collector for `platform` to `tool_path`.
    pub async fn fetch_collector(&self, platform: Platform, tool_path: &Path) -> Result<(), DumpError> {
        self.ensure_downloader().await?;

        let url = platform.collector_url();
        info!(%platform, url, dest = %tool_path.display(), "downloading collector");
        let spec = CommandSpec::new(&self.download_helper).args([
            "-fsSL".to_string(),
            "-o".to_string(),
            tool_path.display().to_string(),
            url.to_string(),
        ]);
        self.runner.run(&spec).await?.check(&self.download_helper)?;

        tokio::fs::set_permissions(tool_path, std::fs::Permissions::from_mode(TOOL_MODE))
            .await
            .map_err(|e| DumpError::io(format!("chmod {}", tool_path.display()), e))?;
        Ok(())
    }
}
