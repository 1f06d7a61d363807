//! DumpOrchestrator - one collection run, start to finish.
//!
//! # Flow
//! 1. Build the execution plan for the request's strategy
//! 2. Create the tool and output directories
//! 3. Provision the collector
//! 4. Remove the previous `latest_dump`
//! 5. Run `dotnet-dump collect ... -o <dump_dir>/latest_dump`
//! 6. List the dump directory and checksum the artifact
//!
//! The collector writes straight to the requested output path, so
//! `latest_dump` is the artifact itself. Any failure ends the run; partial
//! state (half-downloaded tool, removed link) is left as is.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::app::inventory::{list_dir, sha256_file};
use crate::app::provisioner::ToolProvisioner;
use crate::domain::artifact::DumpArtifact;
use crate::domain::config::CollectorConfig;
use crate::domain::errors::DumpError;
use crate::domain::plan::ExecutionPlan;
use crate::domain::request::CollectionRequest;
use crate::impls::HostProbe;
use crate::ports::{Clock, CommandRunner, CommandSpec};

pub struct DumpOrchestrator {
    runner: Arc<dyn CommandRunner>,
    provisioner: ToolProvisioner,
    clock: Arc<dyn Clock>,
    config: CollectorConfig,
}

impl DumpOrchestrator {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        provisioner: ToolProvisioner,
        clock: Arc<dyn Clock>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            runner,
            provisioner,
            clock,
            config,
        }
    }

    /// Wire the default provisioner (host probe + configured download helper)
    /// around `runner`.
    pub fn with_host_probe(
        runner: Arc<dyn CommandRunner>,
        clock: Arc<dyn Clock>,
        config: CollectorConfig,
    ) -> Self {
        let probe = Arc::new(HostProbe::new(runner.clone(), config.musl_marker.clone()));
        let provisioner = ToolProvisioner::new(runner.clone(), probe, config.download_helper.clone());
        Self::new(runner, provisioner, clock, config)
    }

    pub fn plan(&self, request: &CollectionRequest) -> ExecutionPlan {
        ExecutionPlan::for_request(request, &self.config)
    }

    #[instrument(skip_all, fields(pid = %request.target_pid(), strategy = %request.strategy()))]
    pub async fn collect(&self, request: &CollectionRequest) -> Result<DumpArtifact, DumpError> {
        let plan = self.plan(request);
        info!(
            dump_type = %request.dump_type(),
            dump_dir = %request.dump_dir().display(),
            "starting collection"
        );

        create_dir(plan.tool_dir()).await?;
        if plan.output_dir() != plan.tool_dir() {
            create_dir(plan.output_dir()).await?;
        }

        let tool = self.provisioner.ensure_collector_binary(&plan.tool_path()).await?;

        let latest = plan.latest_link();
        remove_previous(&latest).await?;

        let spec = CommandSpec::new(tool.display().to_string())
            .args([
                "collect".to_string(),
                "-p".to_string(),
                request.target_pid().to_string(),
                "--type".to_string(),
                request.dump_type().collector_arg().to_string(),
                "-o".to_string(),
                plan.collector_output().display().to_string(),
            ])
            .envs(plan.env())
            .current_dir(plan.working_dir())
            .inherit_output();
        info!(command = %spec.display_line(), cwd = %plan.working_dir().display(), "running collector");
        self.runner.run(&spec).await?.check(spec.program_name())?;

        let meta = match tokio::fs::metadata(&latest).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DumpError::MissingArtifact(latest));
            }
            Err(e) => return Err(DumpError::io(format!("inspecting {}", latest.display()), e)),
        };

        let listing = list_dir(plan.output_dir()).await?;
        for entry in &listing {
            info!(name = %entry.name, kind = ?entry.kind, size = entry.size_bytes, "dump dir entry");
        }
        let sha256 = sha256_file(&latest).await?;
        info!(path = %latest.display(), size = meta.len(), %sha256, "dump published");

        Ok(DumpArtifact {
            path: latest,
            published_as: plan.collector_output().to_path_buf(),
            size_bytes: meta.len(),
            sha256,
            dump_type: request.dump_type(),
            target_pid: request.target_pid(),
            strategy: request.strategy(),
            collected_at: self.clock.now(),
            listing,
        })
    }
}

async fn create_dir(dir: &Path) -> Result<(), DumpError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| DumpError::io(format!("creating {}", dir.display()), e))
}

/// Drop the old `latest_dump`, whether a plain file or a symlink.
async fn remove_previous(latest: &Path) -> Result<(), DumpError> {
    match tokio::fs::remove_file(latest).await {
        Ok(()) => {
            info!(path = %latest.display(), "removed previous dump");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DumpError::io(format!("removing {}", latest.display()), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::{DumpType, Strategy, TargetPid};
    use crate::impls::ScriptedRunner;
    use crate::ports::{CommandOutput, FixedClock};
    use chrono::{TimeZone, Utc};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()))
    }

    fn config(root: &Path) -> CollectorConfig {
        CollectorConfig {
            proc_root: root.join("proc"),
            scratch_dir: root.join("scratch"),
            musl_marker: root.join("alpine-release"),
            ..CollectorConfig::default()
        }
    }

    fn request(dump_dir: &Path, strategy: Strategy) -> CollectionRequest {
        CollectionRequest::new(DumpType::Mini, TargetPid::new(1).unwrap(), dump_dir, strategy)
            .unwrap()
    }

    fn arg_after<'a>(spec: &'a CommandSpec, flag: &str) -> &'a str {
        let i = spec.args.iter().position(|a| a == flag).unwrap();
        &spec.args[i + 1]
    }

    /// Runner for a glibc x86_64 box with curl; the collector writes
    /// `dump #<n>` to `write_to`, or to its `-o` path when `None`.
    fn host(write_to: Option<PathBuf>) -> ScriptedRunner {
        let runs = AtomicU32::new(0);
        ScriptedRunner::new()
            .with_available(&["curl"])
            .on("uname", |_| Ok(CommandOutput::with_stdout("x86_64\n")))
            .on("curl", |spec| {
                fs::write(&spec.args[2], b"\x7fELF").unwrap();
                Ok(CommandOutput::success())
            })
            .on("dotnet-dump", move |spec| {
                let n = runs.fetch_add(1, Ordering::SeqCst) + 1;
                let out = write_to
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(arg_after(spec, "-o")));
                fs::write(out, format!("dump #{n}")).unwrap();
                Ok(CommandOutput::success())
            })
    }

    #[tokio::test]
    async fn same_container_creates_dir_provisions_and_publishes() {
        let root = tempfile::tempdir().unwrap();
        let dump_dir = root.path().join("dumps");
        let runner = Arc::new(host(None));
        let orch = DumpOrchestrator::with_host_probe(runner.clone(), clock(), config(root.path()));

        let artifact = orch.collect(&request(&dump_dir, Strategy::SameContainer)).await.unwrap();

        assert!(dump_dir.join("dotnet-dump").is_file());
        assert_eq!(artifact.path, dump_dir.join("latest_dump"));
        assert_eq!(fs::read_to_string(&artifact.path).unwrap(), "dump #1");
        assert_eq!(artifact.size_bytes, 7);
        assert_eq!(artifact.sha256, sha256_file(&artifact.path).await.unwrap());
        assert_eq!(artifact.collected_at, clock().now());
        assert_eq!(runner.program_sequence(), vec!["uname", "curl", "dotnet-dump"]);

        let calls = runner.calls_to("dotnet-dump");
        let collect = &calls[0];
        assert_eq!(collect.current_dir.as_deref(), Some(dump_dir.as_path()));
        assert_eq!(arg_after(collect, "--type"), "Mini");
        assert_eq!(arg_after(collect, "-p"), "1");
        assert!(collect.env.is_empty());
    }

    #[tokio::test]
    async fn rerun_replaces_latest_and_reuses_tool() {
        let root = tempfile::tempdir().unwrap();
        let dump_dir = root.path().join("dumps");
        let runner = Arc::new(host(None));
        let orch = DumpOrchestrator::with_host_probe(runner.clone(), clock(), config(root.path()));
        let req = request(&dump_dir, Strategy::SameContainer);

        let first = orch.collect(&req).await.unwrap();
        let second = orch.collect(&req).await.unwrap();

        assert_eq!(first.path, second.path);
        assert_eq!(fs::read_to_string(&second.path).unwrap(), "dump #2");
        assert_ne!(first.sha256, second.sha256);
        assert_eq!(runner.calls_to("curl").len(), 1);

        let dumps: Vec<_> = second
            .listing
            .iter()
            .filter(|e| e.name != "dotnet-dump")
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(dumps, vec!["latest_dump"]);
    }

    #[tokio::test]
    async fn stale_symlink_is_replaced_by_real_file() {
        let root = tempfile::tempdir().unwrap();
        let dump_dir = root.path().join("dumps");
        fs::create_dir_all(&dump_dir).unwrap();
        fs::write(dump_dir.join("dotnet-dump"), b"cached").unwrap();
        fs::write(dump_dir.join("core_20240101_000000"), b"old").unwrap();
        std::os::unix::fs::symlink("core_20240101_000000", dump_dir.join("latest_dump")).unwrap();

        let runner = Arc::new(host(None));
        let orch = DumpOrchestrator::with_host_probe(runner.clone(), clock(), config(root.path()));
        let artifact = orch.collect(&request(&dump_dir, Strategy::SameContainer)).await.unwrap();

        let meta = fs::symlink_metadata(&artifact.path).unwrap();
        assert!(meta.file_type().is_file());
        assert_eq!(fs::read_to_string(dump_dir.join("core_20240101_000000")).unwrap(), "old");
        assert_eq!(runner.program_sequence(), vec!["dotnet-dump"]);
    }

    #[tokio::test]
    async fn debug_container_writes_through_target_root() {
        let root = tempfile::tempdir().unwrap();
        let cfg = config(root.path());
        fs::create_dir_all(&cfg.scratch_dir).unwrap();

        // dump_dir is absolute and doubles as the sidecar's tool cache.
        let dump_dir = root.path().join("dumps");
        let target_root = cfg.proc_root.join("1/root");
        let target_out = target_root
            .join(dump_dir.strip_prefix("/").unwrap())
            .join("latest_dump");

        let runner = Arc::new(host(Some(target_out.clone())));
        let orch = DumpOrchestrator::with_host_probe(runner.clone(), clock(), cfg.clone());
        let req = request(&dump_dir, Strategy::DebugContainer);
        let plan = orch.plan(&req);

        let artifact = orch.collect(&req).await.unwrap();

        assert_eq!(artifact.path, target_out);
        assert_eq!(artifact.published_as, dump_dir.join("latest_dump"));
        assert!(dump_dir.join("dotnet-dump").is_file());

        let calls = runner.calls_to("dotnet-dump");
        let collect = &calls[0];
        assert_eq!(collect.current_dir.as_deref(), Some(cfg.scratch_dir.as_path()));
        assert_eq!(arg_after(collect, "-o"), dump_dir.join("latest_dump").to_str().unwrap());
        assert_eq!(collect.env, plan.env().to_vec());
        let prefix = target_root.to_string_lossy().into_owned();
        assert!(collect.env.iter().all(|(_, v)| v.starts_with(&prefix)));
    }

    #[tokio::test]
    async fn collector_failure_propagates_exit_code() {
        let root = tempfile::tempdir().unwrap();
        let dump_dir = root.path().join("dumps");
        let runner = Arc::new(
            host(None).on("dotnet-dump", |_| Ok(CommandOutput::failed(134, "no diagnostics socket"))),
        );
        let orch = DumpOrchestrator::with_host_probe(runner, clock(), config(root.path()));

        let err = orch
            .collect(&request(&dump_dir, Strategy::SameContainer))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 134);
        assert!(!dump_dir.join("latest_dump").exists());
    }

    #[tokio::test]
    async fn silent_collector_is_missing_artifact() {
        let root = tempfile::tempdir().unwrap();
        let dump_dir = root.path().join("dumps");
        let runner = Arc::new(host(None).on("dotnet-dump", |_| Ok(CommandOutput::success())));
        let orch = DumpOrchestrator::with_host_probe(runner, clock(), config(root.path()));

        let err = orch
            .collect(&request(&dump_dir, Strategy::SameContainer))
            .await
            .unwrap_err();
        assert!(matches!(err, DumpError::MissingArtifact(_)));
    }
}
