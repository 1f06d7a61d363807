//! RetrievalClient - workstation side: run the orchestrator in a pod and copy the dump back.
//!
//! # Flow
//! 1. Resolve the pod (by name or label selector) and check it exists
//! 2. Pick the exec container: the target itself, or a fresh ephemeral
//!    debug container attached to it
//! 3. Push this binary into the exec container and run `collect` there
//! 4. Resolve `latest_dump` to its real path in the target container
//! 5. `kubectl cp` it into the local output directory and checksum it
//!
//! `latest_dump` is saved locally as `<pod>-<YYYYmmddTHHMMSS>.dmp`. A local
//! file is never overwritten; a clash gets a numeric suffix.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument};

use crate::app::inventory::sha256_file;
use crate::domain::errors::DumpError;
use crate::domain::plan::LATEST_LINK_NAME;
use crate::domain::request::{CollectionRequest, Strategy};
use crate::impls::{Kubectl, PodTarget};
use crate::ports::{Clock, CommandRunner};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PodSelector {
    Name(String),
    Label(String),
}

#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub namespace: String,
    pub selector: PodSelector,
    /// Target container; the pod's first container when unset.
    pub container: Option<String>,
    pub debug_image: String,
    /// How long the debug container stays alive.
    pub debug_ttl_secs: u64,
    pub ready_attempts: u32,
    pub ready_delay: Duration,
    /// This binary, as found on the workstation.
    pub local_binary: PathBuf,
    /// Where it is copied to inside the exec container.
    pub remote_binary: PathBuf,
    pub output_dir: PathBuf,
}

impl RetrievalOptions {
    pub fn new(namespace: impl Into<String>, selector: PodSelector, local_binary: impl Into<PathBuf>) -> Self {
        Self {
            namespace: namespace.into(),
            selector,
            container: None,
            debug_image: "debian:bookworm-slim".to_string(),
            debug_ttl_secs: 3600,
            ready_attempts: 30,
            ready_delay: Duration::from_secs(1),
            local_binary: local_binary.into(),
            remote_binary: PathBuf::from("/tmp/dotdump"),
            output_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedDump {
    pub pod: PodTarget,
    pub remote_path: PathBuf,
    pub local_path: PathBuf,
    pub sha256: String,
}

pub struct RetrievalClient {
    kubectl: Kubectl,
    clock: Arc<dyn Clock>,
}

impl RetrievalClient {
    pub fn new(runner: Arc<dyn CommandRunner>, clock: Arc<dyn Clock>) -> Self {
        Self {
            kubectl: Kubectl::new(runner),
            clock,
        }
    }

    /// Find the pod and its target container.
    pub async fn resolve_pod(&self, opts: &RetrievalOptions) -> Result<PodTarget, DumpError> {
        let ns = opts.namespace.as_str();
        let pod = match &opts.selector {
            PodSelector::Name(name) => name.clone(),
            PodSelector::Label(selector) => self
                .kubectl
                .first_pod_matching(ns, selector)
                .await?
                .ok_or_else(|| DumpError::PodNotFound(format!("{ns} -l {selector}")))?,
        };

        if !self.kubectl.pod_exists(ns, &pod).await? {
            return Err(DumpError::PodNotFound(format!("{ns}/{pod}")));
        }

        let container = match &opts.container {
            Some(c) => c.clone(),
            None => self.kubectl.first_container(ns, &pod).await?,
        };
        Ok(PodTarget {
            namespace: ns.to_string(),
            pod,
            container: Some(container),
        })
    }

    #[instrument(skip_all, fields(ns = %opts.namespace, strategy = %request.strategy()))]
    pub async fn retrieve(
        &self,
        opts: &RetrievalOptions,
        request: &CollectionRequest,
    ) -> Result<RetrievedDump, DumpError> {
        let target = self.resolve_pod(opts).await?;
        info!(pod = %target.pod, container = ?target.container, "target resolved");

        let exec_target = match request.strategy() {
            Strategy::SameContainer => target.clone(),
            Strategy::DebugContainer => self.attach_debug_container(opts, &target).await?,
        };

        let remote_binary = opts.remote_binary.display().to_string();
        info!(container = ?exec_target.container, dest = %remote_binary, "pushing orchestrator");
        self.kubectl
            .copy_to(&opts.local_binary, &exec_target, &opts.remote_binary)
            .await?;
        self.kubectl
            .exec(
                &exec_target,
                &["chmod".to_string(), "755".to_string(), remote_binary.clone()],
                true,
            )
            .await?;

        let mut argv = vec![remote_binary, "collect".to_string()];
        argv.extend(request.to_cli_args());
        info!("running remote collection");
        self.kubectl.exec(&exec_target, &argv, false).await?;

        let latest = request.dump_dir().join(LATEST_LINK_NAME);
        let out = self
            .kubectl
            .exec(
                &target,
                &["readlink".to_string(), "-f".to_string(), latest.display().to_string()],
                true,
            )
            .await?;
        let remote_path = PathBuf::from(out.stdout.trim());
        let file_name = remote_path
            .file_name()
            .ok_or_else(|| DumpError::MissingArtifact(latest.clone()))?;
        info!(real_path = %remote_path.display(), "resolved remote dump");

        let local_path = self.local_destination(opts, &target, file_name).await?;
        self.kubectl.copy_from(&target, &remote_path, &local_path).await?;
        let sha256 = sha256_file(&local_path).await?;
        info!(local = %local_path.display(), %sha256, "dump copied");

        Ok(RetrievedDump {
            pod: target,
            remote_path,
            local_path,
            sha256,
        })
    }

    async fn local_destination(
        &self,
        opts: &RetrievalOptions,
        target: &PodTarget,
        remote_name: &OsStr,
    ) -> Result<PathBuf, DumpError> {
        let base = if remote_name == LATEST_LINK_NAME {
            format!("{}-{}.dmp", target.pod, self.clock.now().format("%Y%m%dT%H%M%S"))
        } else {
            remote_name.to_string_lossy().into_owned()
        };

        let mut candidate = opts.output_dir.join(&base);
        let mut n = 1;
        while tokio::fs::try_exists(&candidate)
            .await
            .map_err(|e| DumpError::io(format!("checking {}", candidate.display()), e))?
        {
            n += 1;
            candidate = opts.output_dir.join(format!("{base}.{n}"));
        }
        Ok(candidate)
    }

    async fn attach_debug_container(
        &self,
        opts: &RetrievalOptions,
        target: &PodTarget,
    ) -> Result<PodTarget, DumpError> {
        let target_container = target.container.as_deref().unwrap_or_default();
        let name = format!("dotdump-{}", self.clock.now().timestamp());
        info!(%name, image = %opts.debug_image, target = target_container, "starting debug container");
        self.kubectl
            .start_debug_container(target, target_container, &name, &opts.debug_image, opts.debug_ttl_secs)
            .await?;

        for _ in 0..opts.ready_attempts {
            if self.kubectl.ephemeral_running(target, &name).await? {
                return Ok(target.in_container(name));
            }
            tokio::time::sleep(opts.ready_delay).await;
        }
        Err(DumpError::DebugContainerNotReady {
            name,
            attempts: opts.ready_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request::{DumpType, TargetPid};
    use crate::impls::ScriptedRunner;
    use crate::ports::{CommandOutput, CommandSpec, FixedClock};
    use chrono::{TimeZone, Utc};
    use std::fs;
    use std::path::Path;

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()))
    }

    fn request(strategy: Strategy) -> CollectionRequest {
        CollectionRequest::new(DumpType::Mini, TargetPid::new(1).unwrap(), "/dumps", strategy).unwrap()
    }

    fn options(out: &Path, selector: PodSelector) -> RetrievalOptions {
        RetrievalOptions {
            output_dir: out.to_path_buf(),
            ready_delay: Duration::ZERO,
            ready_attempts: 3,
            ..RetrievalOptions::new("energy", selector, "/usr/local/bin/dotdump")
        }
    }

    /// A well-behaved cluster: label selectors find `api-0`, every pod has
    /// container `api`, and each pod's dump resolves to `/dumps/latest_dump`
    /// holding the pod's name.
    fn cluster(collect_status: i32, debug_running: bool) -> ScriptedRunner {
        ScriptedRunner::new().on("kubectl", move |spec: &CommandSpec| {
            let args: Vec<&str> = spec.args.iter().map(String::as_str).collect();
            let out = match args.as_slice() {
                ["get", "pods", ..] => CommandOutput::with_stdout("api-0"),
                ["get", "pod", "-n", _, _, "-o", path] if path.contains("containers[0]") => {
                    CommandOutput::with_stdout("api")
                }
                ["get", "pod", "-n", _, _, "-o", _] if debug_running => {
                    CommandOutput::with_stdout("2024-01-01T12:00:01Z")
                }
                ["get", "pod", "-n", _, _, "-o", _] => CommandOutput::with_stdout(""),
                ["exec", .., "readlink", "-f", _] => CommandOutput::with_stdout("/dumps/latest_dump\n"),
                ["exec", .., "collect", _, _, _, _, _, _, _, _] => {
                    if collect_status == 0 {
                        CommandOutput::success()
                    } else {
                        CommandOutput::failed(collect_status, "")
                    }
                }
                ["cp", remote, local, ..] if remote.contains(':') => {
                    let pod = remote.split(['/', ':']).nth(1).unwrap();
                    fs::write(local, pod).unwrap();
                    CommandOutput::success()
                }
                _ => CommandOutput::success(),
            };
            Ok(out)
        })
    }

    fn verbs(runner: &ScriptedRunner) -> Vec<String> {
        runner
            .calls()
            .iter()
            .map(|c| c.args.first().cloned().unwrap_or_default())
            .collect()
    }

    #[tokio::test]
    async fn same_container_round_trip() {
        let out = tempfile::tempdir().unwrap();
        let runner = Arc::new(cluster(0, false));
        let client = RetrievalClient::new(runner.clone(), clock());
        let opts = options(out.path(), PodSelector::Label("app=api".into()));

        let dump = client.retrieve(&opts, &request(Strategy::SameContainer)).await.unwrap();

        assert_eq!(dump.pod.pod, "api-0");
        assert_eq!(dump.remote_path, PathBuf::from("/dumps/latest_dump"));
        assert_eq!(dump.local_path, out.path().join("api-0-20240101T120000.dmp"));
        assert_eq!(fs::read(&dump.local_path).unwrap(), b"api-0");
        assert_eq!(dump.sha256, sha256_file(&dump.local_path).await.unwrap());
        assert_eq!(
            verbs(&runner),
            vec!["get", "get", "get", "cp", "exec", "exec", "exec", "cp"]
        );

        let calls = runner.calls();
        let collect = &calls[5];
        assert_eq!(
            collect.args,
            vec![
                "exec", "-n", "energy", "api-0", "-c", "api", "--", "/tmp/dotdump", "collect",
                "--dump-type", "mini", "--target-pid", "1", "--dump-dir", "/dumps",
                "--strategy", "same-container",
            ]
        );
    }

    #[tokio::test]
    async fn repeated_fetches_keep_every_local_dump() {
        let out = tempfile::tempdir().unwrap();
        let runner = Arc::new(cluster(0, false));
        let client = RetrievalClient::new(runner, clock());
        let req = request(Strategy::SameContainer);

        let a = client
            .retrieve(&options(out.path(), PodSelector::Name("api-0".into())), &req)
            .await
            .unwrap();
        let b = client
            .retrieve(&options(out.path(), PodSelector::Name("api-1".into())), &req)
            .await
            .unwrap();
        let again = client
            .retrieve(&options(out.path(), PodSelector::Name("api-0".into())), &req)
            .await
            .unwrap();

        assert_eq!(b.local_path, out.path().join("api-1-20240101T120000.dmp"));
        assert_eq!(again.local_path, out.path().join("api-0-20240101T120000.dmp.2"));
        assert_eq!(fs::read(&a.local_path).unwrap(), b"api-0");
        assert_eq!(fs::read(&b.local_path).unwrap(), b"api-1");
        assert_eq!(fs::read(&again.local_path).unwrap(), b"api-0");
        assert!(!out.path().join("latest_dump").exists());
    }

    #[tokio::test]
    async fn debug_container_runs_collector_in_sidecar() {
        let out = tempfile::tempdir().unwrap();
        let runner = Arc::new(cluster(0, true));
        let client = RetrievalClient::new(runner.clone(), clock());
        let opts = options(out.path(), PodSelector::Name("api-0".into()));

        client.retrieve(&opts, &request(Strategy::DebugContainer)).await.unwrap();

        let sidecar = format!("dotdump-{}", clock().now().timestamp());
        let calls = runner.calls();
        let debug = calls.iter().find(|c| c.args[0] == "debug").unwrap();
        assert!(debug.args.windows(2).any(|w| w[0] == "--target" && w[1] == "api"));
        assert!(debug.args.windows(2).any(|w| w[0] == "--container" && w[1] == sidecar));

        let in_container = |c: &CommandSpec, name: &str| c.args.windows(2).any(|w| w[0] == "-c" && w[1] == name);
        let collect = calls
            .iter()
            .find(|c| c.args.iter().any(|a| a == "collect"))
            .unwrap();
        assert!(in_container(collect, &sidecar));
        let readlink = calls
            .iter()
            .find(|c| c.args.iter().any(|a| a == "readlink"))
            .unwrap();
        assert!(in_container(readlink, "api"));
    }

    #[tokio::test]
    async fn remote_failure_propagates_and_skips_copy() {
        let out = tempfile::tempdir().unwrap();
        let runner = Arc::new(cluster(3, false));
        let client = RetrievalClient::new(runner.clone(), clock());
        let opts = options(out.path(), PodSelector::Name("api-0".into()));

        let err = client
            .retrieve(&opts, &request(Strategy::SameContainer))
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 3);
        assert!(!runner.calls().iter().any(|c| c.args.iter().any(|a| a == "readlink")));
        assert!(!out.path().join("latest_dump").exists());
    }

    #[tokio::test]
    async fn missing_pod_is_reported() {
        let out = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().on("kubectl", |spec| {
            if spec.args[0] == "get" && spec.args[1] == "pods" {
                Ok(CommandOutput::with_stdout(""))
            } else {
                Ok(CommandOutput::failed(1, "NotFound"))
            }
        }));
        let client = RetrievalClient::new(runner.clone(), clock());

        let by_label = options(out.path(), PodSelector::Label("app=nope".into()));
        let err = client.resolve_pod(&by_label).await.unwrap_err();
        assert!(matches!(err, DumpError::PodNotFound(_)));

        let by_name = options(out.path(), PodSelector::Name("ghost".into()));
        let err = client.resolve_pod(&by_name).await.unwrap_err();
        assert!(matches!(err, DumpError::PodNotFound(ref s) if s == "energy/ghost"));
        assert_eq!(err.exit_code(), 1);
    }

    #[tokio::test]
    async fn debug_container_that_never_starts_times_out() {
        let out = tempfile::tempdir().unwrap();
        let runner = Arc::new(cluster(0, false));
        let client = RetrievalClient::new(runner.clone(), clock());
        let opts = options(out.path(), PodSelector::Name("api-0".into()));

        let err = client
            .retrieve(&opts, &request(Strategy::DebugContainer))
            .await
            .unwrap_err();

        assert!(matches!(err, DumpError::DebugContainerNotReady { attempts: 3, .. }));
        assert!(!verbs(&runner).contains(&"cp".to_string()));
    }
}
