//! Kubectl - the cluster control plane, driven through the `kubectl` binary.
//!
//! Only the handful of verbs the retrieval client needs: get, exec, cp and
//! debug. Output parsing is limited to jsonpath scalars.

use std::path::Path;
use std::sync::Arc;

use crate::domain::errors::DumpError;
use crate::ports::{CommandOutput, CommandRunner, CommandSpec};

/// A pod, and optionally one of its containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodTarget {
    pub namespace: String,
    pub pod: String,
    pub container: Option<String>,
}

impl PodTarget {
    pub fn in_container(&self, container: impl Into<String>) -> Self {
        Self {
            container: Some(container.into()),
            ..self.clone()
        }
    }

    /// `<ns>/<pod>:<path>` as understood by `kubectl cp`.
    fn remote_spec(&self, path: &Path) -> String {
        format!("{}/{}:{}", self.namespace, self.pod, path.display())
    }
}

pub struct Kubectl {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl Kubectl {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_program(runner, "kubectl")
    }

    pub fn with_program(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    fn command(&self) -> CommandSpec {
        CommandSpec::new(&self.program)
    }

    async fn run_checked(&self, spec: CommandSpec) -> Result<CommandOutput, DumpError> {
        self.runner.run(&spec).await?.check(&self.program)
    }

    pub async fn pod_exists(&self, namespace: &str, pod: &str) -> Result<bool, DumpError> {
        let out = self
            .runner
            .run(&self.command().args(["get", "pod", "-n", namespace, pod]))
            .await?;
        Ok(out.is_success())
    }

    /// Name of the first pod matching a label selector, if any.
    /// `items[*]` prints nothing for an empty list, where `items[0]` fails.
    pub async fn first_pod_matching(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Option<String>, DumpError> {
        let out = self
            .run_checked(self.command().args([
                "get",
                "pods",
                "-n",
                namespace,
                "-l",
                selector,
                "-o",
                "jsonpath={.items[*].metadata.name}",
            ]))
            .await?;
        Ok(out.stdout.split_whitespace().next().map(str::to_string))
    }

    pub async fn first_container(&self, namespace: &str, pod: &str) -> Result<String, DumpError> {
        let out = self
            .run_checked(self.command().args([
                "get",
                "pod",
                "-n",
                namespace,
                pod,
                "-o",
                "jsonpath={.spec.containers[0].name}",
            ]))
            .await?;
        non_empty(out.stdout).ok_or_else(|| DumpError::PodNotFound(format!("{namespace}/{pod}")))
    }

    /// Attach an ephemeral container sharing `target`'s process namespace.
    /// It runs `sleep <ttl_secs>` so we can exec into it afterwards.
    pub async fn start_debug_container(
        &self,
        pod: &PodTarget,
        target_container: &str,
        name: &str,
        image: &str,
        ttl_secs: u64,
    ) -> Result<(), DumpError> {
        self.run_checked(self.command().args([
            "debug".to_string(),
            pod.pod.clone(),
            "-n".to_string(),
            pod.namespace.clone(),
            "--image".to_string(),
            image.to_string(),
            "--target".to_string(),
            target_container.to_string(),
            "--container".to_string(),
            name.to_string(),
            "--quiet".to_string(),
            "--".to_string(),
            "sleep".to_string(),
            ttl_secs.to_string(),
        ]))
        .await?;
        Ok(())
    }

    pub async fn ephemeral_running(&self, pod: &PodTarget, name: &str) -> Result<bool, DumpError> {
        let jsonpath = format!(
            "jsonpath={{.status.ephemeralContainerStatuses[?(@.name==\"{name}\")].state.running.startedAt}}"
        );
        let out = self
            .run_checked(self.command().args([
                "get",
                "pod",
                "-n",
                pod.namespace.as_str(),
                pod.pod.as_str(),
                "-o",
                jsonpath.as_str(),
            ]))
            .await?;
        Ok(!out.stdout.trim().is_empty())
    }

    /// `kubectl exec`. Inherited output streams to the operator; captured
    /// output is returned. Non-zero exit is returned as `CommandFailed`.
    pub async fn exec(
        &self,
        pod: &PodTarget,
        argv: &[String],
        capture: bool,
    ) -> Result<CommandOutput, DumpError> {
        let mut spec = self
            .command()
            .args(["exec", "-n", pod.namespace.as_str(), pod.pod.as_str()]);
        if let Some(container) = &pod.container {
            spec = spec.args(["-c", container.as_str()]);
        }
        spec = spec.arg("--").args(argv.iter().cloned());
        if !capture {
            spec = spec.inherit_output();
        }
        self.run_checked(spec).await
    }

    pub async fn copy_to(&self, local: &Path, pod: &PodTarget, remote: &Path) -> Result<(), DumpError> {
        let spec = self
            .command()
            .args(["cp".to_string(), local.display().to_string(), pod.remote_spec(remote)]);
        self.run_checked(with_container(spec, pod)).await?;
        Ok(())
    }

    pub async fn copy_from(&self, pod: &PodTarget, remote: &Path, local: &Path) -> Result<(), DumpError> {
        let spec = self
            .command()
            .args(["cp".to_string(), pod.remote_spec(remote), local.display().to_string()]);
        self.run_checked(with_container(spec, pod)).await?;
        Ok(())
    }
}

fn with_container(spec: CommandSpec, pod: &PodTarget) -> CommandSpec {
    match &pod.container {
        Some(container) => spec.args(["-c", container.as_str()]),
        None => spec,
    }
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
