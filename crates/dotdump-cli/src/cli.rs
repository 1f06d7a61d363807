use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dotdump_core::app::{PodSelector, RetrievalOptions};
use dotdump_core::domain::CollectionParams;
use dotdump_core::domain::request::{DEFAULT_DUMP_DIR, DEFAULT_DUMP_TYPE, DEFAULT_STRATEGY, DEFAULT_TARGET_PID};

#[derive(Debug, Parser)]
#[command(name = "dotdump", version, about = "Capture memory dumps of .NET processes in Kubernetes pods")]
pub struct Cli {
    /// Log filter, e.g. `debug` or `dotdump_core=trace`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Collect a dump here, inside the pod.
    Collect(CollectArgs),
    /// Run `collect` in a pod through kubectl and copy the dump back.
    Fetch(FetchArgs),
}

/// Collection parameters. Values are kept as strings and validated by the
/// request type so every bad value exits the same way.
#[derive(Debug, Clone, Args)]
pub struct RequestArgs {
    /// full, heap, mini or triage.
    #[arg(long, env = "dump_type", default_value = DEFAULT_DUMP_TYPE)]
    pub dump_type: String,

    #[arg(long, env = "target_pid", default_value = DEFAULT_TARGET_PID, allow_hyphen_values = true)]
    pub target_pid: String,

    #[arg(long, env = "dump_dir", default_value = DEFAULT_DUMP_DIR)]
    pub dump_dir: String,

    /// same-container or debug-container.
    #[arg(long, env = "strategy", default_value = DEFAULT_STRATEGY)]
    pub strategy: String,
}

impl From<RequestArgs> for CollectionParams {
    fn from(args: RequestArgs) -> Self {
        Self {
            dump_type: Some(args.dump_type),
            target_pid: Some(args.target_pid),
            dump_dir: Some(args.dump_dir),
            strategy: Some(args.strategy),
        }
    }
}

#[derive(Debug, Args)]
pub struct CollectArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    /// Print the artifact report as JSON on stdout.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct FetchArgs {
    #[arg(short, long)]
    pub namespace: String,

    #[arg(long, conflicts_with = "selector", required_unless_present = "selector")]
    pub pod: Option<String>,

    /// Label selector; the first matching pod is used.
    #[arg(short = 'l', long)]
    pub selector: Option<String>,

    /// Target container. Defaults to the pod's first container.
    #[arg(short, long)]
    pub container: Option<String>,

    #[arg(long, default_value = "debian:bookworm-slim")]
    pub debug_image: String,

    /// Linux dotdump binary to push into the pod; use a musl build for
    /// Alpine targets. Defaults to this executable, and is required when
    /// running from a non-linux workstation.
    #[arg(long)]
    pub binary: Option<PathBuf>,

    #[arg(long, default_value = "/tmp/dotdump")]
    pub remote_binary: PathBuf,

    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    #[command(flatten)]
    pub request: RequestArgs,
}

impl FetchArgs {
    pub fn selector(&self) -> PodSelector {
        match (&self.pod, &self.selector) {
            (Some(pod), _) => PodSelector::Name(pod.clone()),
            (None, Some(selector)) => PodSelector::Label(selector.clone()),
            // clap requires one of the two
            (None, None) => PodSelector::Label(String::new()),
        }
    }

    pub fn options(&self, local_binary: PathBuf) -> RetrievalOptions {
        RetrievalOptions {
            container: self.container.clone(),
            debug_image: self.debug_image.clone(),
            remote_binary: self.remote_binary.clone(),
            output_dir: self.output_dir.clone(),
            ..RetrievalOptions::new(&self.namespace, self.selector(), local_binary)
        }
    }
}
