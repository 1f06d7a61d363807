mod cli;
mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use dotdump_core::app::{DumpOrchestrator, RetrievalClient};
use dotdump_core::domain::{CollectionParams, CollectionRequest, CollectorConfig, DumpError};
use dotdump_core::impls::TokioCommandRunner;
use dotdump_core::ports::{CommandRunner, SystemClock};

use crate::cli::{Cli, CollectArgs, Command, FetchArgs};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = logging::init(cli.log_level.as_deref()) {
        eprintln!("{}", diagnostic(&e));
        return ExitCode::FAILURE;
    }

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // not a tracing event: must survive `--log-level off`
            eprintln!("{}", diagnostic(&e));
            ExitCode::from(exit_status(&e))
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner::new());
    match command {
        Command::Collect(args) => collect(runner, args).await,
        Command::Fetch(args) => fetch(runner, args).await,
    }
}

async fn collect(runner: Arc<dyn CommandRunner>, args: CollectArgs) -> anyhow::Result<()> {
    let request = CollectionRequest::try_from(CollectionParams::from(args.request))?;
    let orchestrator =
        DumpOrchestrator::with_host_probe(runner, Arc::new(SystemClock), CollectorConfig::default());

    let artifact = orchestrator.collect(&request).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&artifact)?);
    }
    Ok(())
}

async fn fetch(runner: Arc<dyn CommandRunner>, args: FetchArgs) -> anyhow::Result<()> {
    let request = CollectionRequest::try_from(CollectionParams::from(args.request.clone()))?;
    let local_binary = binary_to_push(args.binary.as_deref(), std::env::consts::OS)?;
    info!(binary = %local_binary.display(), "pushing a binary that must run on the pod's linux");

    let client = RetrievalClient::new(runner, Arc::new(SystemClock));
    let dump = client.retrieve(&args.options(local_binary), &request).await?;
    info!(
        local = %dump.local_path.display(),
        sha256 = %dump.sha256,
        "dump retrieved from {}/{}",
        dump.pod.namespace,
        dump.pod.pod
    );
    Ok(())
}

/// The binary pushed into the pod. Without `--binary` this executable is
/// used, which only makes sense from a linux workstation.
fn binary_to_push(explicit: Option<&Path>, host_os: &str) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if host_os != "linux" {
        anyhow::bail!("this {host_os} build cannot run in a pod; pass --binary with a linux build of dotdump");
    }
    std::env::current_exe().context("locating the dotdump binary")
}

fn diagnostic(err: &anyhow::Error) -> String {
    format!("dotdump: {err:#}")
}

/// A failing child's own status when there is one, 1 otherwise.
fn exit_status(err: &anyhow::Error) -> u8 {
    let code = err.downcast_ref::<DumpError>().map_or(1, DumpError::exit_code);
    u8::try_from(code).ok().filter(|c| *c != 0).unwrap_or(1)
}
