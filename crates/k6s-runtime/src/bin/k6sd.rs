//! `k6sd` - standalone daemon binary for the k6s governance engine.
//!
//! Starts (or resumes) one session over `project_root`, serves the
//! line-delimited tool-call protocol on stdio, and shuts down cleanly
//! on `SIGINT`/`SIGTERM` or when the input stream closes.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use k6s_config::K6sConfig;
use k6s_core::SessionId;
use k6s_runtime::Runtime;

/// k6s daemon - governance engine for a multi-agent coding session.
#[derive(Parser)]
#[command(name = "k6sd")]
#[command(author, version, about = "k6s daemon - session governance engine")]
struct Args {
    /// Project root to govern. Defaults to the current directory.
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// What this session is trying to accomplish.
    #[arg(long, default_value = "unspecified")]
    objective: String,

    /// Path to a k6s.yaml config document. Falls back to the built-in
    /// defaults if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Resume from this prior session id, carrying its context forward.
    #[arg(long)]
    resume: Option<String>,

    /// Enable verbose (debug) logging.
    #[arg(short, long, env = "K6S_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let project_root = match args.project_root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let project_root = project_root.canonicalize().unwrap_or(project_root);

    let config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            K6sConfig::from_yaml(&raw)?
        }
        None => {
            let name = project_root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "project".to_string());
            K6sConfig::default_config(name)
        }
    };

    let runtime = match args.resume {
        Some(parent) => {
            Runtime::resume(project_root, config, args.objective, SessionId::from(parent)).await?
        }
        None => Runtime::start(project_root, config, args.objective).await?,
    };

    info!(session = %runtime.session_id(), "k6sd serving tool calls on stdio");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let result = tokio::select! {
        res = runtime.serve_tool_calls(stdin, stdout) => res.map_err(anyhow::Error::from),
        res = runtime.wait_for_shutdown_signal() => res.map_err(anyhow::Error::from),
    };

    if let Err(err) = &result {
        error!(error = %err, "shutting down after error");
        runtime.fail(err.to_string()).await?;
        return Err(anyhow::anyhow!("{err}"));
    }

    runtime.stop().await?;
    info!("k6sd stopped");
    Ok(())
}
