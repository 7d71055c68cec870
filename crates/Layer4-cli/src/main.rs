//! autorun CLI - Main entry point

mod cli;
mod dispatch;

use autorun_foundation::AutorunConfig;
use autorun_task::{TaskManager, WaitMode};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// autorun - supervise long-running agent worker processes
#[derive(Parser, Debug)]
#[command(name = "autorun")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (replaces the global/project config layers)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root of the per-role agent directories
    #[arg(long, global = true)]
    agents_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve ask/await/halt requests as JSON lines on stdin/stdout
    Serve,
    /// Ask a single question and print the result
    Ask {
        /// Agent role (directory under the agents dir)
        role: String,

        /// Question for the worker
        question: String,

        /// How long to wait for the worker
        #[arg(short, long, value_enum, default_value = "blocking")]
        mode: ModeArg,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Immediate,
    Blocking,
    Hybrid,
}

impl From<ModeArg> for WaitMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Immediate => WaitMode::Immediate,
            ModeArg::Blocking => WaitMode::Blocking,
            ModeArg::Hybrid => WaitMode::Hybrid,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for responses
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => AutorunConfig::load_from(path)?,
        None => AutorunConfig::load().unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            AutorunConfig::default()
        }),
    };
    if let Some(dir) = args.agents_dir {
        config.agents_dir = dir;
    }
    tracing::debug!("Agents dir: {}", config.agents_dir.display());

    let manager = TaskManager::new(config);

    match args.command {
        Command::Serve => {
            tracing::info!("Serving requests on stdin");
            dispatch::serve(&manager, BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await?;
        }
        Command::Ask {
            role,
            question,
            mode,
        } => {
            cli::run_once(&manager, &role, &question, mode.into()).await?;
        }
    }

    Ok(())
}
