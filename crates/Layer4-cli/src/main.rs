//! taskweave CLI - Main entry point

mod cli;
mod plan;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use weave_foundation::EngineConfig;

/// taskweave - run task plans step by step
#[derive(Parser, Debug)]
#[command(name = "weave")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a plan, skipping tasks that already finished
    Run {
        /// Plan file (JSON task tree)
        plan: PathBuf,

        /// Cancel the whole run after this many seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Write task statuses and outputs back to the plan file
        #[arg(short, long)]
        save: bool,

        /// Print only the combined final result
        #[arg(short, long)]
        quiet: bool,
    },
    /// Print a plan as a tree with statuses
    Show {
        plan: PathBuf,
    },
    /// Return every task in a plan to pending
    Reset {
        plan: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug { "debug" } else { "warn" };
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
    let config = EngineConfig::load().unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config: {}", e);
        EngineConfig::default()
    });

    match args.command {
        Command::Run {
            plan,
            timeout,
            save,
            quiet,
        } => {
            let options = cli::RunOptions {
                timeout,
                save,
                quiet,
            };
            let succeeded = cli::run_plan(&plan, &options, &config).await?;
            if !succeeded {
                std::process::exit(1);
            }
        }
        Command::Show { plan } => cli::show_plan(&plan)?,
        Command::Reset { plan } => cli::reset_plan(&plan)?,
    }

    Ok(())
}
