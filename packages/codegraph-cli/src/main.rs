//! Operational CLI (§10's CLI entrypoint). Exercises C5/C6/C8/C9 without
//! the out-of-core HTTP layer: register a repo, run or schedule its parse,
//! detect entry points, and synthesize a flow.

use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use codegraph_ai::{EntryPointService, FlowService};
use codegraph_core::{Id, Settings};
use codegraph_orchestration::{ParsingService, WorkerManager};
use codegraph_storage::PostgresStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "codegraph")]
#[command(about = "Source-code graph extraction, job queue, and LLM-assisted flow synthesis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the worker pool and block until shutdown.
    Serve,

    /// Register a repository, enqueue a parsing job, and run it inline.
    ParseRepo {
        #[arg(long)]
        org: String,
        #[arg(long)]
        path: String,
        #[arg(long)]
        name: Option<String>,
    },

    /// Detect entry points for an already-parsed repository.
    DetectEntryPoints {
        #[arg(long)]
        repo: String,
        #[arg(long)]
        force: bool,
    },

    /// Synthesize a flow document for a confirmed entry point.
    GenerateFlow {
        #[arg(long)]
        repo: String,
        #[arg(long = "entry-point")]
        entry_point: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let settings = match Settings::load() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to load settings: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level_filter(&settings))),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli, settings).await {
        tracing::error!(error = %e, "command_failed");
        eprintln!("error: {e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn log_level_filter(settings: &Settings) -> String {
    match settings.log_level {
        codegraph_core::config::LogLevel::Debug => "debug",
        codegraph_core::config::LogLevel::Info => "info",
        codegraph_core::config::LogLevel::Warning => "warn",
        codegraph_core::config::LogLevel::Error => "error",
        codegraph_core::config::LogLevel::Critical => "error",
    }
    .to_string()
}

async fn run(cli: Cli, settings: Settings) -> codegraph_core::Result<()> {
    let store = Arc::new(PostgresStore::connect(&settings.database_url, settings.database_max_connections).await?);
    store.migrate().await?;

    match cli.command {
        Command::Serve => {
            let mut workers = WorkerManager::new(store.clone(), settings);
            workers.start();
            tracing::info!("worker_pool_started");

            tokio::signal::ctrl_c()
                .await
                .map_err(|e| codegraph_core::CodegraphError::infra(format!("signal handler failed: {e}")))?;

            tracing::info!("shutdown_signal_received");
            workers.stop().await;
        }
        Command::ParseRepo { org, path, name } => {
            let org_id = Id::from_str(&org)
                .map_err(|e| codegraph_core::CodegraphError::input_invalid(format!("invalid org id: {e}")))?;
            let repo_name = name.unwrap_or_else(|| {
                path.rsplit('/').next().filter(|s| !s.is_empty()).unwrap_or(&path).to_string()
            });

            let repo = store.create_repository(org_id, &repo_name, None, &path).await?;
            let job = store.create_job(repo.id).await?;
            tracing::info!(repo_id = %repo.id, job_id = %job.id, "repository_registered");

            let parsing = ParsingService::new(store.clone(), settings);
            parsing.parse_repository(repo.id).await?;
            store.mark_completed(job.id).await?;

            println!("{}", repo.id);
        }
        Command::DetectEntryPoints { repo, force } => {
            let repo_id = Id::from_str(&repo)
                .map_err(|e| codegraph_core::CodegraphError::input_invalid(format!("invalid repo id: {e}")))?;

            let service = EntryPointService::new(store.clone(), settings);
            let stats = service.detect_entry_points(repo_id, force).await?;

            println!(
                "confirmed {} entry point(s); frameworks: {}",
                stats.entry_points_confirmed,
                if stats.frameworks_detected.is_empty() {
                    "none".to_string()
                } else {
                    stats.frameworks_detected.join(", ")
                }
            );
        }
        Command::GenerateFlow { repo, entry_point } => {
            let repo_id = Id::from_str(&repo)
                .map_err(|e| codegraph_core::CodegraphError::input_invalid(format!("invalid repo id: {e}")))?;
            let entry_point_id = Id::from_str(&entry_point)
                .map_err(|e| codegraph_core::CodegraphError::input_invalid(format!("invalid entry point id: {e}")))?;

            let service = FlowService::new(store.clone(), settings);
            let flow = service.generate_flow(repo_id, entry_point_id).await?;

            println!("{}", flow.flow_name);
            for step in &flow.steps {
                println!("  {}. {}", step.step_number, step.title);
            }
        }
    }

    Ok(())
}
