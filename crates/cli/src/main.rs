//! `workflow-sim` CLI entry-point.
//!
//! Available sub-commands:
//! - `validate`: validate an exported workflow JSON file.
//! - `run`: simulate a workflow file and print its run log.
//! - `save`: store a workflow file in the database.
//! - `show`: print the stored workflow as exported JSON.
//! - `migrate`: run pending database migrations.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine::graph::check_integrity;
use engine::persistence::{self, SqlBlobStore, STORAGE_KEY};
use engine::{
    ExecutorConfig, LogKind, RunContext, SharedExecutionState, StateSink, Workflow,
    WorkflowExecutor,
};

const DEFAULT_DATABASE_URL: &str = "sqlite://workflow.db?mode=rwc";

#[derive(Parser)]
#[command(
    name = "workflow-sim",
    about = "Workflow graph simulator with validation and persistence",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate a workflow JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// Simulate a workflow JSON file from its trigger node.
    Run {
        path: PathBuf,
        /// Simulated latency of each node, in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,
        /// Fail any node that runs longer than this, in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Store a workflow JSON file as the current workflow.
    Save {
        path: PathBuf,
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
        #[arg(long, default_value = STORAGE_KEY)]
        key: String,
    },
    /// Print the stored workflow as exported JSON.
    Show {
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
        #[arg(long, default_value = STORAGE_KEY)]
        key: String,
    },
    /// Run pending database migrations.
    Migrate {
        #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
        database_url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("workflow_sim=info,engine=info,warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Validate { path } => validate(&path),
        Command::Run {
            path,
            delay_ms,
            timeout_ms,
        } => {
            let config = ExecutorConfig {
                node_delay: delay_ms.map_or(nodes::EXECUTION_DELAY, Duration::from_millis),
                node_timeout: timeout_ms.map(Duration::from_millis),
            };
            run(&path, config).await
        }
        Command::Save {
            path,
            database_url,
            key,
        } => {
            let workflow = read_workflow(&path)?;
            let store = open_store(&database_url).await?;
            persistence::save_workflow(&store, &key, &workflow.nodes, &workflow.edges).await?;
            info!(key = %key, nodes = workflow.nodes.len(), "workflow stored");
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { database_url, key } => {
            let store = open_store(&database_url).await?;
            let Some(data) = persistence::load_workflow(&store, &key).await? else {
                bail!("no workflow stored under '{key}'");
            };
            println!("{}", persistence::export_workflow_json(&data.nodes, &data.edges)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Migrate { database_url } => {
            info!("Running migrations against {database_url}");
            open_store(&database_url).await?;
            info!("Migrations applied successfully");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_workflow(path: &Path) -> anyhow::Result<Workflow> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    Ok(persistence::import_workflow_json(&content)?)
}

async fn open_store(database_url: &str) -> anyhow::Result<SqlBlobStore> {
    let pool = db::pool::create_pool(database_url, 2)
        .await
        .with_context(|| format!("failed to connect to {database_url}"))?;
    db::pool::run_migrations(&pool).await.context("migration failed")?;
    Ok(SqlBlobStore::new(pool))
}

fn validate(path: &Path) -> anyhow::Result<ExitCode> {
    let workflow = read_workflow(path)?;

    let mut errors = engine::validation::validate_workflow(&workflow.nodes).errors;
    errors.extend(check_integrity(&workflow).iter().map(ToString::to_string));

    if errors.is_empty() {
        println!(
            "✅ Workflow is valid ({} nodes, {} edges)",
            workflow.nodes.len(),
            workflow.edges.len()
        );
        return Ok(ExitCode::SUCCESS);
    }

    eprintln!("❌ Validation failed:");
    for error in &errors {
        eprintln!("  - {error}");
    }
    Ok(ExitCode::FAILURE)
}

async fn run(path: &Path, config: ExecutorConfig) -> anyhow::Result<ExitCode> {
    let workflow = read_workflow(path)?;
    let executor = WorkflowExecutor::simulated(config);
    let state = SharedExecutionState::default();
    let sink = StateSink::new(state.clone());

    let result = executor
        .start(RunContext {
            workflow: &workflow,
            state: &state,
            sink: &sink,
        })
        .await;

    let logs = engine::sink::lock_state(&state).logs.clone();
    for entry in &logs {
        let marker = match entry.kind {
            LogKind::Info => "·",
            LogKind::Success => "✓",
            LogKind::Warning => "!",
            LogKind::Error => "✗",
        };
        println!("{} {marker} {}", entry.timestamp.format("%H:%M:%S%.3f"), entry.message);
    }

    if result.success {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
