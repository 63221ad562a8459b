// crates/migration-gate-cli/src/main.rs
// ============================================================================
// Module: Migration Gate CLI Entry Point
// Description: Command dispatcher for serving the REST API and running
// one-shot maintenance tasks.
// Purpose: Wire storage, providers, and the pipeline orchestrator together
// and expose them as a long-running server or a scriptable command.
// Dependencies: clap, migration-gate-api, migration-gate-core,
// migration-gate-pipeline, migration-gate-providers, migration-gate-storage,
// tokio
// ============================================================================

//! ## Overview
//! Two subcommands: `serve` starts the REST API and recovers any run left
//! `running` by a prior crash before accepting traffic; `migrate` applies
//! the legacy-jobs migration once and exits, for operators who want it run
//! out of band rather than implicitly on every `GET /api/jobs`.

// ============================================================================
// SECTION: Imports
// ============================================================================

mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use migration_gate_pipeline::JobService;
use migration_gate_pipeline::NoopMetrics;
use migration_gate_pipeline::Orchestrator;
use migration_gate_pipeline::OrchestratorConfig;
use migration_gate_providers::FetchBrowserDriver;
use migration_gate_providers::LlmReasoner;
use migration_gate_providers::LlmReasonerConfig;
use migration_gate_providers::RuleBasedReasoner;
use migration_gate_storage::FileSnapshotStore;
use thiserror::Error;
use time::OffsetDateTime;
use tower_http::cors::AllowOrigin;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;

use config::ConfigError;
use config::MigrationGateConfig;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "migration-gate", arg_required_else_help = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the REST API server.
    Serve(ServeCommand),
    /// Apply the legacy-jobs migration once and exit.
    Migrate(MigrateCommand),
}

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Optional config file path (defaults to `./migration-gate.toml` if present).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for the `migrate` command.
#[derive(Args, Debug)]
struct MigrateCommand {
    /// Optional config file path (defaults to `./migration-gate.toml` if present).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Top-level CLI error.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The snapshot store could not be opened.
    #[error("failed to open data directory: {0}")]
    Store(#[from] migration_gate_storage::FileStoreError),
    /// The server failed to bind or serve.
    #[error("server error: {0}")]
    Server(String),
    /// A job or run service call failed.
    #[error(transparent)]
    Core(#[from] migration_gate_core::CoreError),
    /// The orchestrator failed outside of a stage's own error path.
    #[error(transparent)]
    Orchestrator(#[from] migration_gate_pipeline::OrchestratorError),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("migration-gate: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Migrate(command) => command_migrate(command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

fn build_reasoner(config: &MigrationGateConfig) -> Arc<dyn migration_gate_core::Reasoner> {
    match (&config.llm_endpoint, &config.llm_api_key, &config.llm_deployment_name) {
        (Some(endpoint), Some(api_key), Some(deployment_name)) => Arc::new(LlmReasoner::new(
            LlmReasonerConfig::new(endpoint.clone(), api_key.clone(), deployment_name.clone()),
        )),
        _ => Arc::new(RuleBasedReasoner),
    }
}

/// Builds the API's CORS layer. `None` (no `cors_allowed_origins` configured)
/// stays permissive for local/dev use; a configured list restricts origins
/// for production, per the documented deployment requirement.
fn build_cors_layer(allowed_origins: &Option<Vec<String>>) -> CorsLayer {
    match allowed_origins {
        None => CorsLayer::permissive(),
        Some(origins) => {
            let parsed: Vec<axum::http::HeaderValue> = origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(parsed))
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

async fn command_serve(command: ServeCommand) -> Result<ExitCode, CliError> {
    let config = MigrationGateConfig::load(command.config.as_deref())?;
    let store = Arc::new(FileSnapshotStore::open(&config.data_dir)?);
    store.readiness()?;

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        Arc::new(FetchBrowserDriver::new()),
        build_reasoner(&config),
        Arc::new(NoopMetrics),
        OrchestratorConfig::default(),
    ));

    let recovered = orchestrator.recover_crashed_runs(now())?;
    if recovered > 0 {
        eprintln!("migration-gate: recovered {recovered} run(s) left running by a prior crash");
    }

    let state = migration_gate_api::AppState::new(store, orchestrator);
    let router = migration_gate_api::build_router(state, build_cors_layer(&config.cors_allowed_origins));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| CliError::Server(format!("failed to bind {addr}: {err}")))?;
    println!("migration-gate: listening on {addr}");
    axum::serve(listener, router).await.map_err(|err| CliError::Server(err.to_string()))?;

    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Migrate Command
// ============================================================================

fn command_migrate(command: MigrateCommand) -> Result<ExitCode, CliError> {
    let config = MigrationGateConfig::load(command.config.as_deref())?;
    let store = FileSnapshotStore::open(&config.data_dir)?;
    let service = JobService::new(&store);
    let count = service.migrate_legacy()?;
    println!("migration-gate: migrated {count} legacy job(s)");
    Ok(ExitCode::SUCCESS)
}

fn now() -> migration_gate_core::Timestamp {
    migration_gate_core::Timestamp::from_offset(OffsetDateTime::now_utc())
}
