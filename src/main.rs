use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::ConnectOptions;
use tracing::{error, info};

use registrar::cli::Args;
use registrar::config::Config;
use registrar::dump;
use registrar::logging::setup_logging;
use registrar::store::PgCatalogStore;
use registrar::sync::{LoggingReindex, Orchestrator, SyncOptions, SyncStats};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        chunk_size = config.chunk_size,
        stale_after_hours = config.stale_after_hours,
        prune = args.prune,
        "starting catalog sync"
    );

    match run(args, config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            // The invoking process decides whether to rerun; the idempotent
            // writes make that safe.
            error!(error = ?e, "catalog sync failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args, config: Config) -> Result<SyncStats> {
    let connect_options = PgConnectOptions::from_str(&config.database_url)
        .context("failed to parse database URL")?
        .log_statements(tracing::log::LevelFilter::Debug)
        .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

    let pool = PgPoolOptions::new()
        .min_connections(0)
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(4))
        .connect_with(connect_options)
        .await
        .context("failed to create database pool")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run database migrations")?;

    let term_dump = dump::load_term_dump(&args.term_dump)?;
    let professors = match &args.professors {
        Some(path) => dump::load_professors(path)?,
        None => Vec::new(),
    };
    info!(
        classes = term_dump.classes.len(),
        sections = term_dump.sections.len(),
        subjects = term_dump.subjects.len(),
        professors = professors.len(),
        "dump loaded"
    );

    let orchestrator = Orchestrator::new(
        Arc::new(PgCatalogStore::new(pool)),
        Arc::new(LoggingReindex),
        SyncOptions {
            chunk_size: config.chunk_size,
            stale_after: chrono::Duration::hours(config.stale_after_hours as i64),
            prune: args.prune,
        },
    );
    orchestrator.run(&term_dump, &professors).await
}
