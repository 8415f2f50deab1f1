use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use sm_cli::commands::{classify, enforcement, ingest, manual, pipeline, rules, status, sync};
use sm_cli::{Cli, Commands, Config, RulesAction};
use sm_core::ManualInputs;
use sm_engine::local_day_bounds;

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(sm_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = sm_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Ingest {
            app,
            title,
            idle,
            timestamp,
            device,
        } => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            let written = ingest::run(
                &mut db,
                ingest::IngestArgs {
                    app,
                    title,
                    idle,
                    timestamp,
                    device,
                },
            )?;
            if !written {
                tracing::warn!("event was not recorded (duplicate id)");
            }
        }
        Commands::Classify { app } => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            classify::run(&mut stdout, &db, &app)?;
        }
        Commands::Status { json } => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let today = Local::now().date_naive();
            let (start, end) = local_day_bounds(today);
            let report = status::build_report(&db, &config, today, start, end)?;
            status::render(&mut stdout, &report, json)?;
        }
        Commands::Manual {
            date,
            study,
            diet,
            sugar,
        } => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            manual::run(
                &mut stdout,
                &db,
                date,
                ManualInputs {
                    study_done: study,
                    diet_followed: diet,
                    sugar_avoided: sugar,
                },
            )?;
        }
        Commands::Rules { action } => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            match action {
                RulesAction::List { json } => rules::list(&mut stdout, &db, json)?,
                RulesAction::Set { pattern, category } => {
                    rules::set(&mut stdout, &db, &pattern, &category)?;
                }
            }
        }
        Commands::Pipeline { date } => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(pipeline::run(&mut stdout, &db, &config, date))?;
        }
        Commands::Sync => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(sync::run(&mut stdout, db, &config))?;
        }
        Commands::Enforcement { json } => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            enforcement::run(&mut stdout, &db, Local::now().date_naive(), json)?;
        }
    }

    stdout.flush()?;
    Ok(())
}
