//! Command-line interface for warehouse-sync
//!
//! # Usage Examples
//!
//! ```bash
//! # Run every configured table once
//! warehouse-sync run --config sync.yaml
//!
//! # Run two tables with debug logging
//! warehouse-sync --log-level debug run --config sync.yaml --table orders --table refunds
//!
//! # Print the ledger
//! warehouse-sync status --config sync.yaml
//!
//! # Translate MySQL column types
//! warehouse-sync translate "tinyint(1)" "varchar(255)" json
//! ```
//!
//! ## Exit Codes
//! - `0`: every table synced and recorded
//! - `1`: setup error (configuration, arguments)
//! - `2`: some tables failed
//! - `3`: every table failed
//! - `4`: every table synced, but some ledger writes failed

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use warehouse_sync::{Config, JsonReportSink, LogReportSink, ReportSink, SyncContext};

#[derive(Parser)]
#[command(name = "warehouse-sync")]
#[command(about = "Incrementally sync MySQL tables into a PostgreSQL warehouse")]
#[command(long_about = None)]
struct Cli {
    /// Log filter (e.g. "info", "warehouse_sync=debug"); overrides RUST_LOG
    #[arg(long, global = true, env = "WAREHOUSE_SYNC_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync configured tables once
    Run {
        /// Path to the YAML configuration
        #[arg(long, env = "WAREHOUSE_SYNC_CONFIG")]
        config: PathBuf,

        /// Only sync these tables (source or destination name); repeatable
        #[arg(long = "table", value_name = "NAME")]
        tables: Vec<String>,
    },

    /// Print the sync ledger
    Status {
        /// Path to the YAML configuration
        #[arg(long, env = "WAREHOUSE_SYNC_CONFIG")]
        config: PathBuf,
    },

    /// Print the destination type of MySQL column types
    Translate {
        /// MySQL column types, e.g. "int(11) unsigned"
        #[arg(required = true)]
        types: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> anyhow::Result<i32> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("Invalid log filter: {level}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Run { config, tables } => run_sync(config, tables).await,
        Commands::Status { config } => {
            show_status(config).await?;
            Ok(0)
        }
        Commands::Translate { types } => {
            for ty in types {
                println!("{ty}\t{}", mysql_types::translate(&ty));
            }
            Ok(0)
        }
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::from_file(path).with_context(|| format!("Failed to load config from {path:?}"))
}

async fn run_sync(config_path: PathBuf, only: Vec<String>) -> anyhow::Result<i32> {
    let config = load_config(&config_path)?;

    let mut specs = config.table_specs();
    if !only.is_empty() {
        for name in &only {
            if !specs
                .iter()
                .any(|s| &s.source_table == name || &s.destination_table == name)
            {
                anyhow::bail!("Table '{name}' is not in {config_path:?}");
            }
        }
        specs.retain(|s| only.contains(&s.source_table) || only.contains(&s.destination_table));
    }

    let ctx = SyncContext::from_config(&config).context("Failed to set up sync context")?;
    tracing::info!(
        "Starting sync of {} table(s) from {} into {} (ledger: {})",
        specs.len(),
        ctx.extractor.source_type(),
        ctx.warehouse.warehouse_type(),
        ctx.ledger.backend()
    );

    let report = warehouse_sync::run(&ctx, &specs)
        .await
        .with_recipients(config.notifications.recipients.clone());

    let mut sinks: Vec<Box<dyn ReportSink>> = vec![Box::new(LogReportSink)];
    if let Some(path) = &config.report.json_path {
        sinks.push(Box::new(JsonReportSink::new(path.clone())));
    }
    for sink in &sinks {
        // A report that cannot be delivered does not change the sync outcome
        if let Err(e) = sink.deliver(&report).await {
            tracing::error!("Report sink '{}' failed: {e}", sink.name());
        }
    }

    Ok(report.status.exit_code())
}

async fn show_status(config_path: PathBuf) -> anyhow::Result<()> {
    let config = load_config(&config_path)?;
    let ctx = SyncContext::from_config(&config).context("Failed to set up sync context")?;
    let entries = ctx
        .ledger
        .entries()
        .await
        .context("Failed to read sync ledger")?;

    if entries.is_empty() {
        println!("No ledger entries");
        return Ok(());
    }
    println!(
        "{:<32} {:<8} {:<20} {:<20} {:>8} {:>8}  REMARK",
        "TABLE", "STATUS", "LAST RUN", "WATERMARK", "ROWS", "COLUMNS"
    );
    for entry in entries {
        let watermark = entry
            .last_success_watermark
            .map(|w| w.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<32} {:<8} {:<20} {:<20} {:>8} {:>8}  {}",
            entry.table_name,
            entry.status.as_str(),
            entry.last_run_time.format("%Y-%m-%d %H:%M:%S").to_string(),
            watermark,
            entry.row_count,
            entry.column_count,
            entry.remark
        );
    }
    Ok(())
}
