//! # BigQuery Table Exporter (Rust)
//!
//! Pulls a BigQuery table out either page by page over the `tabledata.list`
//! API, split across worker threads and pinned to one snapshot, or through
//! an extract job whose output objects are picked up from Cloud Storage as
//! they appear. Query results are paged into a local file the same way.
//!
//! This application follows the **Hexagonal Architecture** (Ports and Adapters)
//! to keep the scan engine independent of the REST services and local files.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ports;

use crate::application::orchestrator::Orchestrator;
use crate::config::{AppConfig, CliArgs, Command};
use crate::domain::entities::OutputFormat;
use crate::infrastructure::auth::resolve_access_token;
use crate::infrastructure::bigquery::BigQueryRestClient;
use crate::infrastructure::gcs::GcsRestClient;
use crate::infrastructure::local_storage::SinkFactory;
use crate::ports::result_sink::SinkProvider;
use crate::ports::storage_client::RemoteStorageClient;
use crate::ports::table_client::RemoteTableClient;
use clap::Parser;
use log::{error, info};
use std::process;
use std::sync::Arc;

fn main() {
    // 1. Initialize Logging
    env_logger::init();

    // 2. Parse Arguments
    let args = CliArgs::parse();

    // 3. Load Config
    let mut config = match &args.config {
        Some(config_path) => match AppConfig::from_file(config_path) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load config: {}", e);
                process::exit(1);
            }
        },
        None => AppConfig::default(),
    };

    // Merge CLI overrides
    config.merge_cli(&args);

    if let Err(e) = config.validate(&args.command) {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }

    // 4. Initialize Hexagonal Components
    let token = match resolve_access_token(config.bigquery.access_token.as_deref()) {
        Ok(t) => t,
        Err(e) => {
            error!("No access token: {}", e);
            process::exit(1);
        }
    };

    let table_client: Arc<dyn RemoteTableClient> = match BigQueryRestClient::new(&token) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            error!("Could not create BigQuery client: {}", e);
            process::exit(1);
        }
    };

    let storage_client: Option<Arc<dyn RemoteStorageClient>> = match &args.command {
        Command::Extract { .. } => match GcsRestClient::new(&token) {
            Ok(c) => Some(Arc::new(c)),
            Err(e) => {
                error!("Could not create Cloud Storage client: {}", e);
                process::exit(1);
            }
        },
        _ => None,
    };

    let sinks: Arc<dyn SinkProvider> = Arc::new(SinkFactory::new(
        config.export.format.unwrap_or(OutputFormat::Raw),
        config.separator(),
    ));

    // 5. Run Orchestrator
    let orchestrator = Orchestrator::new(table_client, storage_client, sinks, config);

    let outcome = match &args.command {
        Command::Read { .. } => orchestrator.run_read(),
        Command::Extract { .. } => orchestrator.run_extract(),
        Command::Query { .. } => orchestrator.run_query(),
        Command::Describe { list_tables } => match orchestrator.describe(*list_tables) {
            Ok(text) => {
                print!("{}", text);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        },
    };

    match outcome {
        Ok(results) if !results.is_empty() => {
            let rows: u64 = results.iter().map(|r| r.rows).sum();
            let bytes: u64 = results.iter().map(|r| r.bytes).sum();
            info!(
                "Export finished. {} workers, {} rows/files, {} bytes.",
                results.len(),
                rows,
                bytes
            );
        }
        Ok(_) => {}
        Err(e) => {
            error!("Export failed: {}", e);
            process::exit(1);
        }
    }
}
