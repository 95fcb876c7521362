// Copyright 2026 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::application::extract::ExtractJobCoordinator;
use crate::application::object_reader::ObjectReader;
use crate::application::planner::{PartitionPlanner, ReadSettings};
use crate::application::query_reader::QueryReader;
use crate::application::scanner::READ_CHUNK_SIZE;
use crate::config::AppConfig;
use crate::domain::entities::{DestinationFormat, ReadStrategy, TableRef, TaskResult};
use crate::domain::errors::{ExportError, Result};
use crate::ports::result_sink::SinkProvider;
use crate::ports::storage_client::RemoteStorageClient;
use crate::ports::table_client::RemoteTableClient;
use log::{error, info};
use serde_json::json;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Wires configuration to the read, query, extract and describe workflows.
pub struct Orchestrator {
    table_client: Arc<dyn RemoteTableClient>,
    storage_client: Option<Arc<dyn RemoteStorageClient>>,
    sinks: Arc<dyn SinkProvider>,
    config: AppConfig,
}

impl Orchestrator {
    pub fn new(
        table_client: Arc<dyn RemoteTableClient>,
        storage_client: Option<Arc<dyn RemoteStorageClient>>,
        sinks: Arc<dyn SinkProvider>,
        config: AppConfig,
    ) -> Self {
        Self {
            table_client,
            storage_client,
            sinks,
            config,
        }
    }

    /// Fails with a configuration error when the configured dataset, or
    /// with `check_table` the configured table, does not exist.
    fn ensure_source_exists(&self, check_table: bool) -> Result<()> {
        let project = &self.config.bigquery.project;
        let dataset = &self.config.bigquery.dataset;
        if !self.table_client.dataset_exists(project, dataset)? {
            return Err(ExportError::ConfigError(format!(
                "dataset {}:{} does not exist",
                project, dataset
            )));
        }
        if check_table {
            let table = self.source_table();
            if !self.table_client.table_exists(&table)? {
                return Err(ExportError::ConfigError(format!(
                    "table {} does not exist",
                    table
                )));
            }
        }
        Ok(())
    }

    fn source_table(&self) -> TableRef {
        TableRef::new(
            &self.config.bigquery.project,
            &self.config.bigquery.dataset,
            self.config.table(),
        )
    }

    fn output_dir(&self) -> PathBuf {
        PathBuf::from(&self.config.export.output_dir)
    }

    /// Reads the configured table into local files with the configured
    /// strategy, then writes the run report.
    pub fn run_read(&self) -> Result<Vec<TaskResult>> {
        let start_time = Instant::now();
        self.ensure_source_exists(true)?;
        let table = self.source_table();
        let strategy = self
            .config
            .export
            .strategy
            .unwrap_or(ReadStrategy::SingleThread);
        let partition_count = self.config.export.partition_count.unwrap_or(1);
        info!(
            "Reading {} with strategy {:?} ({} partitions)",
            table, strategy, partition_count
        );

        let output_dir = self.output_dir();
        std::fs::create_dir_all(&output_dir)?;
        let mut settings = ReadSettings::new(&output_dir, Arc::clone(&self.sinks));
        settings.page_size = self.config.export.page_size.unwrap_or(READ_CHUNK_SIZE);
        settings.retry = self.config.retry_policy();

        let planner = PartitionPlanner::new(Arc::clone(&self.table_client), settings);
        let results = planner.read(&table, strategy, partition_count)?;
        self.finish_run(results, start_time)
    }

    /// Runs the configured query into `<output_dir>/query.<ext>`, then
    /// writes the run report.
    pub fn run_query(&self) -> Result<Vec<TaskResult>> {
        let start_time = Instant::now();
        let query = self.config.query_text()?;
        let output_dir = self.output_dir();
        std::fs::create_dir_all(&output_dir)?;
        let output = output_dir.join(format!("query.{}", self.sinks.extension()));

        let reader = QueryReader::new(Arc::clone(&self.table_client), &self.config.bigquery.project)
            .with_page_size(self.config.export.page_size.unwrap_or(READ_CHUNK_SIZE))
            .with_retry(self.config.retry_policy())
            .with_poll_interval(self.config.poll_interval());
        info!("Running query into {}", output.display());
        let result = reader.read(&query, &output, self.sinks.as_ref())?;
        self.finish_run(vec![result], start_time)
    }

    /// Exports the configured table to storage and fetches the produced
    /// objects, sharded when a shard count is configured.
    pub fn run_extract(&self) -> Result<Vec<TaskResult>> {
        let start_time = Instant::now();
        let storage = self.storage_client.as_ref().ok_or_else(|| {
            ExportError::ConfigError("extract needs a storage client".to_string())
        })?;
        let storage_config = self.config.storage.as_ref().ok_or_else(|| {
            ExportError::ConfigError("extract needs a storage bucket".to_string())
        })?;
        self.ensure_source_exists(true)?;

        let download_dir = storage_config.download_dir.as_ref().map(PathBuf::from);
        if let Some(dir) = &download_dir {
            std::fs::create_dir_all(dir)?;
        }
        let retry = self.config.retry_policy();
        let reader = ObjectReader::new(Arc::clone(storage), &storage_config.bucket, download_dir)
            .with_retry(retry);
        let coordinator = ExtractJobCoordinator::new(Arc::clone(&self.table_client))
            .with_poll_interval(self.config.poll_interval())
            .with_retry(retry);

        let table = self.source_table();
        let format = self
            .config
            .export
            .destination_format
            .unwrap_or(DestinationFormat::NewlineDelimitedJson);
        let timestamp = chrono::Utc::now().timestamp_millis();

        let results = match self.config.export.shards {
            Some(shards) => {
                info!("Extracting {} into {} shards", table, shards);
                coordinator.run_sharded(&table, shards, &reader, format, timestamp)?
            }
            None => {
                info!("Extracting {} into a single object", table);
                vec![coordinator.run_unsharded(&table, &reader, format, timestamp)?]
            }
        };
        self.finish_run(results, start_time)
    }

    /// Table metadata, or the dataset's table names when `list_tables` is set.
    pub fn describe(&self, list_tables: bool) -> Result<String> {
        self.ensure_source_exists(!list_tables)?;
        let mut out = String::new();
        if list_tables {
            let tables = self
                .table_client
                .list_tables(&self.config.bigquery.project, &self.config.bigquery.dataset)?;
            for t in tables {
                let _ = writeln!(out, "{}", t);
            }
            return Ok(out);
        }

        let metadata = self.table_client.get_table_metadata(&self.source_table())?;
        let _ = writeln!(out, "Table:         {}", metadata.id);
        let _ = writeln!(out, "Rows:          {}", metadata.row_count);
        let _ = writeln!(
            out,
            "Last modified: {}",
            metadata
                .last_modified
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string())
        );
        let _ = writeln!(out, "Columns:");
        for c in &metadata.columns {
            let _ = writeln!(out, "  {:<30} {}", c.name, c.field_type);
        }
        Ok(out)
    }

    fn finish_run(&self, results: Vec<TaskResult>, start_time: Instant) -> Result<Vec<TaskResult>> {
        let duration = start_time.elapsed().as_secs_f64();
        let report_path = generate_report(&self.output_dir(), &results, duration)?;
        info!("Report written to {}", report_path.display());

        let failed = results.iter().filter(|r| !r.is_success()).count();
        if failed > 0 {
            for r in results.iter().filter(|r| !r.is_success()) {
                error!(
                    "{} {}: {}",
                    r.table,
                    r.worker,
                    r.error.as_deref().unwrap_or("unknown error")
                );
            }
            return Err(ExportError::PartitionsFailed {
                failed,
                total: results.len(),
            });
        }
        Ok(results)
    }
}

/// Writes `report_<timestamp>.json` into `output_dir` and returns its path.
fn generate_report(output_dir: &Path, results: &[TaskResult], duration_secs: f64) -> Result<PathBuf> {
    let success = results.iter().filter(|r| r.is_success()).count();
    let failed = results.len() - success;
    let total_rows: u64 = results.iter().map(|r| r.rows).sum();
    let total_bytes: u64 = results.iter().map(|r| r.bytes).sum();

    let report = json!({
        "summary": {
            "total_tasks": results.len(),
            "success": success,
            "failed": failed,
            "total_rows": total_rows,
            "total_bytes": total_bytes,
            "total_duration_seconds": duration_secs,
            "total_mb_per_sec": if duration_secs > 0.0 { (total_bytes as f64 / 1024.0 / 1024.0) / duration_secs } else { 0.0 }
        },
        "details": results
    });

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    std::fs::create_dir_all(output_dir)?;
    let report_path = output_dir.join(format!("report_{}.json", timestamp));
    let file = std::fs::File::create(&report_path)?;
    serde_json::to_writer_pretty(file, &report)?;

    Ok(report_path)
}
