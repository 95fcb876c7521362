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

//! # Partition Planner
//!
//! Splits one table read into independent scans and runs every scan on its
//! own thread:
//!
//! - **single-thread**: one worker, page tokens, whole table.
//! - **parallel-indexed**: `row_count / partition_count` rows per worker,
//!   addressed by row index. Remainder rows past the last stride are dropped.
//! - **parallel-partitioned**: one worker per warehouse-native partition
//!   decorator (`i-of-n`); only valid for tables the warehouse partitions.
//!
//! Every worker of one read sees the same `SnapshotTime`, taken once before
//! any worker starts. All workers are started before the first one is
//! joined, and the planner only returns after every worker has finished.

use crate::application::progress::{ProgressHandle, ProgressReporter};
use crate::application::retry::RetryPolicy;
use crate::application::scanner::{PagedTableScanner, READ_CHUNK_SIZE};
use crate::domain::entities::{
    PartitionSpec, PartitionSuffix, ReadStrategy, SnapshotTime, TableCursor, TableRef, TaskResult,
};
use crate::domain::errors::{ExportError, Result};
use crate::ports::result_sink::SinkProvider;
use crate::ports::table_client::RemoteTableClient;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Settings shared by every worker of a read.
#[derive(Clone)]
pub struct ReadSettings {
    pub output_dir: PathBuf,
    pub page_size: u64,
    pub retry: RetryPolicy,
    pub sinks: Arc<dyn SinkProvider>,
}

impl ReadSettings {
    pub fn new(output_dir: &Path, sinks: Arc<dyn SinkProvider>) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            page_size: READ_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            sinks,
        }
    }
}

/// Everything one scan worker needs, fixed at spawn time.
#[derive(Debug, Clone)]
pub struct ScanParams {
    pub label: String,
    pub table: TableRef,
    pub start_index: Option<u64>,
    pub read_count: Option<u64>,
    pub output_file: PathBuf,
}

/// Cuts `row_count` rows into `partition_count` equal strides.
///
/// The `row_count % partition_count` rows after the last stride belong to no
/// partition.
pub fn plan_index_ranges(row_count: u64, partition_count: usize) -> Result<Vec<PartitionSpec>> {
    if partition_count == 0 {
        return Err(ExportError::ConfigError(
            "partition count must be at least 1".to_string(),
        ));
    }
    let stride = row_count / partition_count as u64;
    Ok((0..partition_count as u64)
        .map(|i| PartitionSpec::IndexRange {
            start: i * stride,
            stride,
        })
        .collect())
}

pub fn plan_native_partitions(partition_count: usize) -> Result<Vec<PartitionSpec>> {
    if partition_count == 0 {
        return Err(ExportError::ConfigError(
            "partition count must be at least 1".to_string(),
        ));
    }
    Ok((0..partition_count)
        .map(|index| {
            PartitionSpec::Suffix(PartitionSuffix {
                index,
                count: partition_count,
            })
        })
        .collect())
}

pub struct PartitionPlanner {
    client: Arc<dyn RemoteTableClient>,
    settings: ReadSettings,
}

impl PartitionPlanner {
    pub fn new(client: Arc<dyn RemoteTableClient>, settings: ReadSettings) -> Self {
        Self { client, settings }
    }

    /// Reads `table` with the given strategy and returns one result per
    /// worker. Worker failures are reported in the results, never raised.
    pub fn read(
        &self,
        table: &TableRef,
        strategy: ReadStrategy,
        partition_count: usize,
    ) -> Result<Vec<TaskResult>> {
        let metadata = self.client.get_table_metadata(table)?;
        info!(
            "{} has {} rows, last modified {}",
            metadata.id,
            metadata.row_count,
            metadata
                .last_modified
                .map(|t| t.format("%b %d %Y %H:%M:%S").to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );

        let pinned = if table.is_decorated() {
            table.clone()
        } else {
            table.clone().with_snapshot(SnapshotTime::now())?
        };

        let tasks = match strategy {
            ReadStrategy::SingleThread => {
                let file = format!("{}.{}", table.table, self.settings.sinks.extension());
                vec![ScanParams {
                    label: table.table.clone(),
                    table: pinned,
                    start_index: None,
                    read_count: None,
                    output_file: self.settings.output_dir.join(file),
                }]
            }
            ReadStrategy::ParallelIndexed => {
                let specs = plan_index_ranges(metadata.row_count, partition_count)?;
                let assigned: u64 = specs
                    .iter()
                    .map(|s| match s {
                        PartitionSpec::IndexRange { stride, .. } => *stride,
                        PartitionSpec::Suffix(_) => 0,
                    })
                    .sum();
                if assigned < metadata.row_count {
                    warn!(
                        "{} trailing rows of {} are not covered by any of the {} partitions",
                        metadata.row_count - assigned,
                        table,
                        partition_count
                    );
                }
                self.partition_tasks(table, &pinned, &specs)
            }
            ReadStrategy::ParallelPartitioned => {
                let specs = plan_native_partitions(partition_count)?;
                self.partition_tasks(table, &pinned, &specs)
            }
        };

        let expected = match strategy {
            ReadStrategy::ParallelPartitioned => None,
            _ => Some(metadata.row_count),
        };
        Ok(self.run_workers(tasks, Arc::new(metadata.column_names()), expected))
    }

    fn partition_tasks(
        &self,
        table: &TableRef,
        pinned: &TableRef,
        specs: &[PartitionSpec],
    ) -> Vec<ScanParams> {
        specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let output_file = self
                    .settings
                    .output_dir
                    .join(format!("{}.{}", table.table, i));
                match *spec {
                    PartitionSpec::IndexRange { start, stride } => ScanParams {
                        label: spec.label(),
                        table: pinned.clone(),
                        start_index: Some(start),
                        read_count: Some(stride),
                        output_file,
                    },
                    PartitionSpec::Suffix(suffix) => ScanParams {
                        label: spec.label(),
                        table: pinned.clone().with_partition(suffix),
                        start_index: None,
                        read_count: None,
                        output_file,
                    },
                }
            })
            .collect()
    }

    /// Starts one thread per task, then waits for all of them.
    fn run_workers(
        &self,
        tasks: Vec<ScanParams>,
        columns: Arc<Vec<String>>,
        expected_rows: Option<u64>,
    ) -> Vec<TaskResult> {
        let reporter = ProgressReporter::start(expected_rows);
        let mut workers: Vec<(ScanParams, Option<JoinHandle<Result<TaskResult>>>)> =
            Vec::with_capacity(tasks.len());

        for params in tasks {
            let client = Arc::clone(&self.client);
            let settings = self.settings.clone();
            let columns = Arc::clone(&columns);
            let progress = reporter.handle(&params.label);
            let worker_params = params.clone();
            let spawned = thread::Builder::new()
                .name(params.label.clone())
                .spawn(move || run_scan_task(client, &settings, worker_params, &columns, progress));
            match spawned {
                Ok(handle) => workers.push((params, Some(handle))),
                Err(e) => {
                    error!("Could not start worker {}: {}", params.label, e);
                    workers.push((params, None));
                }
            }
        }

        let mut results = Vec::with_capacity(workers.len());
        for (params, handle) in workers {
            let output = Some(params.output_file.display().to_string());
            let result = match handle {
                None => TaskResult::failure(
                    params.table.table.clone(),
                    params.label.clone(),
                    output,
                    "worker thread could not be started".to_string(),
                ),
                Some(h) => match h.join() {
                    Ok(Ok(r)) => r,
                    Ok(Err(e)) => {
                        error!("Worker {} failed: {}", params.label, e);
                        TaskResult::failure(
                            params.table.table.clone(),
                            params.label.clone(),
                            output,
                            e.to_string(),
                        )
                    }
                    Err(_) => {
                        let e = ExportError::WorkerPanicked(params.label.clone());
                        error!("{}", e);
                        TaskResult::failure(
                            params.table.table.clone(),
                            params.label.clone(),
                            output,
                            e.to_string(),
                        )
                    }
                },
            };
            results.push(result);
        }
        reporter.finish();
        results
    }
}

/// Body of one scan worker: table range in, one output file out.
fn run_scan_task(
    client: Arc<dyn RemoteTableClient>,
    settings: &ReadSettings,
    params: ScanParams,
    columns: &[String],
    progress: ProgressHandle,
) -> Result<TaskResult> {
    let start_time = Instant::now();
    info!("Reading {}", params.label);

    let cursor = TableCursor::new(params.start_index, params.read_count, None)?;
    let mut sink = settings.sinks.create(&params.output_file, columns);
    let mut scanner = PagedTableScanner::new(client, params.table.clone(), cursor)
        .with_page_size(settings.page_size)
        .with_retry(settings.retry)
        .with_progress(progress)
        .with_label(&params.label);

    let summary = scanner.read(sink.as_mut())?;
    info!("{} done: {} rows", params.label, summary.rows);

    Ok(TaskResult::success(
        params.table.table.clone(),
        params.label,
        Some(params.output_file.display().to_string()),
        summary.rows,
        sink.bytes_written(),
        start_time.elapsed().as_secs_f64(),
    ))
}
