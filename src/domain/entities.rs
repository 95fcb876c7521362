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

//! # Domain Entities
//!
//! Entities are the "Nouns" of our application: table references, scan
//! cursors, partitions, export jobs and the results our workers report.
//!
//! We use the `serde` crate (Serialize/Deserialize) so that the ones which
//! end up in configuration files or reports can be converted to/from JSON
//! or YAML.

use crate::domain::errors::{ExportError, Result};
use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One row exactly as the warehouse returns it (`{"f": [{"v": ...}, ...]}`).
pub type Row = serde_json::Value;

/// How a table read is split across workers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReadStrategy {
    /// One worker reads the whole table with page tokens.
    SingleThread,
    /// The row range is cut into equal strides read by index.
    ParallelIndexed,
    /// The warehouse's own partition decorators, one per worker.
    ParallelPartitioned,
}

impl FromStr for ReadStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single-thread" => Ok(ReadStrategy::SingleThread),
            "parallel-indexed" => Ok(ReadStrategy::ParallelIndexed),
            "parallel-partitioned" => Ok(ReadStrategy::ParallelPartitioned),
            other => Err(format!("unknown read strategy '{}'", other)),
        }
    }
}

/// `OutputFormat` defines how we save rows on disk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Every row serialized as one JSON line, in arrival order.
    Raw,
    /// All rows collected into a single JSON array.
    Json,
    /// Delimited text with a header line of column names.
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Raw => "jsonl",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(OutputFormat::Raw),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// Point in time (epoch milliseconds) a read is pinned to, so that every
/// partition sees the same version of a table that keeps changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotTime(pub i64);

impl SnapshotTime {
    pub fn now() -> Self {
        SnapshotTime(Utc::now().timestamp_millis())
    }
}

/// Native partition decorator, rendered as `i-of-n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSuffix {
    pub index: usize,
    pub count: usize,
}

impl fmt::Display for PartitionSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-of-{}", self.index, self.count)
    }
}

/// Fully qualified reference to a (possibly decorated) warehouse table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub project: String,
    pub dataset: String,
    pub table: String,
    snapshot: Option<SnapshotTime>,
    partition: Option<PartitionSuffix>,
}

impl TableRef {
    pub fn new(project: &str, dataset: &str, table: &str) -> Self {
        Self {
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
            snapshot: None,
            partition: None,
        }
    }

    /// Whether the table id already carries an `@` decorator.
    pub fn is_decorated(&self) -> bool {
        self.table.contains('@')
    }

    /// Pins the reference to `snapshot`. A table id that already carries a
    /// decorator cannot be pinned a second time.
    pub fn with_snapshot(mut self, snapshot: SnapshotTime) -> Result<Self> {
        if self.is_decorated() || self.snapshot.is_some() {
            return Err(ExportError::ConfigError(format!(
                "Table {} already has a snapshot time",
                self.table
            )));
        }
        self.snapshot = Some(snapshot);
        Ok(self)
    }

    pub fn with_partition(mut self, suffix: PartitionSuffix) -> Self {
        self.partition = Some(suffix);
        self
    }

    /// Table id as sent to the warehouse, e.g. `events@1700000000000$3-of-8`.
    pub fn table_id(&self) -> String {
        let mut id = self.table.clone();
        if let Some(s) = self.snapshot {
            id.push_str(&format!("@{}", s.0));
        }
        if let Some(p) = self.partition {
            id.push_str(&format!("${}", p));
        }
        id
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.project, self.dataset, self.table_id())
    }
}

/// One independent piece of a partitioned read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionSpec {
    /// Rows `[start, start + stride)`.
    IndexRange { start: u64, stride: u64 },
    /// A warehouse-native partition.
    Suffix(PartitionSuffix),
}

impl PartitionSpec {
    /// Human readable worker label, used for thread names and logs.
    pub fn label(&self) -> String {
        match self {
            PartitionSpec::IndexRange { start, stride } => {
                format!("[{}-{})", start, start + stride)
            }
            PartitionSpec::Suffix(s) => s.to_string(),
        }
    }
}

/// Where the next page of a scan starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CursorPosition {
    /// Absolute row offset.
    Index(u64),
    /// Opaque page token; `None` means "from the start".
    Token(Option<String>),
}

/// Position within one table scan plus an optional row budget.
///
/// The mode (index or token) is fixed when the cursor is built and never
/// changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCursor {
    position: CursorPosition,
    rows_left: Option<i64>,
}

impl TableCursor {
    /// Builds a cursor from caller supplied start parameters. Supplying both a
    /// start index and a page token is a configuration error.
    pub fn new(
        start_index: Option<u64>,
        read_count: Option<u64>,
        page_token: Option<String>,
    ) -> Result<Self> {
        let position = match (start_index, page_token) {
            (Some(_), Some(_)) => {
                return Err(ExportError::ConfigError(
                    "a scan cannot start from both an index and a page token".to_string(),
                ))
            }
            (Some(i), None) => CursorPosition::Index(i),
            (None, token) => CursorPosition::Token(token),
        };
        let rows_left = read_count
            .map(|c| {
                i64::try_from(c).map_err(|_| {
                    ExportError::ConfigError(format!("read count {} is out of range", c))
                })
            })
            .transpose()?;
        Ok(Self {
            position,
            rows_left,
        })
    }

    pub fn position(&self) -> &CursorPosition {
        &self.position
    }

    pub fn rows_left(&self) -> Option<i64> {
        self.rows_left
    }

    /// Page size to request: `max_rows`, clamped to the remaining budget.
    pub fn page_size(&self, max_rows: u64) -> u64 {
        match self.rows_left {
            Some(left) if left < max_rows as i64 => left.max(0) as u64,
            _ => max_rows,
        }
    }

    /// Whether the row budget is already used up.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.rows_left, Some(left) if left <= 0)
    }

    /// Moves the cursor past a page of `row_count` rows and returns whether
    /// the scan is finished.
    pub(crate) fn advance(&mut self, row_count: usize, page_token: Option<String>) -> bool {
        let mut done = page_token.is_none();
        if let Some(left) = self.rows_left.as_mut() {
            *left -= row_count as i64;
            if *left < 0 {
                error!("Read too many rows: budget overrun by {}", -*left);
            }
            if *left <= 0 {
                done = true;
            }
        }
        match &mut self.position {
            CursorPosition::Index(next) => {
                *next += row_count as u64;
                if row_count == 0 {
                    done = true;
                }
            }
            CursorPosition::Token(token) => *token = page_token,
        }
        done
    }
}

/// `ColumnMetadata` describes one warehouse column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnMetadata {
    pub name: String,
    /// Warehouse type name (e.g. "STRING", "INTEGER", "RECORD").
    pub field_type: String,
}

/// `TableMetadata` is the blueprint for a whole table.
#[derive(Debug, Clone)]
pub struct TableMetadata {
    /// Fully qualified id as reported by the service.
    pub id: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub row_count: u64,
    pub columns: Vec<ColumnMetadata>,
}

impl TableMetadata {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// One page of rows plus the token for the next page, if any.
#[derive(Debug, Clone, Default)]
pub struct PageResponse {
    pub rows: Vec<Row>,
    pub page_token: Option<String>,
}

/// One page of a query's result set. `columns` and `page` are only
/// meaningful once `complete` is set.
#[derive(Debug, Clone, Default)]
pub struct QueryResultsPage {
    pub complete: bool,
    pub columns: Vec<ColumnMetadata>,
    pub page: PageResponse,
}

/// Remote state of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Running,
    Done,
    Failed,
}

/// Reference to a submitted warehouse job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub project: String,
    pub job_id: String,
    pub location: Option<String>,
}

/// File format the warehouse writes export objects in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DestinationFormat {
    NewlineDelimitedJson,
    Csv,
    Avro,
}

impl DestinationFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DestinationFormat::NewlineDelimitedJson => "json",
            DestinationFormat::Csv => "csv",
            DestinationFormat::Avro => "avro",
        }
    }
}

/// Everything needed to submit one table-to-storage export job.
#[derive(Debug, Clone)]
pub struct ExtractJobConfig {
    pub source: TableRef,
    /// One URI per shard; sharded URIs contain a single `*`.
    pub destination_uris: Vec<String>,
    pub destination_format: DestinationFormat,
}

/// An object found in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObject {
    pub uri: String,
    pub size: u64,
}

/// Per-shard poller position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardCursor {
    /// Next file number to look for; dense, starting at 0.
    pub shard_index: u64,
    /// Object path template containing one `*`.
    pub glob_pattern: String,
}

impl ShardCursor {
    pub fn new(glob_pattern: &str) -> Self {
        Self {
            shard_index: 0,
            glob_pattern: glob_pattern.to_string(),
        }
    }

    /// Object path of the file currently waited for.
    pub fn current_object(&self) -> String {
        resolve_shard_path(&self.glob_pattern, self.shard_index)
    }
}

/// Turns a glob path and an index into the object name the warehouse writes
/// (`*` becomes the 12-digit zero-padded index).
pub fn resolve_shard_path(glob: &str, index: u64) -> String {
    glob.replacen('*', &format!("{:012}", index), 1)
}

/// `TaskResult` is the "Report Card" of one worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub table: String,
    /// Worker label (partition range, suffix or shard number).
    pub worker: String,
    pub output: Option<String>,
    /// Rows written (table reads) or files read (shard pollers).
    pub rows: u64,
    pub bytes: u64,
    /// Seconds.
    pub duration: f64,
    /// Either "SUCCESS" or "FAILED".
    pub status: String,
    pub error: Option<String>,
}

impl TaskResult {
    pub fn success(
        table: String,
        worker: String,
        output: Option<String>,
        rows: u64,
        bytes: u64,
        duration: f64,
    ) -> Self {
        Self {
            table,
            worker,
            output,
            rows,
            bytes,
            duration,
            status: "SUCCESS".to_string(),
            error: None,
        }
    }

    pub fn failure(table: String, worker: String, output: Option<String>, error: String) -> Self {
        Self {
            table,
            worker,
            output,
            rows: 0,
            bytes: 0,
            duration: 0.0,
            status: "FAILED".to_string(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "SUCCESS"
    }
}
