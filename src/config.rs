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

//! Configuration: an optional YAML/JSON file, overridden by CLI flags.

use crate::application::retry::{Backoff, RetryPolicy};
use crate::domain::entities::{DestinationFormat, OutputFormat, ReadStrategy};
use crate::domain::errors::{ExportError, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    pub bigquery: BigQueryConfig,
    pub storage: Option<StorageConfig>,
    #[serde(default)]
    pub export: ExportConfig,
    pub retry: Option<RetryConfig>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BigQueryConfig {
    pub project: String,
    pub dataset: String,
    pub table: Option<String>,
    /// Falls back to `GOOGLE_OAUTH_ACCESS_TOKEN`, then to the gcloud CLI.
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    pub bucket: String,
    /// Only report presence of export objects when unset.
    pub download_dir: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    pub format: Option<OutputFormat>,
    pub separator: Option<String>,
    pub strategy: Option<ReadStrategy>,
    pub partition_count: Option<usize>,
    pub page_size: Option<u64>,
    /// Sharded extract when set.
    pub shards: Option<usize>,
    pub destination_format: Option<DestinationFormat>,
    pub poll_interval_secs: Option<u64>,
    /// Standard SQL run by the `query` command.
    pub query: Option<String>,
    /// File holding the query, instead of `query`.
    pub query_file: Option<String>,
}

fn default_output_dir() -> String {
    ".".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            format: None,
            separator: None,
            strategy: None,
            partition_count: None,
            page_size: None,
            shards: None,
            destination_format: None,
            poll_interval_secs: None,
            query: None,
            query_file: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_secs: u64,
    #[serde(default)]
    pub exponential: bool,
    pub max_delay_secs: Option<u64>,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (YAML or JSON)
    #[arg(short, long)]
    pub config: Option<String>,

    /// BigQuery project ID
    #[arg(short, long)]
    pub project: Option<String>,
    /// Dataset containing the table
    #[arg(short, long)]
    pub dataset: Option<String>,
    /// Table to export
    #[arg(short, long)]
    pub table: Option<String>,
    /// Directory for output files and the run report
    #[arg(short, long)]
    pub output: Option<String>,
    /// Destination bucket for extract jobs
    #[arg(short, long)]
    pub bucket: Option<String>,
    /// OAuth access token (otherwise taken from the environment or gcloud)
    #[arg(long)]
    pub access_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Read table rows page by page into local files
    Read {
        /// single-thread, parallel-indexed or parallel-partitioned
        #[arg(long)]
        strategy: Option<ReadStrategy>,
        #[arg(long)]
        partition_count: Option<usize>,
        /// raw, json or csv
        #[arg(short, long)]
        format: Option<OutputFormat>,
        /// CSV field separator
        #[arg(long)]
        separator: Option<String>,
        /// Rows requested per page
        #[arg(long)]
        page_size: Option<u64>,
    },
    /// Export the table to storage with an extract job and fetch the files
    Extract {
        /// Split the export into this many shards read in parallel
        #[arg(short = 'n', long)]
        shards: Option<usize>,
        /// Download found objects here; otherwise only report them
        #[arg(long)]
        download_dir: Option<String>,
    },
    /// Run a standard SQL query and write its result rows into one file
    Query {
        /// Query text
        #[arg(short, long, conflicts_with = "query_file")]
        query: Option<String>,
        /// Read the query text from this file
        #[arg(long)]
        query_file: Option<String>,
        /// raw, json or csv
        #[arg(short, long)]
        format: Option<OutputFormat>,
        /// CSV field separator
        #[arg(long)]
        separator: Option<String>,
        /// Rows requested per page
        #[arg(long)]
        page_size: Option<u64>,
    },
    /// Print table metadata
    Describe {
        /// List the dataset's tables instead
        #[arg(short, long)]
        list_tables: bool,
    },
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: AppConfig = if path.ends_with(".json") {
            serde_json::from_str(&contents)?
        } else {
            serde_yaml::from_str(&contents)
                .map_err(|e| ExportError::ConfigError(format!("{}: {}", path, e)))?
        };

        Ok(config)
    }

    pub fn merge_cli(&mut self, args: &CliArgs) {
        if let Some(p) = &args.project {
            self.bigquery.project = p.clone();
        }
        if let Some(d) = &args.dataset {
            self.bigquery.dataset = d.clone();
        }
        if let Some(t) = &args.table {
            self.bigquery.table = Some(t.clone());
        }
        if let Some(tok) = &args.access_token {
            self.bigquery.access_token = Some(tok.clone());
        }
        if let Some(o) = &args.output {
            self.export.output_dir = o.clone();
        }
        if let Some(b) = &args.bucket {
            self.storage.get_or_insert_with(StorageConfig::default).bucket = b.clone();
        }

        match &args.command {
            Command::Read {
                strategy,
                partition_count,
                format,
                separator,
                page_size,
            } => {
                if strategy.is_some() {
                    self.export.strategy = *strategy;
                }
                if partition_count.is_some() {
                    self.export.partition_count = *partition_count;
                }
                if format.is_some() {
                    self.export.format = *format;
                }
                if let Some(s) = separator {
                    self.export.separator = Some(s.clone());
                }
                if page_size.is_some() {
                    self.export.page_size = *page_size;
                }
            }
            Command::Extract {
                shards,
                download_dir,
            } => {
                if shards.is_some() {
                    self.export.shards = *shards;
                }
                if let Some(d) = download_dir {
                    self.storage.get_or_insert_with(StorageConfig::default).download_dir =
                        Some(d.clone());
                }
            }
            Command::Query {
                query,
                query_file,
                format,
                separator,
                page_size,
            } => {
                if let Some(q) = query {
                    self.export.query = Some(q.clone());
                    self.export.query_file = None;
                }
                if let Some(f) = query_file {
                    self.export.query_file = Some(f.clone());
                    self.export.query = None;
                }
                if format.is_some() {
                    self.export.format = *format;
                }
                if let Some(s) = separator {
                    self.export.separator = Some(s.clone());
                }
                if page_size.is_some() {
                    self.export.page_size = *page_size;
                }
            }
            Command::Describe { .. } => {}
        }
    }

    /// Checks the settings the given command depends on.
    pub fn validate(&self, command: &Command) -> Result<()> {
        if self.bigquery.project.is_empty() {
            return Err(ExportError::ConfigError("project is required".to_string()));
        }
        let is_query = matches!(command, Command::Query { .. });
        if is_query {
            let has_query = self
                .export
                .query
                .as_deref()
                .is_some_and(|q| !q.trim().is_empty())
                || self.export.query_file.is_some();
            if !has_query {
                return Err(ExportError::ConfigError("query text is required".to_string()));
            }
            if self.export.query.is_some() && self.export.query_file.is_some() {
                return Err(ExportError::ConfigError(
                    "set either query or query_file, not both".to_string(),
                ));
            }
        } else if self.bigquery.dataset.is_empty() {
            return Err(ExportError::ConfigError("dataset is required".to_string()));
        }
        let needs_table =
            !is_query && !matches!(command, Command::Describe { list_tables: true });
        if needs_table && self.bigquery.table.as_deref().unwrap_or("").is_empty() {
            return Err(ExportError::ConfigError("table is required".to_string()));
        }
        if self.export.partition_count == Some(0) {
            return Err(ExportError::ConfigError(
                "partition_count must be at least 1".to_string(),
            ));
        }
        if self.export.page_size == Some(0) {
            return Err(ExportError::ConfigError(
                "page_size must be at least 1".to_string(),
            ));
        }
        if self.export.shards == Some(0) {
            return Err(ExportError::ConfigError("shards must be at least 1".to_string()));
        }
        if let Some(sep) = &self.export.separator {
            if sep.len() != 1 {
                return Err(ExportError::ConfigError(format!(
                    "separator must be a single byte, got '{}'",
                    sep
                )));
            }
        }
        if matches!(command, Command::Extract { .. }) {
            let has_bucket = self
                .storage
                .as_ref()
                .map(|s| !s.bucket.is_empty())
                .unwrap_or(false);
            if !has_bucket {
                return Err(ExportError::ConfigError(
                    "extract needs a storage bucket".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// The query text, read from `query_file` when that is set.
    pub fn query_text(&self) -> Result<String> {
        let text = match (&self.export.query, &self.export.query_file) {
            (_, Some(path)) => std::fs::read_to_string(path)?,
            (Some(q), None) => q.clone(),
            (None, None) => String::new(),
        };
        let text = text.trim();
        if text.is_empty() {
            return Err(ExportError::ConfigError("query text is empty".to_string()));
        }
        Ok(text.to_string())
    }

    pub fn table(&self) -> &str {
        self.bigquery.table.as_deref().unwrap_or("")
    }

    pub fn separator(&self) -> u8 {
        self.export
            .separator
            .as_deref()
            .and_then(|s| s.as_bytes().first().copied())
            .unwrap_or(b';')
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.export.poll_interval_secs.unwrap_or(5))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        match &self.retry {
            None => RetryPolicy::default(),
            Some(r) => RetryPolicy {
                max_attempts: r.max_attempts,
                delay: Duration::from_secs(r.delay_secs),
                backoff: if r.exponential {
                    Backoff::Exponential {
                        max: Duration::from_secs(r.max_delay_secs.unwrap_or(60)),
                    }
                } else {
                    Backoff::Fixed
                },
            },
        }
    }
}
