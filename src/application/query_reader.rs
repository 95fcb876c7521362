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

//! Runs a standard SQL query and pages its result set into one local file.

use crate::application::retry::RetryPolicy;
use crate::application::scanner::{PagedTableScanner, READ_CHUNK_SIZE};
use crate::domain::entities::{CursorPosition, JobHandle, TableCursor, TaskResult};
use crate::domain::errors::Result;
use crate::ports::result_sink::SinkProvider;
use crate::ports::table_client::RemoteTableClient;
use chrono::Utc;
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub struct QueryReader {
    client: Arc<dyn RemoteTableClient>,
    project: String,
    page_size: u64,
    retry: RetryPolicy,
    poll_interval: Duration,
}

impl QueryReader {
    pub fn new(client: Arc<dyn RemoteTableClient>, project: &str) -> Self {
        Self {
            client,
            project: project.to_string(),
            page_size: READ_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Starts `query`. Every retry re-sends the same request id, so at most
    /// one job is created.
    pub fn start(&self, query: &str) -> Result<JobHandle> {
        let request_id = format!(
            "bq-export-{}-{}",
            std::process::id(),
            Utc::now().timestamp_micros()
        );
        self.retry.run("jobs.query", || {
            self.client.run_query(&self.project, query, &request_id)
        })
    }

    /// Blocks until `job` has finished and returns its column names.
    pub fn wait_for_results(&self, job: &JobHandle) -> Result<Vec<String>> {
        let start = CursorPosition::Token(None);
        loop {
            let results = self.retry.run(&job.job_id, || {
                self.client.get_query_results(job, &start, 0)
            })?;
            if results.complete {
                return Ok(results.columns.into_iter().map(|c| c.name).collect());
            }
            debug!("Query {} still running", job.job_id);
            thread::sleep(self.poll_interval);
        }
    }

    /// Runs `query` and writes every result row to `output`.
    pub fn read(&self, query: &str, output: &Path, sinks: &dyn SinkProvider) -> Result<TaskResult> {
        let start_time = Instant::now();
        let job = self.start(query)?;
        info!("Query job {} started", job.job_id);
        let columns = self.wait_for_results(&job)?;

        let mut sink = sinks.create(output, &columns);
        let cursor = TableCursor::new(None, None, None)?;
        let mut scanner =
            PagedTableScanner::for_query(Arc::clone(&self.client), job.clone(), cursor)
                .with_page_size(self.page_size)
                .with_retry(self.retry);
        let summary = scanner.read(sink.as_mut())?;
        info!("Query job {} done: {} rows", job.job_id, summary.rows);

        Ok(TaskResult::success(
            "query".to_string(),
            job.job_id,
            Some(output.display().to_string()),
            summary.rows,
            sink.bytes_written(),
            start_time.elapsed().as_secs_f64(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::FakeTableClient;
    use crate::domain::entities::OutputFormat;
    use crate::domain::errors::ExportError;
    use crate::infrastructure::local_storage::SinkFactory;

    fn reader(client: Arc<FakeTableClient>) -> QueryReader {
        QueryReader::new(client, "proj")
            .with_page_size(4)
            .with_retry(RetryPolicy::fixed(3, Duration::ZERO))
            .with_poll_interval(Duration::ZERO)
    }

    #[test]
    fn test_waits_for_job_then_pages_results() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("query.csv");
        let client = Arc::new(FakeTableClient::new(10).with_pending_results(2));
        let sinks = SinkFactory::new(OutputFormat::Csv, b',');

        let result = reader(client.clone())
            .read("SELECT id, name FROM ds.events", &output, &sinks)
            .unwrap();

        assert_eq!(result.rows, 10);
        assert_eq!(result.worker, "query_1");
        assert_eq!(result.bytes, std::fs::metadata(&output).unwrap().len());
        let csv = std::fs::read_to_string(&output).unwrap();
        assert_eq!(csv.lines().next(), Some("id,name"));
        assert_eq!(csv.lines().count(), 11);

        // Two polls while running, one that saw completion, then 3 pages.
        let requests = client.requests();
        assert_eq!(requests.len(), 6);
        assert_eq!(requests[5].1, CursorPosition::Token(Some("8".into())));
        let queries = client.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].0, "SELECT id, name FROM ds.events");
    }

    #[test]
    fn test_empty_result_writes_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("query.csv");
        let client = Arc::new(FakeTableClient::new(0));
        let sinks = SinkFactory::new(OutputFormat::Csv, b';');

        let result = reader(client).read("SELECT 1", &output, &sinks).unwrap();

        assert_eq!(result.rows, 0);
        assert_eq!(std::fs::read_to_string(&output).unwrap(), "id;name\n");
    }

    #[test]
    fn test_failed_page_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("query.jsonl");
        // Call 0 is the completion check, call 1 the first page.
        let client = Arc::new(FakeTableClient::new(10).fail_call(1, 400));
        let sinks = SinkFactory::new(OutputFormat::Raw, b',');

        let err = reader(client).read("SELECT 1", &output, &sinks).unwrap_err();

        assert!(matches!(err, ExportError::Remote { status: 400, .. }));
    }
}
