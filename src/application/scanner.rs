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

//! # Paged Table Scanner
//!
//! The smallest unit of work: reads one table (or one partition of it, or
//! the result set of a finished query) sequentially, page by page, and
//! pushes every batch into a `ResultSink`.
//!
//! The cursor only moves after a page arrived successfully, so a page that
//! is retried after a transient error is fetched again from the very same
//! position and no row is skipped or duplicated.

use crate::application::progress::ProgressHandle;
use crate::application::retry::RetryPolicy;
use crate::domain::entities::{
    CursorPosition, JobHandle, PageResponse, Row, TableCursor, TableRef,
};
use crate::domain::errors::Result;
use crate::ports::result_sink::ResultSink;
use crate::ports::table_client::RemoteTableClient;
use log::{debug, error};
use std::sync::Arc;

/// Default number of rows requested per page.
pub const READ_CHUNK_SIZE: u64 = 64 * 1024;

/// What a finished scan produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub rows: u64,
    pub pages: u64,
}

/// Where the pages of a scan come from.
#[derive(Debug, Clone)]
pub enum PageSource {
    Table(TableRef),
    Query(JobHandle),
}

impl PageSource {
    fn fetch(
        &self,
        client: &dyn RemoteTableClient,
        position: &CursorPosition,
        max_rows: u64,
    ) -> Result<PageResponse> {
        match self {
            PageSource::Table(table) => client.fetch_page(table, position, max_rows),
            PageSource::Query(job) => client
                .get_query_results(job, position, max_rows)
                .map(|results| results.page),
        }
    }
}

pub struct PagedTableScanner {
    client: Arc<dyn RemoteTableClient>,
    source: PageSource,
    cursor: TableCursor,
    page_size: u64,
    retry: RetryPolicy,
    progress: ProgressHandle,
    label: String,
}

impl PagedTableScanner {
    pub fn new(client: Arc<dyn RemoteTableClient>, table: TableRef, cursor: TableCursor) -> Self {
        let label = table.to_string();
        Self::with_source(client, PageSource::Table(table), cursor, label)
    }

    /// Scans the result set of the query job `job`, which must be complete.
    pub fn for_query(
        client: Arc<dyn RemoteTableClient>,
        job: JobHandle,
        cursor: TableCursor,
    ) -> Self {
        let label = job.job_id.clone();
        Self::with_source(client, PageSource::Query(job), cursor, label)
    }

    fn with_source(
        client: Arc<dyn RemoteTableClient>,
        source: PageSource,
        cursor: TableCursor,
        label: String,
    ) -> Self {
        Self {
            client,
            source,
            cursor,
            page_size: READ_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            progress: ProgressHandle::disabled(),
            label,
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

    pub fn with_progress(mut self, progress: ProgressHandle) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn cursor(&self) -> &TableCursor {
        &self.cursor
    }

    fn read_message(&self, row_count: usize, max_rows: u64) -> String {
        let mut msg = format!("Read {} rows", row_count);
        match self.cursor.position() {
            CursorPosition::Index(i) => msg.push_str(&format!(" at {}", i)),
            CursorPosition::Token(Some(t)) => msg.push_str(&format!(" at {}", t)),
            CursorPosition::Token(None) => msg.push_str(" from start"),
        }
        if max_rows != row_count as u64 {
            msg.push_str(&format!(" [max {}]", max_rows));
        }
        msg
    }

    /// Reads one page of at most `max_rows` rows and returns whether the scan
    /// is done together with the rows.
    pub fn read_one_page(&mut self, max_rows: u64) -> Result<(bool, Vec<Row>)> {
        if self.cursor.is_exhausted() {
            return Ok((true, Vec::new()));
        }
        let max_rows = self.cursor.page_size(max_rows);

        let client = self.client.as_ref();
        let source = &self.source;
        let position = self.cursor.position();
        let page = self
            .retry
            .run(&self.label, || source.fetch(client, position, max_rows))?;

        let mut rows = page.rows;
        if let Some(left) = self.cursor.rows_left() {
            let left = left.max(0) as usize;
            if rows.len() > left {
                error!(
                    "{}: service returned {} rows with only {} left in the budget",
                    self.label,
                    rows.len(),
                    left
                );
            }
        }
        debug!("{}: {}", self.label, self.read_message(rows.len(), max_rows));

        let budget = self.cursor.rows_left();
        let done = self.cursor.advance(rows.len(), page.page_token);
        if let Some(left) = budget {
            rows.truncate(left.max(0) as usize);
        }
        Ok((done, rows))
    }

    /// Reads until the end of the table or the row budget, forwarding every
    /// non-empty batch to `sink`. `sink.finish()` is called exactly once.
    pub fn read(&mut self, sink: &mut dyn ResultSink) -> Result<ScanSummary> {
        let mut summary = ScanSummary::default();
        loop {
            let (is_done, rows) = self.read_one_page(self.page_size)?;
            summary.pages += 1;
            if !rows.is_empty() {
                sink.handle_rows(&rows)?;
                summary.rows += rows.len() as u64;
                self.progress.add_rows(rows.len() as u64);
            }
            if is_done {
                break;
            }
        }
        sink.finish()?;
        Ok(summary)
    }
}
