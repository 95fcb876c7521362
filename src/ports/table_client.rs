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

//! # Remote Table Client Port
//!
//! This Port defines what it means to "talk to the warehouse": read table
//! metadata, fetch pages of rows, run queries and export jobs. It doesn't care IF
//! the other end is BigQuery or a Mock for testing.

use crate::domain::entities::{
    CursorPosition, ExtractJobConfig, JobHandle, JobState, PageResponse, QueryResultsPage,
    TableMetadata, TableRef,
};
use crate::domain::errors::Result;

/// `RemoteTableClient` is shared by every worker thread, hence `Send + Sync`.
pub trait RemoteTableClient: Send + Sync {
    /// Returns last-modified time, row count and columns of a table.
    fn get_table_metadata(&self, table: &TableRef) -> Result<TableMetadata>;

    /// Lists the table ids of a dataset.
    fn list_tables(&self, project: &str, dataset: &str) -> Result<Vec<String>>;

    /// `Ok(false)` when the service answers 404 for the dataset.
    fn dataset_exists(&self, project: &str, dataset: &str) -> Result<bool>;

    /// `Ok(false)` when the service answers 404 for the table. Decorators
    /// on `table` are ignored.
    fn table_exists(&self, table: &TableRef) -> Result<bool>;

    /// Fetches at most `max_rows` rows starting at `position`.
    ///
    /// `table` may carry a snapshot or partition decorator.
    fn fetch_page(
        &self,
        table: &TableRef,
        position: &CursorPosition,
        max_rows: u64,
    ) -> Result<PageResponse>;

    /// Submits an export job. `Ok(None)` means the service rejected it.
    fn submit_extract_job(&self, config: &ExtractJobConfig) -> Result<Option<JobHandle>>;

    /// Reads the current state of a submitted job.
    fn poll_job_state(&self, job: &JobHandle) -> Result<JobState>;

    /// Starts a standard SQL query. Re-sending the same `request_id` never
    /// starts a second job.
    fn run_query(&self, project: &str, query: &str, request_id: &str) -> Result<JobHandle>;

    /// Fetches at most `max_rows` result rows of a query job starting at
    /// `position`. Returns an incomplete page while the job still runs.
    fn get_query_results(
        &self,
        job: &JobHandle,
        position: &CursorPosition,
        max_rows: u64,
    ) -> Result<QueryResultsPage>;
}
