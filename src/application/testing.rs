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

//! In-memory stand-ins for the ports, shared by the application tests.

use crate::domain::entities::{
    ColumnMetadata, CursorPosition, ExtractJobConfig, JobHandle, JobState, PageResponse,
    QueryResultsPage, Row, StorageObject, TableMetadata, TableRef,
};
use crate::domain::errors::{ExportError, Result};
use crate::ports::job_state::JobStateView;
use crate::ports::result_sink::ResultSink;
use crate::ports::storage_client::RemoteStorageClient;
use crate::ports::table_client::RemoteTableClient;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Barrier, Mutex};
use std::time::Duration;

pub fn make_row(i: u64) -> Row {
    json!({ "f": [ { "v": i.to_string() }, { "v": format!("name-{}", i) } ] })
}

/// First-column values of warehouse rows, as numbers.
pub fn row_values(rows: &[Row]) -> Vec<u64> {
    rows.iter()
        .map(|r| r["f"][0]["v"].as_str().unwrap().parse().unwrap())
        .collect()
}

pub type DelayFn = fn(&TableRef, &CursorPosition) -> Duration;

/// A table of `rows` numbered rows behind a paginated API.
pub struct FakeTableClient {
    rows: u64,
    overfill: u64,
    failures: Mutex<HashMap<usize, u16>>,
    calls: Mutex<Vec<(String, CursorPosition, u64)>>,
    delay: Option<DelayFn>,
    barrier: Option<(Arc<Barrier>, usize)>,
    arrived: Mutex<usize>,
    job_states: Mutex<VecDeque<JobState>>,
    reject_jobs: bool,
    pending_results: Mutex<usize>,
    pub submitted: Mutex<Vec<ExtractJobConfig>>,
    pub state_polls: Mutex<usize>,
    pub queries: Mutex<Vec<(String, String)>>,
}

impl FakeTableClient {
    pub fn new(rows: u64) -> Self {
        Self {
            rows,
            overfill: 0,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay: None,
            barrier: None,
            arrived: Mutex::new(0),
            job_states: Mutex::new(VecDeque::from(vec![JobState::Done])),
            reject_jobs: false,
            pending_results: Mutex::new(0),
            submitted: Mutex::new(Vec::new()),
            state_polls: Mutex::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Every page carries `extra` rows more than requested.
    pub fn with_overfill(mut self, extra: u64) -> Self {
        self.overfill = extra;
        self
    }

    /// The `call`-th (0-based) page fetch fails with `status`.
    pub fn fail_call(self, call: usize, status: u16) -> Self {
        self.failures.lock().unwrap().insert(call, status);
        self
    }

    pub fn with_delay(mut self, delay: DelayFn) -> Self {
        self.delay = Some(delay);
        self
    }

    /// The first `parties` fetches wait on a shared barrier, so they only
    /// complete once that many workers are running at the same time.
    pub fn with_barrier(mut self, parties: usize) -> Self {
        self.barrier = Some((Arc::new(Barrier::new(parties)), parties));
        self
    }

    /// Job states returned by successive polls; the last one repeats.
    pub fn with_job_states(self, states: Vec<JobState>) -> Self {
        *self.job_states.lock().unwrap() = VecDeque::from(states);
        self
    }

    pub fn rejecting_jobs(mut self) -> Self {
        self.reject_jobs = true;
        self
    }

    /// The first `polls` query result requests report a running job.
    pub fn with_pending_results(self, polls: usize) -> Self {
        *self.pending_results.lock().unwrap() = polls;
        self
    }

    pub fn requests(&self) -> Vec<(String, CursorPosition, u64)> {
        self.calls.lock().unwrap().clone()
    }

    fn columns() -> Vec<ColumnMetadata> {
        vec![
            ColumnMetadata {
                name: "id".into(),
                field_type: "INTEGER".into(),
            },
            ColumnMetadata {
                name: "name".into(),
                field_type: "STRING".into(),
            },
        ]
    }

    fn record_call(&self, id: String, position: &CursorPosition, max_rows: u64) -> usize {
        let mut calls = self.calls.lock().unwrap();
        calls.push((id, position.clone(), max_rows));
        calls.len() - 1
    }

    fn page_at(
        &self,
        call: usize,
        position: &CursorPosition,
        max_rows: u64,
    ) -> Result<PageResponse> {
        if let Some(status) = self.failures.lock().unwrap().remove(&call) {
            return Err(ExportError::remote(status, "injected"));
        }
        let start = match position {
            CursorPosition::Index(i) => *i,
            CursorPosition::Token(None) => 0,
            CursorPosition::Token(Some(t)) => t.parse().unwrap(),
        };
        let end = (start + max_rows + self.overfill).min(self.rows).max(start);
        let next = (start + max_rows).min(self.rows);
        Ok(PageResponse {
            rows: (start..end).map(make_row).collect(),
            page_token: if next < self.rows && next > start {
                Some(next.to_string())
            } else {
                None
            },
        })
    }
}

impl RemoteTableClient for FakeTableClient {
    fn get_table_metadata(&self, table: &TableRef) -> Result<TableMetadata> {
        Ok(TableMetadata {
            id: table.to_string(),
            last_modified: None,
            row_count: self.rows,
            columns: Self::columns(),
        })
    }

    fn list_tables(&self, _project: &str, _dataset: &str) -> Result<Vec<String>> {
        Ok(vec!["events".into(), "users".into()])
    }

    fn dataset_exists(&self, _project: &str, dataset: &str) -> Result<bool> {
        Ok(dataset != "missing")
    }

    fn table_exists(&self, table: &TableRef) -> Result<bool> {
        Ok(["events", "users"].contains(&table.table.as_str()))
    }

    fn fetch_page(
        &self,
        table: &TableRef,
        position: &CursorPosition,
        max_rows: u64,
    ) -> Result<PageResponse> {
        let call = self.record_call(table.table_id(), position, max_rows);
        if let Some((barrier, parties)) = &self.barrier {
            let early = {
                let mut arrived = self.arrived.lock().unwrap();
                *arrived += 1;
                *arrived <= *parties
            };
            if early {
                barrier.wait();
            }
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay(table, position));
        }
        self.page_at(call, position, max_rows)
    }

    fn submit_extract_job(&self, config: &ExtractJobConfig) -> Result<Option<JobHandle>> {
        self.submitted.lock().unwrap().push(config.clone());
        if self.reject_jobs {
            return Ok(None);
        }
        Ok(Some(JobHandle {
            project: config.source.project.clone(),
            job_id: "job_1".into(),
            location: Some("US".into()),
        }))
    }

    fn poll_job_state(&self, _job: &JobHandle) -> Result<JobState> {
        *self.state_polls.lock().unwrap() += 1;
        let mut states = self.job_states.lock().unwrap();
        if states.len() > 1 {
            Ok(states.pop_front().unwrap())
        } else {
            Ok(*states.front().unwrap())
        }
    }

    fn run_query(&self, project: &str, query: &str, request_id: &str) -> Result<JobHandle> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), request_id.to_string()));
        Ok(JobHandle {
            project: project.to_string(),
            job_id: "query_1".into(),
            location: Some("US".into()),
        })
    }

    fn get_query_results(
        &self,
        job: &JobHandle,
        position: &CursorPosition,
        max_rows: u64,
    ) -> Result<QueryResultsPage> {
        let call = self.record_call(job.job_id.clone(), position, max_rows);
        {
            let mut pending = self.pending_results.lock().unwrap();
            if *pending > 0 {
                *pending -= 1;
                return Ok(QueryResultsPage::default());
            }
        }
        Ok(QueryResultsPage {
            complete: true,
            columns: Self::columns(),
            page: self.page_at(call, position, max_rows)?,
        })
    }
}

/// Object store whose contents are driven by a script: each entry of
/// `appear_after` says after how many `object_exists` calls an object shows up.
pub struct FakeStorage {
    objects: Mutex<HashMap<String, (u64, usize)>>,
    checks: Mutex<usize>,
    pub downloads: Mutex<Vec<String>>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            checks: Mutex::new(0),
            downloads: Mutex::new(Vec::new()),
        }
    }

    /// Object visible from the start.
    pub fn with_object(self, path: &str, size: u64) -> Self {
        self.with_object_after(path, size, 0)
    }

    /// Object visible once `checks` existence checks have happened.
    pub fn with_object_after(self, path: &str, size: u64, checks: usize) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), (size, checks));
        self
    }

    pub fn checks(&self) -> usize {
        *self.checks.lock().unwrap()
    }
}

impl RemoteStorageClient for FakeStorage {
    fn object_exists(&self, bucket: &str, object: &str) -> Result<Option<StorageObject>> {
        let seen = {
            let mut c = self.checks.lock().unwrap();
            *c += 1;
            *c - 1
        };
        let objects = self.objects.lock().unwrap();
        Ok(objects.get(object).and_then(|(size, after)| {
            (seen >= *after).then(|| StorageObject {
                uri: format!("gs://{}/{}", bucket, object),
                size: *size,
            })
        }))
    }

    fn download(&self, _bucket: &str, object: &str, destination: &Path) -> Result<u64> {
        self.downloads.lock().unwrap().push(object.to_string());
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(destination, object.as_bytes())?;
        Ok(object.len() as u64)
    }
}

/// Job whose observed states come from a script; the last one repeats.
pub struct ScriptedJob {
    states: Mutex<VecDeque<JobState>>,
    pub polls: Mutex<usize>,
}

impl ScriptedJob {
    pub fn new(states: Vec<JobState>) -> Self {
        Self {
            states: Mutex::new(VecDeque::from(states)),
            polls: Mutex::new(0),
        }
    }
}

impl JobStateView for ScriptedJob {
    fn job_state(&self) -> Result<JobState> {
        *self.polls.lock().unwrap() += 1;
        let mut states = self.states.lock().unwrap();
        if states.len() > 1 {
            Ok(states.pop_front().unwrap())
        } else {
            Ok(*states.front().unwrap())
        }
    }

    fn job_id(&self) -> String {
        "scripted".into()
    }
}

/// Sink that keeps everything in memory.
#[derive(Default)]
pub struct RecordingSink {
    pub rows: Vec<Row>,
    pub batches: usize,
    pub finished: usize,
}

impl ResultSink for RecordingSink {
    fn handle_rows(&mut self, rows: &[Row]) -> Result<()> {
        self.batches += 1;
        self.rows.extend_from_slice(rows);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished += 1;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        0
    }
}
