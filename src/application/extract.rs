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

//! # Extract Job Coordinator
//!
//! Exports a table to storage through an asynchronous warehouse job and
//! collects the resulting objects.
//!
//! - **Unsharded**: one destination object, read once the job is DONE.
//! - **Sharded**: one destination glob per shard in a single job; one
//!   `ShardPoller` per shard starts right after submission and races the
//!   job instead of waiting for it.

use crate::application::object_reader::ObjectReader;
use crate::application::retry::RetryPolicy;
use crate::application::shard_poller::ShardPoller;
use crate::domain::entities::{
    DestinationFormat, ExtractJobConfig, JobHandle, JobState, TableRef, TaskResult,
};
use crate::domain::errors::{ExportError, Result};
use crate::ports::job_state::JobStateView;
use crate::ports::table_client::RemoteTableClient;
use log::{error, info};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default pause between job-state and shard polls.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Object path the job writes to. Sharded paths contain the `*` placeholder
/// the warehouse replaces with the file number.
pub fn extract_object_name(
    source: &TableRef,
    timestamp: i64,
    shard: Option<usize>,
    format: DestinationFormat,
) -> String {
    match shard {
        None => format!(
            "output/{}.{}_{}.{}",
            source.dataset,
            source.table,
            timestamp,
            format.extension()
        ),
        Some(i) => format!(
            "output/{}.{}_{}.{}.*.{}",
            source.dataset,
            source.table,
            timestamp,
            i,
            format.extension()
        ),
    }
}

pub struct ExtractJobCoordinator {
    client: Arc<dyn RemoteTableClient>,
    job: Option<JobHandle>,
    poll_interval: Duration,
    retry: RetryPolicy,
}

impl ExtractJobCoordinator {
    pub fn new(client: Arc<dyn RemoteTableClient>) -> Self {
        Self {
            client,
            job: None,
            poll_interval: POLL_INTERVAL,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn job(&self) -> Option<&JobHandle> {
        self.job.as_ref()
    }

    /// Submits the job. Returns `false` if the service rejected it, in which
    /// case the caller must not wait for or read anything.
    pub fn start_job(&mut self, config: &ExtractJobConfig) -> Result<bool> {
        match self.client.submit_extract_job(config)? {
            Some(handle) => {
                info!(
                    "Started extract job {} for {} -> {:?}",
                    handle.job_id, config.source, config.destination_uris
                );
                self.job = Some(handle);
                Ok(true)
            }
            None => {
                error!("Extract job for {} was rejected", config.source);
                Ok(false)
            }
        }
    }

    pub fn get_job_state(&self) -> Result<JobState> {
        let job = self.job.as_ref().ok_or_else(|| {
            ExportError::ConfigError("no extract job has been started".to_string())
        })?;
        self.retry
            .run(&job.job_id, || self.client.poll_job_state(job))
    }

    /// Blocks until the job is DONE. A FAILED job is an error.
    pub fn wait_for_complete(&self) -> Result<()> {
        loop {
            match self.get_job_state()? {
                JobState::Done => return Ok(()),
                JobState::Failed => {
                    return Err(ExportError::JobFailed {
                        job_id: self.job_id(),
                        reason: "job finished in FAILED state".to_string(),
                    })
                }
                JobState::Running => {
                    info!("Job {} still running, waiting...", self.job_id());
                    thread::sleep(self.poll_interval);
                }
            }
        }
    }

    /// Exports `source` to a single object, waits for the job and reads it.
    pub fn run_unsharded(
        mut self,
        source: &TableRef,
        reader: &ObjectReader,
        format: DestinationFormat,
        timestamp: i64,
    ) -> Result<TaskResult> {
        let start_time = Instant::now();
        let object = extract_object_name(source, timestamp, None, format);
        let config = ExtractJobConfig {
            source: source.clone(),
            destination_uris: vec![reader.make_uri(&object)],
            destination_format: format,
        };
        if !self.start_job(&config)? {
            return Err(ExportError::JobRejected(source.to_string()));
        }
        self.wait_for_complete()?;

        let found = reader.read(&object)?.ok_or_else(|| {
            ExportError::StorageError(format!(
                "job {} finished but {} is missing",
                self.job_id(),
                reader.make_uri(&object)
            ))
        })?;
        Ok(TaskResult::success(
            source.table.clone(),
            "extract".to_string(),
            Some(found.uri),
            1,
            found.size,
            start_time.elapsed().as_secs_f64(),
        ))
    }

    /// Exports `source` into `shard_count` globs with one job and reads every
    /// shard on its own poller thread. Returns one result per shard.
    pub fn run_sharded(
        mut self,
        source: &TableRef,
        shard_count: usize,
        reader: &ObjectReader,
        format: DestinationFormat,
        timestamp: i64,
    ) -> Result<Vec<TaskResult>> {
        if shard_count == 0 {
            return Err(ExportError::ConfigError(
                "shard count must be at least 1".to_string(),
            ));
        }
        let globs: Vec<String> = (0..shard_count)
            .map(|i| extract_object_name(source, timestamp, Some(i), format))
            .collect();
        let config = ExtractJobConfig {
            source: source.clone(),
            destination_uris: globs.iter().map(|g| reader.make_uri(g)).collect(),
            destination_format: format,
        };
        if !self.start_job(&config)? {
            return Err(ExportError::JobRejected(source.to_string()));
        }

        let poll_interval = self.poll_interval;
        let job: Arc<dyn JobStateView> = Arc::new(self);

        // First start every poller, then wait for all of them.
        let mut pollers: Vec<(usize, String, Option<JoinHandle<Result<TaskResult>>>)> =
            Vec::with_capacity(shard_count);
        for (index, glob) in globs.into_iter().enumerate() {
            let poller = ShardPoller::new(
                index,
                &glob,
                reader.clone(),
                Arc::clone(&job),
                poll_interval,
            );
            let spawned = thread::Builder::new()
                .name(format!("shard-{}", index))
                .spawn(move || poller.run());
            match spawned {
                Ok(h) => pollers.push((index, glob, Some(h))),
                Err(e) => {
                    error!("Could not start poller for shard {}: {}", index, e);
                    pollers.push((index, glob, None));
                }
            }
        }

        let mut results = Vec::with_capacity(pollers.len());
        for (index, glob, handle) in pollers {
            let worker = format!("shard {}", index);
            let output = Some(reader.make_uri(&glob));
            let failed = |reason: String| {
                error!("Shard {} failed: {}", index, reason);
                TaskResult::failure(glob.clone(), worker.clone(), output.clone(), reason)
            };
            let result = match handle {
                None => failed("poller thread could not be started".to_string()),
                Some(h) => match h.join() {
                    Ok(Ok(r)) => r,
                    Ok(Err(e)) => failed(e.to_string()),
                    Err(_) => failed(ExportError::WorkerPanicked(worker.clone()).to_string()),
                },
            };
            results.push(result);
        }
        Ok(results)
    }
}

impl JobStateView for ExtractJobCoordinator {
    fn job_state(&self) -> Result<JobState> {
        self.get_job_state()
    }

    fn job_id(&self) -> String {
        self.job
            .as_ref()
            .map(|j| j.job_id.clone())
            .unwrap_or_else(|| "<not started>".to_string())
    }
}
