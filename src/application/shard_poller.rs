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

//! # Shard Poller
//!
//! Watches storage for the numbered files of one shard of an export job.
//!
//! A poller looks for file `shard_index`; when it shows up the index moves
//! on by one. When it is missing the poller asks for the job state and only
//! stops after the job was seen DONE *and* a later existence check still
//! found nothing, so a file written just before the job finished is not
//! missed.

use crate::application::object_reader::ObjectReader;
use crate::domain::entities::{JobState, ShardCursor, TaskResult};
use crate::domain::errors::{ExportError, Result};
use crate::ports::job_state::JobStateView;
use log::info;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Outcome of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollStep {
    /// A new file was found; the cursor moved to the next index.
    Found { object: String, size: u64 },
    /// Nothing new and the job is still running.
    Waiting,
    /// Nothing new, but the job just finished: look once more.
    JobDone,
    /// Nothing new after the job finished.
    Terminated,
}

pub struct ShardPoller {
    partition_id: usize,
    cursor: ShardCursor,
    reader: ObjectReader,
    job: Arc<dyn JobStateView>,
    poll_interval: Duration,
    job_done: bool,
    bytes: u64,
}

impl ShardPoller {
    pub fn new(
        partition_id: usize,
        glob_pattern: &str,
        reader: ObjectReader,
        job: Arc<dyn JobStateView>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            partition_id,
            cursor: ShardCursor::new(glob_pattern),
            reader,
            job,
            poll_interval,
            job_done: false,
            bytes: 0,
        }
    }

    pub fn cursor(&self) -> &ShardCursor {
        &self.cursor
    }

    pub fn poll_once(&mut self) -> Result<PollStep> {
        let object = self.cursor.current_object();
        if let Some(found) = self.reader.read(&object)? {
            self.cursor.shard_index += 1;
            self.bytes += found.size;
            return Ok(PollStep::Found {
                object,
                size: found.size,
            });
        }
        if self.job_done {
            return Ok(PollStep::Terminated);
        }
        match self.job.job_state()? {
            JobState::Done => {
                self.job_done = true;
                Ok(PollStep::JobDone)
            }
            JobState::Failed => Err(ExportError::JobFailed {
                job_id: self.job.job_id(),
                reason: format!("observed by shard poller {}", self.partition_id),
            }),
            JobState::Running => Ok(PollStep::Waiting),
        }
    }

    /// Polls until the job is done and no further file appears.
    pub fn run(mut self) -> Result<TaskResult> {
        let start_time = Instant::now();
        info!(
            "[{}] STARTING on {}",
            self.partition_id,
            self.reader.make_uri(&self.cursor.glob_pattern)
        );
        loop {
            match self.poll_once()? {
                PollStep::Found { .. } | PollStep::JobDone => {}
                PollStep::Waiting => thread::sleep(self.poll_interval),
                PollStep::Terminated => break,
            }
        }
        info!(
            "[{}] DONE. Read {} files",
            self.partition_id, self.cursor.shard_index
        );
        Ok(TaskResult::success(
            self.cursor.glob_pattern.clone(),
            format!("shard {}", self.partition_id),
            Some(self.reader.make_uri(&self.cursor.glob_pattern)),
            self.cursor.shard_index,
            self.bytes,
            start_time.elapsed().as_secs_f64(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::retry::RetryPolicy;
    use crate::application::testing::{FakeStorage, ScriptedJob};
    use crate::domain::entities::resolve_shard_path;

    const GLOB: &str = "output/ds.events_1.0.*.json";

    fn shard(i: u64) -> String {
        resolve_shard_path(GLOB, i)
    }

    fn poller(storage: Arc<FakeStorage>, job: Arc<ScriptedJob>) -> ShardPoller {
        let reader =
            ObjectReader::new(storage, "bkt", None).with_retry(RetryPolicy::fixed(1, Duration::ZERO));
        ShardPoller::new(0, GLOB, reader, job, Duration::ZERO)
    }

    #[test]
    fn test_three_shards_then_done() {
        let storage = Arc::new(
            FakeStorage::new()
                .with_object(&shard(0), 10)
                .with_object(&shard(1), 20)
                .with_object(&shard(2), 30),
        );
        let job = Arc::new(ScriptedJob::new(vec![JobState::Done]));
        let mut p = poller(storage.clone(), job);

        let mut steps = Vec::new();
        loop {
            let step = p.poll_once().unwrap();
            let last = step == PollStep::Terminated;
            steps.push(step);
            if last {
                break;
            }
        }

        let found = steps
            .iter()
            .filter(|s| matches!(s, PollStep::Found { .. }))
            .count();
        assert_eq!(found, 3);
        assert_eq!(steps[3], PollStep::JobDone);
        assert_eq!(steps[4], PollStep::Terminated);
        assert_eq!(p.cursor().shard_index, 3);
        // Shard 3 was checked twice: before and after the DONE observation.
        assert_eq!(storage.checks(), 5);
    }

    #[test]
    fn test_rechecks_after_done_before_terminating() {
        // Shard 3 lands right after the job is first seen DONE.
        let storage = Arc::new(
            FakeStorage::new()
                .with_object(&shard(0), 1)
                .with_object(&shard(1), 1)
                .with_object(&shard(2), 1)
                .with_object_after(&shard(3), 1, 5),
        );
        let job = Arc::new(ScriptedJob::new(vec![JobState::Running, JobState::Done]));

        let result = poller(storage, job.clone()).run().unwrap();

        assert_eq!(result.rows, 4);
        assert_eq!(result.bytes, 4);
        assert_eq!(*job.polls.lock().unwrap(), 2);
    }

    #[test]
    fn test_waits_while_job_running() {
        let storage = Arc::new(FakeStorage::new());
        let job = Arc::new(ScriptedJob::new(vec![JobState::Running]));
        let mut p = poller(storage, job);
        assert_eq!(p.poll_once().unwrap(), PollStep::Waiting);
        assert_eq!(p.poll_once().unwrap(), PollStep::Waiting);
        assert_eq!(p.cursor().shard_index, 0);
    }

    #[test]
    fn test_failed_job_stops_poller() {
        let storage = Arc::new(FakeStorage::new().with_object(&shard(0), 1));
        let job = Arc::new(ScriptedJob::new(vec![JobState::Failed]));
        let res = poller(storage, job).run();
        assert!(matches!(res, Err(ExportError::JobFailed { .. })));
    }

    #[test]
    fn test_empty_shard_terminates_after_done() {
        let storage = Arc::new(FakeStorage::new());
        let job = Arc::new(ScriptedJob::new(vec![JobState::Done]));
        let result = poller(storage, job).run().unwrap();
        assert_eq!(result.rows, 0);
        assert!(result.is_success());
    }
}
