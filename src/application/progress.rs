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

//! Per-worker progress counters.
//!
//! Workers push row counts over a `crossbeam_channel`; a single reporter
//! thread owns the counters and logs them, so workers share no mutable state.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::info;
use std::collections::BTreeMap;
use std::thread::{self, JoinHandle};

#[derive(Debug)]
struct ProgressEvent {
    worker: String,
    rows: u64,
}

/// Sending side handed to one worker.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    worker: String,
    tx: Option<Sender<ProgressEvent>>,
}

impl ProgressHandle {
    /// A handle that reports nowhere.
    pub fn disabled() -> Self {
        Self {
            worker: String::new(),
            tx: None,
        }
    }

    pub fn add_rows(&self, rows: u64) {
        if let Some(tx) = &self.tx {
            // The reporter only goes away after every handle is dropped.
            let _ = tx.send(ProgressEvent {
                worker: self.worker.clone(),
                rows,
            });
        }
    }
}

pub struct ProgressReporter {
    tx: Sender<ProgressEvent>,
    thread: JoinHandle<BTreeMap<String, u64>>,
}

impl ProgressReporter {
    /// Starts the reporter thread. `expected_rows`, when known, turns the log
    /// lines into percentages.
    pub fn start(expected_rows: Option<u64>) -> Self {
        let (tx, rx): (Sender<ProgressEvent>, Receiver<ProgressEvent>) = unbounded();
        let thread = thread::spawn(move || {
            let mut counters: BTreeMap<String, u64> = BTreeMap::new();
            let mut total: u64 = 0;
            for event in rx.iter() {
                let count = counters.entry(event.worker.clone()).or_insert(0);
                *count += event.rows;
                total += event.rows;
                match expected_rows {
                    Some(expected) if expected > 0 => info!(
                        "{}: {} rows (total {}/{}, {:.1}%)",
                        event.worker,
                        count,
                        total,
                        expected,
                        total as f64 * 100.0 / expected as f64
                    ),
                    _ => info!("{}: {} rows (total {})", event.worker, count, total),
                }
            }
            counters
        });
        Self { tx, thread }
    }

    pub fn handle(&self, worker: &str) -> ProgressHandle {
        ProgressHandle {
            worker: worker.to_string(),
            tx: Some(self.tx.clone()),
        }
    }

    /// Stops the reporter once every handle is gone and returns the final
    /// per-worker counters.
    pub fn finish(self) -> BTreeMap<String, u64> {
        drop(self.tx);
        self.thread.join().unwrap_or_default()
    }
}
