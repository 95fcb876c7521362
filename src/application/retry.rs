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

//! Bounded retry with fixed or exponential backoff for transient remote
//! errors (rate limits, 5xx, dropped connections), on top of `backon`.

use crate::domain::errors::{ExportError, Result};
use backon::{BackoffBuilder, BlockingRetryable, ConstantBuilder, ExponentialBuilder};
use log::warn;
use std::cell::Cell;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Always wait the base delay.
    Fixed,
    /// Double the delay after every failed attempt, up to `max`.
    Exponential { max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Never less than 1.
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            delay: Duration::from_secs(5),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            backoff: Backoff::Fixed,
        }
    }

    fn max_retries(&self) -> usize {
        self.max_attempts.max(1) as usize - 1
    }

    fn constant(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_retries())
    }

    fn exponential(&self, max: Duration) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.delay)
            .with_max_delay(max)
            .with_factor(2.0)
            .with_max_times(self.max_retries())
    }

    /// Every pause the policy allows, in order.
    pub fn delays(&self) -> Vec<Duration> {
        match self.backoff {
            Backoff::Fixed => self.constant().build().collect(),
            Backoff::Exponential { max } => self.exponential(max).build().collect(),
        }
    }

    /// Runs `op` until it succeeds, fails with a non-transient error, or the
    /// attempt budget is spent. `op` must be safe to re-issue as is.
    pub fn run<T, F>(&self, what: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        match self.backoff {
            Backoff::Fixed => self.run_with(self.constant(), what, op),
            Backoff::Exponential { max } => self.run_with(self.exponential(max), what, op),
        }
    }

    fn run_with<B, T, F>(&self, builder: B, what: &str, mut op: F) -> Result<T>
    where
        B: BackoffBuilder,
        F: FnMut() -> Result<T>,
    {
        let max_attempts = self.max_attempts.max(1);
        let attempts = Cell::new(0u32);
        let result = (|| {
            attempts.set(attempts.get() + 1);
            op()
        })
        .retry(builder)
        .sleep(thread::sleep)
        .when(ExportError::is_transient)
        .notify(|e: &ExportError, wait: Duration| {
            warn!(
                "{}: retryable error ({}), attempt {}/{}, waiting {:?}",
                what,
                e,
                attempts.get(),
                max_attempts,
                wait
            );
        })
        .call();

        match result {
            Err(e) if e.is_transient() => Err(ExportError::RetriesExhausted {
                attempts: attempts.get(),
                last: Box::new(e),
            }),
            other => other,
        }
    }
}
