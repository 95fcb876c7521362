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

//! # Result Sink Port
//!
//! A sink receives row batches from exactly one worker and turns them into
//! an output file. Sinks are never shared between workers.

use crate::domain::entities::Row;
use crate::domain::errors::Result;
use std::path::Path;

pub trait ResultSink: Send {
    /// Consumes one non-empty batch of rows.
    fn handle_rows(&mut self, rows: &[Row]) -> Result<()>;

    /// Called exactly once after the last batch, even when no rows arrived.
    fn finish(&mut self) -> Result<()>;

    /// Bytes written so far. Exact once `finish` has returned.
    fn bytes_written(&self) -> u64;
}

/// Sinks that need column names (e.g. for a header line).
pub trait ColumnarSink: ResultSink {
    fn set_columns(&mut self, columns: &[String]);
}

/// Hands every worker a fresh sink of the configured output format.
pub trait SinkProvider: Send + Sync {
    fn create(&self, path: &Path, columns: &[String]) -> Box<dyn ResultSink>;

    /// File extension of the files the sinks write, without the dot.
    fn extension(&self) -> &'static str;
}
