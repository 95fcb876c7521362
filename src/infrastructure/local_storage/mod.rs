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

//! Local result sinks: the three ways rows end up on disk.

pub mod csv_sink;
pub mod file_sink;
pub mod json_sink;

use crate::domain::entities::OutputFormat;
use crate::ports::result_sink::{ColumnarSink, ResultSink, SinkProvider};
use csv_sink::CsvSink;
use file_sink::FileSink;
use json_sink::JsonSink;
use std::fs;
use std::io;
use std::path::Path;

/// Builds one fresh sink per worker.
#[derive(Debug, Clone, Copy)]
pub struct SinkFactory {
    format: OutputFormat,
    separator: u8,
}

impl SinkFactory {
    pub fn new(format: OutputFormat, separator: u8) -> Self {
        Self { format, separator }
    }
}

impl SinkProvider for SinkFactory {
    fn create(&self, path: &Path, columns: &[String]) -> Box<dyn ResultSink> {
        match self.format {
            OutputFormat::Raw => Box::new(FileSink::new(path)),
            OutputFormat::Json => Box::new(JsonSink::new(path)),
            OutputFormat::Csv => {
                let mut sink = CsvSink::new(path, self.separator);
                sink.set_columns(columns);
                Box::new(sink)
            }
        }
    }

    fn extension(&self) -> &'static str {
        self.format.extension()
    }
}

/// Creates the parent directory of `path` if it is missing.
pub(crate) fn make_output_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
}
