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

//! CSV sink: one record per row, with an optional header of column names.

use super::make_output_dir;
use crate::domain::entities::Row;
use crate::domain::errors::Result;
use crate::ports::result_sink::{ColumnarSink, ResultSink};
use csv::{QuoteStyle, Writer, WriterBuilder};
use log::info;
use serde_json::Value;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub struct CsvSink {
    path: PathBuf,
    separator: u8,
    columns: Vec<String>,
    writer: Option<Writer<File>>,
    bytes: u64,
}

impl CsvSink {
    pub fn new(path: &Path, separator: u8) -> Self {
        info!("Writing results to {}", path.display());
        Self {
            path: path.to_path_buf(),
            separator,
            columns: Vec::new(),
            writer: None,
            bytes: 0,
        }
    }

    fn writer(&mut self) -> Result<&mut Writer<File>> {
        let wtr = match self.writer.take() {
            Some(w) => w,
            None => {
                make_output_dir(&self.path)?;
                let mut w = WriterBuilder::new()
                    .delimiter(self.separator)
                    .quote_style(QuoteStyle::Necessary)
                    .from_path(&self.path)?;
                if !self.columns.is_empty() {
                    w.write_record(&self.columns)?;
                }
                w
            }
        };
        Ok(self.writer.insert(wtr))
    }
}

/// Flattens a warehouse row (`{"f": [{"v": ...}]}`) into text cells.
/// Nested records and repeated fields are kept as JSON text.
fn row_cells(row: &Row) -> Vec<String> {
    match row.get("f").and_then(Value::as_array) {
        Some(fields) => fields
            .iter()
            .map(|field| match field.get("v") {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect(),
        None => vec![row.to_string()],
    }
}

impl ColumnarSink for CsvSink {
    fn set_columns(&mut self, columns: &[String]) {
        self.columns = columns.to_vec();
    }
}

impl ResultSink for CsvSink {
    fn handle_rows(&mut self, rows: &[Row]) -> Result<()> {
        let wtr = self.writer()?;
        for row in rows {
            wtr.write_record(row_cells(row))?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer()?.flush()?;
        self.writer = None;
        // Size on disk, quoting included.
        self.bytes = fs::metadata(&self.path)?.len();
        info!("Finished writing {}", self.path.display());
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}
