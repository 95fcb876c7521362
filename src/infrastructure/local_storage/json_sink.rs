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

//! JSON sink: collects every row and writes one JSON array on `finish`.

use super::make_output_dir;
use crate::domain::entities::Row;
use crate::domain::errors::Result;
use crate::ports::result_sink::ResultSink;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct JsonSink {
    path: PathBuf,
    output: Vec<Row>,
    bytes: u64,
}

impl JsonSink {
    pub fn new(path: &Path) -> Self {
        info!("Writing results to {}", path.display());
        Self {
            path: path.to_path_buf(),
            output: Vec::new(),
            bytes: 0,
        }
    }
}

impl ResultSink for JsonSink {
    fn handle_rows(&mut self, rows: &[Row]) -> Result<()> {
        self.output.extend_from_slice(rows);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        make_output_dir(&self.path)?;
        let body = serde_json::to_vec(&self.output)?;
        let mut out = BufWriter::new(File::create(&self.path)?);
        out.write_all(&body)?;
        out.flush()?;
        self.bytes = body.len() as u64;
        self.output.clear();
        info!("Finished writing {}", self.path.display());
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_batches_become_one_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let mut sink = JsonSink::new(&path);

        sink.handle_rows(&[json!({"f": [{"v": "a"}]})]).unwrap();
        sink.handle_rows(&[json!({"f": [{"v": "b"}]}), json!({"f": [{"v": "c"}]})])
            .unwrap();
        // Nothing hits the disk before finish.
        assert!(!path.exists());
        sink.finish().unwrap();

        let parsed: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 3);
        assert_eq!(parsed[2]["f"][0]["v"], "c");
    }

    #[test]
    fn test_empty_result_is_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let mut sink = JsonSink::new(&path);
        sink.finish().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
    }
}
