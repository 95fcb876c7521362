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

//! Raw sink: one JSON line per row, written as rows arrive.

use super::make_output_dir;
use crate::domain::entities::Row;
use crate::domain::errors::Result;
use crate::ports::result_sink::ResultSink;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct FileSink {
    path: PathBuf,
    file: Option<BufWriter<File>>,
    bytes: u64,
}

impl FileSink {
    pub fn new(path: &Path) -> Self {
        info!("Writing results to {}", path.display());
        Self {
            path: path.to_path_buf(),
            file: None,
            bytes: 0,
        }
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        let file = match self.file.take() {
            Some(f) => f,
            None => {
                make_output_dir(&self.path)?;
                BufWriter::with_capacity(128 * 1024, File::create(&self.path)?)
            }
        };
        Ok(self.file.insert(file))
    }
}

impl ResultSink for FileSink {
    fn handle_rows(&mut self, rows: &[Row]) -> Result<()> {
        let mut written = 0;
        let out = self.writer()?;
        for row in rows {
            let mut line = serde_json::to_vec(row)?;
            line.push(b'\n');
            out.write_all(&line)?;
            written += line.len() as u64;
        }
        self.bytes += written;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer()?.flush()?;
        self.file = None;
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
    use serde_json::json;

    #[test]
    fn test_rows_become_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.jsonl");
        let mut sink = FileSink::new(&path);

        sink.handle_rows(&[json!({"f": [{"v": "1"}]})]).unwrap();
        sink.handle_rows(&[json!({"f": [{"v": "2"}]})]).unwrap();
        sink.finish().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "{\"f\":[{\"v\":\"1\"}]}\n{\"f\":[{\"v\":\"2\"}]}\n");
        assert_eq!(sink.bytes_written(), content.len() as u64);
    }

    #[test]
    fn test_empty_result_still_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.jsonl");
        let mut sink = FileSink::new(&path);
        sink.finish().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
