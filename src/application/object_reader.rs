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

//! Checks for export objects in a bucket and optionally downloads them.

use crate::application::retry::RetryPolicy;
use crate::domain::entities::StorageObject;
use crate::domain::errors::Result;
use crate::ports::storage_client::RemoteStorageClient;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

/// One bucket plus an optional download directory. Without a download
/// directory objects are only checked for presence.
#[derive(Clone)]
pub struct ObjectReader {
    storage: Arc<dyn RemoteStorageClient>,
    bucket: String,
    download_dir: Option<PathBuf>,
    retry: RetryPolicy,
}

impl ObjectReader {
    pub fn new(
        storage: Arc<dyn RemoteStorageClient>,
        bucket: &str,
        download_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            storage,
            bucket: bucket.to_string(),
            download_dir,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `gs://bucket/object`
    pub fn make_uri(&self, object: &str) -> String {
        format!("gs://{}/{}", self.bucket, object)
    }

    /// Returns the object if present, downloading it first when a download
    /// directory is configured.
    pub fn read(&self, object: &str) -> Result<Option<StorageObject>> {
        let found = self.retry.run(&self.make_uri(object), || {
            self.storage.object_exists(&self.bucket, object)
        })?;
        let found = match found {
            Some(o) => o,
            None => return Ok(None),
        };
        info!("{} size: {}", found.uri, found.size);

        if let Some(dir) = &self.download_dir {
            let destination = dir.join(object);
            info!("Downloading {} to {}", found.uri, destination.display());
            let bytes = self.retry.run(&found.uri, || {
                self.storage.download(&self.bucket, object, &destination)
            })?;
            info!("Downloaded {} bytes", bytes);
        }
        Ok(Some(found))
    }
}
