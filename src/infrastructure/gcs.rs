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

//! Cloud Storage JSON API adapter for `RemoteStorageClient`.

use crate::domain::entities::StorageObject;
use crate::domain::errors::{ExportError, Result};
use crate::infrastructure::local_storage::make_output_dir;
use crate::infrastructure::rest::{build_url, http_client, int_field, send, send_json};
use crate::ports::storage_client::RemoteStorageClient;
use log::debug;
use reqwest::blocking::Client;
use serde_json::Value;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const STORAGE_API: &str = "https://storage.googleapis.com/storage/v1";

pub struct GcsRestClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl GcsRestClient {
    pub fn new(access_token: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: STORAGE_API.to_string(),
            access_token: access_token.to_string(),
        })
    }
}

impl RemoteStorageClient for GcsRestClient {
    fn object_exists(&self, bucket: &str, object: &str) -> Result<Option<StorageObject>> {
        let url = build_url(&self.base_url, &["b", bucket, "o", object])?;
        match send_json(self.client.get(url).bearer_auth(&self.access_token)) {
            Ok(body) => parse_object(&body, bucket, object).map(Some),
            Err(ExportError::Remote { status: 404, .. }) => {
                debug!("gs://{}/{} does not exist yet", bucket, object);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn download(&self, bucket: &str, object: &str, destination: &Path) -> Result<u64> {
        let url = build_url(&self.base_url, &["b", bucket, "o", object])?;
        let mut response = send(
            self.client
                .get(url)
                .bearer_auth(&self.access_token)
                .query(&[("alt", "media")]),
        )?;

        make_output_dir(destination)?;
        let mut writer = BufWriter::new(File::create(destination)?);
        let written = response.copy_to(&mut writer)?;
        writer.flush()?;
        debug!(
            "Downloaded gs://{}/{} to {} ({} bytes)",
            bucket,
            object,
            destination.display(),
            written
        );
        Ok(written)
    }
}

fn parse_object(body: &Value, bucket: &str, object: &str) -> Result<StorageObject> {
    let size = int_field(&body["size"]).ok_or_else(|| {
        ExportError::StorageError(format!("gs://{}/{} has no size", bucket, object))
    })?;
    Ok(StorageObject {
        uri: format!("gs://{}/{}", bucket, object),
        size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_object() {
        let body = json!({
            "kind": "storage#object",
            "name": "output/ds.t_1.json",
            "bucket": "bkt",
            "size": "2048"
        });
        let obj = parse_object(&body, "bkt", "output/ds.t_1.json").unwrap();
        assert_eq!(obj.uri, "gs://bkt/output/ds.t_1.json");
        assert_eq!(obj.size, 2048);
    }

    #[test]
    fn test_parse_object_without_size() {
        let err = parse_object(&json!({"name": "x"}), "bkt", "x").unwrap_err();
        assert!(matches!(err, ExportError::StorageError(_)));
    }
}
