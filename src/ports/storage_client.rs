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

//! # Remote Storage Client Port

use crate::domain::entities::StorageObject;
use crate::domain::errors::Result;
use std::path::Path;

/// Existence checks and downloads against the object store.
pub trait RemoteStorageClient: Send + Sync {
    /// Returns the object's URI and size, or `None` if it does not exist.
    /// "Not found" is an answer, not an error.
    fn object_exists(&self, bucket: &str, object: &str) -> Result<Option<StorageObject>>;

    /// Downloads an object to `destination` and returns the bytes written.
    fn download(&self, bucket: &str, object: &str, destination: &Path) -> Result<u64>;
}
