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

//! # Job State Port
//!
//! Shard pollers only ever *observe* an export job. They get this read-only
//! view instead of the coordinator itself.

use crate::domain::entities::JobState;
use crate::domain::errors::Result;

pub trait JobStateView: Send + Sync {
    fn job_state(&self) -> Result<JobState>;

    /// Job id for log and error messages.
    fn job_id(&self) -> String;
}
