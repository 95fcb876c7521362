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

//! # Ports
//!
//! Traits at the seams between the scan engine and the outside world.
//! The application layer only talks to these; the concrete BigQuery, Cloud
//! Storage and file-writing adapters live in `infrastructure`.

pub mod job_state;
pub mod result_sink;
pub mod storage_client;
pub mod table_client;
