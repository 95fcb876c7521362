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

//! Application layer: the scan, partitioning, query and extract workflows, written
//! against the traits in `ports`.

pub mod extract;
pub mod object_reader;
pub mod orchestrator;
pub mod planner;
pub mod progress;
pub mod query_reader;
pub mod retry;
pub mod scanner;
pub mod shard_poller;

#[cfg(test)]
pub mod testing;
