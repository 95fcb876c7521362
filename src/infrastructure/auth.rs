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

//! OAuth access token lookup for the REST adapters.

use crate::domain::errors::{ExportError, Result};
use log::debug;
use std::process::Command;

pub const TOKEN_ENV_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Picks the configured token, then `GOOGLE_OAUTH_ACCESS_TOKEN`, then asks
/// the gcloud CLI.
pub fn resolve_access_token(configured: Option<&str>) -> Result<String> {
    let env_token = std::env::var(TOKEN_ENV_VAR).ok();
    if let Some(token) = pick_token(configured, env_token.as_deref()) {
        return Ok(token);
    }
    debug!("No access token configured, asking gcloud");
    gcloud_access_token()
}

fn pick_token(configured: Option<&str>, env_token: Option<&str>) -> Option<String> {
    configured
        .into_iter()
        .chain(env_token)
        .map(str::trim)
        .find(|t| !t.is_empty())
        .map(str::to_string)
}

fn gcloud_access_token() -> Result<String> {
    let output = Command::new("gcloud")
        .args(["auth", "print-access-token"])
        .output()
        .map_err(|e| ExportError::ConfigError(format!("could not run gcloud: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExportError::ConfigError(format!(
            "Failed to get access token: {}",
            stderr.trim()
        )));
    }

    let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if token.is_empty() {
        return Err(ExportError::ConfigError(
            "gcloud returned an empty access token".to_string(),
        ));
    }
    Ok(token)
}
