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

//! Plumbing shared by the REST adapters.

use crate::domain::errors::{ExportError, Result};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

pub(crate) fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ExportError::HttpError(e.to_string()))
}

/// `base` with `segments` appended, each one escaped on its own so that
/// decorated table ids (`t@123$0-of-4`) and object names with `/` survive.
pub(crate) fn build_url(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url =
        Url::parse(base).map_err(|e| ExportError::ConfigError(format!("{}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| ExportError::ConfigError(format!("{} cannot take a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Sends the request. Non-2xx answers become `Remote` errors carrying the
/// service's own message.
pub(crate) fn send(request: RequestBuilder) -> Result<reqwest::blocking::Response> {
    let response = request.send()?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(ExportError::Remote {
        status: status.as_u16(),
        reason: error_reason(&body),
        message: error_message(&body),
    })
}

pub(crate) fn send_json(request: RequestBuilder) -> Result<Value> {
    let body = send(request)?.text()?;
    Ok(serde_json::from_str(&body)?)
}

/// `error.message` of a Google API error body, or the body itself.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// `error.errors[0].reason` of a Google API error body (e.g. `rateLimitExceeded`).
pub(crate) fn error_reason(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["errors"][0]["reason"].as_str().map(str::to_string))
}

/// Google APIs send 64-bit integers as strings.
pub(crate) fn int_field(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_url_escapes_each_segment() {
        let url = build_url(
            "https://storage.googleapis.com/storage/v1",
            &["b", "bkt", "o", "output/ds.t_1.0.000000000003.json"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/bkt/o/output%2Fds.t_1.0.000000000003.json"
        );

        let url = build_url("https://example.com/v2/", &["tables", "t@17$0-of-4"]).unwrap();
        assert!(url.path().starts_with("/v2/tables/t@17"));
    }

    #[test]
    fn test_error_message() {
        let body = r#"{"error": {"code": 404, "message": "Not found: Table p:d.t"}}"#;
        assert_eq!(error_message(body), "Not found: Table p:d.t");
        assert_eq!(error_message(" upstream timeout \n"), "upstream timeout");
    }

    #[test]
    fn test_error_reason() {
        let body = r#"{"error": {"code": 403, "message": "Exceeded rate limits",
            "errors": [{"reason": "rateLimitExceeded", "domain": "usageLimits"}]}}"#;
        assert_eq!(error_reason(body).as_deref(), Some("rateLimitExceeded"));

        let denied = r#"{"error": {"code": 403, "message": "Access Denied",
            "errors": [{"reason": "accessDenied"}]}}"#;
        let e = ExportError::Remote {
            status: 403,
            reason: error_reason(denied),
            message: error_message(denied),
        };
        assert!(!e.is_transient());
        assert_eq!(error_reason("<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_int_field() {
        assert_eq!(int_field(&json!("12345")), Some(12345));
        assert_eq!(int_field(&json!(7)), Some(7));
        assert_eq!(int_field(&json!(null)), None);
        assert_eq!(int_field(&json!("x")), None);
    }
}
