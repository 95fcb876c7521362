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

//! Core error definitions for the table exporter.
//!
//! This module provides a centralized `ExportError` enum and a `Result` type
//! used throughout the application to handle remote, I/O, and logic errors.

use thiserror::Error;

/// HTTP statuses the warehouse and storage services use for conditions that
/// clear up on their own (overload, brief outages).
const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// `error.errors[].reason` values that make a 403 a rate limit rather than
/// a permission problem.
const RATE_LIMIT_REASONS: [&str; 4] = [
    "rateLimitExceeded",
    "userRateLimitExceeded",
    "quotaExceeded",
    "backendError",
];

/// Error types encountered during the export process.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Remote service returned {status}: {message}")]
    Remote {
        status: u16,
        /// Machine-readable reason from the error body, when there is one.
        reason: Option<String>,
        message: String,
    },

    #[error("Malformed response from {service}: {message}")]
    MalformedResponse { service: String, message: String },

    #[error("HTTP transport error: {0}")]
    HttpError(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ExportError>,
    },

    #[error("Job was rejected: {0}")]
    JobRejected(String),

    #[error("Extract job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Result sink error: {0}")]
    SinkError(String),

    #[error("{failed} of {total} workers failed")]
    PartitionsFailed { failed: usize, total: usize },

    #[error("Worker {0} panicked")]
    WorkerPanicked(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl ExportError {
    pub fn remote(status: u16, message: &str) -> Self {
        ExportError::Remote {
            status,
            reason: None,
            message: message.to_string(),
        }
    }

    /// Whether re-issuing the same request after a pause may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ExportError::Remote {
                status: 403,
                reason,
                ..
            } => reason
                .as_deref()
                .map(|r| RATE_LIMIT_REASONS.contains(&r))
                .unwrap_or(false),
            ExportError::Remote { status, .. } => TRANSIENT_STATUSES.contains(status),
            ExportError::HttpError(_) => true,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ExportError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ExportError::Remote {
                status: status.as_u16(),
                reason: None,
                message: e.to_string(),
            },
            None => ExportError::HttpError(e.to_string()),
        }
    }
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::SinkError(e.to_string())
    }
}

/// A specialized Result type for the table exporter.
pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        for status in [429, 500, 502, 503, 504] {
            let e = ExportError::remote(status, "busy");
            assert!(e.is_transient(), "{} should be transient", status);
        }
        for status in [400, 401, 403, 404, 409] {
            let e = ExportError::remote(status, "nope");
            assert!(!e.is_transient(), "{} should not be transient", status);
        }
        assert!(ExportError::HttpError("reset".into()).is_transient());
        assert!(!ExportError::ConfigError("bad".into()).is_transient());
    }

    #[test]
    fn test_exhausted_message_carries_last_error() {
        let e = ExportError::RetriesExhausted {
            attempts: 3,
            last: Box::new(ExportError::remote(503, "backend unavailable")),
        };
        let msg = e.to_string();
        assert!(msg.contains("3 attempts"));
        assert!(msg.contains("503"));
    }

    #[test]
    fn test_forbidden_is_transient_only_for_rate_limits() {
        let forbidden = |reason: &str| ExportError::Remote {
            status: 403,
            reason: Some(reason.to_string()),
            message: "forbidden".into(),
        };
        assert!(forbidden("rateLimitExceeded").is_transient());
        assert!(forbidden("userRateLimitExceeded").is_transient());
        assert!(forbidden("quotaExceeded").is_transient());
        assert!(forbidden("backendError").is_transient());
        assert!(!forbidden("accessDenied").is_transient());
        assert!(!ExportError::remote(403, "Access Denied").is_transient());
    }

    #[test]
    fn test_malformed_response_is_permanent() {
        let e = ExportError::MalformedResponse {
            service: "tables.get".into(),
            message: "no id".into(),
        };
        assert!(!e.is_transient());
        assert!(e.to_string().contains("tables.get"));
    }
}
