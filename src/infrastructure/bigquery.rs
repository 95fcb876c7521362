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

//! BigQuery REST v2 adapter for `RemoteTableClient`.

use crate::domain::entities::{
    ColumnMetadata, CursorPosition, ExtractJobConfig, JobHandle, JobState, PageResponse,
    QueryResultsPage, TableMetadata, TableRef,
};
use crate::domain::errors::{ExportError, Result};
use crate::infrastructure::rest::{build_url, http_client, int_field, send_json};
use crate::ports::table_client::RemoteTableClient;
use chrono::{DateTime, TimeZone, Utc};
use log::{debug, error, warn};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Url;
use serde_json::{json, Value};

pub const BIGQUERY_API: &str = "https://bigquery.googleapis.com/bigquery/v2";

/// How long one `jobs.query`/`getQueryResults` call may block server side.
const QUERY_WAIT_MS: u64 = 10_000;

pub struct BigQueryRestClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl BigQueryRestClient {
    pub fn new(access_token: &str) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: BIGQUERY_API.to_string(),
            access_token: access_token.to_string(),
        })
    }

    fn table_segments<'a>(table: &'a TableRef, table_id: &'a str) -> [&'a str; 6] {
        [
            "projects",
            table.project.as_str(),
            "datasets",
            table.dataset.as_str(),
            "tables",
            table_id,
        ]
    }

    /// Sends a GET to `url` and maps a 404 to `false`.
    fn exists(&self, url: Url) -> Result<bool> {
        match send_json(self.client.get(url).bearer_auth(&self.access_token)) {
            Ok(_) => Ok(true),
            Err(ExportError::Remote { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn with_position(request: RequestBuilder, position: &CursorPosition) -> RequestBuilder {
        match position {
            CursorPosition::Index(i) => request.query(&[("startIndex", i.to_string())]),
            CursorPosition::Token(Some(t)) => request.query(&[("pageToken", t)]),
            CursorPosition::Token(None) => request,
        }
    }
}

impl RemoteTableClient for BigQueryRestClient {
    fn get_table_metadata(&self, table: &TableRef) -> Result<TableMetadata> {
        let table_id = table.table_id();
        let url = build_url(&self.base_url, &Self::table_segments(table, &table_id))?;
        let body = send_json(self.client.get(url).bearer_auth(&self.access_token))?;
        parse_table_metadata(&body)
    }

    fn list_tables(&self, project: &str, dataset: &str) -> Result<Vec<String>> {
        let url = build_url(
            &self.base_url,
            &["projects", project, "datasets", dataset, "tables"],
        )?;
        let mut tables = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.client.get(url.clone()).bearer_auth(&self.access_token);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let body = send_json(request)?;
            let (names, next) = parse_table_list(&body);
            tables.extend(names);
            match next {
                Some(t) => page_token = Some(t),
                None => break,
            }
        }
        Ok(tables)
    }

    fn dataset_exists(&self, project: &str, dataset: &str) -> Result<bool> {
        let url = build_url(&self.base_url, &["projects", project, "datasets", dataset])?;
        self.exists(url)
    }

    fn table_exists(&self, table: &TableRef) -> Result<bool> {
        let url = build_url(&self.base_url, &Self::table_segments(table, &table.table))?;
        self.exists(url)
    }

    fn fetch_page(
        &self,
        table: &TableRef,
        position: &CursorPosition,
        max_rows: u64,
    ) -> Result<PageResponse> {
        let table_id = table.table_id();
        let mut segments = Self::table_segments(table, &table_id).to_vec();
        segments.push("data");
        let url = build_url(&self.base_url, &segments)?;

        let request = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[("maxResults", max_rows.to_string())]);
        let body = send_json(Self::with_position(request, position))?;
        Ok(parse_page(body))
    }

    fn submit_extract_job(&self, config: &ExtractJobConfig) -> Result<Option<JobHandle>> {
        let project = &config.source.project;
        let url = build_url(&self.base_url, &["projects", project, "jobs"])?;
        let request = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&extract_job_body(config));
        let body = match send_json(request) {
            Ok(body) => body,
            Err(ExportError::Remote {
                status: 400,
                message,
                ..
            }) => {
                error!("Extract job for {} refused: {}", config.source, message);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if let Some(reason) = error_result(&body) {
            error!("Extract job for {} refused: {}", config.source, reason);
            return Ok(None);
        }
        parse_job_handle(&body, project, "jobs.insert").map(Some)
    }

    fn poll_job_state(&self, job: &JobHandle) -> Result<JobState> {
        let url = build_url(
            &self.base_url,
            &["projects", &job.project, "jobs", &job.job_id],
        )?;
        let mut request = self.client.get(url).bearer_auth(&self.access_token);
        if let Some(location) = &job.location {
            request = request.query(&[("location", location)]);
        }
        let body = send_json(request)?;
        let state = parse_job_state(&body)?;
        debug!("Job {} is {:?}", job.job_id, state);
        Ok(state)
    }

    fn run_query(&self, project: &str, query: &str, request_id: &str) -> Result<JobHandle> {
        let url = build_url(&self.base_url, &["projects", project, "queries"])?;
        let request = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&query_body(query, request_id));
        let body = send_json(request)?;
        if let Some(reason) = error_result(&body) {
            return Err(ExportError::JobRejected(reason));
        }
        parse_job_handle(&body, project, "jobs.query")
    }

    fn get_query_results(
        &self,
        job: &JobHandle,
        position: &CursorPosition,
        max_rows: u64,
    ) -> Result<QueryResultsPage> {
        let url = build_url(
            &self.base_url,
            &["projects", &job.project, "queries", &job.job_id],
        )?;
        let mut request = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("maxResults", max_rows.to_string()),
                ("timeoutMs", QUERY_WAIT_MS.to_string()),
            ]);
        if let Some(location) = &job.location {
            request = request.query(&[("location", location)]);
        }
        let body = send_json(Self::with_position(request, position))?;
        Ok(parse_query_results(body))
    }
}

fn parse_table_metadata(body: &Value) -> Result<TableMetadata> {
    let id = body["id"]
        .as_str()
        .ok_or_else(|| malformed("tables.get", "table resource without id"))?
        .to_string();
    Ok(TableMetadata {
        id,
        last_modified: int_field(&body["lastModifiedTime"]).and_then(millis_to_datetime),
        row_count: int_field(&body["numRows"]).unwrap_or(0),
        columns: parse_columns(&body["schema"]),
    })
}

fn parse_columns(schema: &Value) -> Vec<ColumnMetadata> {
    schema["fields"]
        .as_array()
        .map(|fields| {
            fields
                .iter()
                .map(|f| ColumnMetadata {
                    name: f["name"].as_str().unwrap_or_default().to_string(),
                    field_type: f["type"].as_str().unwrap_or("STRING").to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn malformed(service: &str, message: &str) -> ExportError {
    ExportError::MalformedResponse {
        service: service.to_string(),
        message: message.to_string(),
    }
}

fn millis_to_datetime(ms: u64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms as i64).single()
}

fn parse_table_list(body: &Value) -> (Vec<String>, Option<String>) {
    let names = body["tables"]
        .as_array()
        .map(|tables| {
            tables
                .iter()
                .filter_map(|t| t["tableReference"]["tableId"].as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    let next = body["nextPageToken"].as_str().map(str::to_string);
    (names, next)
}

fn parse_page(mut body: Value) -> PageResponse {
    let rows = match body.get_mut("rows").map(Value::take) {
        Some(Value::Array(rows)) => rows,
        _ => Vec::new(),
    };
    PageResponse {
        rows,
        page_token: body["pageToken"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(str::to_string),
    }
}

fn parse_query_results(body: Value) -> QueryResultsPage {
    let complete = body["jobComplete"].as_bool().unwrap_or(false);
    let columns = parse_columns(&body["schema"]);
    QueryResultsPage {
        complete,
        columns,
        page: parse_page(body),
    }
}

fn query_body(query: &str, request_id: &str) -> Value {
    json!({
        "query": query,
        "useLegacySql": false,
        "timeoutMs": QUERY_WAIT_MS,
        "maxResults": 0,
        "requestId": request_id,
    })
}

fn extract_job_body(config: &ExtractJobConfig) -> Value {
    json!({
        "configuration": {
            "extract": {
                "sourceTable": {
                    "projectId": config.source.project,
                    "datasetId": config.source.dataset,
                    "tableId": config.source.table_id(),
                },
                "destinationUris": config.destination_uris,
                "destinationFormat": config.destination_format,
            }
        }
    })
}

fn error_result(body: &Value) -> Option<String> {
    let err = &body["status"]["errorResult"];
    if err.is_null() {
        return None;
    }
    Some(
        err["message"]
            .as_str()
            .or_else(|| err["reason"].as_str())
            .unwrap_or("unknown error")
            .to_string(),
    )
}

fn parse_job_handle(body: &Value, project: &str, service: &str) -> Result<JobHandle> {
    let reference = &body["jobReference"];
    let job_id = reference["jobId"]
        .as_str()
        .ok_or_else(|| malformed(service, "response without jobReference.jobId"))?;
    Ok(JobHandle {
        project: reference["projectId"]
            .as_str()
            .unwrap_or(project)
            .to_string(),
        job_id: job_id.to_string(),
        location: reference["location"].as_str().map(str::to_string),
    })
}

fn parse_job_state(body: &Value) -> Result<JobState> {
    match body["status"]["state"].as_str() {
        Some("PENDING") | Some("RUNNING") => Ok(JobState::Running),
        Some("DONE") => match error_result(body) {
            Some(reason) => {
                warn!("Job finished with error: {}", reason);
                Ok(JobState::Failed)
            }
            None => Ok(JobState::Done),
        },
        other => Err(malformed(
            "jobs.get",
            &format!("unexpected job state {:?}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{DestinationFormat, PartitionSuffix, SnapshotTime};

    #[test]
    fn test_parse_table_metadata() {
        let body = json!({
            "id": "proj:ds.events",
            "numRows": "1000",
            "lastModifiedTime": "1700000000000",
            "schema": {"fields": [
                {"name": "id", "type": "INTEGER"},
                {"name": "payload", "type": "RECORD"}
            ]}
        });
        let meta = parse_table_metadata(&body).unwrap();
        assert_eq!(meta.id, "proj:ds.events");
        assert_eq!(meta.row_count, 1000);
        assert_eq!(meta.column_names(), vec!["id", "payload"]);
        assert_eq!(
            meta.last_modified.unwrap().timestamp_millis(),
            1_700_000_000_000
        );
    }

    #[test]
    fn test_parse_table_metadata_without_id() {
        let err = parse_table_metadata(&json!({"numRows": "1"})).unwrap_err();
        assert!(matches!(
            err,
            ExportError::MalformedResponse { ref service, .. } if service == "tables.get"
        ));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_page() {
        let body = json!({
            "totalRows": "3",
            "pageToken": "BEWG",
            "rows": [{"f": [{"v": "1"}]}, {"f": [{"v": "2"}]}]
        });
        let page = parse_page(body);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[1]["f"][0]["v"], "2");
        assert_eq!(page.page_token.as_deref(), Some("BEWG"));

        let last = parse_page(json!({"totalRows": "3"}));
        assert!(last.rows.is_empty());
        assert_eq!(last.page_token, None);
    }

    #[test]
    fn test_parse_table_list() {
        let body = json!({
            "tables": [
                {"tableReference": {"projectId": "p", "datasetId": "d", "tableId": "a"}},
                {"tableReference": {"projectId": "p", "datasetId": "d", "tableId": "b"}}
            ],
            "nextPageToken": "next"
        });
        let (names, next) = parse_table_list(&body);
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(next.as_deref(), Some("next"));
        assert_eq!(parse_table_list(&json!({})), (vec![], None));
    }

    #[test]
    fn test_extract_job_body() {
        let source = TableRef::new("p", "d", "t")
            .with_snapshot(SnapshotTime(17))
            .unwrap()
            .with_partition(PartitionSuffix { index: 0, count: 2 });
        let config = ExtractJobConfig {
            source,
            destination_uris: vec!["gs://b/output/d.t_1.0.*.json".into()],
            destination_format: DestinationFormat::NewlineDelimitedJson,
        };
        let body = extract_job_body(&config);
        let extract = &body["configuration"]["extract"];
        assert_eq!(extract["sourceTable"]["tableId"], "t@17$0-of-2");
        assert_eq!(extract["destinationFormat"], "NEWLINE_DELIMITED_JSON");
        assert_eq!(extract["destinationUris"][0], "gs://b/output/d.t_1.0.*.json");
    }

    #[test]
    fn test_parse_job_handle_and_rejection() {
        let body = json!({
            "jobReference": {"projectId": "p", "jobId": "job_abc", "location": "EU"},
            "status": {"state": "RUNNING"}
        });
        assert_eq!(error_result(&body), None);
        let handle = parse_job_handle(&body, "fallback", "jobs.insert").unwrap();
        assert_eq!(handle.job_id, "job_abc");
        assert_eq!(handle.project, "p");
        assert_eq!(handle.location.as_deref(), Some("EU"));

        let rejected = json!({"status": {"state": "DONE", "errorResult": {"reason": "invalid"}}});
        assert_eq!(error_result(&rejected).as_deref(), Some("invalid"));
    }

    #[test]
    fn test_parse_job_state() {
        let state = |s: &str| parse_job_state(&json!({"status": {"state": s}})).unwrap();
        assert_eq!(state("PENDING"), JobState::Running);
        assert_eq!(state("RUNNING"), JobState::Running);
        assert_eq!(state("DONE"), JobState::Done);

        let failed = json!({"status": {"state": "DONE", "errorResult": {"message": "boom"}}});
        assert_eq!(parse_job_state(&failed).unwrap(), JobState::Failed);
        let err = parse_job_state(&json!({"status": {"state": "WEIRD"}})).unwrap_err();
        assert!(matches!(err, ExportError::MalformedResponse { .. }));
        assert!(err.to_string().contains("WEIRD"));
        assert!(matches!(
            parse_job_handle(&json!({"status": {}}), "p", "jobs.insert"),
            Err(ExportError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_query_body() {
        let body = query_body("SELECT 1", "req-1");
        assert_eq!(body["query"], "SELECT 1");
        assert_eq!(body["useLegacySql"], false);
        assert_eq!(body["requestId"], "req-1");
        assert_eq!(body["maxResults"], 0);
    }

    #[test]
    fn test_parse_query_results() {
        let running = parse_query_results(json!({
            "jobReference": {"projectId": "p", "jobId": "q1"},
            "jobComplete": false
        }));
        assert!(!running.complete);
        assert!(running.columns.is_empty());
        assert!(running.page.rows.is_empty());

        let done = parse_query_results(json!({
            "jobComplete": true,
            "schema": {"fields": [{"name": "n", "type": "INTEGER"}]},
            "totalRows": "2",
            "pageToken": "next",
            "rows": [{"f": [{"v": "1"}]}]
        }));
        assert!(done.complete);
        assert_eq!(done.columns[0].name, "n");
        assert_eq!(done.page.rows.len(), 1);
        assert_eq!(done.page.page_token.as_deref(), Some("next"));
    }

    #[test]
    fn test_query_job_handle() {
        let body = json!({"jobReference": {"projectId": "p", "jobId": "q1", "location": "EU"}});
        let handle = parse_job_handle(&body, "p", "jobs.query").unwrap();
        assert_eq!(handle.job_id, "q1");
        let err = parse_job_handle(&json!({}), "p", "jobs.query").unwrap_err();
        assert!(err.to_string().contains("jobs.query"));
    }
}
