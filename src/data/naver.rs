//! Naver DataLab search-trend API client.
//!
//! One POST per batch. The client never retries: a failed batch is returned
//! as a [`FetchError`] and the collector decides what to do with it.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::data::TrendSource;
use crate::data::credentials::Credentials;
use crate::domain::{Batch, DateRange, RawSeriesFragment};
use crate::error::{AppError, FetchError};

pub const DEFAULT_ENDPOINT: &str = "https://openapi.naver.com/v1/datalab/search";
const TIMEOUT_SECS: u64 = 30;
/// Longest response body excerpt kept in a `FetchError`.
const ERROR_BODY_LIMIT: usize = 500;

/// Request body for the search-trend endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest<'a> {
    pub start_date: String,
    pub end_date: String,
    pub time_unit: &'static str,
    pub keyword_groups: Vec<GroupPayload<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPayload<'a> {
    pub group_name: &'a str,
    pub keywords: &'a [String],
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<RawSeriesFragment>,
}

/// Build the request body for one batch (daily granularity).
pub fn search_request(batch: &Batch, range: DateRange) -> SearchRequest<'_> {
    SearchRequest {
        start_date: range.start.format("%Y-%m-%d").to_string(),
        end_date: range.end.format("%Y-%m-%d").to_string(),
        time_unit: "date",
        keyword_groups: batch
            .groups
            .iter()
            .map(|g| GroupPayload {
                group_name: g.name(),
                keywords: g.members(),
            })
            .collect(),
    }
}

/// Turn an HTTP status and body into fragments or a `FetchError`.
pub fn parse_response(status: u16, body: &str) -> Result<Vec<RawSeriesFragment>, FetchError> {
    if !(200..300).contains(&status) {
        return Err(FetchError::http(status, truncate(body, ERROR_BODY_LIMIT)));
    }
    let parsed: SearchResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::http(status, format!("invalid response body: {e}")))?;
    Ok(parsed.results)
}

pub struct NaverClient {
    client: Client,
    credentials: Credentials,
    endpoint: String,
}

impl NaverClient {
    pub fn new(credentials: Credentials, endpoint: Option<String>) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::new(4, format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            credentials,
            endpoint: endpoint.unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TrendSource for NaverClient {
    fn fetch(&self, batch: &Batch, range: DateRange) -> Result<Vec<RawSeriesFragment>, FetchError> {
        let body = search_request(batch, range);
        tracing::debug!(endpoint = %self.endpoint, groups = ?batch.group_names(), "posting trend request");

        let resp = self
            .client
            .post(&self.endpoint)
            .header("X-Naver-Client-Id", &self.credentials.client_id)
            .header("X-Naver-Client-Secret", &self.credentials.client_secret)
            .json(&body)
            .send()
            .map_err(|e| FetchError::transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .map_err(|e| FetchError::http(status, format!("failed to read response body: {e}")))?;
        tracing::debug!(status, bytes = text.len(), "trend response received");

        parse_response(status, &text)
    }

    fn describe(&self) -> String {
        format!("naver ({})", self.endpoint)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::chunk;
    use chrono::NaiveDate;
    use serde_json::json;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 5, 8).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn request_body_matches_wire_format() {
        let keywords: Vec<String> = ["coffee", "latte", "tea"].iter().map(|s| s.to_string()).collect();
        let batches = chunk(&keywords, 5, 2);
        let body = serde_json::to_value(search_request(&batches[0], range())).unwrap();

        assert_eq!(
            body,
            json!({
                "startDate": "2025-05-01",
                "endDate": "2025-05-08",
                "timeUnit": "date",
                "keywordGroups": [
                    { "groupName": "coffee", "keywords": ["coffee", "latte"] },
                    { "groupName": "tea", "keywords": ["tea"] }
                ]
            })
        );
    }

    #[test]
    fn ok_response_yields_fragments() {
        let body = json!({
            "startDate": "2025-05-01",
            "endDate": "2025-05-08",
            "timeUnit": "date",
            "results": [
                { "title": "coffee", "keywords": ["coffee"], "data": [{ "period": "2025-05-01", "ratio": 100 }] },
                { "title": "tea", "keywords": ["tea"], "data": [] }
            ]
        })
        .to_string();

        let fragments = parse_response(200, &body).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].title, "coffee");
        assert_eq!(fragments[0].data[0]["ratio"], json!(100));
        assert!(fragments[1].data.is_empty());
    }

    #[test]
    fn error_status_keeps_status_and_body() {
        let err = parse_response(401, r#"{"errorMessage":"Authentication failed"}"#).unwrap_err();
        assert_eq!(err.status, Some(401));
        assert!(err.body.contains("Authentication failed"));
    }

    #[test]
    fn unparseable_ok_body_is_a_fetch_error() {
        let err = parse_response(200, "<html>maintenance</html>").unwrap_err();
        assert_eq!(err.status, Some(200));
        assert!(err.body.starts_with("invalid response body"));
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(ERROR_BODY_LIMIT + 10);
        let err = parse_response(500, &body).unwrap_err();
        assert_eq!(err.body.len(), ERROR_BODY_LIMIT + 3);
    }
}
