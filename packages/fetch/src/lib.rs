#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Resilient HTTP fetching for public data APIs.
//!
//! [`FetchClient`] performs read-only GETs with bounded retries and
//! exponential backoff on rate-limit responses, then decodes the JSON body
//! into a flat [`Frame`] by dot-joining nested object keys
//! (`municipio.microrregiao.nome`).

use std::time::Duration;

use arbo_map_table::{Frame, Row};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};

/// Errors that can occur while fetching remote tables.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// An HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body was not valid JSON.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-retryable error status.
    #[error("HTTP status {status} for {url}")]
    Status {
        /// The response status code.
        status: u16,
        /// The requested URL.
        url: String,
    },

    /// The configured response format is not supported.
    #[error("Unsupported response format: {0}")]
    UnsupportedFormat(String),

    /// The retry budget was exhausted without a successful response.
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Total attempts made, including the first.
        attempts: u32,
        /// The error observed on the final attempt.
        last_error: String,
    },
}

/// Wire format of an API response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ResponseFormat {
    /// JSON body: a record object or an array of record objects.
    Json,
}

/// HTTP client with a bounded retry budget.
///
/// Retries fire on transport errors and HTTP 429, sleeping
/// `backoff_secs * 2^(attempt-1)` between attempts. Any other error status
/// fails immediately.
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: reqwest::Client,
    format: ResponseFormat,
    max_retries: u32,
    backoff_secs: u64,
}

impl FetchClient {
    /// Creates a client expecting `format` responses, allowing
    /// `max_retries` retries after the initial attempt.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the underlying HTTP client cannot be built.
    pub fn new(
        format: ResponseFormat,
        max_retries: u32,
        backoff_secs: u64,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent("arbo-map/0.1")
            .build()?;
        Ok(Self {
            client,
            format,
            max_retries,
            backoff_secs,
        })
    }

    /// The response format this client decodes.
    #[must_use]
    pub const fn format(&self) -> ResponseFormat {
        self.format
    }

    /// Fetches `url` and decodes the response into a flat [`Frame`].
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the retry budget is exhausted, the server
    /// answers with a non-retryable status, or the body cannot be decoded.
    pub async fn get_table(&self, url: &str) -> Result<Frame, FetchError> {
        let attempts = self.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay_secs = self.backoff_secs << (attempt - 1);
                log::warn!("HTTP GET {url}: retry {attempt}/{} in {delay_secs}s...", self.max_retries);
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
            }

            let response = match self.client.get(url).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = format!("HTTP request error: {e}");
                    log::warn!("HTTP GET {url} (attempt {attempt}): {last_error}");
                    continue;
                }
            };

            let status = response.status();
            log::debug!("HTTP GET {url} -> {status}");

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                last_error = format!("HTTP {status}");
                log::warn!("HTTP GET {url} (attempt {attempt}): rate limited");
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                log::error!(
                    "HTTP GET {url} failed with {status}. Response body: {}",
                    truncate_for_log(&body, 500)
                );
                return Err(FetchError::Status {
                    status: status.as_u16(),
                    url: url.to_owned(),
                });
            }

            let body = match response.text().await {
                Ok(b) => b,
                Err(e) => {
                    last_error = format!("Failed to read response body: {e}");
                    log::warn!("HTTP GET {url} (attempt {attempt}): {last_error}");
                    continue;
                }
            };

            return match self.format {
                ResponseFormat::Json => {
                    let json: Value = serde_json::from_str(&body)?;
                    Ok(Frame::from_records(flatten_records(&json)))
                }
            };
        }

        Err(FetchError::RetriesExhausted {
            attempts,
            last_error,
        })
    }
}

/// Flattens a JSON body into rows: an array yields one row per object
/// element, a single object yields one row. Nested objects are dot-joined
/// into their parent row; arrays and scalars are kept as cell values.
#[must_use]
pub fn flatten_records(body: &Value) -> Vec<Row> {
    match body {
        Value::Array(elements) => elements
            .iter()
            .filter_map(Value::as_object)
            .map(flatten_object)
            .collect(),
        Value::Object(object) => vec![flatten_object(object)],
        _ => Vec::new(),
    }
}

fn flatten_object(object: &serde_json::Map<String, Value>) -> Row {
    let mut row = Row::new();
    flatten_into(&mut row, "", object);
    row
}

fn flatten_into(row: &mut Row, prefix: &str, object: &serde_json::Map<String, Value>) {
    for (key, value) in object {
        let name = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(nested) => flatten_into(row, &name, nested),
            other => {
                row.insert(name, other.clone());
            }
        }
    }
}

/// Truncates a string for logging, appending "..." if it exceeds `max_len`.
fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr as _;

    #[test]
    fn flattens_nested_objects_with_dot_keys() {
        let body = json!([{
            "municipio": {
                "id": 3_106_200,
                "nome": "Divinópolis",
                "microrregiao": { "nome": "Divinópolis" }
            }
        }]);

        let rows = flatten_records(&body);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("municipio.id"), Some(&json!(3_106_200)));
        assert_eq!(
            rows[0].get("municipio.microrregiao.nome"),
            Some(&json!("Divinópolis"))
        );
    }

    #[test]
    fn flattens_single_object_to_one_row() {
        let body = json!({ "SE": 202_401, "casos": 10 });
        let rows = flatten_records(&body);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("SE"), Some(&json!(202_401)));
    }

    #[test]
    fn keeps_scalar_arrays_as_cells() {
        let body = json!([{ "tags": [1, 2, 3], "casos": 0 }]);
        let rows = flatten_records(&body);
        assert_eq!(rows[0].get("tags"), Some(&json!([1, 2, 3])));
    }

    #[test]
    fn empty_array_yields_no_rows() {
        assert!(flatten_records(&json!([])).is_empty());
    }

    #[test]
    fn parses_response_format() {
        assert_eq!(ResponseFormat::from_str("json"), Ok(ResponseFormat::Json));
        assert!(ResponseFormat::from_str("xml").is_err());
    }
}
