//! Upstream data sources
//!
//! Every network access goes through [`SourceClient::call`], which bounds the
//! request with a timeout, applies the optional per-source rate limit, and
//! decodes the JSON body into a typed payload with a typed failure.
//!
//! ## Sources
//! - `status_probe` - cheap reachability check of the official service
//! - `official` / `alternative` - quadrant polygon + roster services (ArcGIS)
//! - `offline` - local GeoJSON polygon snapshot + personnel list
//! - `gold_standard` - capital-district CAI equipment directory
//! - `logical_directory` - national quadrant-to-unit directory (no coordinates)
//! - `webmap_index` - national CAI point index
//!
//! Callers own caching; see [`crate::cache`].

pub mod alternative;
pub mod arcgis;
pub mod gold_standard;
pub mod http;
pub mod logical_directory;
pub mod offline;
pub mod official;
pub mod status_probe;
pub mod webmap_index;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

pub use http::HttpTransport;

/// Typed failure of a single source call
///
/// All variants are recoverable locally: every tier catches them and moves on.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SourceError {
    /// No response within the source's timeout
    #[error("{source_name}: timed out after {timeout_ms} ms")]
    Timeout { source_name: String, timeout_ms: u64 },

    /// Connection, DNS or local file access failure
    #[error("{source_name}: transport failure: {message}")]
    Transport { source_name: String, message: String },

    /// Remote reported an error (structured payload or non-success status)
    #[error("{source_name}: upstream error{}: {message}", fmt_status(.status))]
    UpstreamError {
        source_name: String,
        status: Option<u16>,
        message: String,
    },

    /// Body does not match the expected schema
    #[error("{source_name}: decode error: {message}")]
    Decode { source_name: String, message: String },

    /// Well-formed response with zero results
    #[error("{source_name}: no results")]
    Empty { source_name: String },
}

impl SourceError {
    /// Zero results is a "not present here" signal, not a fault
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    pub fn is_fault(&self) -> bool {
        !self.is_empty()
    }

    /// Short variant label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Transport { .. } => "transport",
            Self::UpstreamError { .. } => "upstream_error",
            Self::Decode { .. } => "decode",
            Self::Empty { .. } => "empty",
        }
    }

    pub fn transport(source_name: &str, message: impl Into<String>) -> Self {
        Self::Transport {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    pub fn decode(source_name: &str, message: impl Into<String>) -> Self {
        Self::Decode {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }

    pub fn empty(source_name: &str) -> Self {
        Self::Empty {
            source_name: source_name.to_string(),
        }
    }
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" {}", s)).unwrap_or_default()
}

/// Raw response handed back by a [`Transport`]
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Connection-level failure reported by a [`Transport`]
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// HTTP seam between the source clients and the network
///
/// `HttpTransport` is the production implementation; tests substitute
/// canned responses. Timeouts are enforced by [`SourceClient`], not here.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<TransportResponse, TransportError>;
}

/// Payloads that can be "well-formed but empty"
pub trait SourcePayload {
    fn is_empty_payload(&self) -> bool;
}

impl<T> SourcePayload for Vec<T> {
    fn is_empty_payload(&self) -> bool {
        self.is_empty()
    }
}

impl SourcePayload for serde_json::Value {
    fn is_empty_payload(&self) -> bool {
        self.is_null()
    }
}

/// Bounded client for one upstream source
pub struct SourceClient {
    name: &'static str,
    timeout: Duration,
    transport: Arc<dyn Transport>,
    rate_limiter: Option<DefaultDirectRateLimiter>,
}

impl SourceClient {
    pub fn new(name: &'static str, timeout: Duration, transport: Arc<dyn Transport>) -> Self {
        Self {
            name,
            timeout,
            transport,
            rate_limiter: None,
        }
    }

    /// Limit this source to `requests_per_second` (0 or `None` disables)
    pub fn with_rate_limit(mut self, requests_per_second: Option<u32>) -> Self {
        self.rate_limiter = requests_per_second
            .and_then(NonZeroU32::new)
            .map(|rps| RateLimiter::direct(Quota::per_second(rps)));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Query `endpoint` and decode the body into `T`
    ///
    /// # Errors
    /// - `Timeout` if no response arrives within the source timeout
    /// - `Transport` on connection failure
    /// - `UpstreamError` on non-success status or an ArcGIS-style `error` member
    /// - `Decode` if the body is not the expected JSON shape
    /// - `Empty` if the decoded payload holds no records
    pub async fn call<T>(&self, endpoint: &str, query: &[(&str, String)]) -> Result<T, SourceError>
    where
        T: DeserializeOwned + SourcePayload,
    {
        let query: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();

        let start = Instant::now();
        tracing::debug!(source = self.name, endpoint, "Querying source");

        let request = async {
            if let Some(limiter) = &self.rate_limiter {
                limiter.until_ready().await;
            }
            self.transport.get(endpoint, &query).await
        };

        let response = match tokio::time::timeout(self.timeout, request).await {
            Err(_) => {
                return Err(SourceError::Timeout {
                    source_name: self.name.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                })
            }
            Ok(Err(e)) => return Err(SourceError::transport(self.name, e.0)),
            Ok(Ok(response)) => response,
        };

        tracing::debug!(
            source = self.name,
            status = response.status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Source responded"
        );

        decode_body(self.name, response)
    }
}

/// Turn a raw response into a typed payload
pub fn decode_body<T>(source_name: &str, response: TransportResponse) -> Result<T, SourceError>
where
    T: DeserializeOwned + SourcePayload,
{
    if !(200..300).contains(&response.status) {
        let mut message = response.body;
        message.truncate(200);
        return Err(SourceError::UpstreamError {
            source_name: source_name.to_string(),
            status: Some(response.status),
            message,
        });
    }

    let value: serde_json::Value = serde_json::from_str(&response.body)
        .map_err(|e| SourceError::decode(source_name, e.to_string()))?;

    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        let status = error
            .get("code")
            .and_then(|c| c.as_u64())
            .and_then(|c| u16::try_from(c).ok());
        return Err(SourceError::UpstreamError {
            source_name: source_name.to_string(),
            status,
            message,
        });
    }

    let payload: T =
        serde_json::from_value(value).map_err(|e| SourceError::decode(source_name, e.to_string()))?;

    if payload.is_empty_payload() {
        return Err(SourceError::empty(source_name));
    }
    Ok(payload)
}

/// Escape a literal for an ArcGIS/SQL `where` clause
pub fn sql_literal(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
pub(crate) mod testing {
    //! Canned-response transport shared by unit tests

    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    pub enum Canned {
        Json(u16, String),
        Fail(String),
        Hang,
    }

    #[derive(Default)]
    pub struct StaticTransport {
        routes: Mutex<HashMap<String, Canned>>,
        pub calls: AtomicUsize,
        pub seen_queries: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl StaticTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn route(self, url: &str, canned: Canned) -> Self {
            self.routes.lock().unwrap().insert(url.to_string(), canned);
            self
        }

        pub fn json(self, url: &str, body: serde_json::Value) -> Self {
            self.route(url, Canned::Json(200, body.to_string()))
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for StaticTransport {
        async fn get(
            &self,
            url: &str,
            query: &[(String, String)],
        ) -> Result<TransportResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_queries
                .lock()
                .unwrap()
                .push((url.to_string(), query.to_vec()));

            let outcome = {
                let routes = self.routes.lock().unwrap();
                match routes.get(url) {
                    Some(Canned::Json(status, body)) => Ok(Some(TransportResponse {
                        status: *status,
                        body: body.clone(),
                    })),
                    Some(Canned::Fail(msg)) => Err(TransportError(msg.clone())),
                    Some(Canned::Hang) => Ok(None),
                    None => Err(TransportError(format!("no route for {}", url))),
                }
            };

            match outcome {
                Ok(Some(response)) => Ok(response),
                Ok(None) => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                Err(e) => Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Canned, StaticTransport};
    use super::*;
    use serde_json::json;

    fn client(transport: StaticTransport) -> SourceClient {
        SourceClient::new("test", Duration::from_secs(10), Arc::new(transport))
    }

    #[tokio::test]
    async fn test_decodes_payload() {
        let c = client(StaticTransport::new().json("http://src/a", json!([{"x": 1}])));
        let rows: Vec<serde_json::Value> = c.call("http://src/a", &[]).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_array_is_empty() {
        let c = client(StaticTransport::new().json("http://src/a", json!([])));
        let err = c.call::<Vec<serde_json::Value>>("http://src/a", &[]).await.unwrap_err();
        assert!(err.is_empty());
        assert!(!err.is_fault());
    }

    #[tokio::test]
    async fn test_structured_error_payload() {
        let c = client(StaticTransport::new().json(
            "http://src/a",
            json!({"error": {"code": 400, "message": "Invalid query parameters"}}),
        ));
        let err = c.call::<serde_json::Value>("http://src/a", &[]).await.unwrap_err();
        assert_eq!(
            err,
            SourceError::UpstreamError {
                source_name: "test".to_string(),
                status: Some(400),
                message: "Invalid query parameters".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_http_status_is_upstream_error() {
        let c = client(
            StaticTransport::new().route("http://src/a", Canned::Json(503, "busy".to_string())),
        );
        let err = c.call::<serde_json::Value>("http://src/a", &[]).await.unwrap_err();
        assert_eq!(err.kind(), "upstream_error");
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_decode() {
        let c = client(StaticTransport::new().json("http://src/a", json!({"features": 3})));
        let err = c
            .call::<Vec<serde_json::Value>>("http://src/a", &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport() {
        let c = client(
            StaticTransport::new().route("http://src/a", Canned::Fail("dns failure".to_string())),
        );
        let err = c.call::<serde_json::Value>("http://src/a", &[]).await.unwrap_err();
        assert_eq!(err, SourceError::transport("test", "dns failure"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_source_times_out() {
        let c = client(StaticTransport::new().route("http://src/a", Canned::Hang));
        let err = c.call::<serde_json::Value>("http://src/a", &[]).await.unwrap_err();
        assert_eq!(
            err,
            SourceError::Timeout {
                source_name: "test".to_string(),
                timeout_ms: 10_000
            }
        );
    }

    #[tokio::test]
    async fn test_query_forwarded() {
        let transport = Arc::new(StaticTransport::new().json("http://src/a", json!([1])));
        let c = SourceClient::new("test", Duration::from_secs(1), transport.clone());
        let _: Vec<u8> = c
            .call("http://src/a", &[("where", "1=1".to_string())])
            .await
            .unwrap();
        let seen = transport.seen_queries.lock().unwrap();
        assert_eq!(seen[0].1, vec![("where".to_string(), "1=1".to_string())]);
    }

    #[test]
    fn test_sql_literal_escapes_quotes() {
        assert_eq!(sql_literal("O'BRIEN"), "O''BRIEN");
    }
}
