//! Online-status probe of the official quadrant service
//!
//! A single cheap metadata request (`?f=json` on the layer URL). The result is
//! cached briefly so the official tier can be skipped while the service is
//! known to be down.

use super::{SourceClient, SourceError};
use serde::Serialize;

/// Last known reachability of the official service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ProbeStatus {
    Online,
    Offline(String),
    /// Service answered but the reply could not be interpreted
    Unknown,
}

impl ProbeStatus {
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::Offline(_))
    }
}

pub struct StatusProbe {
    client: SourceClient,
    url: String,
}

impl StatusProbe {
    pub fn new(client: SourceClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Probe the service
    ///
    /// Never fails: faults become [`ProbeStatus::Offline`] so a down service is
    /// cached as down rather than retried on every query.
    pub async fn check(&self) -> ProbeStatus {
        let result = self
            .client
            .call::<serde_json::Value>(&self.url, &[("f", "json".to_string())])
            .await;
        classify(result)
    }
}

fn classify(result: Result<serde_json::Value, SourceError>) -> ProbeStatus {
    match result {
        Ok(_) => ProbeStatus::Online,
        Err(err @ SourceError::Timeout { .. })
        | Err(err @ SourceError::Transport { .. })
        | Err(err @ SourceError::UpstreamError { .. }) => ProbeStatus::Offline(err.to_string()),
        Err(SourceError::Decode { .. }) | Err(SourceError::Empty { .. }) => ProbeStatus::Unknown,
    }
}
