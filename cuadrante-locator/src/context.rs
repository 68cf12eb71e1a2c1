//! Source context: cached access to the five cached sources
//!
//! One explicit object passed into the resolvers instead of process-global
//! caches. Holds one [`TtlCache`] per source, each with its own TTL:
//!
//! | Source              | TTL (default)      |
//! |---------------------|--------------------|
//! | status probe        | 60 s               |
//! | offline snapshot    | load once          |
//! | gold standard       | 1 h                |
//! | logical directory   | 1 h                |
//! | WebMap CAI index    | 30 min             |

use crate::cache::{CacheStatus, Clock, TtlCache};
use crate::config::LocatorSettings;
use crate::sources::gold_standard::{EquipmentRecord, GoldStandardSource};
use crate::sources::logical_directory::{DirectoryRecord, LogicalDirectorySource};
use crate::sources::offline::{OfflineSnapshot, OfflineSource};
use crate::sources::status_probe::{ProbeStatus, StatusProbe};
use crate::sources::webmap_index::{CaiIndexEntry, WebMapIndexSource};
use crate::sources::{SourceClient, SourceError, Transport};
use cuadrante_common::config::SourceSettings;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Build the bounded client for one configured source
pub fn source_client(
    name: &'static str,
    settings: &SourceSettings,
    transport: &Arc<dyn Transport>,
) -> SourceClient {
    SourceClient::new(name, settings.timeout, Arc::clone(transport))
        .with_rate_limit(settings.requests_per_second)
}

/// Cache status of one source, for `/health`
#[derive(Debug, Clone, Serialize)]
pub struct SourceCacheStatus {
    pub source: &'static str,
    #[serde(flatten)]
    pub status: CacheStatus,
}

/// Outcome of one warm-up load
#[derive(Debug, Clone, Serialize)]
pub struct WarmUpOutcome {
    pub source: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WarmUpOutcome {
    fn from_result<T>(source: &'static str, result: Result<Arc<T>, SourceError>, count: impl Fn(&T) -> usize) -> Self {
        match result {
            Ok(payload) => Self {
                source,
                records: Some(count(&payload)),
                error: None,
            },
            Err(err) => Self {
                source,
                records: None,
                error: Some(err.to_string()),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

pub struct SourceContext {
    probe: StatusProbe,
    offline: OfflineSource,
    gold_standard: GoldStandardSource,
    directory: LogicalDirectorySource,
    webmap: WebMapIndexSource,

    probe_cache: TtlCache<ProbeStatus>,
    offline_cache: TtlCache<OfflineSnapshot>,
    equipment_cache: TtlCache<Vec<EquipmentRecord>>,
    directory_cache: TtlCache<Vec<DirectoryRecord>>,
    cai_index_cache: TtlCache<Vec<CaiIndexEntry>>,
}

impl SourceContext {
    pub fn new(settings: &LocatorSettings, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        let s = &settings.sources;
        Self {
            probe: StatusProbe::new(
                source_client("status_probe", &s.status_probe, &transport),
                s.status_probe.url.clone(),
            ),
            offline: OfflineSource::new(
                settings.quadrants_path.clone(),
                settings.personnel_path.clone(),
            ),
            gold_standard: GoldStandardSource::new(
                source_client("gold_standard", &s.gold_standard, &transport),
                s.gold_standard.url.clone(),
            ),
            directory: LogicalDirectorySource::new(
                source_client("logical_directory", &s.logical_directory, &transport),
                s.logical_directory.url.clone(),
            ),
            webmap: WebMapIndexSource::new(
                source_client("webmap_index", &s.webmap_index, &transport),
                s.webmap_index.url.clone(),
            ),

            probe_cache: TtlCache::new("status_probe", s.status_probe.ttl, Arc::clone(&clock)),
            offline_cache: TtlCache::new("offline", None, Arc::clone(&clock)),
            equipment_cache: TtlCache::new("gold_standard", s.gold_standard.ttl, Arc::clone(&clock)),
            directory_cache: TtlCache::new(
                "logical_directory",
                s.logical_directory.ttl,
                Arc::clone(&clock),
            ),
            cai_index_cache: TtlCache::new("webmap_index", s.webmap_index.ttl, clock),
        }
    }

    /// Cached reachability of the official service
    pub async fn probe_status(&self) -> ProbeStatus {
        match self
            .probe_cache
            .get_or_load(|| async { Ok(self.probe.check().await) })
            .await
        {
            Ok(status) => (*status).clone(),
            Err(_) => ProbeStatus::Unknown,
        }
    }

    pub async fn offline_snapshot(&self) -> Result<Arc<OfflineSnapshot>, SourceError> {
        self.offline_cache.get_or_load(|| self.offline.load()).await
    }

    pub async fn equipment(&self) -> Result<Arc<Vec<EquipmentRecord>>, SourceError> {
        self.equipment_cache
            .get_or_load(|| self.gold_standard.fetch())
            .await
    }

    pub async fn directory(&self) -> Result<Arc<Vec<DirectoryRecord>>, SourceError> {
        self.directory_cache.get_or_load(|| self.directory.fetch()).await
    }

    pub async fn cai_index(&self) -> Result<Arc<Vec<CaiIndexEntry>>, SourceError> {
        self.cai_index_cache.get_or_load(|| self.webmap.fetch()).await
    }

    /// Load the offline snapshot and the three correlation directories
    /// concurrently; failures are reported, never fatal
    pub async fn warm_up(&self) -> Vec<WarmUpOutcome> {
        let started = Instant::now();
        let (offline, equipment, directory, cai_index) = tokio::join!(
            self.offline_snapshot(),
            self.equipment(),
            self.directory(),
            self.cai_index(),
        );

        let outcomes = vec![
            WarmUpOutcome::from_result("offline", offline, |s| s.quadrants.len()),
            WarmUpOutcome::from_result("gold_standard", equipment, Vec::len),
            WarmUpOutcome::from_result("logical_directory", directory, Vec::len),
            WarmUpOutcome::from_result("webmap_index", cai_index, Vec::len),
        ];

        for outcome in &outcomes {
            match (&outcome.records, &outcome.error) {
                (Some(records), _) => info!(source = outcome.source, records, "Warm-up load complete"),
                (_, Some(error)) => warn!(source = outcome.source, error = %error, "Warm-up load failed"),
                _ => {}
            }
        }
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            loaded = outcomes.iter().filter(|o| o.is_ok()).count(),
            "Cache warm-up finished"
        );
        outcomes
    }

    pub async fn cache_statuses(&self) -> Vec<SourceCacheStatus> {
        vec![
            SourceCacheStatus {
                source: self.probe_cache.name(),
                status: self.probe_cache.status().await,
            },
            SourceCacheStatus {
                source: self.offline_cache.name(),
                status: self.offline_cache.status().await,
            },
            SourceCacheStatus {
                source: self.equipment_cache.name(),
                status: self.equipment_cache.status().await,
            },
            SourceCacheStatus {
                source: self.directory_cache.name(),
                status: self.directory_cache.status().await,
            },
            SourceCacheStatus {
                source: self.cai_index_cache.name(),
                status: self.cai_index_cache.status().await,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::sources::testing::{Canned, StaticTransport};
    use cuadrante_common::config::TomlConfig;
    use serde_json::json;
    use std::time::Duration;

    fn config() -> TomlConfig {
        let mut config = TomlConfig::default();
        config.sources.status_probe.url = Some("http://probe".into());
        config.sources.gold_standard.url = Some("http://gold".into());
        config.sources.logical_directory.url = Some("http://dir".into());
        config.sources.webmap_index.url = Some("http://webmap".into());
        config.offline.quadrants_path = "/nonexistent/cuadrantes.geojson".into();
        config
    }

    fn context(transport: Arc<StaticTransport>, clock: Arc<ManualClock>) -> SourceContext {
        let settings = LocatorSettings::resolve(&config()).unwrap();
        SourceContext::new(&settings, transport, clock)
    }

    #[tokio::test]
    async fn test_probe_cached_for_ttl() {
        let transport = Arc::new(StaticTransport::new().route("http://probe", Canned::Fail("down".into())));
        let clock = Arc::new(ManualClock::new());
        let ctx = context(transport.clone(), clock.clone());

        assert!(ctx.probe_status().await.is_offline());
        assert!(ctx.probe_status().await.is_offline());
        assert_eq!(transport.call_count(), 1);

        clock.advance(Duration::from_secs(61));
        ctx.probe_status().await;
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_warm_up_reports_each_source() {
        let transport = Arc::new(
            StaticTransport::new()
                .json("http://gold", json!([{"nombre": "CAI Lourdes", "codigo_siv": "E03C01"}]))
                .json("http://dir", json!([]))
                .route("http://webmap", Canned::Fail("dns".into())),
        );
        let ctx = context(transport, Arc::new(ManualClock::new()));

        let outcomes = ctx.warm_up().await;
        let by_source = |name: &str| outcomes.iter().find(|o| o.source == name).unwrap().clone();

        assert_eq!(by_source("gold_standard").records, Some(1));
        assert!(by_source("logical_directory").error.unwrap().contains("no results"));
        assert!(by_source("webmap_index").error.is_some());
        assert!(by_source("offline").error.is_some());

        let statuses = ctx.cache_statuses().await;
        let gold = statuses.iter().find(|s| s.source == "gold_standard").unwrap();
        assert!(matches!(gold.status, CacheStatus::Fresh { .. }));
        let webmap = statuses.iter().find(|s| s.source == "webmap_index").unwrap();
        assert_eq!(webmap.status, CacheStatus::Empty);
    }
}
