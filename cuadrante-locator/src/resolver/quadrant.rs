//! Quadrant fallback orchestrator
//!
//! Three geometry tiers, strictly in order:
//! 1. Official polygon service (skipped while the status probe reports it offline)
//! 2. Alternative polygon service
//! 3. Offline GeoJSON snapshot
//!
//! After a tier finds the containing polygon, the CAI resolver attaches the
//! command post location, station detail and hierarchy. A CAI miss never fails
//! the request; a geometry miss everywhere is `None`, not an error.

use super::cai::CaiResolver;
use super::{run_chain, ChainOutcome, Tier, TierChain};
use crate::context::SourceContext;
use crate::sources::alternative::AlternativeSource;
use crate::sources::official::OfficialSource;
use crate::sources::status_probe::ProbeStatus;
use crate::sources::SourceError;
use crate::types::{LocatedQuadrant, LocationProvenance, QuadrantRecord, StationDetail, TierOutcome};
use async_trait::async_trait;
use cuadrante_common::GeoPoint;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub struct OfficialTier {
    source: OfficialSource,
    sources: Arc<SourceContext>,
}

impl OfficialTier {
    pub fn new(source: OfficialSource, sources: Arc<SourceContext>) -> Self {
        Self { source, sources }
    }
}

#[async_trait]
impl Tier<GeoPoint, LocatedQuadrant> for OfficialTier {
    fn name(&self) -> &'static str {
        "official"
    }

    async fn attempt(&self, point: &GeoPoint) -> TierOutcome<LocatedQuadrant> {
        if let ProbeStatus::Offline(reason) = self.sources.probe_status().await {
            return TierOutcome::SourceFailed(SourceError::transport(
                "official",
                format!("status probe reports service offline ({})", reason),
            ));
        }
        self.source.locate(*point).await.map(Some).into()
    }
}

pub struct AlternativeTier {
    source: AlternativeSource,
}

impl AlternativeTier {
    pub fn new(source: AlternativeSource) -> Self {
        Self { source }
    }
}

#[async_trait]
impl Tier<GeoPoint, LocatedQuadrant> for AlternativeTier {
    fn name(&self) -> &'static str {
        "alternative"
    }

    async fn attempt(&self, point: &GeoPoint) -> TierOutcome<LocatedQuadrant> {
        self.source.locate(*point).await.map(Some).into()
    }
}

pub struct OfflineTier {
    sources: Arc<SourceContext>,
}

impl OfflineTier {
    pub fn new(sources: Arc<SourceContext>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Tier<GeoPoint, LocatedQuadrant> for OfflineTier {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn attempt(&self, point: &GeoPoint) -> TierOutcome<LocatedQuadrant> {
        self.sources
            .offline_snapshot()
            .await
            .map(|snapshot| snapshot.locate(*point))
            .into()
    }
}

pub struct QuadrantOrchestrator {
    tiers: TierChain<GeoPoint, LocatedQuadrant>,
    cai: Arc<CaiResolver>,
}

impl QuadrantOrchestrator {
    pub fn new(tiers: TierChain<GeoPoint, LocatedQuadrant>, cai: Arc<CaiResolver>) -> Self {
        Self { tiers, cai }
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    /// Quadrant containing `point`, with CAI detail attached when resolvable
    pub async fn resolve_quadrant(&self, point: GeoPoint) -> Option<QuadrantRecord> {
        if !point.is_valid() {
            warn!(lat = point.lat, lng = point.lng, "Rejected invalid coordinate");
            return None;
        }
        let started = Instant::now();

        let (tier, located) = match run_chain("quadrant", &self.tiers, &point).await {
            ChainOutcome::Found { tier, value } => (tier, value),
            ChainOutcome::Exhausted { failures } if failures.len() == self.tiers.len() => {
                let failed: Vec<String> = failures
                    .iter()
                    .map(|(tier, err)| format!("{}: {}", tier, err.kind()))
                    .collect();
                warn!(
                    lat = point.lat,
                    lng = point.lng,
                    failed = ?failed,
                    "Every geometry source failed"
                );
                return None;
            }
            ChainOutcome::Exhausted { failures } => {
                info!(
                    lat = point.lat,
                    lng = point.lng,
                    failed_tiers = failures.len(),
                    "No quadrant contains the point"
                );
                return None;
            }
        };

        let record = self.attach_cai(located).await;
        info!(
            tier,
            code = %record.id,
            provenance = record.provenance.as_str(),
            location_provenance = record.location_provenance.map(LocationProvenance::as_str),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Quadrant resolved"
        );
        Some(record)
    }

    async fn attach_cai(&self, located: LocatedQuadrant) -> QuadrantRecord {
        let cai_location = self.cai.resolve_cai(&located.code, located.centroid).await;
        let hierarchy = self.cai.hierarchy(&located.code).await;

        let station_info = cai_location
            .as_ref()
            .and_then(|l| l.station.clone())
            .or_else(|| {
                located.cai_name.clone().map(|name| StationDetail {
                    name,
                    ..Default::default()
                })
            });

        QuadrantRecord {
            id: located.code,
            display_name: located.display_name,
            roster: located.roster,
            location_provenance: cai_location.as_ref().map(|l| l.provenance),
            cai_location,
            station_info,
            hierarchy,
            provenance: located.provenance,
        }
    }
}
