//! Locator facade
//!
//! Wires sources, caches and both resolvers together from configuration.
//! This is the single entry point the HTTP layer (and any other caller) uses.

use crate::cache::{Clock, SystemClock};
use crate::config::LocatorSettings;
use crate::context::{source_client, SourceContext, WarmUpOutcome};
use crate::resolver::cai::CaiResolver;
use crate::resolver::quadrant::{AlternativeTier, OfficialTier, OfflineTier, QuadrantOrchestrator};
use crate::resolver::TierChain;
use crate::sources::alternative::AlternativeSource;
use crate::sources::official::OfficialSource;
use crate::sources::{HttpTransport, Transport};
use crate::types::{CaiLocation, LocatedQuadrant, QuadrantRecord};
use cuadrante_common::config::{get_user_agent, TomlConfig};
use cuadrante_common::{GeoPoint, Result};
use std::sync::Arc;

pub struct Locator {
    settings: LocatorSettings,
    sources: Arc<SourceContext>,
    cai: Arc<CaiResolver>,
    orchestrator: QuadrantOrchestrator,
}

impl Locator {
    /// Production wiring: HTTP transport and wall clock
    pub fn from_config(config: &TomlConfig) -> Result<Self> {
        let settings = LocatorSettings::resolve(config)?;
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&get_user_agent())?);
        Ok(Self::build(settings, transport, Arc::new(SystemClock)))
    }

    /// Standard tier chains over the given transport and clock
    pub fn build(settings: LocatorSettings, transport: Arc<dyn Transport>, clock: Arc<dyn Clock>) -> Self {
        let sources = Arc::new(SourceContext::new(&settings, Arc::clone(&transport), clock));
        let cai = Arc::new(CaiResolver::new(Arc::clone(&sources), settings.cai_radius_km));

        let s = &settings.sources;
        let official = OfficialSource::new(
            source_client("official", &s.official, &transport),
            s.official.url.clone(),
            s.official.roster_url.clone().unwrap_or_default(),
        );
        let alternative = AlternativeSource::new(
            source_client("alternative", &s.alternative, &transport),
            s.alternative.url.clone(),
            s.alternative.roster_url.clone().unwrap_or_default(),
        );
        let tiers: TierChain<GeoPoint, LocatedQuadrant> = vec![
            Box::new(OfficialTier::new(official, Arc::clone(&sources))),
            Box::new(AlternativeTier::new(alternative)),
            Box::new(OfflineTier::new(Arc::clone(&sources))),
        ];

        Self::with_parts(settings, sources, cai, tiers)
    }

    /// Custom geometry tiers over an existing context
    pub fn with_parts(
        settings: LocatorSettings,
        sources: Arc<SourceContext>,
        cai: Arc<CaiResolver>,
        tiers: TierChain<GeoPoint, LocatedQuadrant>,
    ) -> Self {
        Self {
            orchestrator: QuadrantOrchestrator::new(tiers, Arc::clone(&cai)),
            settings,
            sources,
            cai,
        }
    }

    pub async fn resolve_quadrant(&self, point: GeoPoint) -> Option<QuadrantRecord> {
        self.orchestrator.resolve_quadrant(point).await
    }

    pub async fn resolve_cai(&self, code: &str, fallback_point: Option<GeoPoint>) -> Option<CaiLocation> {
        self.cai.resolve_cai(code, fallback_point).await
    }

    pub async fn warm_up(&self) -> Vec<WarmUpOutcome> {
        self.sources.warm_up().await
    }

    pub fn sources(&self) -> &Arc<SourceContext> {
        &self.sources
    }

    pub fn settings(&self) -> &LocatorSettings {
        &self.settings
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.orchestrator.tier_names()
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.cai.strategy_names()
    }
}
