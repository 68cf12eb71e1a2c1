//! CAI / station multi-tier resolver
//!
//! Locates the command post responsible for a quadrant code. Strategies, in
//! order, each short-circuiting on success:
//!
//! 1. **Gold standard** (capital district only): equipment record by
//!    station+subunit key, then by station preferring the same subunit, then
//!    the nearest record to the fallback point within the radius
//! 2. **WebMap index**: CAI sharing the station, disambiguated by subunit
//!    numeral, else the lowest-numbered candidate (the station's main post)
//! 3. **Logical directory**: responsible unit by exact code or
//!    `(station, serial)`, joined to the WebMap index by unit name
//! 4. **Nearest neighbor**: closest cached CAI to the fallback point within
//!    the radius
//!
//! A miss everywhere is `None`: the quadrant is known, its CAI is not.

use super::{run_chain, Tier, TierChain};
use crate::context::SourceContext;
use crate::siv_code::{SivCode, CAPITAL_UNIT};
use crate::sources::gold_standard::EquipmentRecord;
use crate::sources::logical_directory::{find_record, DirectoryRecord};
use crate::sources::webmap_index::CaiIndexEntry;
use crate::types::{CaiLocation, Hierarchy, LocationProvenance, TierOutcome};
use async_trait::async_trait;
use cuadrante_common::geo::BoundingBox;
use cuadrante_common::text::normalize_unit_name;
use cuadrante_common::GeoPoint;
use std::sync::Arc;
use tracing::{debug, info};

/// Capital-district extent used when the code carries no agency unit
pub const CAPITAL_DISTRICT_BOUNDS: BoundingBox = BoundingBox {
    min_lat: 3.73,
    max_lat: 4.84,
    min_lng: -74.45,
    max_lng: -73.98,
};

/// Input shared by every CAI strategy
#[derive(Debug, Clone)]
pub struct CaiQuery {
    pub code: String,
    pub parsed: Option<SivCode>,
    pub fallback_point: Option<GeoPoint>,
}

impl CaiQuery {
    pub fn new(code: &str, fallback_point: Option<GeoPoint>) -> Self {
        Self {
            code: code.to_string(),
            parsed: SivCode::parse(code),
            fallback_point: fallback_point.filter(GeoPoint::is_valid),
        }
    }

    /// Whether the gold-standard directory applies
    pub fn is_capital_district(&self) -> bool {
        self.parsed.as_ref().is_some_and(SivCode::is_capital_district)
            || self.code.to_uppercase().contains(CAPITAL_UNIT)
            || self
                .fallback_point
                .is_some_and(|p| CAPITAL_DISTRICT_BOUNDS.contains(p))
    }
}

// ============================================================================
// Matching (pure)
// ============================================================================

/// Gold-standard equipment record for a code, or nearest to `fallback`
pub fn match_equipment<'a>(
    records: &'a [EquipmentRecord],
    parsed: Option<&SivCode>,
    fallback: Option<GeoPoint>,
    radius_km: f64,
) -> Option<&'a EquipmentRecord> {
    let located = || records.iter().filter(|r| r.point.is_some());

    if let Some(code) = parsed {
        let key = code.station_subunit();
        if let Some(exact) = located().find(|r| r.key == key) {
            return Some(exact);
        }

        let wanted = code.subunit_number();
        let same_station: Vec<&EquipmentRecord> =
            located().filter(|r| r.key.starts_with(&code.station)).collect();
        let same_subunit = wanted.and_then(|n| {
            same_station
                .iter()
                .copied()
                .find(|r| r.parsed.as_ref().and_then(SivCode::subunit_number) == Some(n))
        });
        if let Some(hit) = same_subunit.or_else(|| same_station.first().copied()) {
            return Some(hit);
        }
    }

    let origin = fallback?;
    nearest_within(located().filter_map(|r| Some((r, r.point?))), origin, radius_km)
}

/// WebMap entry for a parsed code: same station, then same subunit numeral,
/// else the lowest-numbered candidate
pub fn match_webmap<'a>(entries: &'a [CaiIndexEntry], parsed: &SivCode) -> Option<&'a CaiIndexEntry> {
    let candidates: Vec<&CaiIndexEntry> = entries
        .iter()
        .filter(|e| e.parsed.as_ref().is_some_and(|p| p.station == parsed.station))
        .collect();

    if candidates.len() > 1 {
        if let Some(wanted) = parsed.subunit_number() {
            let same_subunit = candidates
                .iter()
                .copied()
                .find(|e| e.parsed.as_ref().and_then(SivCode::subunit_number) == Some(wanted));
            if same_subunit.is_some() {
                return same_subunit;
            }
        }
    }

    // min_by_key keeps the first of equal keys, so index order breaks ties
    candidates.into_iter().min_by_key(|e| {
        let p = e.parsed.as_ref();
        (
            p.and_then(SivCode::subunit_number).unwrap_or(0),
            p.and_then(SivCode::serial_number).unwrap_or(0),
        )
    })
}

/// WebMap entry whose name contains, or is contained in, the unit name
///
/// Ties go to the highest Jaro-Winkler similarity, then to index order.
pub fn join_by_name<'a>(entries: &'a [CaiIndexEntry], unit_name: &str) -> Option<&'a CaiIndexEntry> {
    let wanted = normalize_unit_name(unit_name);
    if wanted.is_empty() {
        return None;
    }

    let mut best: Option<(&CaiIndexEntry, f64)> = None;
    for entry in entries {
        let candidate = entry.match_name.as_str();
        if candidate.is_empty() || !(candidate.contains(&wanted) || wanted.contains(candidate)) {
            continue;
        }
        let score = strsim::jaro_winkler(&wanted, candidate);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((entry, score));
        }
    }
    best.map(|(entry, _)| entry)
}

/// Nearest item to `origin` no farther than `radius_km`
pub fn nearest_within<T>(
    items: impl Iterator<Item = (T, GeoPoint)>,
    origin: GeoPoint,
    radius_km: f64,
) -> Option<T> {
    items
        .map(|(item, point)| (item, origin.distance_km(&point)))
        .filter(|(_, d)| *d <= radius_km)
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(item, _)| item)
}

fn from_equipment(record: &EquipmentRecord, point: GeoPoint, provenance: LocationProvenance) -> CaiLocation {
    CaiLocation {
        point,
        name: record.detail.name.clone(),
        provenance,
        station: Some(record.detail.clone()),
    }
}

fn from_index(entry: &CaiIndexEntry, provenance: LocationProvenance) -> CaiLocation {
    CaiLocation {
        point: entry.point,
        name: entry.detail.name.clone(),
        provenance,
        station: Some(entry.detail.clone()),
    }
}

// ============================================================================
// Strategies
// ============================================================================

pub struct GoldStandardStrategy {
    sources: Arc<SourceContext>,
    radius_km: f64,
}

impl GoldStandardStrategy {
    pub fn new(sources: Arc<SourceContext>, radius_km: f64) -> Self {
        Self { sources, radius_km }
    }
}

#[async_trait]
impl Tier<CaiQuery, CaiLocation> for GoldStandardStrategy {
    fn name(&self) -> &'static str {
        "gold_standard"
    }

    async fn attempt(&self, query: &CaiQuery) -> TierOutcome<CaiLocation> {
        if !query.is_capital_district() {
            debug!(code = %query.code, "Outside the capital district, gold standard skipped");
            return TierOutcome::NotFound;
        }
        let records = match self.sources.equipment().await {
            Ok(records) => records,
            Err(err) => return TierOutcome::SourceFailed(err),
        };
        match_equipment(&records, query.parsed.as_ref(), query.fallback_point, self.radius_km)
            .and_then(|r| Some(from_equipment(r, r.point?, LocationProvenance::GoldStandard)))
            .map_or(TierOutcome::NotFound, TierOutcome::Found)
    }
}

pub struct WebMapStrategy {
    sources: Arc<SourceContext>,
}

impl WebMapStrategy {
    pub fn new(sources: Arc<SourceContext>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Tier<CaiQuery, CaiLocation> for WebMapStrategy {
    fn name(&self) -> &'static str {
        "webmap_index"
    }

    async fn attempt(&self, query: &CaiQuery) -> TierOutcome<CaiLocation> {
        let Some(parsed) = query.parsed.as_ref() else {
            return TierOutcome::NotFound;
        };
        let entries = match self.sources.cai_index().await {
            Ok(entries) => entries,
            Err(err) => return TierOutcome::SourceFailed(err),
        };
        match_webmap(&entries, parsed)
            .map(|e| from_index(e, LocationProvenance::WebMapIndex))
            .map_or(TierOutcome::NotFound, TierOutcome::Found)
    }
}

pub struct LogicalDirectoryStrategy {
    sources: Arc<SourceContext>,
}

impl LogicalDirectoryStrategy {
    pub fn new(sources: Arc<SourceContext>) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl Tier<CaiQuery, CaiLocation> for LogicalDirectoryStrategy {
    fn name(&self) -> &'static str {
        "logical_directory"
    }

    async fn attempt(&self, query: &CaiQuery) -> TierOutcome<CaiLocation> {
        let directory = match self.sources.directory().await {
            Ok(directory) => directory,
            Err(err) => return TierOutcome::SourceFailed(err),
        };
        let Some(unit) = find_record(&directory, &query.code, query.parsed.as_ref())
            .and_then(|r| r.unit.as_deref())
        else {
            return TierOutcome::NotFound;
        };

        // Names only: without a WebMap join there is no coordinate to return
        let entries = match self.sources.cai_index().await {
            Ok(entries) => entries,
            Err(err) => return TierOutcome::SourceFailed(err),
        };
        match join_by_name(&entries, unit) {
            Some(entry) => TierOutcome::Found(from_index(entry, LocationProvenance::LogicalDirectory)),
            None => {
                debug!(code = %query.code, unit, "Directory unit has no WebMap counterpart");
                TierOutcome::NotFound
            }
        }
    }
}

pub struct NearestNeighborStrategy {
    sources: Arc<SourceContext>,
    radius_km: f64,
}

impl NearestNeighborStrategy {
    pub fn new(sources: Arc<SourceContext>, radius_km: f64) -> Self {
        Self { sources, radius_km }
    }
}

#[async_trait]
impl Tier<CaiQuery, CaiLocation> for NearestNeighborStrategy {
    fn name(&self) -> &'static str {
        "nearest_neighbor"
    }

    async fn attempt(&self, query: &CaiQuery) -> TierOutcome<CaiLocation> {
        let Some(origin) = query.fallback_point else {
            return TierOutcome::NotFound;
        };

        // Whatever is cached or loadable; one unavailable index is not fatal
        let (index, equipment) = tokio::join!(self.sources.cai_index(), self.sources.equipment());
        if let (Err(err), Err(_)) = (&index, &equipment) {
            return TierOutcome::SourceFailed(err.clone());
        }

        let index_points = index
            .iter()
            .flat_map(|entries| entries.iter())
            .map(|e| (from_index(e, LocationProvenance::NearestNeighbor), e.point));
        let equipment_points = equipment.iter().flat_map(|records| records.iter()).filter_map(|r| {
            let point = r.point?;
            Some((from_equipment(r, point, LocationProvenance::NearestNeighbor), point))
        });

        nearest_within(index_points.chain(equipment_points), origin, self.radius_km)
            .map_or(TierOutcome::NotFound, TierOutcome::Found)
    }
}

// ============================================================================
// Resolver
// ============================================================================

pub struct CaiResolver {
    strategies: TierChain<CaiQuery, CaiLocation>,
    sources: Arc<SourceContext>,
}

impl CaiResolver {
    /// Standard four-tier chain
    pub fn new(sources: Arc<SourceContext>, radius_km: f64) -> Self {
        let strategies: TierChain<CaiQuery, CaiLocation> = vec![
            Box::new(GoldStandardStrategy::new(Arc::clone(&sources), radius_km)),
            Box::new(WebMapStrategy::new(Arc::clone(&sources))),
            Box::new(LogicalDirectoryStrategy::new(Arc::clone(&sources))),
            Box::new(NearestNeighborStrategy::new(Arc::clone(&sources), radius_km)),
        ];
        Self::with_strategies(sources, strategies)
    }

    pub fn with_strategies(sources: Arc<SourceContext>, strategies: TierChain<CaiQuery, CaiLocation>) -> Self {
        Self { strategies, sources }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Locate the CAI for `code`, using `fallback_point` for proximity tiers
    pub async fn resolve_cai(&self, code: &str, fallback_point: Option<GeoPoint>) -> Option<CaiLocation> {
        let query = CaiQuery::new(code, fallback_point);
        match run_chain("cai", &self.strategies, &query).await.found() {
            Some((tier, location)) => {
                info!(code, tier, cai = %location.name, "CAI located");
                Some(location)
            }
            None => {
                debug!(code, "CAI location unknown");
                None
            }
        }
    }

    /// Administrative placement of a quadrant
    ///
    /// Directory fields when the directory knows the code; otherwise only the
    /// station and subunit codes parsed from the code itself.
    pub async fn hierarchy(&self, code: &str) -> Option<Hierarchy> {
        let parsed = SivCode::parse(code);
        let record = match self.sources.directory().await {
            Ok(directory) => find_record(&directory, code, parsed.as_ref()).cloned(),
            Err(err) => {
                debug!(code, error = %err, "Directory unavailable for hierarchy");
                None
            }
        };
        build_hierarchy(record.as_ref(), parsed.as_ref())
    }
}

fn build_hierarchy(record: Option<&DirectoryRecord>, parsed: Option<&SivCode>) -> Option<Hierarchy> {
    let code = parsed.or_else(|| record.and_then(|r| r.parsed.as_ref()));
    if record.is_none() && code.is_none() {
        return None;
    }
    Some(Hierarchy {
        department: record.and_then(|r| r.department.clone()),
        station: record.and_then(|r| r.station.clone()),
        station_code: code.map(|c| c.station.clone()),
        subunit_code: code.and_then(|c| c.subunit.clone()),
        phone: record.and_then(|r| r.phone.clone()),
    })
}
