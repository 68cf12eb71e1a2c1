//! Core Types for the quadrant locator
//!
//! Defines the query-scoped records produced by the resolution pipeline:
//! - **Quadrant:** `QuadrantRecord` with its roster and provenance
//! - **CAI location:** `CaiLocation` with its own, independent provenance
//! - **Tier outcomes:** tri-state `TierOutcome` folded by the orchestrators
//!
//! Nothing here outlives a query or a cache entry.

use crate::sources::SourceError;
use cuadrante_common::GeoPoint;
use serde::{Deserialize, Serialize};

// ============================================================================
// Provenance
// ============================================================================

/// Geometry source that identified the quadrant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuadrantProvenance {
    /// Authoritative quadrant polygon service
    Official,
    /// Secondary, independently operated quadrant service
    Alternative,
    /// Local GeoJSON snapshot
    Offline,
}

impl QuadrantProvenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Alternative => "alternative",
            Self::Offline => "offline",
        }
    }
}

/// Correlation tier that located the CAI coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationProvenance {
    /// Capital-district equipment directory
    GoldStandard,
    /// National CAI WebMap index
    WebMapIndex,
    /// National logical directory joined to the WebMap index by name
    LogicalDirectory,
    /// Nearest cached CAI within the distance cutoff
    NearestNeighbor,
}

impl LocationProvenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoldStandard => "gold_standard",
            Self::WebMapIndex => "webmap_index",
            Self::LogicalDirectory => "logical_directory",
            Self::NearestNeighbor => "nearest_neighbor",
        }
    }
}

// ============================================================================
// Tier outcomes
// ============================================================================

/// Result of one named strategy in an ordered fallback chain
///
/// `NotFound` is a clean "not present here"; `SourceFailed` means the source
/// could not answer. Both move the chain on to the next tier.
#[derive(Debug)]
pub enum TierOutcome<T> {
    Found(T),
    NotFound,
    SourceFailed(SourceError),
}

impl<T> TierOutcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<Result<Option<T>, SourceError>> for TierOutcome<T> {
    /// `Empty` from a source is absence, not failure
    fn from(result: Result<Option<T>, SourceError>) -> Self {
        match result {
            Ok(Some(value)) => Self::Found(value),
            Ok(None) => Self::NotFound,
            Err(SourceError::Empty { .. }) => Self::NotFound,
            Err(err) => Self::SourceFailed(err),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// One officer assigned to a quadrant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Officer {
    /// Upper-cased, whitespace-collapsed
    pub name: String,
    /// Literal `"unknown"` when the source has none
    pub phone: String,
    /// Rank abbreviation, else first two characters of the name
    pub initials: String,
}

/// Contact detail of the station or CAI that serves a quadrant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationDetail {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Administrative placement of a quadrant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hierarchy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subunit_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A located CAI (command post)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaiLocation {
    pub point: GeoPoint,
    pub name: String,
    pub provenance: LocationProvenance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station: Option<StationDetail>,
}

/// Fully resolved quadrant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuadrantRecord {
    /// Raw code as reported by the geometry source
    pub id: String,
    pub display_name: String,
    /// Source order; the first officer is conventionally the shift lead
    pub roster: Vec<Officer>,
    pub cai_location: Option<CaiLocation>,
    pub station_info: Option<StationDetail>,
    pub hierarchy: Option<Hierarchy>,
    pub provenance: QuadrantProvenance,
    pub location_provenance: Option<LocationProvenance>,
}

/// Output of a geometry tier before CAI correlation
#[derive(Debug, Clone, PartialEq)]
pub struct LocatedQuadrant {
    pub code: String,
    pub display_name: String,
    /// CAI name derived from polygon attributes or the roster
    pub cai_name: Option<String>,
    pub roster: Vec<Officer>,
    /// Polygon centroid, or direct coordinates when no geometry came back
    pub centroid: Option<GeoPoint>,
    pub provenance: QuadrantProvenance,
}
