//! Local quadrant snapshot
//!
//! Two static files produced by the offline batch scripts:
//! - a GeoJSON `FeatureCollection` of quadrant polygons
//! - a JSON array of personnel records
//!
//! Both are read once per process. File access failures map onto the same
//! [`SourceError`] taxonomy as remote sources so the offline tier folds into
//! the orchestrator like any other.

use super::arcgis::loose_string;
use super::SourceError;
use crate::roster::{build_roster, RawOfficer};
use crate::siv_code::suffix_matches;
use crate::types::{LocatedQuadrant, QuadrantProvenance};
use cuadrante_common::geo::{Area, Polygon, Ring};
use cuadrante_common::GeoPoint;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const SOURCE_NAME: &str = "offline";

const CODE_KEYS: &[&str] = &["NRO_CUADRA", "NRO_CUADRANTE", "CODIGO_SIVICC", "cuadrante", "codigo"];
const NAME_KEYS: &[&str] = &["NOMBRE", "NOMBRE_CUADRANTE", "nombre"];
const CAI_KEYS: &[&str] = &["CAI", "NOMBRE_CAI", "cai"];

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<GeoJsonFeature>,
}

#[derive(Debug, Deserialize)]
struct GeoJsonFeature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<GeoJsonGeometry>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum GeoJsonGeometry {
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
    #[serde(other)]
    Other,
}

impl GeoJsonGeometry {
    fn into_area(self) -> Option<Area> {
        let polygons: Vec<Polygon> = match self {
            Self::Polygon { coordinates } => Polygon::from_rings(coordinates).into_iter().collect(),
            Self::MultiPolygon { coordinates } => {
                coordinates.into_iter().filter_map(Polygon::from_rings).collect()
            }
            Self::Other => Vec::new(),
        };
        let area = Area { polygons };
        (!area.is_empty()).then_some(area)
    }
}

/// One quadrant polygon from the snapshot
#[derive(Debug, Clone)]
pub struct OfflineQuadrant {
    pub code: String,
    pub name: Option<String>,
    pub cai_name: Option<String>,
    pub area: Area,
}

/// One personnel record from the snapshot
#[derive(Debug, Clone, Deserialize)]
pub struct PersonnelRecord {
    #[serde(default, deserialize_with = "loose_string")]
    pub nombre: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub telefono: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub cuadrante: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub estacion: Option<String>,
}

/// Loaded snapshot, in file order
#[derive(Debug, Clone, Default)]
pub struct OfflineSnapshot {
    pub quadrants: Vec<OfflineQuadrant>,
    pub personnel: Vec<PersonnelRecord>,
}

impl OfflineSnapshot {
    /// First quadrant containing `point`, in snapshot order
    ///
    /// Overlapping polygons are not disambiguated: file order decides.
    pub fn locate(&self, point: GeoPoint) -> Option<LocatedQuadrant> {
        let quadrant = self.quadrants.iter().find(|q| q.area.contains(point))?;

        let rows: Vec<RawOfficer> = self
            .personnel
            .iter()
            .filter(|p| {
                p.cuadrante
                    .as_deref()
                    .is_some_and(|code| suffix_matches(code, &quadrant.code))
            })
            .map(|p| RawOfficer::new(p.nombre.clone(), p.telefono.clone()))
            .collect();

        let cai_name = quadrant.cai_name.clone().or_else(|| {
            self.personnel
                .iter()
                .find(|p| {
                    p.cuadrante
                        .as_deref()
                        .is_some_and(|code| suffix_matches(code, &quadrant.code))
                })
                .and_then(|p| p.estacion.clone())
        });

        Some(LocatedQuadrant {
            code: quadrant.code.clone(),
            display_name: quadrant
                .name
                .clone()
                .unwrap_or_else(|| quadrant.code.clone()),
            cai_name,
            roster: build_roster(&rows),
            centroid: quadrant.area.centroid(),
            provenance: QuadrantProvenance::Offline,
        })
    }
}

/// Reads the snapshot files
pub struct OfflineSource {
    quadrants_path: PathBuf,
    personnel_path: PathBuf,
}

impl OfflineSource {
    pub fn new(quadrants_path: impl Into<PathBuf>, personnel_path: impl Into<PathBuf>) -> Self {
        Self {
            quadrants_path: quadrants_path.into(),
            personnel_path: personnel_path.into(),
        }
    }

    /// Load both files
    ///
    /// # Errors
    /// - `Transport` if the polygon file cannot be read
    /// - `Decode` if it is not a GeoJSON feature collection
    /// - `Empty` if it holds no usable polygon
    ///
    /// A missing or broken personnel file only empties the rosters.
    pub async fn load(&self) -> Result<OfflineSnapshot, SourceError> {
        let quadrants = load_quadrants(&self.quadrants_path).await?;
        let personnel = match load_personnel(&self.personnel_path).await {
            Ok(personnel) => personnel,
            Err(err) => {
                warn!(
                    path = %self.personnel_path.display(),
                    error = %err,
                    "Personnel snapshot unavailable, rosters will be empty"
                );
                Vec::new()
            }
        };

        info!(
            quadrants = quadrants.len(),
            personnel = personnel.len(),
            "Offline snapshot loaded"
        );
        Ok(OfflineSnapshot {
            quadrants,
            personnel,
        })
    }
}

async fn read_file(path: &Path) -> Result<String, SourceError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SourceError::transport(SOURCE_NAME, format!("{}: {}", path.display(), e)))
}

async fn load_quadrants(path: &Path) -> Result<Vec<OfflineQuadrant>, SourceError> {
    let content = read_file(path).await?;
    let collection: FeatureCollection = serde_json::from_str(&content)
        .map_err(|e| SourceError::decode(SOURCE_NAME, format!("{}: {}", path.display(), e)))?;

    let quadrants: Vec<OfflineQuadrant> = collection
        .features
        .into_iter()
        .filter_map(|feature| {
            let properties = feature.properties.unwrap_or_default();
            let code = property(&properties, CODE_KEYS)?;
            let area = feature.geometry?.into_area()?;
            Some(OfflineQuadrant {
                code,
                name: property(&properties, NAME_KEYS),
                cai_name: property(&properties, CAI_KEYS),
                area,
            })
        })
        .collect();

    if quadrants.is_empty() {
        return Err(SourceError::empty(SOURCE_NAME));
    }
    Ok(quadrants)
}

async fn load_personnel(path: &Path) -> Result<Vec<PersonnelRecord>, SourceError> {
    let content = read_file(path).await?;
    serde_json::from_str(&content)
        .map_err(|e| SourceError::decode(SOURCE_NAME, format!("{}: {}", path.display(), e)))
}

/// First non-blank property among `keys`, numbers rendered as text
fn property(properties: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match properties.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}
