//! ArcGIS REST query format shared by the geometry, roster and CAI index services
//!
//! Responses look like:
//!
//! ```json
//! {"features": [{"attributes": {...}, "geometry": {"rings": [[[lng, lat], ...]]}}]}
//! {"features": [{"attributes": {...}, "geometry": {"x": lng, "y": lat}}]}
//! {"error": {"code": 400, "message": "..."}}
//! ```
//!
//! Attribute values are loosely typed upstream (phones as numbers, coordinates
//! as strings), hence the lenient deserializers below.

use super::SourcePayload;
use cuadrante_common::geo::{Area, Polygon, Ring};
use cuadrante_common::GeoPoint;
use serde::{Deserialize, Deserializer};

/// Feature set returned by a `query` operation
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureSet<A> {
    #[serde(default = "Vec::new")]
    pub features: Vec<Feature<A>>,
}

impl<A> SourcePayload for FeatureSet<A> {
    fn is_empty_payload(&self) -> bool {
        self.features.is_empty()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Feature<A> {
    pub attributes: A,
    #[serde(default)]
    pub geometry: Option<EsriGeometry>,
}

/// Polygon (`rings`) or point (`x`/`y`) geometry in WGS84
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EsriGeometry {
    #[serde(default)]
    pub rings: Option<Vec<Ring>>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

impl EsriGeometry {
    /// Polygon rings as an area
    ///
    /// ArcGIS does not separate polygons from holes; clockwise rings are
    /// exteriors and counter-clockwise rings are holes of the preceding
    /// exterior.
    pub fn area(&self) -> Option<Area> {
        let rings = self.rings.as_ref()?;
        let mut polygons: Vec<Polygon> = Vec::new();
        for ring in rings.iter().filter(|r| r.len() >= 3) {
            if is_clockwise(ring) || polygons.is_empty() {
                polygons.push(Polygon {
                    exterior: ring.clone(),
                    holes: Vec::new(),
                });
            } else if let Some(last) = polygons.last_mut() {
                last.holes.push(ring.clone());
            }
        }
        if polygons.is_empty() {
            None
        } else {
            Some(Area { polygons })
        }
    }

    pub fn point(&self) -> Option<GeoPoint> {
        match (self.y, self.x) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }
}

fn is_clockwise(ring: &[[f64; 2]]) -> bool {
    let n = ring.len();
    let mut sum = 0.0;
    for i in 0..n {
        let [x0, y0] = ring[i];
        let [x1, y1] = ring[(i + 1) % n];
        sum += (x1 - x0) * (y1 + y0);
    }
    sum > 0.0
}

/// Point-intersects query for a polygon layer
pub fn point_query(point: GeoPoint) -> Vec<(&'static str, String)> {
    vec![
        ("geometry", format!("{},{}", point.lng, point.lat)),
        ("geometryType", "esriGeometryPoint".to_string()),
        ("inSR", "4326".to_string()),
        ("spatialRel", "esriSpatialRelIntersects".to_string()),
        ("outFields", "*".to_string()),
        ("returnGeometry", "true".to_string()),
        ("outSR", "4326".to_string()),
        ("f", "json".to_string()),
    ]
}

/// Attribute filter query
pub fn where_query(clause: String, return_geometry: bool) -> Vec<(&'static str, String)> {
    vec![
        ("where", clause),
        ("outFields", "*".to_string()),
        ("returnGeometry", return_geometry.to_string()),
        ("outSR", "4326".to_string()),
        ("f", "json".to_string()),
    ]
}

/// Placeholder CAI names, in `normalize_name` form
const GENERIC_CAI_NAMES: &[&str] = &["CAI", "SIN INFORMACION", "SIN DATO", "N A", "NA", "NULL"];

/// CAI display name from polygon attributes, else from the first roster row
pub fn cai_display_name(polygon_value: Option<&str>, first_roster_station: Option<&str>) -> Option<String> {
    let usable = |name: &&str| {
        let folded = cuadrante_common::text::normalize_name(name);
        !folded.is_empty() && !GENERIC_CAI_NAMES.contains(&folded.as_str())
    };
    polygon_value
        .filter(usable)
        .or_else(|| first_roster_station.filter(usable))
        .map(str::to_string)
}

/// Centroid of a polygon feature, else its direct coordinate attributes
pub fn feature_centroid(
    geometry: Option<&EsriGeometry>,
    lat: Option<f64>,
    lng: Option<f64>,
) -> Option<GeoPoint> {
    geometry
        .and_then(EsriGeometry::area)
        .and_then(|area| area.centroid())
        .or_else(|| Some(GeoPoint::new(lat?, lng?)))
        .filter(GeoPoint::is_valid)
}

/// Accept a string, a number, or null; blank strings become `None`
pub fn loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(serde_json::Value::Number(n)) => Some(match n.as_i64() {
            Some(i) => i.to_string(),
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 => format!("{}", f as i64),
                _ => n.to_string(),
            },
        }),
        _ => None,
    })
}

/// Accept a number or a numeric string; anything else becomes `None`
pub fn loose_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
    .filter(|f: &f64| f.is_finite()))
}
