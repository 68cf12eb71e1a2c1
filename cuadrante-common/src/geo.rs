//! Geodesy primitives
//!
//! Coordinates are WGS84 degrees. Polygon rings follow the GeoJSON/ArcGIS
//! convention of `[longitude, latitude]` pairs; [`GeoPoint`] stores the
//! pair the other way round because every caller reasons in lat/lng.
//!
//! Distances use the Haversine formula on a spherical Earth, which is well
//! within tolerance for the kilometre-scale cutoffs used in CAI matching.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres (IUGG)
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// A WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both components are finite and inside the WGS84 range
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Great-circle distance to `other` in kilometres
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(*self, *other)
    }
}

/// Haversine great-circle distance in kilometres
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Axis-aligned bounding box in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn contains(&self, p: GeoPoint) -> bool {
        p.lat >= self.min_lat && p.lat <= self.max_lat && p.lng >= self.min_lng && p.lng <= self.max_lng
    }
}

/// A ring of `[lng, lat]` positions; closing position optional
pub type Ring = Vec<[f64; 2]>;

/// A polygon with one exterior ring and zero or more holes
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    pub exterior: Ring,
    pub holes: Vec<Ring>,
}

impl Polygon {
    /// Build from GeoJSON-style rings (first ring exterior, rest holes)
    pub fn from_rings(mut rings: Vec<Ring>) -> Option<Self> {
        if rings.is_empty() {
            return None;
        }
        let exterior = rings.remove(0);
        if exterior.len() < 3 {
            return None;
        }
        Some(Self { exterior, holes: rings })
    }

    /// Point-in-polygon test; points inside a hole are outside
    pub fn contains(&self, p: GeoPoint) -> bool {
        ring_contains(&self.exterior, p) && !self.holes.iter().any(|h| ring_contains(h, p))
    }

    /// Area-weighted centroid of the exterior ring
    ///
    /// Degenerate (zero-area) rings fall back to the vertex mean.
    pub fn centroid(&self) -> Option<GeoPoint> {
        ring_centroid(&self.exterior)
    }
}

/// A set of polygons treated as one area (GeoJSON MultiPolygon)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Area {
    pub polygons: Vec<Polygon>,
}

impl Area {
    pub fn contains(&self, p: GeoPoint) -> bool {
        self.polygons.iter().any(|poly| poly.contains(p))
    }

    /// Centroid of the largest member polygon
    pub fn centroid(&self) -> Option<GeoPoint> {
        self.polygons
            .iter()
            .max_by(|a, b| {
                ring_area(&a.exterior)
                    .abs()
                    .partial_cmp(&ring_area(&b.exterior).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .and_then(Polygon::centroid)
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

/// Even-odd ray casting against one ring
pub fn ring_contains(ring: &[[f64; 2]], p: GeoPoint) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let (x, y) = (p.lng, p.lat);
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Signed shoelace area in square degrees
fn ring_area(ring: &[[f64; 2]]) -> f64 {
    let n = ring.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let [x0, y0] = ring[i];
        let [x1, y1] = ring[(i + 1) % n];
        sum += x0 * y1 - x1 * y0;
    }
    sum / 2.0
}

fn ring_centroid(ring: &[[f64; 2]]) -> Option<GeoPoint> {
    let n = ring.len();
    if n == 0 {
        return None;
    }

    let area = ring_area(ring);
    if area.abs() < f64::EPSILON {
        let (sx, sy) = ring
            .iter()
            .fold((0.0, 0.0), |(sx, sy), [x, y]| (sx + x, sy + y));
        return Some(GeoPoint::new(sy / n as f64, sx / n as f64));
    }

    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let [x0, y0] = ring[i];
        let [x1, y1] = ring[(i + 1) % n];
        let cross = x0 * y1 - x1 * y0;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }
    let factor = 1.0 / (6.0 * area);
    Some(GeoPoint::new(cy * factor, cx * factor))
}
