//! Official quadrant service
//!
//! Authoritative ArcGIS polygon layer plus its roster table. Resolution is two
//! dependent steps: point-intersects on the polygon layer, then a roster query
//! filtered by exact quadrant code.

use super::arcgis::{
    cai_display_name, feature_centroid, loose_f64, loose_string, point_query, where_query,
    FeatureSet,
};
use super::{sql_literal, SourceClient, SourceError};
use crate::roster::{build_roster, RawOfficer};
use crate::types::{LocatedQuadrant, QuadrantProvenance};
use cuadrante_common::GeoPoint;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
struct PolygonAttributes {
    #[serde(
        rename = "NRO_CUADRANTE",
        alias = "CODIGO_SIVICC",
        default,
        deserialize_with = "loose_string"
    )]
    code: Option<String>,
    #[serde(rename = "NOMBRE_CUADRANTE", default, deserialize_with = "loose_string")]
    name: Option<String>,
    #[serde(rename = "NOMBRE_CAI", default, deserialize_with = "loose_string")]
    cai_name: Option<String>,
    #[serde(rename = "LATITUD", default, deserialize_with = "loose_f64")]
    lat: Option<f64>,
    #[serde(rename = "LONGITUD", default, deserialize_with = "loose_f64")]
    lng: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct RosterAttributes {
    #[serde(rename = "NOMBRE", default, deserialize_with = "loose_string")]
    name: Option<String>,
    #[serde(rename = "TELEFONO", default, deserialize_with = "loose_string")]
    phone: Option<String>,
    #[serde(rename = "ESTACION", default, deserialize_with = "loose_string")]
    station: Option<String>,
}

pub struct OfficialSource {
    client: SourceClient,
    geometry_url: String,
    roster_url: String,
}

impl OfficialSource {
    pub fn new(client: SourceClient, geometry_url: impl Into<String>, roster_url: impl Into<String>) -> Self {
        Self {
            client,
            geometry_url: geometry_url.into(),
            roster_url: roster_url.into(),
        }
    }

    /// Quadrant containing `point`, with its roster
    ///
    /// `Err(Empty)` when the layer has no polygon at the point. A failed roster
    /// query leaves the roster empty instead of failing the tier.
    pub async fn locate(&self, point: GeoPoint) -> Result<LocatedQuadrant, SourceError> {
        let set: FeatureSet<PolygonAttributes> = self
            .client
            .call(&self.geometry_url, &point_query(point))
            .await?;

        let (attributes, geometry) = set
            .features
            .into_iter()
            .find_map(|f| f.attributes.code.is_some().then_some((f.attributes, f.geometry)))
            .ok_or_else(|| SourceError::empty(self.client.name()))?;
        let code = attributes.code.clone().unwrap_or_default();

        let roster_rows = self.roster(&code).await;
        let first_station = roster_rows.first().and_then(|r| r.station.as_deref());
        let cai_name = cai_display_name(attributes.cai_name.as_deref(), first_station);
        let raw: Vec<RawOfficer> = roster_rows
            .iter()
            .map(|r| RawOfficer::new(r.name.clone(), r.phone.clone()))
            .collect();

        Ok(LocatedQuadrant {
            display_name: attributes.name.clone().unwrap_or_else(|| code.clone()),
            centroid: feature_centroid(geometry.as_ref(), attributes.lat, attributes.lng),
            roster: build_roster(&raw),
            cai_name,
            code,
            provenance: QuadrantProvenance::Official,
        })
    }

    async fn roster(&self, code: &str) -> Vec<RosterAttributes> {
        let clause = format!("NRO_CUADRANTE = '{}'", sql_literal(code));
        match self
            .client
            .call::<FeatureSet<RosterAttributes>>(&self.roster_url, &where_query(clause, false))
            .await
        {
            Ok(set) => set.features.into_iter().map(|f| f.attributes).collect(),
            Err(err) if err.is_empty() => Vec::new(),
            Err(err) => {
                warn!(source = self.client.name(), code, error = %err, "Roster query failed");
                Vec::new()
            }
        }
    }
}
