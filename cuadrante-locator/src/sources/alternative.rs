//! Alternative quadrant service
//!
//! Independently operated ArcGIS service with its own attribute schema. Its
//! roster table indexes quadrant codes loosely, so roster rows are selected by
//! substring on the code's serial without leading zeros, then narrowed to rows
//! whose own code names the quadrant.

use super::arcgis::{
    cai_display_name, feature_centroid, loose_string, point_query, where_query, FeatureSet,
};
use super::{sql_literal, SourceClient, SourceError};
use crate::roster::{build_roster, RawOfficer};
use crate::siv_code::{loose_serial, suffix_matches};
use crate::types::{LocatedQuadrant, QuadrantProvenance};
use cuadrante_common::GeoPoint;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
struct PolygonAttributes {
    #[serde(rename = "CUADRANTE", default, deserialize_with = "loose_string")]
    code: Option<String>,
    #[serde(rename = "NOMBRE", default, deserialize_with = "loose_string")]
    name: Option<String>,
    #[serde(rename = "CAI", default, deserialize_with = "loose_string")]
    cai_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RosterAttributes {
    #[serde(rename = "FUNCIONARIO", default, deserialize_with = "loose_string")]
    name: Option<String>,
    #[serde(rename = "CELULAR", default, deserialize_with = "loose_string")]
    phone: Option<String>,
    #[serde(rename = "UNIDAD", default, deserialize_with = "loose_string")]
    unit: Option<String>,
    #[serde(rename = "CUADRANTE", default, deserialize_with = "loose_string")]
    code: Option<String>,
}

pub struct AlternativeSource {
    client: SourceClient,
    geometry_url: String,
    roster_url: String,
}

impl AlternativeSource {
    pub fn new(client: SourceClient, geometry_url: impl Into<String>, roster_url: impl Into<String>) -> Self {
        Self {
            client,
            geometry_url: geometry_url.into(),
            roster_url: roster_url.into(),
        }
    }

    pub async fn locate(&self, point: GeoPoint) -> Result<LocatedQuadrant, SourceError> {
        let set: FeatureSet<PolygonAttributes> = self
            .client
            .call(&self.geometry_url, &point_query(point))
            .await?;

        let feature = set
            .features
            .into_iter()
            .find(|f| f.attributes.code.is_some())
            .ok_or_else(|| SourceError::empty(self.client.name()))?;
        let attributes = feature.attributes;
        let code = attributes.code.clone().unwrap_or_default();

        let roster_rows = self.roster(&code).await;
        let first_unit = roster_rows.first().and_then(|r| r.unit.as_deref());
        let cai_name = cai_display_name(attributes.cai_name.as_deref(), first_unit);
        let raw: Vec<RawOfficer> = roster_rows
            .iter()
            .map(|r| RawOfficer::new(r.name.clone(), r.phone.clone()))
            .collect();

        Ok(LocatedQuadrant {
            display_name: attributes.name.clone().unwrap_or_else(|| code.clone()),
            centroid: feature_centroid(feature.geometry.as_ref(), None, None),
            roster: build_roster(&raw),
            cai_name,
            code,
            provenance: QuadrantProvenance::Alternative,
        })
    }

    async fn roster(&self, code: &str) -> Vec<RosterAttributes> {
        let Some(serial) = loose_serial(code) else {
            return Vec::new();
        };
        let clause = format!("CUADRANTE LIKE '%{}%'", sql_literal(serial));
        match self
            .client
            .call::<FeatureSet<RosterAttributes>>(&self.roster_url, &where_query(clause, false))
            .await
        {
            Ok(set) => set
                .features
                .into_iter()
                .map(|f| f.attributes)
                .filter(|row| row.code.as_deref().map_or(true, |c| suffix_matches(c, code)))
                .collect(),
            Err(err) if err.is_empty() => Vec::new(),
            Err(err) => {
                warn!(source = self.client.name(), code, error = %err, "Roster query failed");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::StaticTransport;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const GEOMETRY: &str = "http://alt/0/query";
    const ROSTER: &str = "http://alt/1/query";

    #[tokio::test]
    async fn test_roster_filtered_by_suffix() {
        let transport = Arc::new(
            StaticTransport::new()
                .json(
                    GEOMETRY,
                    json!({"features": [{
                        "attributes": {"CUADRANTE": "MEVALMNVCCD03E12S07000123", "NOMBRE": "Cuadrante 123", "CAI": ""},
                        "geometry": {"rings": [[[-76.6, 3.4], [-76.6, 3.5], [-76.5, 3.5], [-76.5, 3.4], [-76.6, 3.4]]]}
                    }]}),
                )
                .json(
                    ROSTER,
                    json!({"features": [
                        {"attributes": {"FUNCIONARIO": "PT LINA MORA", "CELULAR": 3159998877u64, "UNIDAD": "CAI SAN FERNANDO", "CUADRANTE": "123"}},
                        {"attributes": {"FUNCIONARIO": "SI OTRO SERIAL", "CUADRANTE": "1234"}},
                        {"attributes": {"FUNCIONARIO": "SI OTRA ESTACION", "CUADRANTE": "MEVALMNVCCD03E04C01000123"}},
                        {"attributes": {"FUNCIONARIO": "IT SIN CODIGO"}}
                    ]}),
                ),
        );
        let source = AlternativeSource::new(
            SourceClient::new("alternative", Duration::from_secs(10), transport.clone()),
            GEOMETRY,
            ROSTER,
        );

        let located = source.locate(GeoPoint::new(3.45, -76.55)).await.unwrap();
        assert_eq!(located.provenance, QuadrantProvenance::Alternative);
        assert_eq!(located.display_name, "Cuadrante 123");
        assert_eq!(located.cai_name.as_deref(), Some("CAI SAN FERNANDO"));
        assert_eq!(located.roster[0].initials, "PT");
        assert_eq!(located.roster[0].phone, "3159998877");
        let names: Vec<&str> = located.roster.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["PT LINA MORA", "IT SIN CODIGO"]);

        let seen = transport.seen_queries.lock().unwrap();
        assert!(seen[1]
            .1
            .contains(&("where".to_string(), "CUADRANTE LIKE '%123%'".to_string())));
    }
}
