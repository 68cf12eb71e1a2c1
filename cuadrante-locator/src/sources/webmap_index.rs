//! National CAI WebMap index
//!
//! Point layer with one feature per CAI nationwide. Downloaded whole and
//! cached; every lookup against it is in-memory.

use super::arcgis::{loose_f64, loose_string, where_query, FeatureSet};
use super::{SourceClient, SourceError};
use crate::siv_code::SivCode;
use crate::types::StationDetail;
use cuadrante_common::text::normalize_unit_name;
use cuadrante_common::GeoPoint;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
struct CaiAttributes {
    #[serde(rename = "CODIGO_SIV", default, deserialize_with = "loose_string")]
    code: Option<String>,
    #[serde(rename = "NOMBRE", default, deserialize_with = "loose_string")]
    name: Option<String>,
    #[serde(rename = "DIRECCION", default, deserialize_with = "loose_string")]
    address: Option<String>,
    #[serde(rename = "TELEFONO", default, deserialize_with = "loose_string")]
    phone: Option<String>,
    #[serde(rename = "CORREO", default, deserialize_with = "loose_string")]
    email: Option<String>,
    #[serde(rename = "LATITUD", default, deserialize_with = "loose_f64")]
    lat: Option<f64>,
    #[serde(rename = "LONGITUD", default, deserialize_with = "loose_f64")]
    lng: Option<f64>,
}

/// One located CAI
#[derive(Debug, Clone, PartialEq)]
pub struct CaiIndexEntry {
    pub code: Option<String>,
    pub parsed: Option<SivCode>,
    pub point: GeoPoint,
    pub detail: StationDetail,
    /// `normalize_unit_name` of the CAI name, precomputed for joins
    pub match_name: String,
}

impl CaiIndexEntry {
    pub fn new(code: Option<String>, point: GeoPoint, detail: StationDetail) -> Self {
        Self {
            parsed: code.as_deref().and_then(SivCode::parse),
            match_name: normalize_unit_name(&detail.name),
            code,
            point,
            detail,
        }
    }
}

pub struct WebMapIndexSource {
    client: SourceClient,
    url: String,
}

impl WebMapIndexSource {
    pub fn new(client: SourceClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Download every CAI point, keeping feature order
    pub async fn fetch(&self) -> Result<Vec<CaiIndexEntry>, SourceError> {
        let query = where_query("1=1".to_string(), true);
        let set: FeatureSet<CaiAttributes> = self.client.call(&self.url, &query).await?;

        let total = set.features.len();
        let entries: Vec<CaiIndexEntry> = set
            .features
            .into_iter()
            .filter_map(|feature| {
                let attrs = feature.attributes;
                let point = feature
                    .geometry
                    .as_ref()
                    .and_then(|g| g.point())
                    .or_else(|| Some(GeoPoint::new(attrs.lat?, attrs.lng?)))
                    .filter(GeoPoint::is_valid)?;
                let detail = StationDetail {
                    name: attrs.name?,
                    address: attrs.address,
                    phone: attrs.phone,
                    email: attrs.email,
                };
                Some(CaiIndexEntry::new(attrs.code, point, detail))
            })
            .collect();

        if entries.is_empty() {
            return Err(SourceError::empty(self.client.name()));
        }
        if entries.len() < total {
            tracing::debug!(
                source = self.client.name(),
                kept = entries.len(),
                dropped = total - entries.len(),
                "Dropped CAI features without name or location"
            );
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::StaticTransport;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const URL: &str = "http://webmap/cai/query";

    #[tokio::test]
    async fn test_points_from_geometry_or_attributes() {
        let transport = StaticTransport::new().json(
            URL,
            json!({"features": [
                {"attributes": {"CODIGO_SIV": "MEBOGMNVCCC01E10C01", "NOMBRE": "CAI Lourdes",
                                "TELEFONO": 6012841111u64},
                 "geometry": {"x": -74.0655, "y": 4.6412}},
                {"attributes": {"CODIGO_SIV": "E10S02", "NOMBRE": "C.A.I. Egipto",
                                "LATITUD": "4,5921", "LONGITUD": "-74,0701"}},
                {"attributes": {"NOMBRE": "Sin ubicación"}}
            ]}),
        );
        let source = WebMapIndexSource::new(
            SourceClient::new("webmap_index", Duration::from_secs(15), Arc::new(transport)),
            URL,
        );

        let entries = source.fetch().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].point, GeoPoint::new(4.6412, -74.0655));
        assert_eq!(entries[0].parsed.as_ref().unwrap().station, "E10");
        assert_eq!(entries[0].match_name, "LOURDES");
        assert_eq!(entries[1].point, GeoPoint::new(4.5921, -74.0701));
        assert_eq!(entries[1].match_name, "EGIPTO");
    }
}
