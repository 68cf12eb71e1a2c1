//! Capital-district CAI equipment directory
//!
//! Open-data listing of every CAI building in the capital district with
//! coordinates and contact fields. Each record carries a foreign key that
//! correlates to a station+subunit (`E01C02`).

use super::arcgis::{loose_f64, loose_string};
use super::{SourceClient, SourceError};
use crate::siv_code::{normalize_code, SivCode};
use crate::types::StationDetail;
use cuadrante_common::GeoPoint;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
struct RawEquipment {
    #[serde(default, deserialize_with = "loose_string")]
    nombre: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    direccion: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    telefono: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    correo: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    codigo_siv: Option<String>,
    #[serde(default, deserialize_with = "loose_f64")]
    latitud: Option<f64>,
    #[serde(default, deserialize_with = "loose_f64")]
    longitud: Option<f64>,
}

/// One CAI building
#[derive(Debug, Clone, PartialEq)]
pub struct EquipmentRecord {
    /// Station+subunit key (`E01C02`), or the normalized raw key if unparseable
    pub key: String,
    pub parsed: Option<SivCode>,
    pub point: Option<GeoPoint>,
    pub detail: StationDetail,
}

impl EquipmentRecord {
    fn from_raw(raw: RawEquipment) -> Option<Self> {
        let name = raw.nombre?;
        let raw_key = raw.codigo_siv.unwrap_or_default();
        let parsed = SivCode::parse(&raw_key);
        let key = parsed
            .as_ref()
            .map(SivCode::station_subunit)
            .unwrap_or_else(|| normalize_code(&raw_key));
        let point = match (raw.latitud, raw.longitud) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)).filter(GeoPoint::is_valid),
            _ => None,
        };

        Some(Self {
            key,
            parsed,
            point,
            detail: StationDetail {
                name,
                address: raw.direccion,
                phone: raw.telefono,
                email: raw.correo,
            },
        })
    }
}

pub struct GoldStandardSource {
    client: SourceClient,
    url: String,
}

impl GoldStandardSource {
    pub fn new(client: SourceClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Download the full equipment directory
    pub async fn fetch(&self) -> Result<Vec<EquipmentRecord>, SourceError> {
        let rows: Vec<RawEquipment> = self.client.call(&self.url, &[]).await?;
        let records: Vec<EquipmentRecord> =
            rows.into_iter().filter_map(EquipmentRecord::from_raw).collect();
        if records.is_empty() {
            return Err(SourceError::empty(self.client.name()));
        }
        tracing::debug!(source = self.client.name(), records = records.len(), "Equipment directory decoded");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::StaticTransport;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    const URL: &str = "http://gold/cai.json";

    fn source(body: serde_json::Value) -> GoldStandardSource {
        let transport = StaticTransport::new().json(URL, body);
        GoldStandardSource::new(
            SourceClient::new("gold_standard", Duration::from_secs(15), Arc::new(transport)),
            URL,
        )
    }

    #[tokio::test]
    async fn test_records_decoded_with_loose_types() {
        let s = source(json!([
            {"nombre": "CAI Chapinero", "direccion": "Cra 13 # 60-10", "telefono": 6013456789u64,
             "correo": "cai.chapinero@policia.gov.co", "codigo_siv": "E02C01",
             "latitud": "4,6452", "longitud": -74.0631},
            {"nombre": "CAI sin coordenadas", "codigo_siv": "MEBOGMNVCCC01E03S02000001"},
            {"direccion": "no name, dropped"}
        ]));
        let records = s.fetch().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].key, "E02C01");
        assert_eq!(records[0].detail.phone.as_deref(), Some("6013456789"));
        assert_eq!(records[0].point, Some(GeoPoint::new(4.6452, -74.0631)));
        assert_eq!(records[1].key, "E03S02");
        assert_eq!(records[1].point, None);
    }

    #[tokio::test]
    async fn test_all_rows_unusable_is_empty() {
        let s = source(json!([{"direccion": "x"}]));
        assert!(s.fetch().await.unwrap_err().is_empty());
    }
}
