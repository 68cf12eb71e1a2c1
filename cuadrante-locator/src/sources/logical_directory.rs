//! National quadrant-to-unit directory
//!
//! Maps every quadrant code to its department, parent station and responsible
//! unit. Carries names only: coordinates must come from a join against the
//! WebMap index.

use super::arcgis::loose_string;
use super::{SourceClient, SourceError};
use crate::siv_code::{normalize_code, SivCode};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
struct RawDirectoryRow {
    #[serde(default, deserialize_with = "loose_string")]
    departamento: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    estacion: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    unidad: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    codigo_siv: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    telefono: Option<String>,
}

/// One quadrant's administrative placement
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryRecord {
    pub code: String,
    /// Alphanumeric upper-case form of `code` for equality matches
    pub normalized_code: String,
    pub parsed: Option<SivCode>,
    pub department: Option<String>,
    pub station: Option<String>,
    /// Responsible unit (usually a CAI) by name
    pub unit: Option<String>,
    pub phone: Option<String>,
}

impl DirectoryRecord {
    fn from_raw(raw: RawDirectoryRow) -> Option<Self> {
        let code = raw.codigo_siv?;
        Some(Self {
            normalized_code: normalize_code(&code),
            parsed: SivCode::parse(&code),
            code,
            department: raw.departamento,
            station: raw.estacion,
            unit: raw.unidad,
            phone: raw.telefono,
        })
    }
}

pub struct LogicalDirectorySource {
    client: SourceClient,
    url: String,
}

impl LogicalDirectorySource {
    pub fn new(client: SourceClient, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub async fn fetch(&self) -> Result<Vec<DirectoryRecord>, SourceError> {
        let rows: Vec<RawDirectoryRow> = self.client.call(&self.url, &[]).await?;
        let records: Vec<DirectoryRecord> =
            rows.into_iter().filter_map(DirectoryRecord::from_raw).collect();
        if records.is_empty() {
            return Err(SourceError::empty(self.client.name()));
        }
        Ok(records)
    }
}

/// Directory record for a quadrant code
///
/// Exact normalized code first, then the `(station, serial)` pair ignoring
/// every other segment, so `E01-01` finds `MEBOGMNVCCC01E01C02000001`.
pub fn find_record<'a>(
    records: &'a [DirectoryRecord],
    code: &str,
    parsed: Option<&SivCode>,
) -> Option<&'a DirectoryRecord> {
    let normalized = normalize_code(code);
    if let Some(exact) = records.iter().find(|r| r.normalized_code == normalized) {
        return Some(exact);
    }

    let parsed = parsed?;
    let serial = parsed.serial_number()?;
    records.iter().find(|r| {
        r.parsed.as_ref().is_some_and(|p| {
            p.station == parsed.station && p.serial_number() == Some(serial)
        })
    })
}
