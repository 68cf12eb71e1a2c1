//! Shared fixtures for locator integration tests
//!
//! A routing fake [`Transport`], resolved settings pointing every source at a
//! fake URL, and writers for the offline snapshot files.

#![allow(dead_code)]

use async_trait::async_trait;
use cuadrante_common::config::{SourceConfig, TomlConfig};
use cuadrante_locator::cache::ManualClock;
use cuadrante_locator::config::LocatorSettings;
use cuadrante_locator::sources::{Transport, TransportError, TransportResponse};
use cuadrante_locator::Locator;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const PROBE: &str = "http://official/layer";
pub const OFFICIAL_GEOMETRY: &str = "http://official/0/query";
pub const OFFICIAL_ROSTER: &str = "http://official/1/query";
pub const ALT_GEOMETRY: &str = "http://alt/0/query";
pub const ALT_ROSTER: &str = "http://alt/1/query";
pub const GOLD: &str = "http://gold/cai.json";
pub const DIRECTORY: &str = "http://directory/cuadrantes.json";
pub const WEBMAP: &str = "http://webmap/cai/query";

/// Canned reply for one URL
#[derive(Clone)]
pub enum Reply {
    Json(u16, Value),
    Fail(String),
    Hang,
}

/// Transport answering by URL, recording every request
#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(self, url: &str, body: Value) -> Self {
        self.set(url, Reply::Json(200, body));
        self
    }

    pub fn fail(self, url: &str) -> Self {
        self.set(url, Reply::Fail("connection refused".to_string()));
        self
    }

    pub fn hang(self, url: &str) -> Self {
        self.set(url, Reply::Hang);
        self
    }

    /// Replace the reply for `url` after construction
    pub fn set(&self, url: &str, reply: Reply) {
        self.routes.lock().unwrap().insert(url.to_string(), reply);
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .count()
    }

    /// Query parameters of the last request to `url`
    pub fn last_query(&self, url: &str) -> Option<Vec<(String, String)>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(u, _)| u == url)
            .map(|(_, q)| q.clone())
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), query.to_vec()));
        let reply = self.routes.lock().unwrap().get(url).cloned();
        match reply {
            Some(Reply::Json(status, body)) => Ok(TransportResponse {
                status,
                body: body.to_string(),
            }),
            Some(Reply::Fail(message)) => Err(TransportError(message)),
            Some(Reply::Hang) => {
                std::future::pending::<()>().await;
                Err(TransportError("unreachable".to_string()))
            }
            None => Err(TransportError(format!("no route for {}", url))),
        }
    }
}

fn source(url: &str, roster_url: Option<&str>) -> SourceConfig {
    SourceConfig {
        url: Some(url.to_string()),
        roster_url: roster_url.map(str::to_string),
        ..Default::default()
    }
}

/// Config with every source on a fake URL and the snapshot under `dir`
pub fn test_config(dir: &Path) -> TomlConfig {
    let mut config = TomlConfig::default();
    config.query.debounce_ms = 50;
    config.sources.status_probe = source(PROBE, None);
    config.sources.official = source(OFFICIAL_GEOMETRY, Some(OFFICIAL_ROSTER));
    config.sources.alternative = source(ALT_GEOMETRY, Some(ALT_ROSTER));
    config.sources.gold_standard = source(GOLD, None);
    config.sources.logical_directory = source(DIRECTORY, None);
    config.sources.webmap_index = source(WEBMAP, None);
    config.offline.quadrants_path = dir.join("cuadrantes.geojson");
    config.offline.personnel_path = dir.join("personal.json");
    config
}

pub fn test_settings(dir: &Path) -> LocatorSettings {
    LocatorSettings::resolve(&test_config(dir)).unwrap()
}

/// Locator over `transport` with a manual clock; keep the `TempDir` alive
pub fn locator_with(transport: Arc<FakeTransport>, dir: &TempDir) -> Locator {
    Locator::build(
        test_settings(dir.path()),
        transport,
        Arc::new(ManualClock::new()),
    )
}

/// Closed square ring around `(lat, lng)` as `[lng, lat]` pairs, clockwise
pub fn square(lat: f64, lng: f64, half: f64) -> Value {
    json!([[
        [lng - half, lat - half],
        [lng - half, lat + half],
        [lng + half, lat + half],
        [lng + half, lat - half],
        [lng - half, lat - half]
    ]])
}

/// ArcGIS polygon feature set with a single quadrant
pub fn arcgis_polygon(attributes: Value, lat: f64, lng: f64) -> Value {
    json!({"features": [{"attributes": attributes, "geometry": {"rings": square(lat, lng, 0.01)}}]})
}

pub fn arcgis_rows(rows: Vec<Value>) -> Value {
    let features: Vec<Value> = rows.into_iter().map(|a| json!({"attributes": a})).collect();
    json!({ "features": features })
}

pub fn no_features() -> Value {
    json!({"features": []})
}

/// Write the offline snapshot files into `dir`
pub fn write_offline(dir: &Path, quadrants: Vec<(&str, &str, f64, f64)>, personnel: Value) {
    let features: Vec<Value> = quadrants
        .into_iter()
        .map(|(code, name, lat, lng)| {
            json!({
                "type": "Feature",
                "properties": {"NRO_CUADRA": code, "NOMBRE": name},
                "geometry": {"type": "Polygon", "coordinates": square(lat, lng, 0.01)}
            })
        })
        .collect();
    let collection = json!({"type": "FeatureCollection", "features": features});
    std::fs::write(dir.join("cuadrantes.geojson"), collection.to_string()).unwrap();
    std::fs::write(dir.join("personal.json"), personnel.to_string()).unwrap();
}
