//! HTTP Server & Routing Integration Tests
//!
//! Drives the router with `oneshot` requests; every upstream is a fake.

mod helpers;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use cuadrante_locator::{build_router, AppState};
use helpers::*;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const CODE: &str = "MEBOGMNVCCC01E01C02000004";

/// Router with the official and alternative services down and one offline
/// quadrant around (4.65, -74.06)
fn test_app(dir: &TempDir) -> Router {
    write_offline(dir.path(), vec![(CODE, "CUADRANTE 4", 4.65, -74.06)], json!([]));
    let transport = Arc::new(
        FakeTransport::new()
            .json(PROBE, json!({"name": "Cuadrantes"}))
            .fail(OFFICIAL_GEOMETRY)
            .fail(ALT_GEOMETRY)
            .json(
                WEBMAP,
                json!({"features": [{
                    "attributes": {"CODIGO_SIV": "MEMEDMNVCCC01E10C01000001", "NOMBRE": "CAI Estadio"},
                    "geometry": {"x": -75.58, "y": 6.25}
                }]}),
            ),
    );
    let locator = locator_with(transport, dir);
    build_router(AppState::new(Arc::new(locator)))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_reports_every_cache() {
    let dir = TempDir::new().unwrap();
    let (status, body) = get(test_app(&dir), "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "cuadrante-locator");
    let sources = body["sources"].as_array().unwrap();
    assert_eq!(sources.len(), 5);
    assert_eq!(sources[0]["source"], "status_probe");
    assert!(sources.iter().all(|s| s["state"] == "empty"));
}

#[tokio::test]
async fn test_health_shows_fresh_cache_after_query() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, _) = get(app.clone(), "/quadrant?lat=4.65&lng=-74.06").await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = get(app, "/health").await;
    let offline = body["sources"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["source"] == "offline")
        .unwrap()
        .clone();
    assert_eq!(offline["state"], "fresh");
    assert!(offline.get("fetched_at").is_some());
}

#[tokio::test]
async fn test_quadrant_from_offline_snapshot() {
    let dir = TempDir::new().unwrap();
    let (status, body) = get(test_app(&dir), "/quadrant?lat=4.65&lng=-74.06").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], CODE);
    assert_eq!(body["displayName"], "CUADRANTE 4");
    assert_eq!(body["provenance"], "Offline");
    assert_eq!(body["hierarchy"]["stationCode"], "E01");
}

#[tokio::test]
async fn test_quadrant_not_found_is_404() {
    let dir = TempDir::new().unwrap();
    let (status, body) = get(test_app(&dir), "/quadrant?lat=12.0&lng=-80.0").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_quadrant_rejects_invalid_coordinates() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = get(app.clone(), "/quadrant?lat=200&lng=-74.0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    // Unparseable numbers are rejected by the extractor
    let (status, _) = get(app, "/quadrant?lat=north&lng=-74.0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_newer_session_query_supersedes_older() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let first = {
        let app = app.clone();
        tokio::spawn(async move { get(app, "/quadrant?lat=4.65&lng=-74.06&session=map-1").await })
    };
    // Still inside the first query's debounce window
    tokio::time::sleep(Duration::from_millis(10)).await;
    let (second_status, _) = get(app, "/quadrant?lat=4.651&lng=-74.061&session=map-1").await;

    let (first_status, first_body) = first.await.unwrap();
    assert_eq!(first_status, StatusCode::CONFLICT);
    assert_eq!(first_body["error"]["code"], "SUPERSEDED");
    assert_eq!(second_status, StatusCode::OK);
}

#[tokio::test]
async fn test_code_endpoint_parses_both_grammars() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = get(app.clone(), &format!("/code/{}", CODE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["unit"], "MEBOG");
    assert_eq!(body["station"], "E01");
    assert_eq!(body["subunit"], "C02");
    assert_eq!(body["grammar"], "long");

    let (status, body) = get(app.clone(), "/code/E01-01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["station"], "E01");
    assert_eq!(body["serial"], "01");
    assert_eq!(body["grammar"], "short");

    let (status, body) = get(app, "/code/UNKNOWN").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_cai_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = test_app(&dir);

    let (status, body) = get(app.clone(), "/cai?code=MEMEDMNVCCC01E10C01000004").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "CAI Estadio");
    assert_eq!(body["provenance"], "WebMapIndex");

    let (status, _) = get(app.clone(), "/cai?code=E10-04&lat=6.25").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(app, "/cai?code=E99-01").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}
