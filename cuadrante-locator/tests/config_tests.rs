//! Locator settings resolution from TOML files
//!
//! Exercises the path from a config file on disk to validated
//! [`LocatorSettings`], including the failures that must stop startup.

use cuadrante_common::config::{load_toml_config, TomlConfig};
use cuadrante_common::Error;
use cuadrante_locator::config::LocatorSettings;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_toml(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn resolve(content: &str) -> cuadrante_common::Result<LocatorSettings> {
    let file = write_toml(content);
    let config = load_toml_config(file.path())?;
    LocatorSettings::resolve(&config)
}

#[test]
fn test_empty_file_resolves_to_defaults() {
    let settings = resolve("").unwrap();

    assert_eq!(settings.debounce, Duration::from_millis(300));
    assert_eq!(settings.cai_radius_km, 2.0);
    assert_eq!(settings.sources.status_probe.ttl, Some(Duration::from_secs(60)));
    assert_eq!(settings.sources.official.timeout, Duration::from_secs(10));
    assert_eq!(settings.sources.gold_standard.ttl, Some(Duration::from_secs(3600)));
    assert_eq!(settings.sources.webmap_index.ttl, Some(Duration::from_secs(1800)));
    assert!(settings.sources.official.roster_url.is_some());
    assert!(settings.sources.alternative.roster_url.is_some());
}

#[test]
fn test_overrides_apply_per_source() {
    let settings = resolve(
        r#"
        [query]
        debounce_ms = 150
        cai_radius_km = 1.5

        [sources.official]
        url = "http://localhost:9000/0/query"
        roster_url = "http://localhost:9000/1/query"
        timeout_secs = 3
        requests_per_second = 5

        [sources.webmap_index]
        ttl_secs = 120

        [offline]
        quadrants_path = "/srv/cuadrante/cuadrantes.geojson"
        "#,
    )
    .unwrap();

    assert_eq!(settings.debounce, Duration::from_millis(150));
    assert_eq!(settings.cai_radius_km, 1.5);
    assert_eq!(settings.sources.official.url, "http://localhost:9000/0/query");
    assert_eq!(settings.sources.official.timeout, Duration::from_secs(3));
    assert_eq!(settings.sources.official.requests_per_second, Some(5));
    assert_eq!(settings.sources.webmap_index.ttl, Some(Duration::from_secs(120)));
    // Untouched sources keep their defaults
    assert_eq!(settings.sources.alternative.timeout, Duration::from_secs(10));
    assert_eq!(
        settings.quadrants_path.to_str(),
        Some("/srv/cuadrante/cuadrantes.geojson")
    );
    assert_eq!(
        settings.personnel_path,
        TomlConfig::default().offline.personnel_path
    );
}

#[test]
fn test_blank_endpoint_is_config_error() {
    let err = resolve(
        r#"
        [sources.gold_standard]
        url = "   "
        "#,
    )
    .unwrap_err();

    assert!(matches!(err, Error::Config(ref msg) if msg.contains("gold_standard")));
}

#[test]
fn test_blank_roster_endpoint_is_config_error() {
    let err = resolve(
        r#"
        [sources.alternative]
        roster_url = ""
        "#,
    )
    .unwrap_err();

    assert!(matches!(err, Error::Config(ref msg) if msg.contains("alternative.roster_url")));
}

#[test]
fn test_non_positive_radius_is_config_error() {
    for radius in ["0.0", "-1.0"] {
        let err = resolve(&format!("[query]\ncai_radius_km = {}\n", radius)).unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("cai_radius_km")));
    }
}

#[test]
fn test_malformed_file_is_config_error() {
    let file = write_toml("port = \"not a number\"");
    let err = load_toml_config(file.path()).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_zero_rate_limit_means_unlimited() {
    let settings = resolve(
        r#"
        [sources.logical_directory]
        requests_per_second = 0
        "#,
    )
    .unwrap();
    assert_eq!(settings.sources.logical_directory.requests_per_second, None);
}
