//! Locator settings resolution
//!
//! Turns the bootstrap [`TomlConfig`] into fully resolved, validated settings:
//! every source gets its endpoint, timeout, TTL and rate limit, with built-in
//! defaults filling whatever the TOML file leaves out.

use cuadrante_common::config::{
    SourceSettings, TomlConfig, ALTERNATIVE_DEFAULTS, GOLD_STANDARD_DEFAULTS,
    LOGICAL_DIRECTORY_DEFAULTS, OFFICIAL_DEFAULTS, STATUS_PROBE_DEFAULTS, WEBMAP_INDEX_DEFAULTS,
};
use cuadrante_common::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Resolved settings for every upstream source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSet {
    pub status_probe: SourceSettings,
    pub official: SourceSettings,
    pub alternative: SourceSettings,
    pub gold_standard: SourceSettings,
    pub logical_directory: SourceSettings,
    pub webmap_index: SourceSettings,
}

/// Everything the locator needs at construction time
#[derive(Debug, Clone, PartialEq)]
pub struct LocatorSettings {
    pub sources: SourceSet,
    pub quadrants_path: PathBuf,
    pub personnel_path: PathBuf,
    /// Distance cutoff for proximity CAI matches
    pub cai_radius_km: f64,
    pub debounce: Duration,
}

impl LocatorSettings {
    /// Resolve and validate
    ///
    /// # Errors
    /// `Config` when an endpoint is blank, a geometry service lacks a roster
    /// endpoint, or the CAI radius is not a positive distance.
    pub fn resolve(config: &TomlConfig) -> Result<Self> {
        let s = &config.sources;
        let sources = SourceSet {
            status_probe: s.status_probe.resolve(&STATUS_PROBE_DEFAULTS),
            official: s.official.resolve(&OFFICIAL_DEFAULTS),
            alternative: s.alternative.resolve(&ALTERNATIVE_DEFAULTS),
            gold_standard: s.gold_standard.resolve(&GOLD_STANDARD_DEFAULTS),
            logical_directory: s.logical_directory.resolve(&LOGICAL_DIRECTORY_DEFAULTS),
            webmap_index: s.webmap_index.resolve(&WEBMAP_INDEX_DEFAULTS),
        };

        for (name, settings) in sources.named() {
            if !is_valid_endpoint(&settings.url) {
                return Err(Error::Config(format!("sources.{}.url is empty", name)));
            }
            if settings.timeout.is_zero() {
                warn!(source = name, "timeout_secs = 0, every request will time out");
            }
            debug!(
                source = name,
                url = %settings.url,
                timeout_secs = settings.timeout.as_secs(),
                ttl_secs = settings.ttl.map(|t| t.as_secs()),
                "Source configured"
            );
        }

        for (name, settings) in [("official", &sources.official), ("alternative", &sources.alternative)] {
            if !settings.roster_url.as_deref().is_some_and(is_valid_endpoint) {
                return Err(Error::Config(format!("sources.{}.roster_url is empty", name)));
            }
        }

        let cai_radius_km = config.query.cai_radius_km;
        if !(cai_radius_km.is_finite() && cai_radius_km > 0.0) {
            return Err(Error::Config(format!(
                "query.cai_radius_km must be a positive distance, got {}",
                cai_radius_km
            )));
        }

        Ok(Self {
            sources,
            quadrants_path: config.offline.quadrants_path.clone(),
            personnel_path: config.offline.personnel_path.clone(),
            cai_radius_km,
            debounce: Duration::from_millis(config.query.debounce_ms),
        })
    }
}

impl SourceSet {
    fn named(&self) -> [(&'static str, &SourceSettings); 6] {
        [
            ("status_probe", &self.status_probe),
            ("official", &self.official),
            ("alternative", &self.alternative),
            ("gold_standard", &self.gold_standard),
            ("logical_directory", &self.logical_directory),
            ("webmap_index", &self.webmap_index),
        ]
    }
}

/// Non-empty, non-whitespace
pub fn is_valid_endpoint(url: &str) -> bool {
    !url.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve() {
        let settings = LocatorSettings::resolve(&TomlConfig::default()).unwrap();
        assert_eq!(settings.sources.official.timeout, Duration::from_secs(10));
        assert_eq!(settings.sources.status_probe.ttl, Some(Duration::from_secs(60)));
        assert_eq!(settings.sources.webmap_index.ttl, Some(Duration::from_secs(1800)));
        assert_eq!(settings.debounce, Duration::from_millis(300));
        assert_eq!(settings.cai_radius_km, 2.0);
    }

    #[test]
    fn test_blank_url_rejected() {
        let mut config = TomlConfig::default();
        config.sources.gold_standard.url = Some("  ".to_string());
        let err = LocatorSettings::resolve(&config).unwrap_err();
        assert!(err.to_string().contains("gold_standard"));
    }

    #[test]
    fn test_blank_roster_url_rejected() {
        let mut config = TomlConfig::default();
        config.sources.alternative.roster_url = Some(String::new());
        assert!(LocatorSettings::resolve(&config).is_err());
    }

    #[test]
    fn test_radius_must_be_positive() {
        let mut config = TomlConfig::default();
        config.query.cai_radius_km = 0.0;
        assert!(LocatorSettings::resolve(&config).is_err());
        config.query.cai_radius_km = f64::NAN;
        assert!(LocatorSettings::resolve(&config).is_err());
    }
}
