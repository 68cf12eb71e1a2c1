//! Bootstrap configuration loading and config file resolution
//!
//! Configuration file priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`<config_dir>/cuadrante/locator.toml`)
//! 4. Built-in defaults (fallback)
//!
//! Every key in the TOML file is optional. Missing keys take the built-in
//! defaults below, so an empty or missing file yields a runnable service.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "CUADRANTE_CONFIG";

/// Standard user-agent for all outbound HTTP requests
pub fn get_user_agent() -> String {
    format!(
        "cuadrante-locator/{} (+https://github.com/cuadrante/cuadrante)",
        env!("CARGO_PKG_VERSION")
    )
}

/// Bootstrap configuration loaded from TOML file
///
/// Cannot change while the service runs; restart to pick up edits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Query tuning (debounce, distance cutoffs)
    #[serde(default)]
    pub query: QueryConfig,

    /// Upstream source endpoints
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Local snapshot files
    #[serde(default)]
    pub offline: OfflineConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            logging: LoggingConfig::default(),
            query: QueryConfig::default(),
            sources: SourcesConfig::default(),
            offline: OfflineConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Query tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Viewport-settled coalescing window in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Maximum distance for proximity matches of a CAI, in kilometres
    #[serde(default = "default_cai_radius_km")]
    pub cai_radius_km: f64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            cai_radius_km: default_cai_radius_km(),
        }
    }
}

/// Per-source overrides as written in TOML
///
/// All fields are optional; [`SourceConfig::resolve`] fills gaps from the
/// source's built-in [`SourceDefaults`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Primary endpoint (geometry query, directory listing, probe target)
    #[serde(default)]
    pub url: Option<String>,
    /// Secondary endpoint (roster query for geometry services)
    #[serde(default)]
    pub roster_url: Option<String>,
    /// Per-request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Cache time-to-live in seconds
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    /// Optional client-side rate limit
    #[serde(default)]
    pub requests_per_second: Option<u32>,
}

/// Built-in defaults for one upstream source
#[derive(Debug, Clone, Copy)]
pub struct SourceDefaults {
    pub url: &'static str,
    pub roster_url: Option<&'static str>,
    pub timeout_secs: u64,
    pub ttl_secs: Option<u64>,
}

/// Fully resolved settings for one upstream source
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSettings {
    pub url: String,
    pub roster_url: Option<String>,
    pub timeout: Duration,
    /// `None` means load once per process
    pub ttl: Option<Duration>,
    pub requests_per_second: Option<u32>,
}

impl SourceConfig {
    /// Merge TOML overrides with built-in defaults
    pub fn resolve(&self, defaults: &SourceDefaults) -> SourceSettings {
        SourceSettings {
            url: self.url.clone().unwrap_or_else(|| defaults.url.to_string()),
            roster_url: self
                .roster_url
                .clone()
                .or_else(|| defaults.roster_url.map(str::to_string)),
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(defaults.timeout_secs)),
            ttl: self
                .ttl_secs
                .or(defaults.ttl_secs)
                .map(Duration::from_secs),
            requests_per_second: self.requests_per_second.filter(|rps| *rps > 0),
        }
    }
}

pub const STATUS_PROBE_DEFAULTS: SourceDefaults = SourceDefaults {
    url: "https://gisponal.policia.gov.co/arcgis/rest/services/MNVCC/Cuadrantes/MapServer/0",
    roster_url: None,
    timeout_secs: 5,
    ttl_secs: Some(60),
};

pub const OFFICIAL_DEFAULTS: SourceDefaults = SourceDefaults {
    url: "https://gisponal.policia.gov.co/arcgis/rest/services/MNVCC/Cuadrantes/MapServer/0/query",
    roster_url: Some(
        "https://gisponal.policia.gov.co/arcgis/rest/services/MNVCC/Cuadrantes/MapServer/1/query",
    ),
    timeout_secs: 10,
    ttl_secs: None,
};

pub const ALTERNATIVE_DEFAULTS: SourceDefaults = SourceDefaults {
    url: "https://services.arcgis.com/cuadrantes/ArcGIS/rest/services/Cuadrantes_PONAL/FeatureServer/0/query",
    roster_url: Some(
        "https://services.arcgis.com/cuadrantes/ArcGIS/rest/services/Cuadrantes_PONAL/FeatureServer/1/query",
    ),
    timeout_secs: 10,
    ttl_secs: None,
};

pub const GOLD_STANDARD_DEFAULTS: SourceDefaults = SourceDefaults {
    url: "https://datosabiertos.bogota.gov.co/api/cai/equipamientos.json",
    roster_url: None,
    timeout_secs: 15,
    ttl_secs: Some(3600),
};

pub const LOGICAL_DIRECTORY_DEFAULTS: SourceDefaults = SourceDefaults {
    url: "https://www.datos.gov.co/resource/cuadrantes-mnvcc.json",
    roster_url: None,
    timeout_secs: 15,
    ttl_secs: Some(3600),
};

pub const WEBMAP_INDEX_DEFAULTS: SourceDefaults = SourceDefaults {
    url: "https://gisponal.policia.gov.co/arcgis/rest/services/MNVCC/CAI/MapServer/0/query",
    roster_url: None,
    timeout_secs: 15,
    ttl_secs: Some(1800),
};

/// Upstream source sections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default)]
    pub status_probe: SourceConfig,
    #[serde(default)]
    pub official: SourceConfig,
    #[serde(default)]
    pub alternative: SourceConfig,
    #[serde(default)]
    pub gold_standard: SourceConfig,
    #[serde(default)]
    pub logical_directory: SourceConfig,
    #[serde(default)]
    pub webmap_index: SourceConfig,
}

/// Local snapshot files produced by the offline batch scripts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// GeoJSON FeatureCollection of quadrant polygons
    #[serde(default = "default_quadrants_path")]
    pub quadrants_path: PathBuf,
    /// JSON array of personnel records
    #[serde(default = "default_personnel_path")]
    pub personnel_path: PathBuf,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            quadrants_path: default_quadrants_path(),
            personnel_path: default_personnel_path(),
        }
    }
}

fn default_port() -> u16 {
    5731
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_debounce_ms() -> u64 {
    300
}

fn default_cai_radius_km() -> f64 {
    2.0
}

fn default_quadrants_path() -> PathBuf {
    PathBuf::from("data/cuadrantes.geojson")
}

fn default_personnel_path() -> PathBuf {
    PathBuf::from("data/personal.json")
}

/// Resolve which config file to read, if any
///
/// Returns `None` when no candidate exists; callers then run on defaults.
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    dirs::config_dir()
        .map(|d| d.join("cuadrante").join("locator.toml"))
        .filter(|p| p.exists())
}

/// Load TOML config from a path
///
/// A missing file yields defaults with a warning; a malformed file is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file not found: {} (using built-in defaults)",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Resolve and load configuration in one step
pub fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg, CONFIG_ENV_VAR) {
        Some(path) => load_toml_config(&path),
        None => {
            info!("No config file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}
