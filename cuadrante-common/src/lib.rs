//! # Cuadrante Common Library
//!
//! Shared code for the quadrant locator service including:
//! - Error types
//! - Bootstrap configuration loading (TOML)
//! - Geodesy primitives (Haversine distance, point-in-polygon, centroids)
//! - Text normalization for approximate name matching

pub mod config;
pub mod error;
pub mod geo;
pub mod text;

pub use error::{Error, Result};
pub use geo::GeoPoint;
