//! HTTP API handlers for cuadrante-locator
//!
//! Thin JSON layer over [`crate::Locator`]; every handler is read-only.

pub mod health;
pub mod quadrant;

pub use health::health_routes;
pub use quadrant::quadrant_routes;
