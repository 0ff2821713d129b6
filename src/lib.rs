//! Fleet telemetry ingestion: validation, driver-behavior detection, geofencing,
//! trip lifecycle, cache-aside location reads and live fan-out.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod hub;
pub mod kafka;
pub mod models;
pub mod processor;
