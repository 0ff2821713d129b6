//! Derivative, TTL-bound views over the store.
//!
//! The store stays authoritative. Anything in here can be dropped at any time and
//! rebuilt from it; a failing cache backend degrades reads to direct store access.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::error::CacheError;
use crate::models::HistoryQuery;

mod aside;
mod memory;

pub use aside::LocationCache;
pub use memory::MemoryCache;

/// Minimal key-value contract of an external cache.
///
/// String keys and JSON string values, so any backend can be slotted in.
#[async_trait]
pub trait KvCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Removes every key starting with `prefix`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize, CacheError>;
}

#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub current_location: Duration,
    pub history: Duration,
    pub geofences: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            current_location: Duration::from_secs(5 * 60),
            history: Duration::from_secs(15 * 60),
            geofences: Duration::from_secs(30 * 60),
        }
    }
}

pub mod keys {
    use super::*;

    pub fn current_location(vehicle_id: Uuid) -> String {
        format!("location:current:{}", vehicle_id)
    }

    /// Every history key for the vehicle shares this prefix.
    pub fn history_prefix(vehicle_id: Uuid) -> String {
        format!("location:history:{}:", vehicle_id)
    }

    pub fn history(vehicle_id: Uuid, query: &HistoryQuery) -> String {
        format!("{}{}", history_prefix(vehicle_id), query.canonical_key())
    }

    pub fn company_geofences(company_id: Uuid) -> String {
        format!("geofences:company:{}", company_id)
    }
}
