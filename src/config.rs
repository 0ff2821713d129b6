use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub http_bind_addr: String,
    pub kafka_enabled: bool,
    pub kafka_bootstrap_servers: String,
    pub kafka_topic: String,
    pub kafka_group_id: String,
    pub kafka_auto_offset_reset: String,
    pub kafka_sasl_mechanism: String,
    pub kafka_username: String,
    pub kafka_password: String,
    pub kafka_security_protocol: String,
    pub kafka_max_retries: u32,
    pub kafka_circuit_breaker_cooldown: u64,
    pub database_url: String,
    pub db_max_connections: u32,
    pub cache_max_entries: u64,
    pub cache_current_location_ttl: u64,
    pub cache_history_ttl: u64,
    pub cache_geofence_ttl: u64,
    pub side_effect_workers: usize,
    pub side_effect_queue_capacity: usize,
    pub shutdown_drain_secs: u64,
    pub behavior_history_limit: i64,
    pub log_level: String,
}

/// Reads a numeric variable, falling back to `default` when unset or unparsable.
fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let http_bind_addr =
            env::var("HTTP_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let kafka_enabled = env_parse("KAFKA_ENABLED", false);
        let kafka_bootstrap_servers =
            env::var("KAFKA_BOOTSTRAP_SERVERS").unwrap_or_else(|_| "localhost:9092".to_string());
        let kafka_topic = env::var("KAFKA_TOPIC").unwrap_or_else(|_| "gps-points".to_string());
        let kafka_group_id =
            env::var("KAFKA_GROUP_ID").unwrap_or_else(|_| "fleet-telemetry".to_string());
        let kafka_auto_offset_reset =
            env::var("KAFKA_AUTO_OFFSET_RESET").unwrap_or_else(|_| "latest".to_string());
        let kafka_sasl_mechanism =
            env::var("KAFKA_SASL_MECHANISM").unwrap_or_else(|_| "SCRAM-SHA-256".to_string());
        let kafka_username = env::var("KAFKA_USERNAME").unwrap_or_default();
        let kafka_password = env::var("KAFKA_PASSWORD").unwrap_or_default();
        let kafka_security_protocol =
            env::var("KAFKA_SECURITY_PROTOCOL").unwrap_or_else(|_| "SASL_PLAINTEXT".to_string());
        let kafka_max_retries = env_parse("KAFKA_MAX_RETRIES", 5);
        let kafka_circuit_breaker_cooldown = env_parse("KAFKA_CIRCUIT_BREAKER_COOLDOWN", 300);

        let db_host = env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string());
        let db_port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
        let db_name = env::var("DB_DATABASE").unwrap_or_else(|_| "fleet".to_string());
        let db_user = env::var("DB_USER").unwrap_or_else(|_| "fleet".to_string());
        let db_pwd = env::var("DB_PWD").unwrap_or_else(|_| "fleet".to_string());

        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}",
            db_user, db_pwd, db_host, db_port, db_name
        );
        let db_max_connections = env_parse("DB_MAX_CONNECTIONS", 50);

        let cache_max_entries = env_parse("CACHE_MAX_ENTRIES", 100_000);
        let cache_current_location_ttl = env_parse("CACHE_CURRENT_LOCATION_TTL", 300);
        let cache_history_ttl = env_parse("CACHE_HISTORY_TTL", 900);
        let cache_geofence_ttl = env_parse("CACHE_GEOFENCE_TTL", 1800);

        let side_effect_workers = env_parse("SIDE_EFFECT_WORKERS", 4usize).max(1);
        let side_effect_queue_capacity = env_parse("SIDE_EFFECT_QUEUE_CAPACITY", 1024usize).max(1);
        let shutdown_drain_secs = env_parse("SHUTDOWN_DRAIN_SECS", 10);
        let behavior_history_limit = env_parse("BEHAVIOR_HISTORY_LIMIT", 10i64).max(2);

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            http_bind_addr,
            kafka_enabled,
            kafka_bootstrap_servers,
            kafka_topic,
            kafka_group_id,
            kafka_auto_offset_reset,
            kafka_sasl_mechanism,
            kafka_username,
            kafka_password,
            kafka_security_protocol,
            kafka_max_retries,
            kafka_circuit_breaker_cooldown,
            database_url,
            db_max_connections,
            cache_max_entries,
            cache_current_location_ttl,
            cache_history_ttl,
            cache_geofence_ttl,
            side_effect_workers,
            side_effect_queue_capacity,
            shutdown_drain_secs,
            behavior_history_limit,
            log_level,
        })
    }

    pub fn cache_ttls(&self) -> crate::cache::CacheTtls {
        crate::cache::CacheTtls {
            current_location: Duration::from_secs(self.cache_current_location_ttl),
            history: Duration::from_secs(self.cache_history_ttl),
            geofences: Duration::from_secs(self.cache_geofence_ttl),
        }
    }
}
