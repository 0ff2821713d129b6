use fleet_telemetry::api::{self, AppState};
use fleet_telemetry::cache::{LocationCache, MemoryCache};
use fleet_telemetry::config::AppConfig;
use fleet_telemetry::db::{self, postgres::PgStore, Store};
use fleet_telemetry::hub::BroadcastHub;
use fleet_telemetry::kafka;
use fleet_telemetry::processor::geofence::GeofenceEvaluator;
use fleet_telemetry::processor::side_effects::{self, SideEffectContext};
use fleet_telemetry::processor::IngestionPipeline;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = AppConfig::load()?;

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .init();

    info!("Starting fleet telemetry service...");

    // Init DB
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;
    info!("Connected to database");
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool));

    let cache = LocationCache::new(
        Arc::new(MemoryCache::new(config.cache_max_entries)),
        store.clone(),
        config.cache_ttls(),
    );

    let (hub, _hub_task) = BroadcastHub::start();

    let context = Arc::new(SideEffectContext {
        store: store.clone(),
        cache: cache.clone(),
        hub: hub.clone(),
        geofences: Arc::new(GeofenceEvaluator::new(store.clone(), cache.clone())),
        history_limit: config.behavior_history_limit,
    });
    let (queue, workers) = side_effects::start(
        context,
        config.side_effect_workers,
        config.side_effect_queue_capacity,
    );
    info!(
        "Started {} side-effect workers (queue capacity {})",
        config.side_effect_workers, config.side_effect_queue_capacity
    );

    let pipeline = Arc::new(IngestionPipeline::new(store, cache, queue));

    // Start Kafka
    let consumer = if config.kafka_enabled {
        let config = config.clone();
        let pipeline = pipeline.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = kafka::start_kafka_consumer(&config, pipeline).await {
                error!("Kafka consumer stopped: {}", e);
            }
        }))
    } else {
        info!("Kafka consumer disabled");
        None
    };

    // Serve HTTP
    let app = api::router(AppState {
        pipeline: pipeline.clone(),
        hub,
    });
    let listener = tokio::net::TcpListener::bind(&config.http_bind_addr).await?;
    info!("Listening on {}", config.http_bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    if let Some(consumer) = consumer {
        consumer.abort();
        let _ = consumer.await;
    }

    // Last producer handle; workers exit once the queue is empty.
    drop(pipeline);
    if !workers
        .drain(Duration::from_secs(config.shutdown_drain_secs))
        .await
    {
        warn!("Some side effects were abandoned at shutdown");
    }

    info!("Stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
