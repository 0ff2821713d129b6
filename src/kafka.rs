use crate::config::AppConfig;
use crate::processor::IngestionPipeline;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Consumes JSON point reports with SASL authentication and a circuit breaker on receive errors.
pub async fn start_kafka_consumer(
    config: &AppConfig,
    pipeline: Arc<IngestionPipeline>,
) -> anyhow::Result<()> {
    info!("Initializing Kafka consumer for topic: {}", config.kafka_topic);

    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_bootstrap_servers)
        .set("group.id", &config.kafka_group_id)
        .set("auto.offset.reset", &config.kafka_auto_offset_reset)
        // SASL
        .set("security.protocol", &config.kafka_security_protocol)
        .set("sasl.mechanism", &config.kafka_sasl_mechanism)
        .set("sasl.username", &config.kafka_username)
        .set("sasl.password", &config.kafka_password);

    let consumer: StreamConsumer = client_config.create()?;

    consumer.subscribe(&[&config.kafka_topic])?;
    info!("Subscribed to topic: {}", config.kafka_topic);

    let mut consecutive_failures = 0;
    let max_retries = config.kafka_max_retries;
    let cooldown_duration = Duration::from_secs(config.kafka_circuit_breaker_cooldown);

    loop {
        if consecutive_failures >= max_retries {
            warn!(
                "Circuit breaker tripped ({} consecutive failures)! Sleeping for {} seconds...",
                consecutive_failures, config.kafka_circuit_breaker_cooldown
            );
            tokio::time::sleep(cooldown_duration).await;
            consecutive_failures = 0;
            info!("Circuit breaker reset. Resuming consumption.");
        }

        match consumer.recv().await {
            Ok(m) => {
                consecutive_failures = 0;

                let payload = match m.payload() {
                    None => {
                        warn!("Received empty payload from Kafka");
                        continue;
                    }
                    Some(p) => p.to_vec(),
                };

                let pipeline = pipeline.clone();
                // Keep the consumer loop free of ingestion latency.
                tokio::spawn(async move {
                    match pipeline.process_payload(&payload).await {
                        Ok(outcome) if outcome.degraded.is_empty() => {
                            debug!("Stored point {}", outcome.point.id)
                        }
                        Ok(outcome) => warn!(
                            "Stored point {} with degradations {:?}",
                            outcome.point.id, outcome.degraded
                        ),
                        Err(e) => warn!("Rejected Kafka point report ({}): {}", e.code(), e),
                    }
                });
            }
            Err(e) => {
                error!(
                    "Kafka error: {}. Incrementing failure count ({} / {})",
                    e,
                    consecutive_failures + 1,
                    max_retries
                );
                consecutive_failures += 1;

                // Avoid a tight loop on transient network errors.
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
        }
    }
}
