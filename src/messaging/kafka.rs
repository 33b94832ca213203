use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use crate::metrics::Metrics;
use crate::utils::{BreakerConfig, BreakerError, BreakerState, CircuitBreaker};

use super::{EventPublisher, PublishError};

// ============================================================================
// Kafka Publisher
// ============================================================================
//
// FutureProducer behind a circuit breaker. The breaker is fail-fast
// protection against a dead broker, not a retry layer: a rejected publish is
// reported upward exactly like a failed one.
// ============================================================================

pub struct KafkaPublisher {
    producer: FutureProducer,
    breaker: CircuitBreaker,
    send_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl KafkaPublisher {
    pub fn new(brokers: &str, send_timeout: Duration, metrics: Arc<Metrics>) -> anyhow::Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", send_timeout.as_millis().to_string())
            .create()?;

        let breaker = CircuitBreaker::new(BreakerConfig::default());
        metrics.record_breaker_state(breaker.state());

        Ok(Self {
            producer,
            breaker,
            send_timeout,
            metrics,
        })
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    /// Drain in-flight deliveries. Called once at shutdown.
    pub fn flush(&self, wait: Duration) {
        if let Err(e) = self.producer.flush(Timeout::After(wait)) {
            tracing::warn!(error = %e, "producer flush incomplete");
        }
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish(&self, channel: &str, key: &str, payload: &str) -> Result<(), PublishError> {
        let result = self
            .breaker
            .call(async {
                let record = FutureRecord::to(channel).key(key).payload(payload);

                self.producer
                    .send(record, Timeout::After(self.send_timeout))
                    .await
                    .map(|_| ())
                    .map_err(|(err, _)| err)
            })
            .await;

        self.metrics.record_breaker_state(self.breaker.state());

        match result {
            Ok(()) => {
                tracing::info!(topic = %channel, key = %key, "event published");
                Ok(())
            }
            Err(BreakerError::Rejected) => {
                tracing::error!(topic = %channel, "publisher circuit open, event not sent");
                Err(PublishError::CircuitOpen)
            }
            Err(BreakerError::Failed(err)) => {
                tracing::error!(error = %err, topic = %channel, "event publish failed");
                Err(PublishError::Broker(err.to_string()))
            }
        }
    }
}
