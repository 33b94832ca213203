use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::utils::BreakerState;

// ============================================================================
// Metrics - Prometheus metrics for the order workflow
// ============================================================================
//
// Tracks:
// - Order creation throughput and latency
// - Create failures by workflow stage (validate, verify, store, publish)
// - Event publishing outcomes, including events dropped after a committed
//   insert (the store/broker inconsistency window)
// - Publisher circuit breaker state
//
// Scraped via GET /metrics on the main HTTP server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    pub orders_created: IntCounter,
    pub order_failures: IntCounterVec,
    pub create_duration: Histogram,
    pub verify_duration: Histogram,
    pub events_published: IntCounter,
    pub events_dropped: IntCounter,
    pub breaker_state: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created =
            IntCounter::new("orders_created_total", "Orders successfully created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let order_failures = IntCounterVec::new(
            Opts::new(
                "order_failures_total",
                "Create requests that failed, by workflow stage",
            ),
            &["stage"],
        )?;
        registry.register(Box::new(order_failures.clone()))?;

        let create_duration = Histogram::with_opts(
            HistogramOpts::new(
                "order_create_duration_seconds",
                "End-to-end create workflow duration",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0]),
        )?;
        registry.register(Box::new(create_duration.clone()))?;

        let verify_duration = Histogram::with_opts(
            HistogramOpts::new(
                "product_verify_duration_seconds",
                "Catalog verification duration",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0]),
        )?;
        registry.register(Box::new(verify_duration.clone()))?;

        let events_published = IntCounter::new(
            "order_events_published_total",
            "order.created events handed to the broker",
        )?;
        registry.register(Box::new(events_published.clone()))?;

        let events_dropped = IntCounter::new(
            "order_events_dropped_total",
            "Committed orders whose order.created event could not be published",
        )?;
        registry.register(Box::new(events_dropped.clone()))?;

        let breaker_state = IntGauge::new(
            "publisher_circuit_state",
            "Publisher circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(breaker_state.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            order_failures,
            create_duration,
            verify_duration,
            events_published,
            events_dropped,
            breaker_state,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn record_failure(&self, stage: &str) {
        self.order_failures.with_label_values(&[stage]).inc();
    }

    pub fn record_breaker_state(&self, state: BreakerState) {
        let value = match state {
            BreakerState::Closed => 0,
            BreakerState::Open => 1,
            BreakerState::HalfOpen => 2,
        };
        self.breaker_state.set(value);
    }
}
