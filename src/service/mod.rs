use std::sync::Arc;
use std::time::Instant;

use crate::catalog::ProductVerifier;
use crate::db::OrderStore;
use crate::error::OrderError;
use crate::messaging::{EventPublisher, PublishError};
use crate::metrics::Metrics;
use crate::models::{CreateOrderRequest, Order, OrderCreatedEvent, OrderStatus, Product};

// ============================================================================
// Order Service - create/list/get orchestration
// ============================================================================
//
// The create workflow runs four strictly ordered steps:
//
//   validate -> verify product -> insert PENDING -> publish order.created
//
// Each step runs only if the previous one succeeded. A publish failure after
// the insert is NOT rolled back: the order stays committed, the gap is
// logged and counted, and the caller gets an error.
// ============================================================================

const MISSING_PRODUCT_ID: &str = "productId is required";
const INVALID_QUANTITY: &str = "quantity must be a positive integer";

pub struct OrderService {
    verifier: Arc<dyn ProductVerifier>,
    store: Arc<dyn OrderStore>,
    publisher: Arc<dyn EventPublisher>,
    events_topic: String,
    metrics: Arc<Metrics>,
}

impl OrderService {
    pub fn new(
        verifier: Arc<dyn ProductVerifier>,
        store: Arc<dyn OrderStore>,
        publisher: Arc<dyn EventPublisher>,
        events_topic: impl Into<String>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            verifier,
            store,
            publisher,
            events_topic: events_topic.into(),
            metrics,
        }
    }

    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        let started = Instant::now();
        let result = self.run_create(request).await;
        self.metrics
            .create_duration
            .observe(started.elapsed().as_secs_f64());

        match &result {
            Ok(order) => {
                self.metrics.orders_created.inc();
                tracing::info!(order_id = order.id, "order created");
            }
            Err(err) => self.metrics.record_failure(failed_stage(err)),
        }

        result
    }

    pub async fn list_orders(&self) -> Result<Vec<Order>, OrderError> {
        self.store.select_all().await.map_err(|err| {
            tracing::error!(error = %err, "order listing failed");
            OrderError::Storage(err)
        })
    }

    pub async fn get_order(&self, id: i64) -> Result<Order, OrderError> {
        match self.store.select_by_id(id).await {
            Ok(Some(order)) => Ok(order),
            Ok(None) => Err(OrderError::NotFound),
            Err(err) => {
                tracing::error!(order_id = id, error = %err, "order lookup failed");
                Err(OrderError::Storage(err))
            }
        }
    }

    async fn run_create(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        let (product_id, quantity) = validate(request)?;

        let verify_started = Instant::now();
        let product = self.verifier.verify(&product_id).await.map_err(|reason| {
            tracing::warn!(product_id = %product_id, reason = %reason, "product verification failed");
            OrderError::ProductUnavailable(reason)
        })?;
        self.metrics
            .verify_duration
            .observe(verify_started.elapsed().as_secs_f64());

        let order = self
            .store
            .insert(&product_id, quantity, OrderStatus::Pending)
            .await
            .map_err(|err| {
                tracing::error!(product_id = %product_id, error = %err, "order insert failed");
                OrderError::Storage(err)
            })?;

        tracing::debug!(order_id = order.id, "order persisted, publishing event");

        if let Err(err) = self.publish_created(&order, product).await {
            self.metrics.events_dropped.inc();
            tracing::error!(
                order_id = order.id,
                error = %err,
                "order committed but order.created was not published; \
                 event stream consumers will not see this order"
            );
            return Err(OrderError::Publish(err));
        }
        self.metrics.events_published.inc();

        Ok(order)
    }

    async fn publish_created(&self, order: &Order, product: Product) -> Result<(), PublishError> {
        let event = OrderCreatedEvent::new(order, product);
        let payload = serde_json::to_string(&event)
            .map_err(|e| PublishError::Broker(format!("event serialization: {e}")))?;

        self.publisher
            .publish(&self.events_topic, &order.id.to_string(), &payload)
            .await
    }
}

fn validate(request: CreateOrderRequest) -> Result<(String, i32), OrderError> {
    let product_id = match request.product_id {
        Some(id) if !id.is_empty() => id,
        _ => return Err(OrderError::InvalidInput(MISSING_PRODUCT_ID)),
    };

    let quantity = match request.quantity {
        Some(q) if q > 0 => q,
        _ => return Err(OrderError::InvalidInput(INVALID_QUANTITY)),
    };

    Ok((product_id, quantity))
}

fn failed_stage(err: &OrderError) -> &'static str {
    match err {
        OrderError::InvalidInput(_) => "validate",
        OrderError::ProductUnavailable(_) => "verify",
        OrderError::Storage(_) => "store",
        OrderError::Publish(_) => "publish",
        OrderError::NotFound => "read",
    }
}
