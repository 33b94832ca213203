use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::catalog::{ProductVerifier, VerifyError};
use crate::db::{OrderStore, StoreError};
use crate::messaging::{EventPublisher, PublishError};
use crate::models::{Order, OrderStatus, Product};

// ============================================================================
// Test doubles for the collaborator ports
// ============================================================================

pub fn sample_product() -> Product {
    Product {
        id: "42".to_string(),
        title: "Dune".to_string(),
        author: "Frank Herbert".to_string(),
    }
}

/// Verifier returning a fixed outcome, counting calls.
pub struct StubVerifier {
    outcome: Box<dyn Fn() -> Result<Product, VerifyError> + Send + Sync>,
    calls: AtomicUsize,
}

impl StubVerifier {
    pub fn ok(product: Product) -> Self {
        Self {
            outcome: Box::new(move || Ok(product.clone())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(make: fn() -> VerifyError) -> Self {
        Self {
            outcome: Box::new(move || Err(make())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductVerifier for StubVerifier {
    async fn verify(&self, _product_id: &str) -> Result<Product, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.outcome)()
    }
}

/// In-memory store with database-style auto-increment ids.
pub struct RecordingStore {
    orders: Mutex<Vec<Order>>,
    fail: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            orders: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            orders: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn inserts(&self) -> usize {
        self.orders.lock().unwrap().len()
    }
}

#[async_trait]
impl OrderStore for RecordingStore {
    async fn insert(
        &self,
        product_id: &str,
        quantity: i32,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        if self.fail {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let mut orders = self.orders.lock().unwrap();
        let order = Order {
            id: orders.len() as i64 + 1,
            product_id: product_id.to_string(),
            quantity,
            status,
            created_at: Utc::now(),
        };
        orders.push(order.clone());
        Ok(order)
    }

    async fn select_all(&self) -> Result<Vec<Order>, StoreError> {
        if self.fail {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        let mut orders = self.orders.lock().unwrap().clone();
        orders.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(orders)
    }

    async fn select_by_id(&self, id: i64) -> Result<Option<Order>, StoreError> {
        if self.fail {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(self.orders.lock().unwrap().iter().find(|o| o.id == id).cloned())
    }
}

enum PublishMode {
    Accept,
    FailBroker,
    FailCircuitOpen,
}

/// Publisher capturing everything it is handed.
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, String, String)>>,
    mode: PublishMode,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            mode: PublishMode::Accept,
        }
    }

    pub fn failing() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            mode: PublishMode::FailBroker,
        }
    }

    pub fn circuit_open() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            mode: PublishMode::FailCircuitOpen,
        }
    }

    /// Captured (channel, key, payload) triples, in publish order.
    pub fn published(&self) -> Vec<(String, String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, channel: &str, key: &str, payload: &str) -> Result<(), PublishError> {
        match self.mode {
            PublishMode::Accept => {
                self.published.lock().unwrap().push((
                    channel.to_string(),
                    key.to_string(),
                    payload.to_string(),
                ));
                Ok(())
            }
            PublishMode::FailBroker => Err(PublishError::Broker("delivery failed".to_string())),
            PublishMode::FailCircuitOpen => Err(PublishError::CircuitOpen),
        }
    }
}
