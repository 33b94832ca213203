use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::models::{Order, OrderStatus};

// ============================================================================
// Order Store - PostgreSQL persistence
// ============================================================================
//
// Single `orders` table, schema ensured at startup. Every query runs under a
// deadline so a stalled database surfaces as a storage error instead of a
// hung request.
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("database did not answer within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert a new order and return it with the store-assigned id.
    async fn insert(
        &self,
        product_id: &str,
        quantity: i32,
        status: OrderStatus,
    ) -> Result<Order, StoreError>;

    /// All orders, newest first.
    async fn select_all(&self) -> Result<Vec<Order>, StoreError>;

    async fn select_by_id(&self, id: i64) -> Result<Option<Order>, StoreError>;
}

pub async fn connect(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}

/// Create the status enum and orders table on a fresh database.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        DO $$ BEGIN
            IF NOT EXISTS (SELECT 1 FROM pg_type WHERE typname = 'order_status') THEN
                CREATE TYPE order_status AS ENUM
                    ('PENDING', 'CONFIRMED', 'SHIPPED', 'DELIVERED', 'CANCELLED');
            END IF;
        END $$
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            id          BIGSERIAL PRIMARY KEY,
            product_id  TEXT NOT NULL,
            quantity    INTEGER NOT NULL CHECK (quantity > 0),
            status      order_status NOT NULL,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub struct PgOrderStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgOrderStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    async fn bounded<T>(
        &self,
        query: impl std::future::Future<Output = Result<T, sqlx::Error>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, query).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(
        &self,
        product_id: &str,
        quantity: i32,
        status: OrderStatus,
    ) -> Result<Order, StoreError> {
        let query = sqlx::query_as::<_, Order>(
            "INSERT INTO orders (product_id, quantity, status) \
             VALUES ($1, $2, $3) \
             RETURNING id, product_id, quantity, status, created_at",
        )
        .bind(product_id)
        .bind(quantity)
        .bind(status)
        .fetch_one(&self.pool);

        self.bounded(query).await
    }

    async fn select_all(&self) -> Result<Vec<Order>, StoreError> {
        let query = sqlx::query_as::<_, Order>(
            "SELECT id, product_id, quantity, status, created_at \
             FROM orders ORDER BY id DESC",
        )
        .fetch_all(&self.pool);

        self.bounded(query).await
    }

    async fn select_by_id(&self, id: i64) -> Result<Option<Order>, StoreError> {
        let query = sqlx::query_as::<_, Order>(
            "SELECT id, product_id, quantity, status, created_at \
             FROM orders WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool);

        self.bounded(query).await
    }
}
