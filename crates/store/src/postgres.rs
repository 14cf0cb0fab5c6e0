//! PostgreSQL storage backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{
    CustomerId, EventId, IdempotencyKey, Money, OrderId, PaymentId, ProductId, SagaId, ShipmentId,
};
use domain::{
    EventType, InventoryLevel, Order, OrderStatus, OutboxEvent, Payment, PaymentStatus, SagaLog,
    SagaStatus, SagaStep, Shipment, ShipmentStatus, TargetService,
};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use uuid::Uuid;

use crate::change::{ParticipantWrite, StateChange};
use crate::error::{Result, StoreError};
use crate::store::{
    InventoryStore, OrderStore, OutboxStore, PaymentStore, SagaLogStore, ShipmentStore, Storage,
};

/// PostgreSQL-backed implementation of [`Storage`].
#[derive(Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the schema migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Unique violations on any `*_idempotency_key_key` constraint mean the
/// write raced a retry of itself.
fn map_insert_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err
            .constraint()
            .is_some_and(|c| c.ends_with("idempotency_key_key"))
    {
        return StoreError::DuplicateIdempotencyKey;
    }
    StoreError::Database(e)
}

fn row_to_saga(row: PgRow) -> Result<SagaLog> {
    let steps_json: serde_json::Value = row.try_get("steps")?;
    let steps: Vec<SagaStep> = serde_json::from_value(steps_json)?;
    let status: String = row.try_get("status")?;

    Ok(SagaLog {
        saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
        idempotency_key: row.try_get("idempotency_key")?,
        customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        total_price: Money::from_cents(row.try_get::<i64, _>("total_price")?),
        order_id: row
            .try_get::<Option<Uuid>, _>("order_id")?
            .map(OrderId::from_uuid),
        status: status.parse::<SagaStatus>()?,
        steps,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_event(row: PgRow) -> Result<OutboxEvent> {
    let event_type: String = row.try_get("event_type")?;
    let target_service: String = row.try_get("target_service")?;

    Ok(OutboxEvent {
        id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
        aggregate_id: OrderId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
        event_type: event_type.parse::<EventType>()?,
        payload: row.try_get("payload")?,
        target_service: target_service.parse::<TargetService>()?,
        target_endpoint: row.try_get("target_endpoint")?,
        is_published: row.try_get("is_published")?,
        publish_attempts: row.try_get::<i32, _>("publish_attempts")? as u32,
        max_retries: row.try_get::<i32, _>("max_retries")? as u32,
        last_error: row.try_get("last_error")?,
        published_at: row.try_get::<Option<DateTime<Utc>>, _>("published_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
        saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
        customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        total_price: Money::from_cents(row.try_get::<i64, _>("total_price")?),
        status: status.parse::<OrderStatus>()?,
        idempotency_key: IdempotencyKey::new(row.try_get::<String, _>("idempotency_key")?),
        compensation_key: row
            .try_get::<Option<String>, _>("compensation_key")?
            .map(IdempotencyKey::new),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_payment(row: PgRow) -> Result<Payment> {
    let status: String = row.try_get("status")?;
    Ok(Payment {
        id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
        saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        amount: Money::from_cents(row.try_get::<i64, _>("amount")?),
        status: status.parse::<PaymentStatus>()?,
        idempotency_key: IdempotencyKey::new(row.try_get::<String, _>("idempotency_key")?),
        compensation_key: row
            .try_get::<Option<String>, _>("compensation_key")?
            .map(IdempotencyKey::new),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_inventory(row: PgRow) -> Result<InventoryLevel> {
    Ok(InventoryLevel {
        product_id: ProductId::new(row.try_get::<String, _>("product_id")?),
        quantity: row.try_get::<i32, _>("quantity")? as u32,
        reserved_quantity: row.try_get::<i32, _>("reserved_quantity")? as u32,
        idempotency_key: row
            .try_get::<Option<String>, _>("idempotency_key")?
            .map(IdempotencyKey::new),
        compensation_key: row
            .try_get::<Option<String>, _>("compensation_key")?
            .map(IdempotencyKey::new),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_shipment(row: PgRow) -> Result<Shipment> {
    let status: String = row.try_get("status")?;
    Ok(Shipment {
        id: ShipmentId::from_uuid(row.try_get::<Uuid, _>("id")?),
        saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
        order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
        customer_id: CustomerId::from_uuid(row.try_get::<Uuid, _>("customer_id")?),
        status: status.parse::<ShipmentStatus>()?,
        idempotency_key: IdempotencyKey::new(row.try_get::<String, _>("idempotency_key")?),
        compensation_key: row
            .try_get::<Option<String>, _>("compensation_key")?
            .map(IdempotencyKey::new),
        created_at: row.try_get("created_at")?,
    })
}

async fn upsert_saga(conn: &mut PgConnection, saga: &SagaLog) -> Result<()> {
    let steps = serde_json::to_value(&saga.steps)?;
    sqlx::query(
        r#"
        INSERT INTO saga_logs (saga_id, idempotency_key, customer_id, product_id, quantity, total_price, order_id, status, steps, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (saga_id) DO UPDATE SET
            order_id = EXCLUDED.order_id,
            status = EXCLUDED.status,
            steps = EXCLUDED.steps
        "#,
    )
    .bind(saga.saga_id.as_uuid())
    .bind(saga.idempotency_key)
    .bind(saga.customer_id.as_uuid())
    .bind(saga.product_id.as_str())
    .bind(saga.quantity as i32)
    .bind(saga.total_price.cents())
    .bind(saga.order_id.map(|id| id.as_uuid()))
    .bind(saga.status.as_str())
    .bind(steps)
    .bind(saga.created_at)
    .execute(conn)
    .await
    .map_err(map_insert_error)?;
    Ok(())
}

async fn upsert_order(conn: &mut PgConnection, order: &Order) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orders (id, saga_id, customer_id, product_id, quantity, total_price, status, idempotency_key, compensation_key, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            compensation_key = EXCLUDED.compensation_key
        "#,
    )
    .bind(order.id.as_uuid())
    .bind(order.saga_id.as_uuid())
    .bind(order.customer_id.as_uuid())
    .bind(order.product_id.as_str())
    .bind(order.quantity as i32)
    .bind(order.total_price.cents())
    .bind(order.status.as_str())
    .bind(order.idempotency_key.as_str())
    .bind(order.compensation_key.as_ref().map(|k| k.as_str()))
    .bind(order.created_at)
    .execute(conn)
    .await
    .map_err(map_insert_error)?;
    Ok(())
}

async fn upsert_payment(conn: &mut PgConnection, payment: &Payment) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (id, saga_id, order_id, customer_id, amount, status, idempotency_key, compensation_key, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            compensation_key = EXCLUDED.compensation_key
        "#,
    )
    .bind(payment.id.as_uuid())
    .bind(payment.saga_id.as_uuid())
    .bind(payment.order_id.as_uuid())
    .bind(payment.customer_id.as_uuid())
    .bind(payment.amount.cents())
    .bind(payment.status.as_str())
    .bind(payment.idempotency_key.as_str())
    .bind(payment.compensation_key.as_ref().map(|k| k.as_str()))
    .bind(payment.created_at)
    .execute(conn)
    .await
    .map_err(map_insert_error)?;
    Ok(())
}

async fn upsert_inventory(conn: &mut PgConnection, level: &InventoryLevel) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO inventory_levels (product_id, quantity, reserved_quantity, idempotency_key, compensation_key, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (product_id) DO UPDATE SET
            quantity = EXCLUDED.quantity,
            reserved_quantity = EXCLUDED.reserved_quantity,
            idempotency_key = EXCLUDED.idempotency_key,
            compensation_key = EXCLUDED.compensation_key
        "#,
    )
    .bind(level.product_id.as_str())
    .bind(level.quantity as i32)
    .bind(level.reserved_quantity as i32)
    .bind(level.idempotency_key.as_ref().map(|k| k.as_str()))
    .bind(level.compensation_key.as_ref().map(|k| k.as_str()))
    .bind(level.created_at)
    .execute(conn)
    .await
    .map_err(map_insert_error)?;
    Ok(())
}

async fn upsert_shipment(conn: &mut PgConnection, shipment: &Shipment) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO shipments (id, saga_id, order_id, customer_id, status, idempotency_key, compensation_key, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO UPDATE SET
            status = EXCLUDED.status,
            compensation_key = EXCLUDED.compensation_key
        "#,
    )
    .bind(shipment.id.as_uuid())
    .bind(shipment.saga_id.as_uuid())
    .bind(shipment.order_id.as_uuid())
    .bind(shipment.customer_id.as_uuid())
    .bind(shipment.status.as_str())
    .bind(shipment.idempotency_key.as_str())
    .bind(shipment.compensation_key.as_ref().map(|k| k.as_str()))
    .bind(shipment.created_at)
    .execute(conn)
    .await
    .map_err(map_insert_error)?;
    Ok(())
}

async fn insert_event(conn: &mut PgConnection, event: &OutboxEvent) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO outbox_events (id, aggregate_id, event_type, payload, target_service, target_endpoint, is_published, publish_attempts, max_retries, last_error, published_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(event.id.as_uuid())
    .bind(event.aggregate_id.as_uuid())
    .bind(event.event_type.as_str())
    .bind(&event.payload)
    .bind(event.target_service.as_str())
    .bind(&event.target_endpoint)
    .bind(event.is_published)
    .bind(event.publish_attempts as i32)
    .bind(event.max_retries as i32)
    .bind(&event.last_error)
    .bind(event.published_at)
    .bind(event.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

const SAGA_COLUMNS: &str = "saga_id, idempotency_key, customer_id, product_id, quantity, total_price, order_id, status, steps, created_at";
const EVENT_COLUMNS: &str = "id, aggregate_id, event_type, payload, target_service, target_endpoint, is_published, publish_attempts, max_retries, last_error, published_at, created_at";
const ORDER_COLUMNS: &str = "id, saga_id, customer_id, product_id, quantity, total_price, status, idempotency_key, compensation_key, created_at";
const PAYMENT_COLUMNS: &str =
    "id, saga_id, order_id, customer_id, amount, status, idempotency_key, compensation_key, created_at";
const INVENTORY_COLUMNS: &str =
    "product_id, quantity, reserved_quantity, idempotency_key, compensation_key, created_at";
const SHIPMENT_COLUMNS: &str =
    "id, saga_id, order_id, customer_id, status, idempotency_key, compensation_key, created_at";

#[async_trait]
impl SagaLogStore for PostgresStorage {
    async fn find_saga_by_idempotency_key(&self, key: Uuid) -> Result<Option<SagaLog>> {
        let row = sqlx::query(&format!(
            "SELECT {SAGA_COLUMNS} FROM saga_logs WHERE idempotency_key = $1"
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_saga).transpose()
    }

    async fn find_saga(&self, saga_id: SagaId) -> Result<Option<SagaLog>> {
        let row = sqlx::query(&format!(
            "SELECT {SAGA_COLUMNS} FROM saga_logs WHERE saga_id = $1"
        ))
        .bind(saga_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_saga).transpose()
    }

    async fn save_saga(&self, saga: &SagaLog) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        upsert_saga(&mut *conn, saga).await
    }
}

#[async_trait]
impl OutboxStore for PostgresStorage {
    async fn find_unpublished(&self, batch_size: usize) -> Result<Vec<OutboxEvent>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM outbox_events
            WHERE is_published = FALSE AND publish_attempts < max_retries
            ORDER BY created_at ASC
            LIMIT $1
            "#
        ))
        .bind(batch_size as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_event).collect()
    }

    async fn save_publish_state(&self, event: &OutboxEvent) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE outbox_events
            SET is_published = $2, publish_attempts = $3, last_error = $4, published_at = $5
            WHERE id = $1
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.is_published)
        .bind(event.publish_attempts as i32)
        .bind(&event.last_error)
        .bind(event.published_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStorage {
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_order).transpose()
    }

    async fn find_order_by_idempotency_key(&self, key: &IdempotencyKey) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE idempotency_key = $1"
        ))
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_order).transpose()
    }
}

#[async_trait]
impl PaymentStore for PostgresStorage {
    async fn find_payment(&self, id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_payment).transpose()
    }

    async fn find_payment_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE idempotency_key = $1"
        ))
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_payment).transpose()
    }

    async fn find_payment_by_saga(&self, saga_id: SagaId) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE saga_id = $1"
        ))
        .bind(saga_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_payment).transpose()
    }

    async fn find_payment_by_compensation_key(
        &self,
        key: &IdempotencyKey,
        order_id: OrderId,
    ) -> Result<Option<Payment>> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE compensation_key = $1 AND order_id = $2"
        ))
        .bind(key.as_str())
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_payment).transpose()
    }
}

#[async_trait]
impl InventoryStore for PostgresStorage {
    async fn find_inventory(&self, product_id: &ProductId) -> Result<Option<InventoryLevel>> {
        let row = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory_levels WHERE product_id = $1"
        ))
        .bind(product_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_inventory).transpose()
    }

    async fn find_inventory_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<InventoryLevel>> {
        let row = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory_levels WHERE idempotency_key = $1"
        ))
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_inventory).transpose()
    }

    async fn find_inventory_by_compensation_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<InventoryLevel>> {
        let row = sqlx::query(&format!(
            "SELECT {INVENTORY_COLUMNS} FROM inventory_levels WHERE compensation_key = $1"
        ))
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_inventory).transpose()
    }
}

#[async_trait]
impl ShipmentStore for PostgresStorage {
    async fn find_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_shipment).transpose()
    }

    async fn find_shipment_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<Shipment>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE idempotency_key = $1"
        ))
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_shipment).transpose()
    }

    async fn find_shipment_by_saga(&self, saga_id: SagaId) -> Result<Option<Shipment>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE saga_id = $1"
        ))
        .bind(saga_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_shipment).transpose()
    }

    async fn find_shipment_by_compensation_key(
        &self,
        key: &IdempotencyKey,
        order_id: OrderId,
    ) -> Result<Option<Shipment>> {
        let row = sqlx::query(&format!(
            "SELECT {SHIPMENT_COLUMNS} FROM shipments WHERE compensation_key = $1 AND order_id = $2"
        ))
        .bind(key.as_str())
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(row_to_shipment).transpose()
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn commit(&self, change: StateChange) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        match &change.participant {
            Some(ParticipantWrite::Order(order)) => upsert_order(&mut *tx, order).await?,
            Some(ParticipantWrite::Payment(payment)) => upsert_payment(&mut *tx, payment).await?,
            Some(ParticipantWrite::Inventory(level)) => upsert_inventory(&mut *tx, level).await?,
            Some(ParticipantWrite::Shipment(shipment)) => {
                upsert_shipment(&mut *tx, shipment).await?
            }
            None => {}
        }

        if let Some(saga) = &change.saga {
            upsert_saga(&mut *tx, saga).await?;
        }

        for event in &change.events {
            insert_event(&mut *tx, event).await?;
        }

        tx.commit().await?;
        tracing::debug!(
            events = change.events.len(),
            saga = change.saga.is_some(),
            "state change committed"
        );
        Ok(())
    }
}
