use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use bakery_common::{BakeryError, BakeryResult, EscalationCategory, LineItem, Order};

use super::{corrupt_row, is_unique_violation, store_err};
use crate::query::OverdueQuery;
use crate::traits::OrderStore;

const ORDER_COLUMNS: &str = "id, order_number, order_type, status, picking_status, baking_status, \
     payment_status, items, customer_name, customer_phone, delivery_notes, expected_pickup_date, \
     escalated, escalated_at, last_overdue_bucket, created_at, updated_at, picking_started_at, baking_started_at, \
     ready_for_pickup_at, out_for_delivery_at, closed_at, version";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    order_type: String,
    status: String,
    picking_status: String,
    baking_status: Option<String>,
    payment_status: String,
    items: Json<Vec<LineItem>>,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    delivery_notes: Option<String>,
    expected_pickup_date: Option<NaiveDate>,
    escalated: bool,
    escalated_at: Option<DateTime<Utc>>,
    last_overdue_bucket: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    picking_started_at: Option<DateTime<Utc>>,
    baking_started_at: Option<DateTime<Utc>>,
    ready_for_pickup_at: Option<DateTime<Utc>>,
    out_for_delivery_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    version: i64,
}

impl TryFrom<OrderRow> for Order {
    type Error = BakeryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Order {
            id: row.id,
            order_number: row.order_number,
            order_type: row.order_type.parse()?,
            status: row.status.parse()?,
            picking_status: row.picking_status.parse()?,
            baking_status: row.baking_status.map(|s| s.parse()).transpose()?,
            payment_status: row.payment_status.parse()?,
            items: row.items.0,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            delivery_notes: row.delivery_notes,
            expected_pickup_date: row.expected_pickup_date,
            escalated: row.escalated,
            escalated_at: row.escalated_at,
            last_overdue_bucket: row.last_overdue_bucket,
            created_at: row.created_at,
            updated_at: row.updated_at,
            picking_started_at: row.picking_started_at,
            baking_started_at: row.baking_started_at,
            ready_for_pickup_at: row.ready_for_pickup_at,
            out_for_delivery_at: row.out_for_delivery_at,
            closed_at: row.closed_at,
            version: row.version,
        })
    }
}

fn into_order(row: OrderRow) -> BakeryResult<Order> {
    Order::try_from(row).map_err(corrupt_row)
}

/// Order store backed by the `orders` and `order_number_sequences` tables.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order) -> BakeryResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, order_type, status, picking_status, baking_status,
                payment_status, items, customer_name, customer_phone, delivery_notes,
                expected_pickup_date, escalated, escalated_at, last_overdue_bucket,
                created_at, updated_at, picking_started_at, baking_started_at,
                ready_for_pickup_at, out_for_delivery_at, closed_at, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23)
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.order_type.as_str())
        .bind(order.status.as_str())
        .bind(order.picking_status.as_str())
        .bind(order.baking_status.map(|s| s.as_str()))
        .bind(order.payment_status.as_str())
        .bind(Json(&order.items))
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.delivery_notes)
        .bind(order.expected_pickup_date)
        .bind(order.escalated)
        .bind(order.escalated_at)
        .bind(order.last_overdue_bucket)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.picking_started_at)
        .bind(order.baking_started_at)
        .bind(order.ready_for_pickup_at)
        .bind(order.out_for_delivery_at)
        .bind(order.closed_at)
        .bind(order.version)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(BakeryError::Validation(format!(
                "order number {} already exists",
                order.order_number
            ))),
            Err(e) => Err(store_err(e)),
        }
    }

    async fn get(&self, id: Uuid) -> BakeryResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(into_order).transpose()
    }

    async fn update(&self, order: &Order, expected_version: i64) -> BakeryResult<Order> {
        // order_number, order_type and created_at are immutable and not written.
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders SET
                status = $3,
                picking_status = $4,
                baking_status = $5,
                payment_status = $6,
                items = $7,
                customer_name = $8,
                customer_phone = $9,
                delivery_notes = $10,
                expected_pickup_date = $11,
                escalated = $12,
                escalated_at = $13,
                last_overdue_bucket = $14,
                updated_at = $15,
                picking_started_at = $16,
                baking_started_at = $17,
                ready_for_pickup_at = $18,
                out_for_delivery_at = $19,
                closed_at = $20,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order.id)
        .bind(expected_version)
        .bind(order.status.as_str())
        .bind(order.picking_status.as_str())
        .bind(order.baking_status.map(|s| s.as_str()))
        .bind(order.payment_status.as_str())
        .bind(Json(&order.items))
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.delivery_notes)
        .bind(order.expected_pickup_date)
        .bind(order.escalated)
        .bind(order.escalated_at)
        .bind(order.last_overdue_bucket)
        .bind(order.updated_at)
        .bind(order.picking_started_at)
        .bind(order.baking_started_at)
        .bind(order.ready_for_pickup_at)
        .bind(order.out_for_delivery_at)
        .bind(order.closed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        if let Some(row) = row {
            return into_order(row);
        }

        // Nothing matched: either the version moved on or the order is gone.
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
            .bind(order.id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;

        if exists {
            Err(BakeryError::ConcurrentModification(order.id))
        } else {
            Err(BakeryError::OrderNotFound(order.id))
        }
    }

    async fn list_overdue_candidates(&self, query: &OverdueQuery) -> BakeryResult<Vec<Order>> {
        let (predicate, entered_at) = match query.category {
            EscalationCategory::Pickup => (
                "status = 'ready_for_pickup'
                 AND ((expected_pickup_date IS NULL AND ready_for_pickup_at < $1)
                      OR expected_pickup_date < $2)",
                "ready_for_pickup_at",
            ),
            EscalationCategory::Delivery => (
                "status = 'out_for_delivery'
                 AND out_for_delivery_at < $1",
                "out_for_delivery_at",
            ),
            EscalationCategory::Baking => (
                "status = 'baking'
                 AND baking_status IS DISTINCT FROM 'done'
                 AND baking_started_at < $1",
                "baking_started_at",
            ),
        };

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders
             WHERE {predicate}
               AND last_overdue_bucket IS DISTINCT FROM $3
             ORDER BY {entered_at} ASC
             LIMIT $4"
        ))
        .bind(query.entered_before)
        .bind(query.pickup_date_before)
        .bind(query.bucket)
        .bind(query.limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter().map(into_order).collect()
    }

    async fn claim_order_number(&self, prefix: &str) -> BakeryResult<String> {
        // One statement: seed from the highest existing number, or bump the
        // counter under the row lock taken by ON CONFLICT.
        let next = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO order_number_sequences (prefix, last_value)
            SELECT $1, COALESCE(MAX(substring(order_number FROM char_length($1) + 1)::bigint), 0) + 1
            FROM orders
            WHERE left(order_number, char_length($1)) = $1
              AND substring(order_number FROM char_length($1) + 1) ~ '^[0-9]+$'
            ON CONFLICT (prefix) DO UPDATE
                SET last_value = GREATEST(order_number_sequences.last_value + 1, EXCLUDED.last_value)
            RETURNING last_value
            "#,
        )
        .bind(prefix)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(format!("{prefix}{next}"))
    }
}
