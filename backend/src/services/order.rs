//! Orders and their conversion into sales

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::ledger::StockKey;
use shared::sales::plan_order_conversion;
use shared::{
    DomainError, Order, OrderLineItem, OrderStatus, PaginatedResponse, Pagination, PaymentType,
    Principal, SaleLineItem,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::access::ensure_warehouse_scope;
use crate::services::sale::{
    client_name, current_prices, record_sale, validate_daily_consumption, NewSale, SaleDetail,
};
use crate::services::stock::{ensure_warehouse_exists, lock_records};

const ORDER_COLUMNS: &str =
    "id, client_id, warehouse_id, seller_id, delivery_date, status, notes, created_at";

#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderLineInput {
    pub presentation_id: Uuid,
    pub quantity: i32,
    /// Defaults to the presentation's current price
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub estimated_price: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderInput {
    pub client_id: Uuid,
    pub warehouse_id: Uuid,
    pub delivery_date: NaiveDate,
    pub lines: Vec<OrderLineInput>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrderInput {
    pub status: Option<OrderStatus>,
    pub delivery_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub lines: Option<Vec<OrderLineInput>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConvertOrderInput {
    /// Price lines at today's presentation price instead of the estimate
    #[serde(default)]
    pub use_current_price: bool,
    #[serde(default)]
    pub payment_type: PaymentType,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub daily_consumption_kg: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub warehouse_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub status: Option<OrderStatus>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub lines: Vec<OrderLineItem>,
}

async fn lock_order(conn: &mut PgConnection, order_id: Uuid) -> AppResult<Order> {
    sqlx::query_as::<_, Order>(&format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

async fn order_lines(conn: &mut PgConnection, order_id: Uuid) -> AppResult<Vec<OrderLineItem>> {
    let lines = sqlx::query_as::<_, OrderLineItem>(
        r#"
        SELECT id, order_id, presentation_id, quantity, estimated_price
        FROM order_line_items
        WHERE order_id = $1
        ORDER BY id
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(lines)
}

/// Validate and price order lines, then replace the stored ones
async fn write_lines(
    conn: &mut PgConnection,
    order_id: Uuid,
    lines: &[OrderLineInput],
) -> AppResult<Vec<OrderLineItem>> {
    if lines.is_empty() {
        return Err(DomainError::EmptyOrder.into());
    }
    let ids: Vec<Uuid> = lines.iter().map(|l| l.presentation_id).collect();
    let prices = current_prices(conn, &ids).await?;

    sqlx::query("DELETE FROM order_line_items WHERE order_id = $1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    let mut stored = Vec::with_capacity(lines.len());
    for line in lines {
        shared::validate_quantity(line.quantity)
            .map_err(|msg| AppError::validation("quantity", msg))?;
        let current = prices
            .get(&line.presentation_id)
            .copied()
            .ok_or(DomainError::UnknownPresentation(line.presentation_id))?;
        let price = line.estimated_price.unwrap_or(current);
        if price < Decimal::ZERO {
            return Err(DomainError::InvalidAmount {
                field: "estimated_price",
            }
            .into());
        }
        shared::money::ensure_money_scale("estimated_price", price)?;

        let item = sqlx::query_as::<_, OrderLineItem>(
            r#"
            INSERT INTO order_line_items (order_id, presentation_id, quantity, estimated_price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, order_id, presentation_id, quantity, estimated_price
            "#,
        )
        .bind(order_id)
        .bind(line.presentation_id)
        .bind(line.quantity)
        .bind(price)
        .fetch_one(&mut *conn)
        .await?;
        stored.push(item);
    }
    Ok(stored)
}

impl OrderService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create(&self, actor: &Principal, input: CreateOrderInput) -> AppResult<OrderDetail> {
        ensure_warehouse_scope(actor, input.warehouse_id)?;

        let mut tx = self.db.begin().await?;
        client_name(&mut tx, input.client_id).await?;
        ensure_warehouse_exists(&mut tx, input.warehouse_id).await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (client_id, warehouse_id, seller_id, delivery_date, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(input.client_id)
        .bind(input.warehouse_id)
        .bind(actor.user_id)
        .bind(input.delivery_date)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await?;
        let lines = write_lines(&mut tx, order.id, &input.lines).await?;
        tx.commit().await?;

        tracing::info!(order_id = %order.id, lines = lines.len(), "Order created");
        Ok(OrderDetail { order, lines })
    }

    /// Change status, date, notes or lines of an open order
    pub async fn update(
        &self,
        actor: &Principal,
        order_id: Uuid,
        input: UpdateOrderInput,
    ) -> AppResult<OrderDetail> {
        let mut tx = self.db.begin().await?;
        let existing = lock_order(&mut tx, order_id).await?;
        ensure_warehouse_scope(actor, existing.warehouse_id)?;

        let status = existing
            .status
            .transition(input.status.unwrap_or(existing.status))?;

        let order = sqlx::query_as::<_, Order>(&format!(
            r#"
            UPDATE orders
            SET status = $2, delivery_date = $3, notes = $4
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(status)
        .bind(input.delivery_date.unwrap_or(existing.delivery_date))
        .bind(input.notes.as_ref().or(existing.notes.as_ref()))
        .fetch_one(&mut *tx)
        .await?;

        let lines = match &input.lines {
            Some(lines) => write_lines(&mut tx, order_id, lines).await?,
            None => order_lines(&mut tx, order_id).await?,
        };
        tx.commit().await?;

        Ok(OrderDetail { order, lines })
    }

    pub async fn cancel(&self, actor: &Principal, order_id: Uuid) -> AppResult<Order> {
        self.update(
            actor,
            order_id,
            UpdateOrderInput {
                status: Some(OrderStatus::Cancelado),
                ..Default::default()
            },
        )
        .await
        .map(|detail| {
            tracing::info!(order_id = %order_id, "Order cancelled");
            detail.order
        })
    }

    /// Delete an order that was never delivered
    pub async fn delete(&self, actor: &Principal, order_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let order = lock_order(&mut tx, order_id).await?;
        ensure_warehouse_scope(actor, order.warehouse_id)?;
        if order.status == OrderStatus::Entregado {
            return Err(DomainError::AlreadyDelivered.into());
        }

        sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Turn an open order into a sale against current stock and mark it
    /// delivered. Shortfalls on any line leave the order untouched.
    pub async fn convert(
        &self,
        actor: &Principal,
        order_id: Uuid,
        input: ConvertOrderInput,
    ) -> AppResult<SaleDetail> {
        validate_daily_consumption(input.daily_consumption_kg)?;

        let mut tx = self.db.begin().await?;
        let order = lock_order(&mut tx, order_id).await?;
        ensure_warehouse_scope(actor, order.warehouse_id)?;
        order.status.ensure_open()?;

        let lines = order_lines(&mut tx, order.id).await?;
        let client_name = client_name(&mut tx, order.client_id).await?;
        let ids: Vec<Uuid> = lines.iter().map(|l| l.presentation_id).collect();
        let prices = current_prices(&mut tx, &ids).await?;

        let keys: Vec<StockKey> = lines
            .iter()
            .map(|l| StockKey::new(l.presentation_id, order.warehouse_id))
            .collect();
        let mut book = lock_records(&mut tx, &keys).await?;
        let plan = plan_order_conversion(
            &book,
            order.status,
            order.warehouse_id,
            &lines,
            &prices,
            input.use_current_price,
        )?;

        let (sale, items): (_, Vec<SaleLineItem>) = record_sale(
            &mut tx,
            &mut book,
            &plan,
            NewSale {
                client_id: order.client_id,
                client_name: &client_name,
                payment_type: input.payment_type,
                daily_consumption_kg: input.daily_consumption_kg,
                order_id: Some(order.id),
            },
            actor,
        )
        .await?;

        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(order.id)
            .bind(OrderStatus::Entregado)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(
            order_id = %order.id,
            sale_id = %sale.id,
            total = %sale.total,
            "Order converted to sale"
        );

        Ok(SaleDetail {
            sale,
            items,
            payments: Vec::new(),
        })
    }

    pub async fn get(&self, actor: &Principal, order_id: Uuid) -> AppResult<OrderDetail> {
        let mut conn = self.db.acquire().await?;
        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
        ensure_warehouse_scope(actor, order.warehouse_id)?;

        let lines = order_lines(&mut conn, order_id).await?;
        Ok(OrderDetail { order, lines })
    }

    pub async fn list(
        &self,
        actor: &Principal,
        filter: OrderFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Order>> {
        let range = shared::DateRange {
            start: filter.start,
            end: filter.end,
        };
        range
            .validate()
            .map_err(|msg| AppError::validation("start", msg))?;
        let warehouse_id = actor.warehouse_filter(filter.warehouse_id);

        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR warehouse_id = $1)
              AND ($2::uuid IS NULL OR client_id = $2)
              AND ($3::order_status IS NULL OR status = $3)
              AND ($4::date IS NULL OR delivery_date >= $4)
              AND ($5::date IS NULL OR delivery_date <= $5)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM orders {WHERE}"))
            .bind(warehouse_id)
            .bind(filter.client_id)
            .bind(filter.status)
            .bind(range.start)
            .bind(range.end)
            .fetch_one(&self.db)
            .await?;

        let orders = sqlx::query_as::<_, Order>(&format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders {WHERE}
            ORDER BY delivery_date, created_at
            LIMIT $6 OFFSET $7
            "#
        ))
        .bind(warehouse_id)
        .bind(filter.client_id)
        .bind(filter.status)
        .bind(range.start)
        .bind(range.end)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(orders, &pagination, total.max(0) as u64))
    }
}
