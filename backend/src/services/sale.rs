//! Sale transaction manager
//!
//! Creating a sale validates every line against locked inventory records
//! before debiting any of them. Editing line items reverses the sale's whole
//! stock consumption first and re-runs creation on the new lines; deleting
//! reverses it and removes the sale with its payments.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::ledger::{StockBook, StockKey};
use shared::projection::project_purchase;
use shared::reconciliation::SaleBalance;
use shared::sales::{apply_sale, plan_sale, reverse_sale, SaleLineRequest, SalePlan};
use shared::{
    DomainError, PaginatedResponse, Pagination, PaymentStatus, PaymentType, Principal, Sale,
    SaleLineItem,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};
use crate::external::{delete_quietly, ObjectStore};
use crate::services::access::ensure_warehouse_scope;
use crate::services::payment::{present_payments, PaymentView};
use crate::services::stock::{
    end_of_day, ensure_warehouse_exists, lock_records, persist, sale_movements, start_of_day,
};

pub(crate) const SALE_COLUMNS: &str = "id, client_id, warehouse_id, seller_id, order_id, total, \
     payment_type, payment_status, daily_consumption_kg, sale_date, created_at";

/// Sale service
#[derive(Clone)]
pub struct SaleService {
    db: PgPool,
    store: Arc<dyn ObjectStore>,
    url_ttl: Duration,
}

/// Input for creating a sale
#[derive(Debug, Deserialize)]
pub struct CreateSaleInput {
    pub client_id: Uuid,
    pub warehouse_id: Uuid,
    pub items: Vec<SaleLineRequest>,
    #[serde(default)]
    pub payment_type: PaymentType,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub daily_consumption_kg: Option<Decimal>,
    pub order_id: Option<Uuid>,
}

/// Input for updating a sale. `warehouse_id` is accepted only to reject a change.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateSaleInput {
    pub warehouse_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub items: Option<Vec<SaleLineRequest>>,
    pub payment_type: Option<PaymentType>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub daily_consumption_kg: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SaleFilter {
    pub client_id: Option<Uuid>,
    pub warehouse_id: Option<Uuid>,
    pub payment_status: Option<PaymentStatus>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// A sale with its line items and payments
#[derive(Debug, Serialize)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleLineItem>,
    pub payments: Vec<PaymentView>,
}

/// Who a new sale is for and how it is paid; the lines come from a [`SalePlan`]
pub(crate) struct NewSale<'a> {
    pub client_id: Uuid,
    pub client_name: &'a str,
    pub payment_type: PaymentType,
    pub daily_consumption_kg: Option<Decimal>,
    pub order_id: Option<Uuid>,
}

// ============================================================================
// Steps shared with order conversion
// ============================================================================

/// Current sale price of every presentation named in `ids`
pub(crate) async fn current_prices(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Decimal>> {
    let rows = sqlx::query_as::<_, (Uuid, Decimal)>(
        "SELECT id, sale_price FROM presentations WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().collect())
}

pub(crate) async fn client_name(conn: &mut PgConnection, client_id: Uuid) -> AppResult<String> {
    sqlx::query_scalar::<_, String>("SELECT name FROM clients WHERE id = $1")
        .bind(client_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Client".to_string()))
}

pub(crate) fn sale_reason(sale_id: Uuid, client_name: &str) -> String {
    format!("Sale {} - Client {}", sale_id, client_name)
}

/// Insert the sale row, debit its lines through `book`, persist the book
/// and write the line items. The caller has locked every record in the plan.
pub(crate) async fn record_sale(
    conn: &mut PgConnection,
    book: &mut StockBook,
    plan: &SalePlan,
    new: NewSale<'_>,
    actor: &Principal,
) -> AppResult<(Sale, Vec<SaleLineItem>)> {
    let status = PaymentStatus::derive(plan.total, Decimal::ZERO);
    let sale = sqlx::query_as::<_, Sale>(&format!(
        r#"
        INSERT INTO sales (client_id, warehouse_id, seller_id, order_id, total,
                           payment_type, payment_status, daily_consumption_kg)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {SALE_COLUMNS}
        "#
    ))
    .bind(new.client_id)
    .bind(plan.warehouse_id)
    .bind(actor.user_id)
    .bind(new.order_id)
    .bind(plan.total)
    .bind(new.payment_type)
    .bind(status)
    .bind(new.daily_consumption_kg)
    .fetch_one(&mut *conn)
    .await?;

    let reason = sale_reason(sale.id, new.client_name);
    apply_sale(book, plan, sale.id, actor.user_id, &reason)?;
    persist(conn, book).await?;

    let items = insert_line_items(conn, sale.id, plan).await?;
    update_client_projection(conn, &sale).await?;

    Ok((sale, items))
}

async fn insert_line_items(
    conn: &mut PgConnection,
    sale_id: Uuid,
    plan: &SalePlan,
) -> AppResult<Vec<SaleLineItem>> {
    let mut items = Vec::with_capacity(plan.lines.len());
    for line in &plan.lines {
        let item = sqlx::query_as::<_, SaleLineItem>(
            r#"
            INSERT INTO sale_line_items (sale_id, presentation_id, lot_id, quantity, unit_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, sale_id, presentation_id, lot_id, quantity, unit_price
            "#,
        )
        .bind(sale_id)
        .bind(line.presentation_id)
        .bind(line.lot_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .fetch_one(&mut *conn)
        .await?;
        items.push(item);
    }
    Ok(items)
}

/// Record the purchase on the client and, with a consumption estimate,
/// project when the client will buy again
async fn update_client_projection(conn: &mut PgConnection, sale: &Sale) -> AppResult<()> {
    match sale.daily_consumption_kg {
        Some(daily) => {
            let projection = project_purchase(sale.total, daily, sale.sale_date)?;
            sqlx::query(
                r#"
                UPDATE clients
                SET purchase_frequency_days = $2, last_purchase_at = $3, next_purchase_at = $4
                WHERE id = $1
                "#,
            )
            .bind(sale.client_id)
            .bind(projection.frequency_days)
            .bind(projection.last_purchase_at)
            .bind(projection.next_purchase_at)
            .execute(&mut *conn)
            .await?;
        }
        None => {
            sqlx::query(
                r#"
                UPDATE clients
                SET last_purchase_at = GREATEST(COALESCE(last_purchase_at, $2), $2)
                WHERE id = $1
                "#,
            )
            .bind(sale.client_id)
            .bind(sale.sale_date)
            .execute(&mut *conn)
            .await?;
        }
    }
    Ok(())
}

/// Lock a sale row for the rest of the transaction
pub(crate) async fn lock_sale(conn: &mut PgConnection, sale_id: Uuid) -> AppResult<Sale> {
    sqlx::query_as::<_, Sale>(&format!(
        "SELECT {SALE_COLUMNS} FROM sales WHERE id = $1 FOR UPDATE"
    ))
    .bind(sale_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::from(DomainError::UnknownSale(sale_id)))
}

pub(crate) async fn paid_total(conn: &mut PgConnection, sale_id: Uuid) -> AppResult<Decimal> {
    let paid = sqlx::query_scalar::<_, Decimal>(
        "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE sale_id = $1",
    )
    .bind(sale_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(paid)
}

/// Store the status derived from `balance` on the sale
pub(crate) async fn store_status(
    conn: &mut PgConnection,
    sale_id: Uuid,
    balance: SaleBalance,
) -> AppResult<PaymentStatus> {
    let status = balance.status();
    sqlx::query("UPDATE sales SET payment_status = $2 WHERE id = $1")
        .bind(sale_id)
        .bind(status)
        .execute(&mut *conn)
        .await?;
    Ok(status)
}

pub(crate) fn validate_daily_consumption(value: Option<Decimal>) -> AppResult<()> {
    if let Some(daily) = value {
        shared::projection::validate_daily_consumption(daily)?;
    }
    Ok(())
}

fn line_keys(warehouse_id: Uuid, lines: &[SaleLineRequest]) -> Vec<StockKey> {
    lines
        .iter()
        .map(|line| StockKey::new(line.presentation_id, warehouse_id))
        .collect()
}

fn presentation_ids(lines: &[SaleLineRequest]) -> Vec<Uuid> {
    let mut ids: Vec<Uuid> = lines.iter().map(|line| line.presentation_id).collect();
    ids.sort();
    ids.dedup();
    ids
}

impl SaleService {
    /// Create a new SaleService instance
    pub fn new(db: PgPool, store: Arc<dyn ObjectStore>, storage: &StorageConfig) -> Self {
        Self {
            db,
            store,
            url_ttl: Duration::from_secs(storage.presign_ttl_seconds),
        }
    }

    /// Create a sale, debiting stock for every line
    pub async fn create(&self, actor: &Principal, input: CreateSaleInput) -> AppResult<SaleDetail> {
        ensure_warehouse_scope(actor, input.warehouse_id)?;
        validate_daily_consumption(input.daily_consumption_kg)?;
        if input.items.is_empty() {
            return Err(DomainError::EmptySale.into());
        }

        let mut tx = self.db.begin().await?;

        let client_name = client_name(&mut tx, input.client_id).await?;
        ensure_warehouse_exists(&mut tx, input.warehouse_id).await?;
        if let Some(order_id) = input.order_id {
            let exists =
                sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM orders WHERE id = $1)")
                    .bind(order_id)
                    .fetch_one(&mut *tx)
                    .await?;
            if !exists {
                return Err(AppError::NotFound("Order".to_string()));
            }
        }

        let prices = current_prices(&mut tx, &presentation_ids(&input.items)).await?;
        let mut book = lock_records(&mut tx, &line_keys(input.warehouse_id, &input.items)).await?;
        let plan = plan_sale(&book, input.warehouse_id, &input.items, &prices)?;

        let (sale, items) = record_sale(
            &mut tx,
            &mut book,
            &plan,
            NewSale {
                client_id: input.client_id,
                client_name: &client_name,
                payment_type: input.payment_type,
                daily_consumption_kg: input.daily_consumption_kg,
                order_id: input.order_id,
            },
            actor,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(
            sale_id = %sale.id,
            warehouse_id = %sale.warehouse_id,
            total = %sale.total,
            lines = items.len(),
            "Sale created"
        );

        Ok(SaleDetail {
            sale,
            items,
            payments: Vec::new(),
        })
    }

    /// Update a sale. New line items replace the old ones through a full
    /// reversal followed by a fresh debit.
    pub async fn update(
        &self,
        actor: &Principal,
        sale_id: Uuid,
        input: UpdateSaleInput,
    ) -> AppResult<SaleDetail> {
        validate_daily_consumption(input.daily_consumption_kg)?;

        let mut tx = self.db.begin().await?;
        let sale = lock_sale(&mut tx, sale_id).await?;
        ensure_warehouse_scope(actor, sale.warehouse_id)?;
        if matches!(input.warehouse_id, Some(w) if w != sale.warehouse_id) {
            return Err(AppError::ImmutableField("warehouse_id".to_string()));
        }

        let client_id = input.client_id.unwrap_or(sale.client_id);
        let client_name = client_name(&mut tx, client_id).await?;
        let paid = paid_total(&mut tx, sale.id).await?;
        let mut balance = SaleBalance::new(sale.total, paid);

        if let Some(lines) = &input.items {
            if lines.is_empty() {
                return Err(DomainError::EmptySale.into());
            }
            let previous = sale_movements(&mut tx, sale.id).await?;

            let mut keys = line_keys(sale.warehouse_id, lines);
            keys.extend(
                previous
                    .iter()
                    .map(|m| StockKey::new(m.presentation_id, m.warehouse_id)),
            );
            let mut book = lock_records(&mut tx, &keys).await?;

            reverse_sale(&mut book, &previous)?;
            let prices = current_prices(&mut tx, &presentation_ids(lines)).await?;
            let plan = plan_sale(&book, sale.warehouse_id, lines, &prices)?;
            balance = balance.retotal(plan.total)?;

            apply_sale(
                &mut book,
                &plan,
                sale.id,
                actor.user_id,
                &sale_reason(sale.id, &client_name),
            )?;
            persist(&mut tx, &book).await?;

            sqlx::query("DELETE FROM sale_line_items WHERE sale_id = $1")
                .bind(sale.id)
                .execute(&mut *tx)
                .await?;
            insert_line_items(&mut tx, sale.id, &plan).await?;
        }

        let updated = sqlx::query_as::<_, Sale>(&format!(
            r#"
            UPDATE sales
            SET client_id = $2, total = $3, payment_type = $4,
                daily_consumption_kg = $5, payment_status = $6
            WHERE id = $1
            RETURNING {SALE_COLUMNS}
            "#
        ))
        .bind(sale.id)
        .bind(client_id)
        .bind(balance.total)
        .bind(input.payment_type.unwrap_or(sale.payment_type))
        .bind(input.daily_consumption_kg.or(sale.daily_consumption_kg))
        .bind(balance.status())
        .fetch_one(&mut *tx)
        .await?;

        if updated.daily_consumption_kg.is_some() {
            update_client_projection(&mut tx, &updated).await?;
        }
        tx.commit().await?;

        tracing::info!(
            sale_id = %updated.id,
            total = %updated.total,
            status = updated.payment_status.as_str(),
            lines_replaced = input.items.is_some(),
            "Sale updated"
        );
        self.get(actor, sale_id).await
    }

    /// Reverse a sale's stock, then delete it together with its line items
    /// and payments. Receipt objects are removed after commit.
    pub async fn delete(&self, actor: &Principal, sale_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let sale = lock_sale(&mut tx, sale_id).await?;
        ensure_warehouse_scope(actor, sale.warehouse_id)?;

        let movements = sale_movements(&mut tx, sale.id).await?;
        let keys: Vec<StockKey> = movements
            .iter()
            .map(|m| StockKey::new(m.presentation_id, m.warehouse_id))
            .collect();
        let mut book = lock_records(&mut tx, &keys).await?;
        reverse_sale(&mut book, &movements)?;
        persist(&mut tx, &book).await?;

        // Receipt keys can be shared with payments of other sales in a batch
        let orphaned = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT p.receipt_key
            FROM payments p
            WHERE p.sale_id = $1
              AND p.receipt_key IS NOT NULL
              AND NOT EXISTS (
                  SELECT 1 FROM payments o
                  WHERE o.receipt_key = p.receipt_key AND o.sale_id <> $1
              )
            "#,
        )
        .bind(sale.id)
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM sales WHERE id = $1")
            .bind(sale.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        for key in &orphaned {
            delete_quietly(self.store.as_ref(), key).await;
        }

        tracing::info!(
            sale_id = %sale_id,
            movements_reversed = movements.len(),
            user_id = %actor.user_id,
            "Sale deleted"
        );
        Ok(())
    }

    /// Get a sale with its line items and payments
    pub async fn get(&self, actor: &Principal, sale_id: Uuid) -> AppResult<SaleDetail> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = $1"
        ))
        .bind(sale_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(DomainError::UnknownSale(sale_id))?;
        ensure_warehouse_scope(actor, sale.warehouse_id)?;

        let items = sqlx::query_as::<_, SaleLineItem>(
            r#"
            SELECT id, sale_id, presentation_id, lot_id, quantity, unit_price
            FROM sale_line_items
            WHERE sale_id = $1
            ORDER BY id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.db)
        .await?;

        let payments = crate::services::payment::payments_of_sale(&self.db, sale_id).await?;
        let payments = present_payments(self.store.as_ref(), self.url_ttl, payments).await;

        Ok(SaleDetail {
            sale,
            items,
            payments,
        })
    }

    pub async fn list(
        &self,
        actor: &Principal,
        filter: SaleFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Sale>> {
        let range = shared::DateRange {
            start: filter.start,
            end: filter.end,
        };
        range
            .validate()
            .map_err(|msg| AppError::validation("start", msg))?;
        let warehouse_id = actor.warehouse_filter(filter.warehouse_id);
        let start: Option<DateTime<Utc>> = range.start.map(start_of_day);
        let end: Option<DateTime<Utc>> = range.end.map(end_of_day);

        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR warehouse_id = $1)
              AND ($2::uuid IS NULL OR client_id = $2)
              AND ($3::payment_status IS NULL OR payment_status = $3)
              AND ($4::timestamptz IS NULL OR sale_date >= $4)
              AND ($5::timestamptz IS NULL OR sale_date < $5)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM sales {WHERE}"))
            .bind(warehouse_id)
            .bind(filter.client_id)
            .bind(filter.payment_status)
            .bind(start)
            .bind(end)
            .fetch_one(&self.db)
            .await?;

        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {SALE_COLUMNS} FROM sales {WHERE}
            ORDER BY sale_date DESC, id
            LIMIT $6 OFFSET $7
            "#
        ))
        .bind(warehouse_id)
        .bind(filter.client_id)
        .bind(filter.payment_status)
        .bind(start)
        .bind(end)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(sales, &pagination, total.max(0) as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sale_reason_names_sale_and_client() {
        let id = Uuid::nil();
        assert_eq!(
            sale_reason(id, "Pollería Don Juan"),
            "Sale 00000000-0000-0000-0000-000000000000 - Client Pollería Don Juan"
        );
    }

    #[test]
    fn keys_and_ids_cover_every_line() {
        let warehouse = Uuid::new_v4();
        let presentation = Uuid::new_v4();
        let lines = vec![
            SaleLineRequest {
                presentation_id: presentation,
                quantity: 1,
                unit_price: None,
            },
            SaleLineRequest {
                presentation_id: presentation,
                quantity: 2,
                unit_price: None,
            },
        ];
        assert_eq!(presentation_ids(&lines), vec![presentation]);
        assert_eq!(line_keys(warehouse, &lines).len(), 2);
    }

    #[test]
    fn daily_consumption_must_be_positive() {
        assert!(validate_daily_consumption(None).is_ok());
        assert!(validate_daily_consumption(Some(Decimal::ONE)).is_ok());
        assert!(validate_daily_consumption(Some(Decimal::ZERO)).is_err());
        assert!(validate_daily_consumption(Some(Decimal::new(1, 28))).is_err());
        assert!(validate_daily_consumption(Some(Decimal::new(125, 2))).is_ok());
    }
}
