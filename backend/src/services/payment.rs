//! Payment reconciliation
//!
//! Every payment mutation locks the owning sale row, checks the balance and
//! stores the recomputed `payment_status` in the same transaction. Receipt
//! uploads happen before the transaction and are deleted again if it fails.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::money::{ensure_money_scale, ensure_positive};
use shared::reconciliation::{allocate_deposit, plan_batch, BatchPair, DepositCandidate, SaleBalance};
use shared::{DomainError, Payment, PaymentMethod, Principal, Sale};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};
use crate::external::{compensate, delete_quietly, ObjectStore, Upload};
use crate::services::access::{ensure_warehouse_scope, require_role, MANAGERS};
use crate::services::sale::{lock_sale, paid_total, store_status, SALE_COLUMNS};

const PAYMENT_COLUMNS: &str = "id, sale_id, amount, method, reference, receipt_key, payment_date, \
     deposited, deposited_amount, deposit_date, user_id, created_at";

/// Object-store folder for payment receipts
pub const RECEIPT_FOLDER: &str = "payment-receipts";

/// A payment as returned to clients, with a temporary receipt URL
#[derive(Debug, Serialize)]
pub struct PaymentView {
    #[serde(flatten)]
    pub payment: Payment,
    pub receipt_url: Option<String>,
}

/// Fields of a new payment; amounts are already exact decimals
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentChanges {
    pub amount: Option<Decimal>,
    pub method: Option<PaymentMethod>,
    pub reference: Option<String>,
    pub payment_date: Option<NaiveDate>,
    pub remove_receipt: bool,
}

/// One receipt paying down several sales
#[derive(Debug, Clone)]
pub struct BatchPaymentInput {
    pub pairs: Vec<BatchPair>,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub payment_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterDepositInput {
    pub payment_ids: Vec<Uuid>,
    #[serde(with = "rust_decimal::serde::str")]
    pub deposited_amount: Decimal,
    pub deposit_date: Option<NaiveDate>,
}

/// Attach a temporary receipt URL; a URL that cannot be produced is logged
/// and left out
pub async fn present_payment(store: &dyn ObjectStore, ttl: Duration, payment: Payment) -> PaymentView {
    let receipt_url = match &payment.receipt_key {
        Some(key) => match store.url_for(key, ttl).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(payment_id = %payment.id, error = %e, "Could not resolve receipt URL");
                None
            }
        },
        None => None,
    };
    PaymentView {
        payment,
        receipt_url,
    }
}

pub async fn present_payments(
    store: &dyn ObjectStore,
    ttl: Duration,
    payments: Vec<Payment>,
) -> Vec<PaymentView> {
    let mut views = Vec::with_capacity(payments.len());
    for payment in payments {
        views.push(present_payment(store, ttl, payment).await);
    }
    views
}

pub async fn payments_of_sale(db: &PgPool, sale_id: Uuid) -> AppResult<Vec<Payment>> {
    let payments = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE sale_id = $1 ORDER BY payment_date, created_at"
    ))
    .bind(sale_id)
    .fetch_all(db)
    .await?;
    Ok(payments)
}

/// True when no payment references `key` any more
async fn receipt_unreferenced(conn: &mut PgConnection, key: &str) -> AppResult<bool> {
    let referenced = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM payments WHERE receipt_key = $1)",
    )
    .bind(key)
    .fetch_one(&mut *conn)
    .await?;
    Ok(!referenced)
}

fn validate_amount(amount: Decimal) -> AppResult<Decimal> {
    ensure_positive("amount", amount)?;
    Ok(ensure_money_scale("amount", amount)?)
}

/// Payment service
#[derive(Clone)]
pub struct PaymentService {
    db: PgPool,
    store: Arc<dyn ObjectStore>,
    url_ttl: Duration,
    max_upload_bytes: usize,
}

impl PaymentService {
    /// Create a new PaymentService instance
    pub fn new(db: PgPool, store: Arc<dyn ObjectStore>, storage: &StorageConfig) -> Self {
        Self {
            db,
            store,
            url_ttl: Duration::from_secs(storage.presign_ttl_seconds),
            max_upload_bytes: storage.max_upload_bytes,
        }
    }

    /// Add a payment to a sale, with an optional receipt
    pub async fn add_payment(
        &self,
        actor: &Principal,
        sale_id: Uuid,
        input: NewPayment,
        receipt: Option<Upload>,
    ) -> AppResult<PaymentView> {
        validate_amount(input.amount)?;
        let key = self.upload(receipt.as_ref()).await?;

        let result = self.insert_payment(actor, sale_id, &input, key.as_deref()).await;
        let payment = compensate(self.store.as_ref(), key.as_deref(), result).await?;

        tracing::info!(
            payment_id = %payment.id,
            sale_id = %sale_id,
            amount = %payment.amount,
            has_receipt = payment.receipt_key.is_some(),
            "Payment registered"
        );
        Ok(self.present_one(payment).await)
    }

    async fn insert_payment(
        &self,
        actor: &Principal,
        sale_id: Uuid,
        input: &NewPayment,
        receipt_key: Option<&str>,
    ) -> AppResult<Payment> {
        let mut tx = self.db.begin().await?;
        let sale = lock_sale(&mut tx, sale_id).await?;
        ensure_warehouse_scope(actor, sale.warehouse_id)?;

        let mut balance = SaleBalance::new(sale.total, paid_total(&mut tx, sale.id).await?);
        balance.apply(sale.id, input.amount)?;

        let payment = insert_row(&mut tx, actor, sale.id, input.amount, input, receipt_key).await?;
        store_status(&mut tx, sale.id, balance).await?;
        tx.commit().await?;
        Ok(payment)
    }

    /// Edit a payment. The new amount is checked against the balance without
    /// the payment itself; a replaced or removed receipt is deleted after commit.
    pub async fn update_payment(
        &self,
        actor: &Principal,
        payment_id: Uuid,
        changes: PaymentChanges,
        receipt: Option<Upload>,
    ) -> AppResult<PaymentView> {
        if let Some(amount) = changes.amount {
            validate_amount(amount)?;
        }
        let new_key = self.upload(receipt.as_ref()).await?;

        let result = self
            .apply_changes(actor, payment_id, &changes, new_key.as_deref())
            .await;
        let (payment, stale_key) = compensate(self.store.as_ref(), new_key.as_deref(), result).await?;

        if let Some(key) = stale_key {
            delete_quietly(self.store.as_ref(), &key).await;
        }

        tracing::info!(payment_id = %payment.id, amount = %payment.amount, "Payment updated");
        Ok(self.present_one(payment).await)
    }

    async fn apply_changes(
        &self,
        actor: &Principal,
        payment_id: Uuid,
        changes: &PaymentChanges,
        new_key: Option<&str>,
    ) -> AppResult<(Payment, Option<String>)> {
        let mut tx = self.db.begin().await?;
        let (sale, existing) = lock_sale_of_payment(&mut tx, payment_id).await?;
        ensure_warehouse_scope(actor, sale.warehouse_id)?;

        let amount = changes.amount.unwrap_or(existing.amount);
        if amount < existing.deposited_amount {
            return Err(AppError::validation(
                "amount",
                format!(
                    "Amount cannot be lower than the {} already deposited",
                    existing.deposited_amount
                ),
            ));
        }
        let mut balance =
            SaleBalance::new(sale.total, paid_total(&mut tx, sale.id).await?).without(existing.amount);
        balance.apply(sale.id, amount)?;

        let receipt_key = match (new_key, changes.remove_receipt) {
            (Some(key), _) => Some(key.to_string()),
            (None, true) => None,
            (None, false) => existing.receipt_key.clone(),
        };
        let deposited = existing.deposited_amount > Decimal::ZERO
            && amount - existing.deposited_amount <= shared::money::EPSILON;

        let payment = sqlx::query_as::<_, Payment>(&format!(
            r#"
            UPDATE payments
            SET amount = $2, method = $3, reference = $4, payment_date = $5,
                receipt_key = $6, deposited = $7
            WHERE id = $1
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(existing.id)
        .bind(amount)
        .bind(changes.method.unwrap_or(existing.method))
        .bind(changes.reference.as_ref().or(existing.reference.as_ref()))
        .bind(changes.payment_date.unwrap_or(existing.payment_date))
        .bind(&receipt_key)
        .bind(deposited)
        .fetch_one(&mut *tx)
        .await?;
        store_status(&mut tx, sale.id, balance).await?;

        let stale_key = match existing.receipt_key {
            Some(old) if receipt_key.as_deref() != Some(old.as_str()) => {
                receipt_unreferenced(&mut tx, &old).await?.then_some(old)
            }
            _ => None,
        };
        tx.commit().await?;

        Ok((payment, stale_key))
    }

    /// Delete a payment and recompute its sale's status. The receipt object
    /// is removed best-effort once nothing references it.
    pub async fn delete_payment(&self, actor: &Principal, payment_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let (sale, payment) = lock_sale_of_payment(&mut tx, payment_id).await?;
        ensure_warehouse_scope(actor, sale.warehouse_id)?;

        sqlx::query("DELETE FROM payments WHERE id = $1")
            .bind(payment.id)
            .execute(&mut *tx)
            .await?;
        let balance = SaleBalance::new(sale.total, paid_total(&mut tx, sale.id).await?);
        let status = store_status(&mut tx, sale.id, balance).await?;

        let stale_key = match payment.receipt_key {
            Some(key) => receipt_unreferenced(&mut tx, &key).await?.then_some(key),
            None => None,
        };
        tx.commit().await?;

        if let Some(key) = stale_key {
            delete_quietly(self.store.as_ref(), &key).await;
        }

        tracing::info!(
            payment_id = %payment_id,
            sale_id = %sale.id,
            status = status.as_str(),
            "Payment deleted"
        );
        Ok(())
    }

    /// Pay several sales from one receipt. Every pair is checked against the
    /// running balance of its sale before anything is written.
    pub async fn batch_create(
        &self,
        actor: &Principal,
        input: BatchPaymentInput,
        receipt: Option<Upload>,
    ) -> AppResult<Vec<PaymentView>> {
        if input.pairs.is_empty() {
            return Err(DomainError::EmptyBatch.into());
        }
        for pair in &input.pairs {
            validate_amount(pair.amount)?;
        }
        let key = self.upload(receipt.as_ref()).await?;

        let result = self.insert_batch(actor, &input, key.as_deref()).await;
        let payments = compensate(self.store.as_ref(), key.as_deref(), result).await?;

        tracing::info!(
            payments = payments.len(),
            user_id = %actor.user_id,
            has_receipt = key.is_some(),
            "Batch payment registered"
        );

        Ok(present_payments(self.store.as_ref(), self.url_ttl, payments).await)
    }

    async fn insert_batch(
        &self,
        actor: &Principal,
        input: &BatchPaymentInput,
        receipt_key: Option<&str>,
    ) -> AppResult<Vec<Payment>> {
        let mut sale_ids: Vec<Uuid> = input.pairs.iter().map(|p| p.sale_id).collect();
        sale_ids.sort();
        sale_ids.dedup();

        let mut tx = self.db.begin().await?;
        let sales = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&sale_ids)
        .fetch_all(&mut *tx)
        .await?;

        for sale in &sales {
            ensure_warehouse_scope(actor, sale.warehouse_id)?;
        }

        let paid: HashMap<Uuid, Decimal> = sqlx::query_as::<_, (Uuid, Decimal)>(
            r#"
            SELECT sale_id, COALESCE(SUM(amount), 0)
            FROM payments
            WHERE sale_id = ANY($1)
            GROUP BY sale_id
            "#,
        )
        .bind(&sale_ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .collect();

        let balances: HashMap<Uuid, SaleBalance> = sales
            .iter()
            .map(|sale| {
                let paid = paid.get(&sale.id).copied().unwrap_or(Decimal::ZERO);
                (sale.id, SaleBalance::new(sale.total, paid))
            })
            .collect();
        let settled = plan_batch(&balances, &input.pairs)?;

        let details = NewPayment {
            amount: Decimal::ZERO,
            method: input.method,
            reference: input.reference.clone(),
            payment_date: input.payment_date,
        };
        let mut payments = Vec::with_capacity(input.pairs.len());
        for pair in &input.pairs {
            payments.push(
                insert_row(&mut tx, actor, pair.sale_id, pair.amount, &details, receipt_key).await?,
            );
        }
        for (sale_id, balance) in settled {
            store_status(&mut tx, sale_id, balance).await?;
        }
        tx.commit().await?;

        Ok(payments)
    }

    /// Spread a bank deposit over the undeposited part of the given
    /// payments, oldest first
    pub async fn register_deposit(
        &self,
        actor: &Principal,
        input: RegisterDepositInput,
    ) -> AppResult<Vec<PaymentView>> {
        require_role(actor, MANAGERS)?;
        if input.payment_ids.is_empty() {
            return Err(AppError::validation(
                "payment_ids",
                "At least one payment is required",
            ));
        }
        ensure_money_scale("deposited_amount", input.deposited_amount)?;
        let deposit_date = input.deposit_date.unwrap_or_else(|| Utc::now().date_naive());

        let mut ids = input.payment_ids.clone();
        ids.sort();
        ids.dedup();

        let mut tx = self.db.begin().await?;
        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;
        if let Some(missing) = ids.iter().find(|id| !payments.iter().any(|p| p.id == **id)) {
            return Err(DomainError::UnknownPayment(*missing).into());
        }

        let warehouses = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT s.warehouse_id
            FROM sales s
            JOIN payments p ON p.sale_id = s.id
            WHERE p.id = ANY($1)
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;
        for warehouse_id in warehouses {
            ensure_warehouse_scope(actor, warehouse_id)?;
        }

        let candidates = payments
            .iter()
            .map(|p| DepositCandidate {
                payment_id: p.id,
                payment_date: p.payment_date,
                created_at: p.created_at,
                amount: p.amount,
                deposited_amount: p.deposited_amount,
            })
            .collect();
        let allocations = allocate_deposit(candidates, input.deposited_amount)?;

        let mut updated = Vec::with_capacity(allocations.len());
        for allocation in &allocations {
            let payment = sqlx::query_as::<_, Payment>(&format!(
                r#"
                UPDATE payments
                SET deposited_amount = $2, deposited = $3, deposit_date = $4
                WHERE id = $1
                RETURNING {PAYMENT_COLUMNS}
                "#
            ))
            .bind(allocation.payment_id)
            .bind(allocation.deposited_amount)
            .bind(allocation.fully_deposited)
            .bind(deposit_date)
            .fetch_one(&mut *tx)
            .await?;
            updated.push(payment);
        }
        tx.commit().await?;

        tracing::info!(
            amount = %input.deposited_amount,
            payments = updated.len(),
            %deposit_date,
            "Deposit registered against payments"
        );

        Ok(present_payments(self.store.as_ref(), self.url_ttl, updated).await)
    }

    /// Payments of one sale, oldest first
    pub async fn list_for_sale(&self, actor: &Principal, sale_id: Uuid) -> AppResult<Vec<PaymentView>> {
        let warehouse_id =
            sqlx::query_scalar::<_, Uuid>("SELECT warehouse_id FROM sales WHERE id = $1")
                .bind(sale_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or(DomainError::UnknownSale(sale_id))?;
        ensure_warehouse_scope(actor, warehouse_id)?;

        let payments = payments_of_sale(&self.db, sale_id).await?;
        Ok(present_payments(self.store.as_ref(), self.url_ttl, payments).await)
    }

    async fn upload(&self, receipt: Option<&Upload>) -> AppResult<Option<String>> {
        match receipt {
            Some(upload) => {
                upload.validate(self.max_upload_bytes)?;
                Ok(Some(self.store.store(upload, RECEIPT_FOLDER).await?))
            }
            None => Ok(None),
        }
    }

    async fn present_one(&self, payment: Payment) -> PaymentView {
        present_payment(self.store.as_ref(), self.url_ttl, payment).await
    }
}

/// Lock the sale owning a payment, then the payment itself
async fn lock_sale_of_payment(
    conn: &mut PgConnection,
    payment_id: Uuid,
) -> AppResult<(Sale, Payment)> {
    let sale_id = sqlx::query_scalar::<_, Uuid>("SELECT sale_id FROM payments WHERE id = $1")
        .bind(payment_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(DomainError::UnknownPayment(payment_id))?;
    let sale = lock_sale(conn, sale_id).await?;

    let payment = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 FOR UPDATE"
    ))
    .bind(payment_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(DomainError::UnknownPayment(payment_id))?;
    Ok((sale, payment))
}

async fn insert_row(
    conn: &mut PgConnection,
    actor: &Principal,
    sale_id: Uuid,
    amount: Decimal,
    details: &NewPayment,
    receipt_key: Option<&str>,
) -> AppResult<Payment> {
    let payment_date = details
        .payment_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let payment = sqlx::query_as::<_, Payment>(&format!(
        r#"
        INSERT INTO payments (sale_id, amount, method, reference, receipt_key, payment_date, user_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {PAYMENT_COLUMNS}
        "#
    ))
    .bind(sale_id)
    .bind(amount)
    .bind(details.method)
    .bind(&details.reference)
    .bind(receipt_key)
    .bind(payment_date)
    .bind(actor.user_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(payment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::object_store::MemoryObjectStore;
    use std::str::FromStr;

    fn payment(receipt_key: Option<&str>) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            sale_id: Uuid::new_v4(),
            amount: Decimal::from_str("25.00").unwrap(),
            method: PaymentMethod::Efectivo,
            reference: None,
            receipt_key: receipt_key.map(str::to_string),
            payment_date: Utc::now().date_naive(),
            deposited: false,
            deposited_amount: Decimal::ZERO,
            deposit_date: None,
            user_id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn receipt_urls_are_resolved_at_read_time() {
        let store = MemoryObjectStore::default();
        let views = present_payments(
            &store,
            Duration::from_secs(60),
            vec![payment(Some("payment-receipts/a.png")), payment(None)],
        )
        .await;
        assert_eq!(views.len(), 2);
        assert!(views[0]
            .receipt_url
            .as_deref()
            .is_some_and(|url| url.contains("payment-receipts/a.png")));
        assert!(views[1].receipt_url.is_none());
    }

    #[test]
    fn amounts_need_two_decimals_at_most() {
        assert!(validate_amount(Decimal::from_str("10.25").unwrap()).is_ok());
        assert!(validate_amount(Decimal::from_str("10.255").unwrap()).is_err());
        assert!(validate_amount(Decimal::ZERO).is_err());
    }
}
