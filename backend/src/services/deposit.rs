//! Bank deposits
//!
//! A deposit records money taken to the bank for one warehouse. Its receipt
//! follows the same upload rules as payment receipts.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::money::{ensure_money_scale, ensure_positive};
use shared::{BankDeposit, DateRange, PaginatedResponse, Pagination, Principal};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};
use crate::external::{compensate, delete_quietly, ObjectStore, Upload};
use crate::services::access::{ensure_warehouse_scope, require_role, MANAGERS};

const DEPOSIT_COLUMNS: &str = "id, warehouse_id, amount, deposit_date, bank_reference, \
     receipt_key, notes, user_id, created_at";

/// Object-store folder for deposit slips
pub const DEPOSIT_FOLDER: &str = "deposit-receipts";

#[derive(Debug, Serialize)]
pub struct DepositView {
    #[serde(flatten)]
    pub deposit: BankDeposit,
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewDeposit {
    pub warehouse_id: Uuid,
    pub amount: Decimal,
    pub deposit_date: Option<NaiveDate>,
    pub bank_reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DepositChanges {
    pub amount: Option<Decimal>,
    pub deposit_date: Option<NaiveDate>,
    pub bank_reference: Option<String>,
    pub notes: Option<String>,
    pub remove_receipt: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct DepositFilter {
    pub warehouse_id: Option<Uuid>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Clone)]
pub struct DepositService {
    db: PgPool,
    store: Arc<dyn ObjectStore>,
    url_ttl: Duration,
    max_upload_bytes: usize,
}

impl DepositService {
    pub fn new(db: PgPool, store: Arc<dyn ObjectStore>, storage: &StorageConfig) -> Self {
        Self {
            db,
            store,
            url_ttl: Duration::from_secs(storage.presign_ttl_seconds),
            max_upload_bytes: storage.max_upload_bytes,
        }
    }

    pub async fn create(
        &self,
        actor: &Principal,
        input: NewDeposit,
        receipt: Option<Upload>,
    ) -> AppResult<DepositView> {
        ensure_warehouse_scope(actor, input.warehouse_id)?;
        let amount = validate_amount(input.amount)?;
        let key = self.upload(receipt.as_ref()).await?;

        let result = sqlx::query_as::<_, BankDeposit>(&format!(
            r#"
            INSERT INTO bank_deposits
                (warehouse_id, amount, deposit_date, bank_reference, receipt_key, notes, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {DEPOSIT_COLUMNS}
            "#
        ))
        .bind(input.warehouse_id)
        .bind(amount)
        .bind(input.deposit_date.unwrap_or_else(|| Utc::now().date_naive()))
        .bind(&input.bank_reference)
        .bind(&key)
        .bind(&input.notes)
        .bind(actor.user_id)
        .fetch_one(&self.db)
        .await
        .map_err(AppError::from);
        let deposit = compensate(self.store.as_ref(), key.as_deref(), result).await?;

        tracing::info!(
            deposit_id = %deposit.id,
            warehouse_id = %deposit.warehouse_id,
            amount = %deposit.amount,
            "Bank deposit recorded"
        );
        Ok(self.present(deposit).await)
    }

    pub async fn list(
        &self,
        actor: &Principal,
        filter: DepositFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<DepositView>> {
        DateRange {
            start: filter.start,
            end: filter.end,
        }
        .validate()
        .map_err(|msg| AppError::validation("start", msg))?;
        let warehouse = actor.warehouse_filter(filter.warehouse_id);

        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR warehouse_id = $1)
              AND ($2::date IS NULL OR deposit_date >= $2)
              AND ($3::date IS NULL OR deposit_date <= $3)
        "#;

        let total =
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM bank_deposits {WHERE}"))
                .bind(warehouse)
                .bind(filter.start)
                .bind(filter.end)
                .fetch_one(&self.db)
                .await?;

        let deposits = sqlx::query_as::<_, BankDeposit>(&format!(
            r#"
            SELECT {DEPOSIT_COLUMNS} FROM bank_deposits {WHERE}
            ORDER BY deposit_date DESC, created_at DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(warehouse)
        .bind(filter.start)
        .bind(filter.end)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        let mut views = Vec::with_capacity(deposits.len());
        for deposit in deposits {
            views.push(self.present(deposit).await);
        }
        Ok(PaginatedResponse::new(views, &pagination, total.max(0) as u64))
    }

    pub async fn get(&self, actor: &Principal, id: Uuid) -> AppResult<DepositView> {
        let deposit = self.fetch(id).await?;
        ensure_warehouse_scope(actor, deposit.warehouse_id)?;
        Ok(self.present(deposit).await)
    }

    /// Edit a deposit. A new receipt replaces the old one, which is deleted
    /// only once the row no longer points at it.
    pub async fn update(
        &self,
        actor: &Principal,
        id: Uuid,
        changes: DepositChanges,
        receipt: Option<Upload>,
    ) -> AppResult<DepositView> {
        require_role(actor, MANAGERS)?;
        if let Some(amount) = changes.amount {
            validate_amount(amount)?;
        }
        let key = self.upload(receipt.as_ref()).await?;

        let result = self.apply_changes(actor, id, &changes, key.as_deref()).await;
        let (deposit, stale_key) = compensate(self.store.as_ref(), key.as_deref(), result).await?;

        if let Some(stale) = stale_key {
            delete_quietly(self.store.as_ref(), &stale).await;
        }
        tracing::info!(deposit_id = %deposit.id, user_id = %actor.user_id, "Bank deposit updated");
        Ok(self.present(deposit).await)
    }

    async fn apply_changes(
        &self,
        actor: &Principal,
        id: Uuid,
        changes: &DepositChanges,
        new_key: Option<&str>,
    ) -> AppResult<(BankDeposit, Option<String>)> {
        let mut tx = self.db.begin().await?;
        let existing = sqlx::query_as::<_, BankDeposit>(&format!(
            "SELECT {DEPOSIT_COLUMNS} FROM bank_deposits WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Bank deposit".to_string()))?;
        ensure_warehouse_scope(actor, existing.warehouse_id)?;

        let receipt_key = match new_key {
            Some(key) => Some(key.to_string()),
            None if changes.remove_receipt => None,
            None => existing.receipt_key.clone(),
        };
        let stale_key = existing
            .receipt_key
            .clone()
            .filter(|old| receipt_key.as_deref() != Some(old.as_str()));

        let deposit = sqlx::query_as::<_, BankDeposit>(&format!(
            r#"
            UPDATE bank_deposits
            SET amount = $2, deposit_date = $3, bank_reference = $4, notes = $5, receipt_key = $6
            WHERE id = $1
            RETURNING {DEPOSIT_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(changes.amount.unwrap_or(existing.amount))
        .bind(changes.deposit_date.unwrap_or(existing.deposit_date))
        .bind(changes.bank_reference.clone().or(existing.bank_reference))
        .bind(changes.notes.clone().or(existing.notes))
        .bind(&receipt_key)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((deposit, stale_key))
    }

    pub async fn delete(&self, actor: &Principal, id: Uuid) -> AppResult<()> {
        require_role(actor, MANAGERS)?;
        let deposit = self.fetch(id).await?;
        ensure_warehouse_scope(actor, deposit.warehouse_id)?;

        sqlx::query("DELETE FROM bank_deposits WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        if let Some(key) = &deposit.receipt_key {
            delete_quietly(self.store.as_ref(), key).await;
        }
        tracing::info!(deposit_id = %id, user_id = %actor.user_id, "Bank deposit deleted");
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> AppResult<BankDeposit> {
        sqlx::query_as::<_, BankDeposit>(&format!(
            "SELECT {DEPOSIT_COLUMNS} FROM bank_deposits WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Bank deposit".to_string()))
    }

    async fn upload(&self, receipt: Option<&Upload>) -> AppResult<Option<String>> {
        match receipt {
            Some(upload) => {
                upload.validate(self.max_upload_bytes)?;
                Ok(Some(self.store.store(upload, DEPOSIT_FOLDER).await?))
            }
            None => Ok(None),
        }
    }

    async fn present(&self, deposit: BankDeposit) -> DepositView {
        let receipt_url = match &deposit.receipt_key {
            Some(key) => match self.store.url_for(key, self.url_ttl).await {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(deposit_id = %deposit.id, error = %e, "Could not resolve receipt URL");
                    None
                }
            },
            None => None,
        };
        DepositView {
            deposit,
            receipt_url,
        }
    }
}

fn validate_amount(amount: Decimal) -> AppResult<Decimal> {
    ensure_positive("amount", amount)?;
    Ok(ensure_money_scale("amount", amount)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::MemoryObjectStore;

    fn upload() -> Upload {
        Upload {
            filename: "slip.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            bytes: b"%PDF-1.4".to_vec(),
        }
    }

    #[tokio::test]
    async fn deposit_slips_land_in_their_own_folder() {
        let store = MemoryObjectStore::default();
        let key = store.store(&upload(), DEPOSIT_FOLDER).await.unwrap();
        assert!(key.starts_with("deposit-receipts/slip_"));
        assert!(key.ends_with(".pdf"));
    }

    #[test]
    fn deposit_amount_must_be_positive_cents() {
        assert!(validate_amount(Decimal::new(15000, 2)).is_ok());
        assert!(validate_amount(Decimal::ZERO).is_err());
        assert!(validate_amount(Decimal::new(1001, 3)).is_err());
    }
}
