//! Waste (merma) written off lots
//!
//! Recording waste takes the kilograms out of the lot's available weight in
//! the same transaction; deleting a record gives them back.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::{validate_waste_kg, DateRange, PaginatedResponse, Pagination, Principal, WasteRecord};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::access::{require_role, MANAGERS};
use crate::services::stock::{consume_lot, end_of_day, restore_lot, start_of_day};

const WASTE_COLUMNS: &str =
    "id, lot_id, quantity_kg, converted_to_briquettes, recorded_at, user_id, created_at";

#[derive(Clone)]
pub struct WasteService {
    db: PgPool,
}

#[derive(Debug, Deserialize)]
pub struct RecordWasteInput {
    pub lot_id: Uuid,
    #[serde(with = "rust_decimal::serde::str")]
    pub quantity_kg: Decimal,
    #[serde(default)]
    pub converted_to_briquettes: bool,
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WasteFilter {
    pub lot_id: Option<Uuid>,
    pub converted_to_briquettes: Option<bool>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl WasteService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn record(&self, actor: &Principal, input: RecordWasteInput) -> AppResult<WasteRecord> {
        require_role(actor, MANAGERS)?;
        let quantity_kg = validate_waste_kg(input.quantity_kg)?;

        let mut tx = self.db.begin().await?;
        let lot = consume_lot(&mut tx, input.lot_id, quantity_kg).await?;

        let waste = sqlx::query_as::<_, WasteRecord>(&format!(
            r#"
            INSERT INTO waste (lot_id, quantity_kg, converted_to_briquettes, recorded_at, user_id)
            VALUES ($1, $2, $3, COALESCE($4, NOW()), $5)
            RETURNING {WASTE_COLUMNS}
            "#
        ))
        .bind(input.lot_id)
        .bind(quantity_kg)
        .bind(input.converted_to_briquettes)
        .bind(input.recorded_at)
        .bind(actor.user_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(
            waste_id = %waste.id,
            lot_id = %lot.id,
            quantity_kg = %quantity_kg,
            remaining_kg = %lot.available_quantity_kg,
            "Waste recorded"
        );
        Ok(waste)
    }

    pub async fn list(
        &self,
        filter: WasteFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<WasteRecord>> {
        let range = DateRange {
            start: filter.start,
            end: filter.end,
        };
        range
            .validate()
            .map_err(|msg| AppError::validation("start", msg))?;
        let start = filter.start.map(start_of_day);
        let end = filter.end.map(end_of_day);

        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR lot_id = $1)
              AND ($2::boolean IS NULL OR converted_to_briquettes = $2)
              AND ($3::timestamptz IS NULL OR recorded_at >= $3)
              AND ($4::timestamptz IS NULL OR recorded_at < $4)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM waste {WHERE}"))
            .bind(filter.lot_id)
            .bind(filter.converted_to_briquettes)
            .bind(start)
            .bind(end)
            .fetch_one(&self.db)
            .await?;

        let records = sqlx::query_as::<_, WasteRecord>(&format!(
            r#"
            SELECT {WASTE_COLUMNS} FROM waste {WHERE}
            ORDER BY recorded_at DESC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(filter.lot_id)
        .bind(filter.converted_to_briquettes)
        .bind(start)
        .bind(end)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(records, &pagination, total.max(0) as u64))
    }

    /// Undo a waste record, returning its kilograms to the lot
    pub async fn delete(&self, actor: &Principal, id: Uuid) -> AppResult<()> {
        require_role(actor, MANAGERS)?;

        let mut tx = self.db.begin().await?;
        let waste = sqlx::query_as::<_, WasteRecord>(&format!(
            "SELECT {WASTE_COLUMNS} FROM waste WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Waste record".to_string()))?;

        restore_lot(&mut tx, waste.lot_id, waste.quantity_kg).await?;
        sqlx::query("DELETE FROM waste WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(waste_id = %id, lot_id = %waste.lot_id, user_id = %actor.user_id, "Waste deleted");
        Ok(())
    }
}
