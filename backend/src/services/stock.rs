//! Inventory records and the movement log
//!
//! All quantity changes go through a [`StockBook`] built from rows locked with
//! `SELECT ... FOR UPDATE`, and are written back by [`persist`] inside the
//! caller's transaction.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use shared::ledger::{MovementOrigin, StockBook, StockKey};
use shared::{
    DomainError, InventoryRecord, InventoryStatus, Lot, Movement, MovementType, PaginatedResponse,
    Pagination, Presentation, Principal,
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::access::{ensure_warehouse_scope, require_role, MANAGERS};

const RECORD_COLUMNS: &str =
    "id, presentation_id, warehouse_id, lot_id, quantity, minimum_stock, updated_at";

const MOVEMENT_COLUMNS: &str = "id, movement_type, presentation_id, warehouse_id, lot_id, quantity, \
     user_id, reason, sale_id, operation_id, created_at";

// ============================================================================
// Persistence helpers shared by every stock-changing service
// ============================================================================

/// Lock the records for `keys` and load them into a fresh book.
///
/// Rows are locked in `(presentation_id, warehouse_id)` order so concurrent
/// operations over overlapping keys always queue instead of deadlocking.
pub async fn lock_records(conn: &mut PgConnection, keys: &[StockKey]) -> AppResult<StockBook> {
    let mut keys = keys.to_vec();
    keys.sort();
    keys.dedup();

    let presentations: Vec<Uuid> = keys.iter().map(|k| k.presentation_id).collect();
    let warehouses: Vec<Uuid> = keys.iter().map(|k| k.warehouse_id).collect();

    let records = sqlx::query_as::<_, InventoryRecord>(&format!(
        r#"
        SELECT {RECORD_COLUMNS}
        FROM inventory_records
        WHERE (presentation_id, warehouse_id) IN (
            SELECT * FROM UNNEST($1::uuid[], $2::uuid[])
        )
        ORDER BY presentation_id, warehouse_id
        FOR UPDATE
        "#
    ))
    .bind(&presentations)
    .bind(&warehouses)
    .fetch_all(&mut *conn)
    .await?;

    Ok(StockBook::from_records(&records))
}

/// Write a book back: touched levels, then deletions of reversed movements,
/// then the new movements. Returns the inserted movements in draft order.
pub async fn persist(conn: &mut PgConnection, book: &StockBook) -> AppResult<Vec<Movement>> {
    for (key, level) in book.changes() {
        match level.record_id {
            Some(record_id) => {
                sqlx::query(
                    r#"
                    UPDATE inventory_records
                    SET quantity = $2, lot_id = $3, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(record_id)
                .bind(level.quantity)
                .bind(level.lot_id)
                .execute(&mut *conn)
                .await?;
            }
            None => {
                // A record inserted concurrently is added to, provided it holds
                // the same lot or is empty
                let inserted = sqlx::query_scalar::<_, Uuid>(
                    r#"
                    INSERT INTO inventory_records
                        (presentation_id, warehouse_id, lot_id, quantity, minimum_stock)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (presentation_id, warehouse_id) DO UPDATE
                    SET quantity = inventory_records.quantity + EXCLUDED.quantity,
                        lot_id = CASE WHEN inventory_records.quantity = 0
                                      THEN EXCLUDED.lot_id
                                      ELSE inventory_records.lot_id END,
                        updated_at = NOW()
                    WHERE inventory_records.quantity = 0
                       OR inventory_records.lot_id IS NOT DISTINCT FROM EXCLUDED.lot_id
                    RETURNING id
                    "#,
                )
                .bind(key.presentation_id)
                .bind(key.warehouse_id)
                .bind(level.lot_id)
                .bind(level.quantity)
                .bind(level.minimum_stock)
                .fetch_optional(&mut *conn)
                .await?;

                if inserted.is_none() {
                    return Err(AppError::Conflict {
                        resource: "inventory_record".to_string(),
                        message: "Inventory record was created concurrently with another lot"
                            .to_string(),
                    });
                }
            }
        }
    }

    if !book.reversed().is_empty() {
        sqlx::query("DELETE FROM movements WHERE id = ANY($1)")
            .bind(book.reversed())
            .execute(&mut *conn)
            .await?;
    }

    let mut inserted = Vec::with_capacity(book.movements().len());
    for draft in book.movements() {
        let movement = sqlx::query_as::<_, Movement>(&format!(
            r#"
            INSERT INTO movements
                (movement_type, presentation_id, warehouse_id, lot_id, quantity,
                 user_id, reason, sale_id, operation_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {MOVEMENT_COLUMNS}
            "#
        ))
        .bind(draft.movement_type)
        .bind(draft.presentation_id)
        .bind(draft.warehouse_id)
        .bind(draft.lot_id)
        .bind(draft.quantity)
        .bind(draft.user_id)
        .bind(&draft.reason)
        .bind(draft.origin.sale_id())
        .bind(draft.origin.operation_id())
        .fetch_one(&mut *conn)
        .await?;
        inserted.push(movement);
    }

    Ok(inserted)
}

/// Movements a sale produced, oldest first
pub async fn sale_movements(conn: &mut PgConnection, sale_id: Uuid) -> AppResult<Vec<Movement>> {
    let movements = sqlx::query_as::<_, Movement>(&format!(
        "SELECT {MOVEMENT_COLUMNS} FROM movements WHERE sale_id = $1 ORDER BY created_at, id"
    ))
    .bind(sale_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(movements)
}

/// Take `kg` out of a lot's available kilograms, refusing to go negative
pub async fn consume_lot(conn: &mut PgConnection, lot_id: Uuid, kg: Decimal) -> AppResult<Lot> {
    let lot = lock_lot(conn, lot_id).await?;
    let remaining = lot.remaining_after(kg)?;
    set_lot_available(conn, lot_id, remaining).await
}

/// Give `kg` back to a lot
pub async fn restore_lot(conn: &mut PgConnection, lot_id: Uuid, kg: Decimal) -> AppResult<Lot> {
    let lot = lock_lot(conn, lot_id).await?;
    set_lot_available(conn, lot_id, lot.available_quantity_kg + kg).await
}

async fn lock_lot(conn: &mut PgConnection, lot_id: Uuid) -> AppResult<Lot> {
    sqlx::query_as::<_, Lot>(
        r#"
        SELECT id, product_id, supplier_id, wet_weight_kg, dry_weight_kg,
               available_quantity_kg, received_at, created_at
        FROM lots
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(lot_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Lot".to_string()))
}

async fn set_lot_available(
    conn: &mut PgConnection,
    lot_id: Uuid,
    available: Decimal,
) -> AppResult<Lot> {
    let lot = sqlx::query_as::<_, Lot>(
        r#"
        UPDATE lots SET available_quantity_kg = $2
        WHERE id = $1
        RETURNING id, product_id, supplier_id, wet_weight_kg, dry_weight_kg,
                  available_quantity_kg, received_at, created_at
        "#,
    )
    .bind(lot_id)
    .bind(available)
    .fetch_one(&mut *conn)
    .await?;
    Ok(lot)
}

pub async fn fetch_presentation(conn: &mut PgConnection, id: Uuid) -> AppResult<Presentation> {
    sqlx::query_as::<_, Presentation>(
        r#"
        SELECT id, product_id, name, kind, net_weight_kg, sale_price, active, created_at
        FROM presentations
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::from(DomainError::UnknownPresentation(id)))
}

/// Check a batch of presentation ids with a single query
pub async fn ensure_presentations_exist(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<()> {
    let found = sqlx::query_scalar::<_, Uuid>("SELECT id FROM presentations WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
    match first_missing(ids, &found) {
        Some(id) => Err(DomainError::UnknownPresentation(id).into()),
        None => Ok(()),
    }
}

/// First requested id absent from `found`, in request order
fn first_missing(requested: &[Uuid], found: &[Uuid]) -> Option<Uuid> {
    requested.iter().copied().find(|id| !found.contains(id))
}

pub async fn ensure_warehouse_exists(conn: &mut PgConnection, id: Uuid) -> AppResult<String> {
    sqlx::query_scalar::<_, String>("SELECT name FROM warehouses WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Warehouse".to_string()))
}

// ============================================================================
// Inventory service
// ============================================================================

/// Inventory service for records, manual movements and the movement log
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
}

/// Input for creating an inventory record
#[derive(Debug, Deserialize)]
pub struct InitializeRecordInput {
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
    pub lot_id: Option<Uuid>,
    #[serde(default)]
    pub quantity: i32,
    pub minimum_stock: Option<i32>,
}

/// Input for updating an inventory record; quantity is not writable here
#[derive(Debug, Deserialize)]
pub struct UpdateRecordInput {
    pub minimum_stock: Option<i32>,
    pub lot_id: Option<Uuid>,
}

/// Input for a manual stock movement
#[derive(Debug, Deserialize)]
pub struct ManualMovementInput {
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub quantity: i32,
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct InventoryFilter {
    pub warehouse_id: Option<Uuid>,
    pub presentation_id: Option<Uuid>,
    #[serde(default)]
    pub low_stock: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct MovementFilter {
    pub warehouse_id: Option<Uuid>,
    pub presentation_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub movement_type: Option<MovementType>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl InventoryService {
    /// Create a new InventoryService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create the record for a presentation in a warehouse. A non-zero
    /// starting quantity is credited through the ledger and, when a lot is
    /// given, drawn from the lot's kilograms.
    pub async fn initialize_record(
        &self,
        actor: &Principal,
        input: InitializeRecordInput,
    ) -> AppResult<InventoryRecord> {
        require_role(actor, MANAGERS)?;
        ensure_warehouse_scope(actor, input.warehouse_id)?;
        if input.quantity < 0 {
            return Err(DomainError::InvalidQuantity(input.quantity).into());
        }
        let minimum_stock = input
            .minimum_stock
            .unwrap_or(shared::DEFAULT_MINIMUM_STOCK);
        shared::validate_minimum_stock(minimum_stock)
            .map_err(|msg| AppError::validation("minimum_stock", msg))?;

        let mut tx = self.db.begin().await?;

        let presentation = fetch_presentation(&mut tx, input.presentation_id).await?;
        ensure_warehouse_exists(&mut tx, input.warehouse_id).await?;

        let record = sqlx::query_as::<_, InventoryRecord>(&format!(
            r#"
            INSERT INTO inventory_records (presentation_id, warehouse_id, lot_id, quantity, minimum_stock)
            VALUES ($1, $2, NULL, 0, $3)
            ON CONFLICT (presentation_id, warehouse_id) DO NOTHING
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(input.presentation_id)
        .bind(input.warehouse_id)
        .bind(minimum_stock)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Conflict {
            resource: "inventory_record".to_string(),
            message: "This presentation already has a record in this warehouse".to_string(),
        })?;

        if let Some(lot_id) = input.lot_id {
            self.ensure_lot_matches_product(&mut tx, lot_id, presentation.product_id)
                .await?;
        }

        let key = StockKey::new(record.presentation_id, record.warehouse_id);
        if input.quantity > 0 {
            let mut book = StockBook::from_records([&record]);
            book.credit(
                key,
                input.lot_id,
                input.quantity,
                None,
                actor.user_id,
                "Inventory initialization",
                MovementOrigin::Manual,
            )?;
            persist(&mut tx, &book).await?;
            if let Some(lot_id) = input.lot_id {
                consume_lot(&mut tx, lot_id, presentation.kilograms_for(input.quantity)).await?;
            }
        } else if input.lot_id.is_some() {
            sqlx::query("UPDATE inventory_records SET lot_id = $2 WHERE id = $1")
                .bind(record.id)
                .bind(input.lot_id)
                .execute(&mut *tx)
                .await?;
        }

        let record = Self::fetch_record(&mut tx, record.id).await?;
        tx.commit().await?;

        tracing::info!(
            record_id = %record.id,
            presentation_id = %record.presentation_id,
            warehouse_id = %record.warehouse_id,
            quantity = record.quantity,
            "Inventory record initialized"
        );
        Ok(record)
    }

    /// Change the threshold or, while empty, the lot of a record
    pub async fn update_record(
        &self,
        actor: &Principal,
        record_id: Uuid,
        input: UpdateRecordInput,
    ) -> AppResult<InventoryRecord> {
        require_role(actor, MANAGERS)?;

        let mut tx = self.db.begin().await?;
        let existing = sqlx::query_as::<_, InventoryRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_records WHERE id = $1 FOR UPDATE"
        ))
        .bind(record_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Inventory record".to_string()))?;
        ensure_warehouse_scope(actor, existing.warehouse_id)?;

        let minimum_stock = input.minimum_stock.unwrap_or(existing.minimum_stock);
        shared::validate_minimum_stock(minimum_stock)
            .map_err(|msg| AppError::validation("minimum_stock", msg))?;

        let lot_id = match input.lot_id {
            Some(lot_id) if existing.lot_id != Some(lot_id) => {
                if existing.quantity != 0 {
                    return Err(DomainError::LotMismatch {
                        presentation_id: existing.presentation_id,
                        warehouse_id: existing.warehouse_id,
                        requested: lot_id,
                        current: existing.lot_id,
                    }
                    .into());
                }
                let presentation = fetch_presentation(&mut tx, existing.presentation_id).await?;
                self.ensure_lot_matches_product(&mut tx, lot_id, presentation.product_id)
                    .await?;
                Some(lot_id)
            }
            _ => existing.lot_id,
        };

        let record = sqlx::query_as::<_, InventoryRecord>(&format!(
            r#"
            UPDATE inventory_records
            SET minimum_stock = $2, lot_id = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING {RECORD_COLUMNS}
            "#
        ))
        .bind(record_id)
        .bind(minimum_stock)
        .bind(lot_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(record)
    }

    /// Manual entrada or salida. A lot-backed entrada packs the lot's
    /// kilograms into units of the presentation.
    pub async fn create_movement(
        &self,
        actor: &Principal,
        input: ManualMovementInput,
    ) -> AppResult<Movement> {
        ensure_warehouse_scope(actor, input.warehouse_id)?;
        shared::validate_quantity(input.quantity)
            .map_err(|msg| AppError::validation("quantity", msg))?;
        let reason = input.reason.trim();
        if reason.is_empty() {
            return Err(AppError::validation("reason", "Reason is required"));
        }

        let key = StockKey::new(input.presentation_id, input.warehouse_id);
        let mut tx = self.db.begin().await?;
        let presentation = fetch_presentation(&mut tx, input.presentation_id).await?;
        ensure_warehouse_exists(&mut tx, input.warehouse_id).await?;

        let mut book = lock_records(&mut tx, &[key]).await?;
        match input.movement_type {
            MovementType::Entrada => {
                if let Some(lot_id) = input.lot_id {
                    self.ensure_lot_matches_product(&mut tx, lot_id, presentation.product_id)
                        .await?;
                }
                book.credit(
                    key,
                    input.lot_id,
                    input.quantity,
                    None,
                    actor.user_id,
                    reason,
                    MovementOrigin::Manual,
                )?;
            }
            MovementType::Salida => {
                book.ensure_available(&[(key, input.quantity)])?;
                book.debit(
                    key,
                    input.lot_id,
                    input.quantity,
                    actor.user_id,
                    reason,
                    MovementOrigin::Manual,
                )?;
            }
        }

        let movement = persist(&mut tx, &book)
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Movement was not recorded".to_string()))?;

        if let (MovementType::Entrada, Some(lot_id)) = (input.movement_type, input.lot_id) {
            consume_lot(&mut tx, lot_id, presentation.kilograms_for(input.quantity)).await?;
        }
        tx.commit().await?;

        tracing::info!(
            movement_id = %movement.id,
            movement_type = movement.movement_type.as_str(),
            quantity = movement.quantity,
            user_id = %actor.user_id,
            "Manual movement recorded"
        );
        Ok(movement)
    }

    /// Undo a manual movement and delete it
    pub async fn reverse_movement(&self, actor: &Principal, movement_id: Uuid) -> AppResult<()> {
        require_role(actor, MANAGERS)?;

        let mut tx = self.db.begin().await?;
        let movement = sqlx::query_as::<_, Movement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM movements WHERE id = $1 FOR UPDATE"
        ))
        .bind(movement_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Movement".to_string()))?;
        ensure_warehouse_scope(actor, movement.warehouse_id)?;
        if movement.is_owned() {
            return Err(DomainError::MovementOwned(movement.id).into());
        }

        let key = StockKey::new(movement.presentation_id, movement.warehouse_id);
        let mut book = lock_records(&mut tx, &[key]).await?;
        book.reverse(&movement)?;
        persist(&mut tx, &book).await?;

        if let (MovementType::Entrada, Some(lot_id)) = (movement.movement_type, movement.lot_id) {
            let presentation = fetch_presentation(&mut tx, movement.presentation_id).await?;
            restore_lot(&mut tx, lot_id, presentation.kilograms_for(movement.quantity)).await?;
        }
        tx.commit().await?;

        tracing::info!(movement_id = %movement_id, user_id = %actor.user_id, "Movement reversed");
        Ok(())
    }

    pub async fn list_records(
        &self,
        actor: &Principal,
        filter: InventoryFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<InventoryStatus>> {
        let warehouse_id = actor.warehouse_filter(filter.warehouse_id);
        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR warehouse_id = $1)
              AND ($2::uuid IS NULL OR presentation_id = $2)
              AND (NOT $3 OR quantity <= minimum_stock)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM inventory_records {WHERE}"
        ))
        .bind(warehouse_id)
        .bind(filter.presentation_id)
        .bind(filter.low_stock)
        .fetch_one(&self.db)
        .await?;

        let records = sqlx::query_as::<_, InventoryRecord>(&format!(
            r#"
            SELECT {RECORD_COLUMNS} FROM inventory_records {WHERE}
            ORDER BY warehouse_id, presentation_id
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(warehouse_id)
        .bind(filter.presentation_id)
        .bind(filter.low_stock)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(
            records.into_iter().map(InventoryStatus::from).collect(),
            &pagination,
            total.max(0) as u64,
        ))
    }

    pub async fn list_movements(
        &self,
        actor: &Principal,
        filter: MovementFilter,
        pagination: Pagination,
    ) -> AppResult<PaginatedResponse<Movement>> {
        let range = shared::DateRange {
            start: filter.start,
            end: filter.end,
        };
        range
            .validate()
            .map_err(|msg| AppError::validation("start", msg))?;
        let warehouse_id = actor.warehouse_filter(filter.warehouse_id);
        let start = range.start.map(start_of_day);
        let end = range.end.map(end_of_day);

        const WHERE: &str = r#"
            WHERE ($1::uuid IS NULL OR warehouse_id = $1)
              AND ($2::uuid IS NULL OR presentation_id = $2)
              AND ($3::movement_type IS NULL OR movement_type = $3)
              AND ($4::timestamptz IS NULL OR created_at >= $4)
              AND ($5::timestamptz IS NULL OR created_at < $5)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM movements {WHERE}"))
            .bind(warehouse_id)
            .bind(filter.presentation_id)
            .bind(filter.movement_type)
            .bind(start)
            .bind(end)
            .fetch_one(&self.db)
            .await?;

        let movements = sqlx::query_as::<_, Movement>(&format!(
            r#"
            SELECT {MOVEMENT_COLUMNS} FROM movements {WHERE}
            ORDER BY created_at DESC, id
            LIMIT $6 OFFSET $7
            "#
        ))
        .bind(warehouse_id)
        .bind(filter.presentation_id)
        .bind(filter.movement_type)
        .bind(start)
        .bind(end)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(
            movements,
            &pagination,
            total.max(0) as u64,
        ))
    }

    async fn fetch_record(conn: &mut PgConnection, record_id: Uuid) -> AppResult<InventoryRecord> {
        let record = sqlx::query_as::<_, InventoryRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_records WHERE id = $1"
        ))
        .bind(record_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(record)
    }

    async fn ensure_lot_matches_product(
        &self,
        conn: &mut PgConnection,
        lot_id: Uuid,
        product_id: Uuid,
    ) -> AppResult<()> {
        let lot_product = sqlx::query_scalar::<_, Uuid>("SELECT product_id FROM lots WHERE id = $1")
            .bind(lot_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound("Lot".to_string()))?;
        if lot_product != product_id {
            return Err(AppError::validation(
                "lot_id",
                "Lot belongs to a different product than the presentation",
            ));
        }
        Ok(())
    }
}

/// Inclusive lower bound of a date filter
pub fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Exclusive upper bound of a date filter: midnight after `date`
pub fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    start_of_day(date.succ_opt().unwrap_or(date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_filter_bounds_cover_the_whole_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(start_of_day(day).to_rfc3339(), "2024-03-31T00:00:00+00:00");
        assert_eq!(end_of_day(day).to_rfc3339(), "2024-04-01T00:00:00+00:00");
    }

    #[test]
    fn reports_first_presentation_not_found() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert_eq!(first_missing(&[a, b, c], &[c, a]), Some(b));
        assert_eq!(first_missing(&[a, b], &[b, a]), None);
        assert_eq!(first_missing(&[], &[a]), None);
    }
}
