//! Inter-warehouse transfers

use serde::{Deserialize, Serialize};
use shared::ledger::StockKey;
use shared::transfer::{apply_transfer, operation_tag, TransferEnds, TransferLine};
use shared::{Movement, Principal};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::access::ensure_warehouse_scope;
use crate::services::stock::{
    ensure_presentations_exist, ensure_warehouse_exists, lock_records, persist,
};

#[derive(Clone)]
pub struct TransferService {
    db: PgPool,
}

#[derive(Debug, Deserialize)]
pub struct TransferInput {
    pub origin_warehouse_id: Uuid,
    pub destination_warehouse_id: Uuid,
    pub lines: Vec<TransferLine>,
}

/// Both sides of every moved line, tied together by `operation_id`
#[derive(Debug, Serialize)]
pub struct TransferResult {
    pub operation_id: Uuid,
    pub movements: Vec<Movement>,
}

impl TransferService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Move stock between warehouses atomically. Every line is validated
    /// against the locked records of both warehouses before any is applied.
    pub async fn transfer(&self, actor: &Principal, input: TransferInput) -> AppResult<TransferResult> {
        ensure_warehouse_scope(actor, input.origin_warehouse_id)?;

        let mut tx = self.db.begin().await?;
        let origin_name = ensure_warehouse_exists(&mut tx, input.origin_warehouse_id).await?;
        let destination_name = ensure_warehouse_exists(&mut tx, input.destination_warehouse_id).await?;

        let mut presentations: Vec<Uuid> = input.lines.iter().map(|l| l.presentation_id).collect();
        presentations.sort();
        presentations.dedup();
        ensure_presentations_exist(&mut tx, &presentations).await?;

        let keys: Vec<StockKey> = presentations
            .iter()
            .flat_map(|p| {
                [
                    StockKey::new(*p, input.origin_warehouse_id),
                    StockKey::new(*p, input.destination_warehouse_id),
                ]
            })
            .collect();
        let mut book = lock_records(&mut tx, &keys).await?;

        let operation_id = Uuid::new_v4();
        let ends = TransferEnds {
            origin_id: input.origin_warehouse_id,
            origin_name: &origin_name,
            destination_id: input.destination_warehouse_id,
            destination_name: &destination_name,
        };
        apply_transfer(&mut book, &ends, &input.lines, actor.user_id, operation_id)?;
        let movements = persist(&mut tx, &book).await?;
        tx.commit().await?;

        tracing::info!(
            operation = %operation_tag(operation_id),
            origin = %input.origin_warehouse_id,
            destination = %input.destination_warehouse_id,
            lines = input.lines.len(),
            user_id = %actor.user_id,
            "Transfer completed"
        );

        Ok(TransferResult {
            operation_id,
            movements,
        })
    }
}
