//! Stock counters and the movement log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum-stock threshold given to records created without one
pub const DEFAULT_MINIMUM_STOCK: i32 = 10;

/// Mutable current-quantity counter per (presentation, warehouse)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryRecord {
    pub id: Uuid,
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
    /// Lot currently stocked for this presentation in this warehouse
    pub lot_id: Option<Uuid>,
    pub quantity: i32,
    pub minimum_stock: i32,
    pub updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.minimum_stock
    }
}

/// Inventory record as listed to clients, flagged when at or under its minimum
#[derive(Debug, Clone, Serialize)]
pub struct InventoryStatus {
    #[serde(flatten)]
    pub record: InventoryRecord,
    pub low_stock: bool,
}

impl From<InventoryRecord> for InventoryStatus {
    fn from(record: InventoryRecord) -> Self {
        Self {
            low_stock: record.is_low_stock(),
            record,
        }
    }
}

/// Direction of a stock movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "movement_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    /// Stock coming in
    Entrada,
    /// Stock going out
    Salida,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entrada => "entrada",
            MovementType::Salida => "salida",
        }
    }
}

/// Immutable ledger entry recording one stock change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Movement {
    pub id: Uuid,
    pub movement_type: MovementType,
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub quantity: i32,
    pub user_id: Uuid,
    pub reason: String,
    /// Owning sale, when the movement was produced by a sale
    pub sale_id: Option<Uuid>,
    /// Shared id of a transfer's salida/entrada pair
    pub operation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// Movements owned by a sale or a transfer can only be undone through their owner
    pub fn is_owned(&self) -> bool {
        self.sale_id.is_some() || self.operation_id.is_some()
    }
}
