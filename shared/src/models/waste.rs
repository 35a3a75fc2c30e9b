//! Waste (merma) written off a lot

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::ensure_positive;
use crate::DomainError;

/// Lot kilograms are stored with three decimals
pub const KILOGRAM_SCALE: u32 = 3;

/// Kilograms lost from a lot, optionally pressed into briquettes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct WasteRecord {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub quantity_kg: Decimal,
    pub converted_to_briquettes: bool,
    pub recorded_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Waste must remove a positive weight no finer than a gram
pub fn validate_waste_kg(quantity_kg: Decimal) -> Result<Decimal, DomainError> {
    ensure_positive("quantity_kg", quantity_kg)?;
    if quantity_kg.normalize().scale() > KILOGRAM_SCALE {
        return Err(DomainError::TooPrecise {
            field: "quantity_kg",
            max_decimals: KILOGRAM_SCALE,
        });
    }
    Ok(quantity_kg)
}
