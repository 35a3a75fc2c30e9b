//! Catalog models: warehouses, clients, products, presentations and lots

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A physical storage location; the scope boundary for stock and user access
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Warehouse {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A customer, with the purchase projection maintained by sales
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub purchase_frequency_days: Option<Decimal>,
    pub last_purchase_at: Option<DateTime<Utc>>,
    pub next_purchase_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Packaging form of a presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "presentation_kind", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum PresentationKind {
    Bruto,
    Procesado,
    Merma,
    Briqueta,
    Detalle,
}

/// Sellable unit of a product, e.g. a 5 kg bag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Presentation {
    pub id: Uuid,
    pub product_id: Uuid,
    pub name: String,
    pub kind: PresentationKind,
    pub net_weight_kg: Decimal,
    pub sale_price: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Presentation {
    /// Kilograms of raw material packed into `units` of this presentation
    pub fn kilograms_for(&self, units: i32) -> Decimal {
        self.net_weight_kg * Decimal::from(units)
    }
}

/// Where raw material comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A traceable intake of raw material from a supplier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Lot {
    pub id: Uuid,
    pub product_id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub wet_weight_kg: Option<Decimal>,
    pub dry_weight_kg: Option<Decimal>,
    pub available_quantity_kg: Decimal,
    pub received_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Lot {
    /// Remaining kilograms after consuming `kg`, refusing to go negative
    pub fn remaining_after(&self, kg: Decimal) -> Result<Decimal, crate::DomainError> {
        if kg > self.available_quantity_kg {
            return Err(crate::DomainError::InsufficientLotStock {
                lot_id: self.id,
                requested_kg: kg,
                available_kg: self.available_quantity_kg,
            });
        }
        Ok(self.available_quantity_kg - kg)
    }
}
