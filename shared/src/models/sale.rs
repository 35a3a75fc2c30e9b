//! Sale models and payment status derivation

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::EPSILON;

/// How the client intends to pay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "payment_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    #[default]
    Contado,
    Credito,
}

/// Aggregate payment state of a sale, cached on the sale row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "payment_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pendiente,
    Parcial,
    Pagado,
}

impl PaymentStatus {
    /// Status as a pure function of the sale total and the sum of its payments.
    ///
    /// A balance within `EPSILON` of zero counts as settled, so a zero-total
    /// sale is `Pagado`.
    pub fn derive(total: Decimal, paid: Decimal) -> Self {
        if (total - paid).abs() <= EPSILON {
            PaymentStatus::Pagado
        } else if paid > EPSILON {
            PaymentStatus::Parcial
        } else {
            PaymentStatus::Pendiente
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pendiente => "pendiente",
            PaymentStatus::Parcial => "parcial",
            PaymentStatus::Pagado => "pagado",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: Uuid,
    pub client_id: Uuid,
    pub warehouse_id: Uuid,
    pub seller_id: Uuid,
    /// Order this sale was converted from, if any
    pub order_id: Option<Uuid>,
    pub total: Decimal,
    pub payment_type: PaymentType,
    pub payment_status: PaymentStatus,
    pub daily_consumption_kg: Option<Decimal>,
    pub sale_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLineItem {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub presentation_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl SaleLineItem {
    pub fn subtotal(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn status_thresholds() {
        assert_eq!(PaymentStatus::derive(dec("100"), dec("0")), PaymentStatus::Pendiente);
        assert_eq!(PaymentStatus::derive(dec("100"), dec("0.01")), PaymentStatus::Parcial);
        assert_eq!(PaymentStatus::derive(dec("100"), dec("99.9995")), PaymentStatus::Pagado);
        assert_eq!(PaymentStatus::derive(dec("100"), dec("100")), PaymentStatus::Pagado);
        assert_eq!(PaymentStatus::derive(dec("0"), dec("0")), PaymentStatus::Pagado);
    }
}
