//! Payments against sales and bank deposits

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Efectivo,
    Deposito,
    Transferencia,
    Tarjeta,
    YapePlin,
    Otro,
}

/// Money applied against a sale's balance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Payment {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    /// Opaque object-store key; never a URL
    pub receipt_key: Option<String>,
    pub payment_date: NaiveDate,
    pub deposited: bool,
    pub deposited_amount: Decimal,
    pub deposit_date: Option<NaiveDate>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Part of the amount not yet matched to a bank deposit
    pub fn undeposited(&self) -> Decimal {
        (self.amount - self.deposited_amount).max(Decimal::ZERO)
    }
}

/// Money physically deposited at the bank
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct BankDeposit {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub amount: Decimal,
    pub deposit_date: NaiveDate,
    pub bank_reference: Option<String>,
    pub receipt_key: Option<String>,
    pub notes: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
