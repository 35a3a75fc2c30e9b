//! Operating expenses

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "expense_category", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ExpenseCategory {
    Logistica,
    Personal,
    Otros,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Expense {
    pub id: Uuid,
    pub warehouse_id: Uuid,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount: Decimal,
    pub expense_date: NaiveDate,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
