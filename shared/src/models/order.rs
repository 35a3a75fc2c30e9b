//! Orders: scheduled future sales and their lifecycle

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "order_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Programado,
    Confirmado,
    Entregado,
    Cancelado,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Programado => "programado",
            OrderStatus::Confirmado => "confirmado",
            OrderStatus::Entregado => "entregado",
            OrderStatus::Cancelado => "cancelado",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Entregado | OrderStatus::Cancelado)
    }

    /// Fails for terminal states, naming which one
    pub fn ensure_open(&self) -> Result<(), DomainError> {
        match self {
            OrderStatus::Entregado => Err(DomainError::AlreadyDelivered),
            OrderStatus::Cancelado => Err(DomainError::AlreadyCancelled),
            _ => Ok(()),
        }
    }

    /// Entregado is reachable only through conversion, never by a plain update
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Programado, Programado)
                | (Programado, Confirmado)
                | (Confirmado, Confirmado)
                | (Programado, Cancelado)
                | (Confirmado, Cancelado)
        )
    }

    pub fn transition(&self, next: OrderStatus) -> Result<OrderStatus, DomainError> {
        self.ensure_open()?;
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidStateTransition {
                from: self.as_str(),
                to: next.as_str(),
            })
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: Uuid,
    pub client_id: Uuid,
    pub warehouse_id: Uuid,
    pub seller_id: Uuid,
    pub delivery_date: NaiveDate,
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderLineItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub presentation_id: Uuid,
    pub quantity: i32,
    pub estimated_price: Decimal,
}
