//! Domain rule violations
//!
//! These carry enough structured detail (ids, requested and available amounts)
//! for a client to fix the request without re-querying.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// One line that cannot be served from current stock
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shortfall {
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
    pub requested: i32,
    pub available: i32,
}

/// Broad class of a domain error, used to pick the HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainErrorKind {
    Validation,
    NotFound,
    InsufficientStock,
    BalanceExceeded,
    State,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Insufficient stock for {} line(s)", shortfalls.len())]
    InsufficientStock { shortfalls: Vec<Shortfall> },

    #[error("No inventory record for presentation {presentation_id} in warehouse {warehouse_id}")]
    NoInventoryRecord {
        presentation_id: Uuid,
        warehouse_id: Uuid,
    },

    #[error("No lot assigned to presentation {presentation_id} in warehouse {warehouse_id}")]
    LotNotAssigned {
        presentation_id: Uuid,
        warehouse_id: Uuid,
    },

    #[error("Lot {requested} does not match the lot stocked for presentation {presentation_id}")]
    LotMismatch {
        presentation_id: Uuid,
        warehouse_id: Uuid,
        requested: Uuid,
        current: Option<Uuid>,
    },

    #[error("Lot {lot_id} has {available_kg} kg available, {requested_kg} kg requested")]
    InsufficientLotStock {
        lot_id: Uuid,
        requested_kg: Decimal,
        available_kg: Decimal,
    },

    #[error("Payment of {requested} exceeds pending balance {pending} of sale {sale_id}")]
    AmountExceedsBalance {
        sale_id: Uuid,
        pending: Decimal,
        requested: Decimal,
    },

    #[error("Sale total {total} is below the {paid} already paid")]
    TotalBelowPaid { total: Decimal, paid: Decimal },

    #[error("Deposit of {requested} exceeds undeposited amount {available}")]
    DepositExceedsUndeposited {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("{field} must be positive")]
    InvalidAmount { field: &'static str },

    #[error("{field} is not an exact decimal: {value:?}")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("{field} allows at most {max_decimals} decimals")]
    TooPrecise {
        field: &'static str,
        max_decimals: u32,
    },

    #[error("A sale needs at least one line item")]
    EmptySale,

    #[error("The order has no line items")]
    EmptyOrder,

    #[error("A transfer needs at least one line")]
    EmptyTransfer,

    #[error("A batch needs at least one sale/amount pair")]
    EmptyBatch,

    #[error("Origin and destination warehouse must differ")]
    SameWarehouse,

    #[error("Presentation {0} not found")]
    UnknownPresentation(Uuid),

    #[error("Sale {0} not found")]
    UnknownSale(Uuid),

    #[error("Payment {0} not found")]
    UnknownPayment(Uuid),

    #[error("Order has already been delivered")]
    AlreadyDelivered,

    #[error("Order has been cancelled")]
    AlreadyCancelled,

    #[error("Cannot move order from {from} to {to}")]
    InvalidStateTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Movement {0} was already reversed")]
    MovementAlreadyReversed(Uuid),

    #[error("Movement {0} belongs to a sale or transfer and can only be undone through it")]
    MovementOwned(Uuid),

    #[error("Daily consumption must be greater than zero")]
    InvalidDailyConsumption,
}

impl DomainError {
    pub fn kind(&self) -> DomainErrorKind {
        use DomainError::*;
        match self {
            InsufficientStock { .. } | NoInventoryRecord { .. } | InsufficientLotStock { .. } => {
                DomainErrorKind::InsufficientStock
            }
            AmountExceedsBalance { .. }
            | TotalBelowPaid { .. }
            | DepositExceedsUndeposited { .. } => DomainErrorKind::BalanceExceeded,
            UnknownPresentation(_) | UnknownSale(_) | UnknownPayment(_) => {
                DomainErrorKind::NotFound
            }
            AlreadyDelivered
            | AlreadyCancelled
            | InvalidStateTransition { .. }
            | MovementAlreadyReversed(_)
            | MovementOwned(_) => DomainErrorKind::State,
            _ => DomainErrorKind::Validation,
        }
    }

    /// Machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        use DomainError::*;
        match self {
            InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            NoInventoryRecord { .. } => "NO_INVENTORY_RECORD",
            LotNotAssigned { .. } => "LOT_NOT_ASSIGNED",
            LotMismatch { .. } => "LOT_MISMATCH",
            InsufficientLotStock { .. } => "INSUFFICIENT_LOT_STOCK",
            AmountExceedsBalance { .. } => "AMOUNT_EXCEEDS_BALANCE",
            TotalBelowPaid { .. } => "TOTAL_BELOW_PAID",
            DepositExceedsUndeposited { .. } => "DEPOSIT_EXCEEDS_UNDEPOSITED",
            InvalidQuantity(_) | InvalidAmount { .. } | InvalidDecimal { .. } | TooPrecise { .. } => {
                "VALIDATION_ERROR"
            }
            EmptySale => "EMPTY_SALE",
            EmptyOrder => "EMPTY_ORDER",
            EmptyTransfer => "EMPTY_TRANSFER",
            EmptyBatch => "EMPTY_BATCH",
            SameWarehouse => "SAME_WAREHOUSE",
            UnknownPresentation(_) | UnknownSale(_) | UnknownPayment(_) => "NOT_FOUND",
            AlreadyDelivered => "ALREADY_DELIVERED",
            AlreadyCancelled => "ALREADY_CANCELLED",
            InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            MovementAlreadyReversed(_) => "MOVEMENT_ALREADY_REVERSED",
            MovementOwned(_) => "MOVEMENT_OWNED",
            InvalidDailyConsumption => "INVALID_DAILY_CONSUMPTION",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            DomainError::InsufficientStock { shortfalls: vec![] }.kind(),
            DomainErrorKind::InsufficientStock
        );
        assert_eq!(
            DomainError::AmountExceedsBalance {
                sale_id: Uuid::nil(),
                pending: Decimal::ZERO,
                requested: Decimal::ONE,
            }
            .kind(),
            DomainErrorKind::BalanceExceeded
        );
        assert_eq!(DomainError::AlreadyDelivered.kind(), DomainErrorKind::State);
        assert_eq!(DomainError::EmptySale.kind(), DomainErrorKind::Validation);
        assert_eq!(
            DomainError::UnknownSale(Uuid::nil()).kind(),
            DomainErrorKind::NotFound
        );
    }
}
