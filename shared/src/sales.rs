//! Sale planning
//!
//! Turns requested lines into priced lines bound to the lot each record
//! currently holds, validating every line against a [`StockBook`] before any
//! of them is debited.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{MovementDraft, MovementOrigin, StockBook, StockKey};
use crate::models::{Movement, OrderLineItem, OrderStatus};
use crate::money::ensure_money_scale;
use crate::DomainError;

/// A line as the caller supplies it: presentation and quantity, price optional
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLineRequest {
    pub presentation_id: Uuid,
    pub quantity: i32,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub unit_price: Option<Decimal>,
}

/// A validated line, ready to be debited and stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub presentation_id: Uuid,
    pub lot_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl PlannedLine {
    pub fn subtotal(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalePlan {
    pub warehouse_id: Uuid,
    pub lines: Vec<PlannedLine>,
    pub total: Decimal,
}

/// Validate all lines, then price them.
///
/// `prices` maps each known presentation to its current sale price; it is
/// used when a line carries no price of its own.
pub fn plan_sale(
    book: &StockBook,
    warehouse_id: Uuid,
    lines: &[SaleLineRequest],
    prices: &HashMap<Uuid, Decimal>,
) -> Result<SalePlan, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::EmptySale);
    }

    let mut planned = Vec::with_capacity(lines.len());
    let mut demands = Vec::with_capacity(lines.len());

    for line in lines {
        if line.quantity <= 0 {
            return Err(DomainError::InvalidQuantity(line.quantity));
        }
        let current_price = prices
            .get(&line.presentation_id)
            .copied()
            .ok_or(DomainError::UnknownPresentation(line.presentation_id))?;
        let unit_price = line.unit_price.unwrap_or(current_price);
        if unit_price < Decimal::ZERO {
            return Err(DomainError::InvalidAmount {
                field: "unit_price",
            });
        }
        ensure_money_scale("unit_price", unit_price)?;

        let key = StockKey::new(line.presentation_id, warehouse_id);
        let level = book.level(&key).ok_or(DomainError::NoInventoryRecord {
            presentation_id: line.presentation_id,
            warehouse_id,
        })?;
        let lot_id = level.lot_id.ok_or(DomainError::LotNotAssigned {
            presentation_id: line.presentation_id,
            warehouse_id,
        })?;

        demands.push((key, line.quantity));
        planned.push(PlannedLine {
            presentation_id: line.presentation_id,
            lot_id,
            quantity: line.quantity,
            unit_price,
        });
    }

    book.ensure_available(&demands)?;

    let total = planned.iter().map(PlannedLine::subtotal).sum();
    Ok(SalePlan {
        warehouse_id,
        lines: planned,
        total,
    })
}

/// Debit every planned line, tagging the movements with the sale id
pub fn apply_sale(
    book: &mut StockBook,
    plan: &SalePlan,
    sale_id: Uuid,
    user_id: Uuid,
    reason: &str,
) -> Result<Vec<MovementDraft>, DomainError> {
    plan.lines
        .iter()
        .map(|line| {
            book.debit(
                StockKey::new(line.presentation_id, plan.warehouse_id),
                Some(line.lot_id),
                line.quantity,
                user_id,
                reason,
                MovementOrigin::Sale(sale_id),
            )
        })
        .collect()
}

/// Undo every movement a sale produced
pub fn reverse_sale(book: &mut StockBook, movements: &[Movement]) -> Result<(), DomainError> {
    for movement in movements {
        book.reverse(movement)?;
    }
    Ok(())
}

/// Plan the sale an order turns into.
///
/// Terminal orders are refused first. Stock for every order line is then
/// checked in one pass so the caller gets the full shortfall list, and only
/// then are lots resolved and lines priced, either at the presentation's
/// current price or at the estimate stored on the order.
pub fn plan_order_conversion(
    book: &StockBook,
    status: OrderStatus,
    warehouse_id: Uuid,
    order_lines: &[OrderLineItem],
    prices: &HashMap<Uuid, Decimal>,
    use_current_price: bool,
) -> Result<SalePlan, DomainError> {
    status.ensure_open()?;
    if order_lines.is_empty() {
        return Err(DomainError::EmptyOrder);
    }

    let demands: Vec<(StockKey, i32)> = order_lines
        .iter()
        .map(|line| (StockKey::new(line.presentation_id, warehouse_id), line.quantity))
        .collect();
    book.ensure_available(&demands)?;

    let requests: Vec<SaleLineRequest> = order_lines
        .iter()
        .map(|line| SaleLineRequest {
            presentation_id: line.presentation_id,
            quantity: line.quantity,
            unit_price: (!use_current_price).then_some(line.estimated_price),
        })
        .collect();
    plan_sale(book, warehouse_id, &requests, prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InventoryRecord;
    use chrono::Utc;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn price_defaults_to_presentation_price() {
        let warehouse = Uuid::new_v4();
        let presentation = Uuid::new_v4();
        let record = InventoryRecord {
            id: Uuid::new_v4(),
            presentation_id: presentation,
            warehouse_id: warehouse,
            lot_id: Some(Uuid::new_v4()),
            quantity: 20,
            minimum_stock: 5,
            updated_at: Utc::now(),
        };
        let book = StockBook::from_records([&record]);
        let prices = HashMap::from([(presentation, dec("12.50"))]);
        let lines = vec![
            SaleLineRequest {
                presentation_id: presentation,
                quantity: 2,
                unit_price: None,
            },
            SaleLineRequest {
                presentation_id: presentation,
                quantity: 1,
                unit_price: Some(dec("10.00")),
            },
        ];

        let plan = plan_sale(&book, warehouse, &lines, &prices).unwrap();
        assert_eq!(plan.total, dec("35.00"));
        assert_eq!(plan.lines[0].lot_id, record.lot_id.unwrap());
    }

    #[test]
    fn record_without_lot_is_rejected() {
        let warehouse = Uuid::new_v4();
        let presentation = Uuid::new_v4();
        let record = InventoryRecord {
            id: Uuid::new_v4(),
            presentation_id: presentation,
            warehouse_id: warehouse,
            lot_id: None,
            quantity: 20,
            minimum_stock: 5,
            updated_at: Utc::now(),
        };
        let book = StockBook::from_records([&record]);
        let prices = HashMap::from([(presentation, dec("1"))]);
        let lines = vec![SaleLineRequest {
            presentation_id: presentation,
            quantity: 1,
            unit_price: None,
        }];

        assert!(matches!(
            plan_sale(&book, warehouse, &lines, &prices),
            Err(DomainError::LotNotAssigned { .. })
        ));
    }

    #[test]
    fn line_request_rejects_float_prices() {
        let id = Uuid::new_v4();
        let float = format!(r#"{{"presentation_id":"{id}","quantity":1,"unit_price":12.5}}"#);
        assert!(serde_json::from_str::<SaleLineRequest>(&float).is_err());

        let exact = format!(r#"{{"presentation_id":"{id}","quantity":1,"unit_price":"12.50"}}"#);
        let line: SaleLineRequest = serde_json::from_str(&exact).unwrap();
        assert_eq!(line.unit_price, Some(dec("12.50")));

        let absent = format!(r#"{{"presentation_id":"{id}","quantity":1}}"#);
        let line: SaleLineRequest = serde_json::from_str(&absent).unwrap();
        assert_eq!(line.unit_price, None);
    }
}
