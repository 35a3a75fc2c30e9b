//! Sale planning and stock reversal tests
//!
//! Tests for the sale flow including:
//! - all lines validated before any debit (insufficient stock rejection)
//! - delete restores exactly what the sale consumed, even after a restock on a new lot
//! - editing lines L1 -> L2 -> L1 returns stock to where it started
//! - purchase-frequency projection of the client

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::ledger::{MovementOrigin, StockBook, StockKey};
use shared::projection::project_purchase;
use shared::sales::{apply_sale, plan_sale, reverse_sale, SaleLineRequest};
use shared::{DomainError, InventoryRecord, Movement, MovementType};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// A warehouse stocked with a few presentations, each on its own lot
struct Shop {
    warehouse: Uuid,
    records: Vec<InventoryRecord>,
    prices: HashMap<Uuid, Decimal>,
}

impl Shop {
    fn new(quantities: &[i32]) -> Self {
        let warehouse = Uuid::new_v4();
        let mut records = Vec::new();
        let mut prices = HashMap::new();
        for (i, quantity) in quantities.iter().enumerate() {
            let presentation = Uuid::new_v4();
            prices.insert(presentation, Decimal::from(10 + i as i64));
            records.push(InventoryRecord {
                id: Uuid::new_v4(),
                presentation_id: presentation,
                warehouse_id: warehouse,
                lot_id: Some(Uuid::new_v4()),
                quantity: *quantity,
                minimum_stock: 5,
                updated_at: Utc::now(),
            });
        }
        Shop {
            warehouse,
            records,
            prices,
        }
    }

    fn presentation(&self, i: usize) -> Uuid {
        self.records[i].presentation_id
    }

    fn key(&self, i: usize) -> StockKey {
        StockKey::new(self.presentation(i), self.warehouse)
    }

    fn book(&self) -> StockBook {
        StockBook::from_records(&self.records)
    }

    fn line(&self, i: usize, quantity: i32) -> SaleLineRequest {
        SaleLineRequest {
            presentation_id: self.presentation(i),
            quantity,
            unit_price: None,
        }
    }

    fn quantities(&self, book: &StockBook) -> Vec<i32> {
        (0..self.records.len()).map(|i| book.available(&self.key(i))).collect()
    }
}

/// Plan and debit a sale, returning its movements as stored rows
fn sell(shop: &Shop, book: &mut StockBook, lines: &[SaleLineRequest]) -> Result<Vec<Movement>, DomainError> {
    let sale_id = Uuid::new_v4();
    let plan = plan_sale(book, shop.warehouse, lines, &shop.prices)?;
    let drafts = apply_sale(book, &plan, sale_id, Uuid::new_v4(), "Sale")?;
    Ok(drafts
        .into_iter()
        .map(|d| Movement {
            id: Uuid::new_v4(),
            movement_type: d.movement_type,
            presentation_id: d.presentation_id,
            warehouse_id: d.warehouse_id,
            lot_id: d.lot_id,
            quantity: d.quantity,
            user_id: d.user_id,
            reason: d.reason,
            sale_id: d.origin.sale_id(),
            operation_id: d.origin.operation_id(),
            created_at: Utc::now(),
        })
        .collect())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Scenario B: 15 requested against 10 on hand
    #[test]
    fn test_insufficient_stock_leaves_quantity() {
        let shop = Shop::new(&[10]);
        let mut book = shop.book();

        let err = sell(&shop, &mut book, &[shop.line(0, 15)]).unwrap_err();

        match err {
            DomainError::InsufficientStock { shortfalls } => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].presentation_id, shop.presentation(0));
                assert_eq!(shortfalls[0].requested, 15);
                assert_eq!(shortfalls[0].available, 10);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(book.available(&shop.key(0)), 10);
        assert!(book.movements().is_empty());
    }

    #[test]
    fn test_every_short_line_is_reported() {
        let shop = Shop::new(&[3, 50, 1]);
        let book = shop.book();
        let lines = [shop.line(0, 4), shop.line(1, 5), shop.line(2, 2)];

        let err = plan_sale(&book, shop.warehouse, &lines, &shop.prices).unwrap_err();
        match err {
            DomainError::InsufficientStock { shortfalls } => assert_eq!(shortfalls.len(), 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_repeated_presentation_is_summed() {
        let shop = Shop::new(&[10]);
        let book = shop.book();
        let lines = [shop.line(0, 6), shop.line(0, 6)];
        assert!(matches!(
            plan_sale(&book, shop.warehouse, &lines, &shop.prices),
            Err(DomainError::InsufficientStock { .. })
        ));
    }

    #[test]
    fn test_total_uses_current_price_unless_given() {
        let shop = Shop::new(&[10, 10]);
        let book = shop.book();
        let mut priced = shop.line(1, 2);
        priced.unit_price = Some(dec("7.50"));

        let plan = plan_sale(&book, shop.warehouse, &[shop.line(0, 3), priced], &shop.prices).unwrap();

        // 3 x 10 + 2 x 7.50
        assert_eq!(plan.total, dec("45.00"));
        assert_eq!(plan.lines[0].lot_id, shop.records[0].lot_id.unwrap());
    }

    #[test]
    fn test_rejected_lines() {
        let shop = Shop::new(&[10]);
        let book = shop.book();

        assert!(matches!(
            plan_sale(&book, shop.warehouse, &[], &shop.prices),
            Err(DomainError::EmptySale)
        ));
        assert!(matches!(
            plan_sale(&book, shop.warehouse, &[shop.line(0, 0)], &shop.prices),
            Err(DomainError::InvalidQuantity(0))
        ));

        let mut cheap = shop.line(0, 1);
        cheap.unit_price = Some(dec("-1"));
        assert!(plan_sale(&book, shop.warehouse, &[cheap], &shop.prices).is_err());

        let mut fractional = shop.line(0, 1);
        fractional.unit_price = Some(dec("1.999"));
        assert!(matches!(
            plan_sale(&book, shop.warehouse, &[fractional], &shop.prices),
            Err(DomainError::TooPrecise { .. })
        ));
    }

    #[test]
    fn test_record_without_lot_cannot_be_sold() {
        let mut shop = Shop::new(&[10]);
        shop.records[0].lot_id = None;
        let book = shop.book();
        assert!(matches!(
            plan_sale(&book, shop.warehouse, &[shop.line(0, 1)], &shop.prices),
            Err(DomainError::LotNotAssigned { .. })
        ));
    }

    #[test]
    fn test_other_warehouse_has_no_record() {
        let shop = Shop::new(&[10]);
        let book = shop.book();
        assert!(matches!(
            plan_sale(&book, Uuid::new_v4(), &[shop.line(0, 1)], &shop.prices),
            Err(DomainError::NoInventoryRecord { .. })
        ));
    }

    #[test]
    fn test_sale_movements_are_tagged() {
        let shop = Shop::new(&[10]);
        let mut book = shop.book();
        let movements = sell(&shop, &mut book, &[shop.line(0, 2)]).unwrap();

        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].movement_type, MovementType::Salida);
        assert!(movements[0].sale_id.is_some());
        assert_eq!(movements[0].lot_id, shop.records[0].lot_id);
    }

    /// Deleting a sale undoes its movements and nothing else
    #[test]
    fn test_delete_restores_stock() {
        let shop = Shop::new(&[10, 20]);
        let mut book = shop.book();
        let movements = sell(&shop, &mut book, &[shop.line(0, 4), shop.line(1, 20)]).unwrap();
        assert_eq!(shop.quantities(&book), vec![6, 0]);

        reverse_sale(&mut book, &movements).unwrap();

        assert_eq!(shop.quantities(&book), vec![10, 20]);
        assert_eq!(book.reversed().len(), movements.len());
    }

    /// Sell out lot A, restock the record with lot B, then delete the old sale
    #[test]
    fn test_delete_after_restock_with_new_lot() {
        let shop = Shop::new(&[5]);
        let mut book = shop.book();
        let old_lot = shop.records[0].lot_id;
        let movements = sell(&shop, &mut book, &[shop.line(0, 5)]).unwrap();
        assert_eq!(book.available(&shop.key(0)), 0);

        let new_lot = Uuid::new_v4();
        book.credit(shop.key(0), Some(new_lot), 10, None, Uuid::new_v4(), "Restock", MovementOrigin::Manual)
            .unwrap();

        reverse_sale(&mut book, &movements).unwrap();

        let level = book.level(&shop.key(0)).unwrap();
        assert_eq!(level.quantity, 15);
        assert_eq!(level.lot_id, Some(new_lot));
        assert_ne!(level.lot_id, old_lot);
        assert_eq!(book.reversed().len(), 1);
    }

    #[test]
    fn test_purchase_projection() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let projection = project_purchase(dec("100"), dec("8"), at).unwrap();

        assert_eq!(projection.frequency_days, dec("12.50"));
        assert_eq!(projection.last_purchase_at, at);
        assert_eq!(projection.next_purchase_at, at + Duration::hours(300));

        assert!(matches!(
            project_purchase(dec("100"), Decimal::ZERO, at),
            Err(DomainError::InvalidDailyConsumption)
        ));
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn lines_strategy() -> impl Strategy<Value = Vec<(usize, i32)>> {
        prop::collection::vec((0usize..3, 1i32..15), 1..5)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A sale either debits everything or nothing
        #[test]
        fn prop_sale_is_all_or_nothing(
            stock in prop::collection::vec(0i32..30, 3),
            lines in lines_strategy()
        ) {
            let shop = Shop::new(&stock);
            let mut book = shop.book();
            let requests: Vec<SaleLineRequest> = lines.iter().map(|(i, q)| shop.line(*i, *q)).collect();

            match sell(&shop, &mut book, &requests) {
                Ok(_) => {
                    for (i, before) in stock.iter().enumerate() {
                        let sold: i32 = lines.iter().filter(|(j, _)| *j == i).map(|(_, q)| q).sum();
                        prop_assert_eq!(book.available(&shop.key(i)), before - sold);
                    }
                }
                Err(_) => {
                    prop_assert_eq!(shop.quantities(&book), stock.clone());
                }
            }
            for q in shop.quantities(&book) {
                prop_assert!(q >= 0);
            }
        }

        /// Create then delete leaves every record as it was
        #[test]
        fn prop_delete_is_exact_inverse(
            stock in prop::collection::vec(10i32..40, 3),
            lines in lines_strategy()
        ) {
            let shop = Shop::new(&stock);
            let mut book = shop.book();
            let requests: Vec<SaleLineRequest> = lines.iter().map(|(i, q)| shop.line(*i, *q)).collect();

            if let Ok(movements) = sell(&shop, &mut book, &requests) {
                reverse_sale(&mut book, &movements).unwrap();
                prop_assert_eq!(shop.quantities(&book), stock);
            }
        }

        /// Editing lines L1 -> L2 -> L1 ends where L1 alone ended
        #[test]
        fn prop_update_round_trip(
            stock in prop::collection::vec(20i32..60, 3),
            first in lines_strategy(),
            second in lines_strategy()
        ) {
            let shop = Shop::new(&stock);
            let mut book = shop.book();
            let l1: Vec<SaleLineRequest> = first.iter().map(|(i, q)| shop.line(*i, *q)).collect();
            let l2: Vec<SaleLineRequest> = second.iter().map(|(i, q)| shop.line(*i, *q)).collect();

            let Ok(m1) = sell(&shop, &mut book, &l1) else { return Ok(()); };
            let after_l1 = shop.quantities(&book);

            reverse_sale(&mut book, &m1).unwrap();
            let Ok(m2) = sell(&shop, &mut book, &l2) else { return Ok(()); };

            reverse_sale(&mut book, &m2).unwrap();
            sell(&shop, &mut book, &l1).unwrap();

            prop_assert_eq!(shop.quantities(&book), after_l1);
        }
    }
}
