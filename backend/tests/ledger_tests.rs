//! Stock ledger tests
//!
//! Covers debit, credit and reversal on a stock book:
//! - quantities never go below zero, whatever the sequence of operations
//! - a rejected operation leaves every level untouched
//! - lot rules on credit and debit
//! - a movement can only be reversed once

use chrono::Utc;
use proptest::prelude::*;
use shared::ledger::{MovementDraft, MovementOrigin, StockBook, StockKey};
use shared::{DomainError, InventoryRecord, Movement, MovementType};
use uuid::Uuid;

fn record(key: StockKey, lot_id: Option<Uuid>, quantity: i32) -> InventoryRecord {
    InventoryRecord {
        id: Uuid::new_v4(),
        presentation_id: key.presentation_id,
        warehouse_id: key.warehouse_id,
        lot_id,
        quantity,
        minimum_stock: 5,
        updated_at: Utc::now(),
    }
}

/// The row a draft becomes once inserted
fn persisted(draft: &MovementDraft) -> Movement {
    Movement {
        id: Uuid::new_v4(),
        movement_type: draft.movement_type,
        presentation_id: draft.presentation_id,
        warehouse_id: draft.warehouse_id,
        lot_id: draft.lot_id,
        quantity: draft.quantity,
        user_id: draft.user_id,
        reason: draft.reason.clone(),
        sale_id: draft.origin.sale_id(),
        operation_id: draft.origin.operation_id(),
        created_at: Utc::now(),
    }
}

fn key() -> StockKey {
    StockKey::new(Uuid::new_v4(), Uuid::new_v4())
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_debit_logs_salida_on_record_lot() {
        let k = key();
        let lot = Uuid::new_v4();
        let user = Uuid::new_v4();
        let mut book = StockBook::from_records([&record(k, Some(lot), 10)]);

        let draft = book
            .debit(k, None, 4, user, "Manual exit", MovementOrigin::Manual)
            .unwrap();

        assert_eq!(draft.movement_type, MovementType::Salida);
        assert_eq!(draft.lot_id, Some(lot));
        assert_eq!(draft.quantity, 4);
        assert_eq!(book.available(&k), 6);
        assert_eq!(book.movements().len(), 1);
    }

    #[test]
    fn test_debit_beyond_stock_is_rejected_without_change() {
        let k = key();
        let mut book = StockBook::from_records([&record(k, Some(Uuid::new_v4()), 10)]);

        let err = book
            .debit(k, None, 15, Uuid::new_v4(), "Too much", MovementOrigin::Manual)
            .unwrap_err();

        match err {
            DomainError::InsufficientStock { shortfalls } => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].requested, 15);
                assert_eq!(shortfalls[0].available, 10);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(book.available(&k), 10);
        assert!(book.movements().is_empty());
        assert_eq!(book.changes().count(), 0);
    }

    #[test]
    fn test_debit_without_record_fails() {
        let k = key();
        let mut book = StockBook::new();
        let result = book.debit(k, None, 1, Uuid::new_v4(), "x", MovementOrigin::Manual);
        assert!(result.is_err());
        assert_eq!(book.available(&k), 0);
    }

    #[test]
    fn test_debit_with_other_lot_is_a_mismatch() {
        let k = key();
        let mut book = StockBook::from_records([&record(k, Some(Uuid::new_v4()), 10)]);
        let result = book.debit(
            k,
            Some(Uuid::new_v4()),
            1,
            Uuid::new_v4(),
            "x",
            MovementOrigin::Manual,
        );
        assert!(matches!(result, Err(DomainError::LotMismatch { .. })));
        assert_eq!(book.available(&k), 10);
    }

    #[test]
    fn test_credit_creates_missing_record() {
        let k = key();
        let lot = Uuid::new_v4();
        let mut book = StockBook::new();

        book.credit(k, Some(lot), 7, Some(3), Uuid::new_v4(), "Intake", MovementOrigin::Manual)
            .unwrap();

        let level = book.level(&k).unwrap();
        assert_eq!(level.quantity, 7);
        assert_eq!(level.minimum_stock, 3);
        assert_eq!(level.lot_id, Some(lot));
        assert_eq!(level.record_id, None);
    }

    #[test]
    fn test_credit_repoints_lot_only_when_empty() {
        let k = key();
        let old_lot = Uuid::new_v4();
        let new_lot = Uuid::new_v4();

        let mut stocked = StockBook::from_records([&record(k, Some(old_lot), 4)]);
        let result = stocked.credit(k, Some(new_lot), 1, None, Uuid::new_v4(), "x", MovementOrigin::Manual);
        assert!(matches!(result, Err(DomainError::LotMismatch { .. })));

        let mut empty = StockBook::from_records([&record(k, Some(old_lot), 0)]);
        empty
            .credit(k, Some(new_lot), 1, None, Uuid::new_v4(), "x", MovementOrigin::Manual)
            .unwrap();
        assert_eq!(empty.level(&k).unwrap().lot_id, Some(new_lot));
    }

    #[test]
    fn test_reverse_restores_and_marks_for_deletion() {
        let k = key();
        let lot = Uuid::new_v4();
        let mut book = StockBook::from_records([&record(k, Some(lot), 10)]);
        let draft = book
            .debit(k, None, 6, Uuid::new_v4(), "Sale", MovementOrigin::Sale(Uuid::new_v4()))
            .unwrap();
        let movement = persisted(&draft);

        book.reverse(&movement).unwrap();

        assert_eq!(book.available(&k), 10);
        assert_eq!(book.reversed(), &[movement.id]);
    }

    #[test]
    fn test_reverse_twice_is_refused() {
        let k = key();
        let mut book = StockBook::from_records([&record(k, Some(Uuid::new_v4()), 10)]);
        let draft = book
            .debit(k, None, 2, Uuid::new_v4(), "x", MovementOrigin::Manual)
            .unwrap();
        let movement = persisted(&draft);

        book.reverse(&movement).unwrap();
        let again = book.reverse(&movement);

        assert!(matches!(again, Err(DomainError::MovementAlreadyReversed(id)) if id == movement.id));
        assert_eq!(book.available(&k), 10);
    }

    #[test]
    fn test_reversing_an_entrada_needs_the_stock_back() {
        let k = key();
        let lot = Uuid::new_v4();
        let mut book = StockBook::from_records([&record(k, Some(lot), 0)]);
        let draft = book
            .credit(k, Some(lot), 5, None, Uuid::new_v4(), "In", MovementOrigin::Manual)
            .unwrap();
        book.debit(k, None, 3, Uuid::new_v4(), "Out", MovementOrigin::Manual)
            .unwrap();

        let result = book.reverse(&persisted(&draft));
        assert!(matches!(result, Err(DomainError::InsufficientStock { .. })));
        assert_eq!(book.available(&k), 2);
    }

    #[test]
    fn test_origin_tags() {
        let sale = Uuid::new_v4();
        let op = Uuid::new_v4();
        assert_eq!(MovementOrigin::Sale(sale).sale_id(), Some(sale));
        assert_eq!(MovementOrigin::Sale(sale).operation_id(), None);
        assert_eq!(MovementOrigin::Transfer(op).operation_id(), Some(op));
        assert_eq!(MovementOrigin::Manual.sale_id(), None);
    }

    #[test]
    fn test_changes_are_in_key_order() {
        let warehouse = Uuid::new_v4();
        let lot = Uuid::new_v4();
        let mut keys: Vec<StockKey> = (0..4).map(|_| StockKey::new(Uuid::new_v4(), warehouse)).collect();
        let records: Vec<InventoryRecord> = keys.iter().map(|k| record(*k, Some(lot), 10)).collect();
        let mut book = StockBook::from_records(&records);

        for k in keys.iter().rev() {
            book.debit(*k, None, 1, Uuid::new_v4(), "x", MovementOrigin::Manual)
                .unwrap();
        }

        keys.sort();
        let changed: Vec<StockKey> = book.changes().map(|(k, _)| *k).collect();
        assert_eq!(changed, keys);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    #[derive(Debug, Clone)]
    enum Op {
        Debit(i32),
        Credit(i32),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1i32..40).prop_map(Op::Debit),
            (1i32..40).prop_map(Op::Credit),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Quantity never drops below zero and a rejected debit changes nothing
        #[test]
        fn prop_stock_never_negative(
            initial in 0i32..50,
            ops in prop::collection::vec(op_strategy(), 1..30)
        ) {
            let k = key();
            let lot = Uuid::new_v4();
            let mut book = StockBook::from_records([&record(k, Some(lot), initial)]);
            let mut expected = initial;

            for op in ops {
                match op {
                    Op::Debit(q) => {
                        let before = book.available(&k);
                        match book.debit(k, None, q, Uuid::new_v4(), "out", MovementOrigin::Manual) {
                            Ok(_) => expected -= q,
                            Err(_) => {
                                prop_assert_eq!(book.available(&k), before);
                            }
                        }
                    }
                    Op::Credit(q) => {
                        book.credit(k, Some(lot), q, None, Uuid::new_v4(), "in", MovementOrigin::Manual)
                            .unwrap();
                        expected += q;
                    }
                }
                prop_assert!(book.available(&k) >= 0);
                prop_assert_eq!(book.available(&k), expected);
            }
        }

        /// Every accepted operation logs one movement of equal magnitude
        #[test]
        fn prop_movements_match_quantity_changes(
            initial in 0i32..50,
            ops in prop::collection::vec(op_strategy(), 1..30)
        ) {
            let k = key();
            let lot = Uuid::new_v4();
            let mut book = StockBook::from_records([&record(k, Some(lot), initial)]);

            for op in ops {
                let _ = match op {
                    Op::Debit(q) => book.debit(k, None, q, Uuid::new_v4(), "out", MovementOrigin::Manual),
                    Op::Credit(q) => book.credit(k, Some(lot), q, None, Uuid::new_v4(), "in", MovementOrigin::Manual),
                };
            }

            let net: i32 = book
                .movements()
                .iter()
                .map(|m| match m.movement_type {
                    MovementType::Entrada => m.quantity,
                    MovementType::Salida => -m.quantity,
                })
                .sum();
            prop_assert_eq!(book.available(&k), initial + net);
        }

        /// Reversing every movement, newest first, returns to the start
        #[test]
        fn prop_reversal_restores_initial(
            initial in 0i32..50,
            ops in prop::collection::vec(op_strategy(), 1..20)
        ) {
            let k = key();
            let lot = Uuid::new_v4();
            let mut book = StockBook::from_records([&record(k, Some(lot), initial)]);
            for op in ops {
                let _ = match op {
                    Op::Debit(q) => book.debit(k, None, q, Uuid::new_v4(), "out", MovementOrigin::Manual),
                    Op::Credit(q) => book.credit(k, Some(lot), q, None, Uuid::new_v4(), "in", MovementOrigin::Manual),
                };
            }

            let movements: Vec<Movement> = book.movements().iter().map(persisted).collect();
            for movement in movements.iter().rev() {
                book.reverse(movement).unwrap();
            }
            prop_assert_eq!(book.available(&k), initial);
            prop_assert_eq!(book.reversed().len(), movements.len());
        }
    }
}
