//! Payment reconciliation tests
//!
//! Tests for balances, batches and bank deposits:
//! - the sum of a sale's payments never exceeds its total
//! - payment status is a pure function of total and amount paid
//! - a batch is checked against running balances and fails as a whole
//! - deposits fill the oldest payments first

use chrono::{NaiveDate, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::reconciliation::{allocate_deposit, plan_batch, BatchPair, DepositCandidate, SaleBalance};
use shared::{DomainError, PaymentStatus};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn candidate(day: u32, amount: &str, deposited: &str) -> DepositCandidate {
    DepositCandidate {
        payment_id: Uuid::new_v4(),
        payment_date: NaiveDate::from_ymd_opt(2024, 6, day).unwrap(),
        created_at: Utc::now(),
        amount: dec(amount),
        deposited_amount: dec(deposited),
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Scenario A: 60 + 40 settles a sale of 100; anything more is refused
    #[test]
    fn test_payments_settle_then_refuse() {
        let sale = Uuid::new_v4();
        let mut balance = SaleBalance::new(dec("100.00"), Decimal::ZERO);

        balance.apply(sale, dec("60.00")).unwrap();
        assert_eq!(balance.status(), PaymentStatus::Parcial);

        balance.apply(sale, dec("40.00")).unwrap();
        assert_eq!(balance.status(), PaymentStatus::Pagado);

        let err = balance.apply(sale, dec("0.01")).unwrap_err();
        match err {
            DomainError::AmountExceedsBalance {
                sale_id,
                pending,
                requested,
            } => {
                assert_eq!(sale_id, sale);
                assert_eq!(pending, Decimal::ZERO);
                assert_eq!(requested, dec("0.01"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(balance.paid, dec("100.00"));
    }

    #[test]
    fn test_status_derivation() {
        assert_eq!(PaymentStatus::derive(dec("100"), Decimal::ZERO), PaymentStatus::Pendiente);
        assert_eq!(PaymentStatus::derive(dec("100"), dec("0.01")), PaymentStatus::Parcial);
        assert_eq!(PaymentStatus::derive(dec("100"), dec("99.99")), PaymentStatus::Parcial);
        assert_eq!(PaymentStatus::derive(dec("100"), dec("100.00")), PaymentStatus::Pagado);
        assert_eq!(PaymentStatus::derive(Decimal::ZERO, Decimal::ZERO), PaymentStatus::Pagado);
    }

    #[test]
    fn test_amount_must_be_positive_cents() {
        let balance = SaleBalance::new(dec("100"), Decimal::ZERO);
        let sale = Uuid::new_v4();
        assert!(balance.check(sale, Decimal::ZERO).is_err());
        assert!(balance.check(sale, dec("-5")).is_err());
        assert!(matches!(
            balance.check(sale, dec("10.005")),
            Err(DomainError::TooPrecise { .. })
        ));
    }

    #[test]
    fn test_lower_total_below_paid_is_refused() {
        let balance = SaleBalance::new(dec("100"), dec("80"));
        assert!(matches!(
            balance.retotal(dec("79.99")),
            Err(DomainError::TotalBelowPaid { .. })
        ));
        let lowered = balance.retotal(dec("80")).unwrap();
        assert_eq!(lowered.status(), PaymentStatus::Pagado);
    }

    /// Scenario E: two pairs of 30 against a balance of 50
    #[test]
    fn test_batch_uses_running_balance() {
        let sale = Uuid::new_v4();
        let balances = HashMap::from([(sale, SaleBalance::new(dec("50.00"), Decimal::ZERO))]);
        let pairs = vec![
            BatchPair { sale_id: sale, amount: dec("30.00") },
            BatchPair { sale_id: sale, amount: dec("30.00") },
        ];

        let err = plan_batch(&balances, &pairs).unwrap_err();
        match err {
            DomainError::AmountExceedsBalance { pending, requested, .. } => {
                assert_eq!(pending, dec("20.00"));
                assert_eq!(requested, dec("30.00"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_batch_over_several_sales() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let balances = HashMap::from([
            (a, SaleBalance::new(dec("50"), dec("10"))),
            (b, SaleBalance::new(dec("20"), Decimal::ZERO)),
        ]);
        let pairs = vec![
            BatchPair { sale_id: a, amount: dec("40") },
            BatchPair { sale_id: b, amount: dec("5") },
        ];

        let after = plan_batch(&balances, &pairs).unwrap();
        assert_eq!(after[&a].status(), PaymentStatus::Pagado);
        assert_eq!(after[&b].status(), PaymentStatus::Parcial);
    }

    #[test]
    fn test_batch_rejects_unknown_and_empty() {
        let balances = HashMap::new();
        assert!(matches!(plan_batch(&balances, &[]), Err(DomainError::EmptyBatch)));

        let stranger = Uuid::new_v4();
        let pairs = vec![BatchPair { sale_id: stranger, amount: dec("1") }];
        assert!(matches!(
            plan_batch(&balances, &pairs),
            Err(DomainError::UnknownSale(id)) if id == stranger
        ));
    }

    #[test]
    fn test_deposit_fills_oldest_first() {
        let newest = candidate(20, "50.00", "0");
        let oldest = candidate(1, "30.00", "10.00");
        let middle = candidate(10, "40.00", "0");

        let allocations =
            allocate_deposit(vec![newest.clone(), oldest.clone(), middle.clone()], dec("45.00")).unwrap();

        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0].payment_id, oldest.payment_id);
        assert_eq!(allocations[0].applied, dec("20.00"));
        assert!(allocations[0].fully_deposited);
        assert_eq!(allocations[1].payment_id, middle.payment_id);
        assert_eq!(allocations[1].applied, dec("25.00"));
        assert_eq!(allocations[1].deposited_amount, dec("25.00"));
        assert!(!allocations[1].fully_deposited);
    }

    #[test]
    fn test_deposit_beyond_undeposited_is_refused() {
        let payments = vec![candidate(1, "30", "30"), candidate(2, "20", "5")];
        let err = allocate_deposit(payments, dec("15.01")).unwrap_err();
        match err {
            DomainError::DepositExceedsUndeposited { requested, available } => {
                assert_eq!(requested, dec("15.01"));
                assert_eq!(available, dec("15"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

// ============================================================================
// Property Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Money amounts between 0.01 and 200.00
    fn amount_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..20_000).prop_map(|cents| Decimal::new(cents, 2))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Whatever is attempted, the paid sum stays within the total and the
        /// status matches the sums
        #[test]
        fn prop_paid_never_exceeds_total(
            total in amount_strategy(),
            attempts in prop::collection::vec(amount_strategy(), 1..15)
        ) {
            let sale = Uuid::new_v4();
            let mut balance = SaleBalance::new(total, Decimal::ZERO);
            for amount in attempts {
                let before = balance;
                if balance.apply(sale, amount).is_err() {
                    prop_assert_eq!(balance, before);
                }
                prop_assert!(balance.paid <= balance.total);
                prop_assert_eq!(balance.status(), PaymentStatus::derive(balance.total, balance.paid));
            }
        }

        /// A batch accepted as a whole never overpays any sale
        #[test]
        fn prop_batch_respects_every_total(
            totals in prop::collection::vec(amount_strategy(), 1..4),
            picks in prop::collection::vec((0usize..4, amount_strategy()), 1..8)
        ) {
            let sales: Vec<Uuid> = totals.iter().map(|_| Uuid::new_v4()).collect();
            let balances: HashMap<Uuid, SaleBalance> = sales
                .iter()
                .zip(&totals)
                .map(|(id, total)| (*id, SaleBalance::new(*total, Decimal::ZERO)))
                .collect();
            let pairs: Vec<BatchPair> = picks
                .iter()
                .map(|(i, amount)| BatchPair { sale_id: sales[i % sales.len()], amount: *amount })
                .collect();

            if let Ok(after) = plan_batch(&balances, &pairs) {
                for (sale, balance) in &after {
                    let requested: Decimal = pairs
                        .iter()
                        .filter(|p| p.sale_id == *sale)
                        .map(|p| p.amount)
                        .sum();
                    prop_assert_eq!(balance.paid, requested);
                    prop_assert!(balance.paid <= balances[sale].total);
                }
            }
        }

        /// A deposit never fills a payment past its amount and applies
        /// exactly what was deposited
        #[test]
        fn prop_deposit_conserves_amount(
            amounts in prop::collection::vec(amount_strategy(), 1..6),
            share in 1u32..=100
        ) {
            let payments: Vec<DepositCandidate> = amounts
                .iter()
                .enumerate()
                .map(|(i, a)| DepositCandidate {
                    payment_id: Uuid::new_v4(),
                    payment_date: NaiveDate::from_ymd_opt(2024, 1, 1 + i as u32).unwrap(),
                    created_at: Utc::now(),
                    amount: *a,
                    deposited_amount: Decimal::ZERO,
                })
                .collect();
            let available: Decimal = amounts.iter().sum();
            let deposit = (available * Decimal::from(share) / Decimal::from(100)).round_dp(2);
            prop_assume!(deposit > Decimal::ZERO);

            let allocations = allocate_deposit(payments.clone(), deposit).unwrap();
            let applied: Decimal = allocations.iter().map(|a| a.applied).sum();
            prop_assert_eq!(applied, deposit);
            for allocation in &allocations {
                let payment = payments.iter().find(|p| p.payment_id == allocation.payment_id).unwrap();
                prop_assert!(allocation.deposited_amount <= payment.amount);
            }
        }
    }
}
