//! Payment reconciliation
//!
//! Balance checks for single and batch payments, and the oldest-first
//! allocation of a bank deposit across payments.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::PaymentStatus;
use crate::money::{ensure_money_scale, ensure_positive, exceeds, EPSILON};
use crate::DomainError;

/// Total of a sale against what has been paid on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleBalance {
    pub total: Decimal,
    pub paid: Decimal,
}

impl SaleBalance {
    pub fn new(total: Decimal, paid: Decimal) -> Self {
        Self { total, paid }
    }

    pub fn pending(&self) -> Decimal {
        self.total - self.paid
    }

    pub fn status(&self) -> PaymentStatus {
        PaymentStatus::derive(self.total, self.paid)
    }

    /// Fails unless `amount` is positive and fits in the pending balance
    pub fn check(&self, sale_id: Uuid, amount: Decimal) -> Result<(), DomainError> {
        ensure_positive("amount", amount)?;
        ensure_money_scale("amount", amount)?;
        if exceeds(amount, self.pending()) {
            return Err(DomainError::AmountExceedsBalance {
                sale_id,
                pending: self.pending(),
                requested: amount,
            });
        }
        Ok(())
    }

    /// Check then record `amount` as paid
    pub fn apply(&mut self, sale_id: Uuid, amount: Decimal) -> Result<(), DomainError> {
        self.check(sale_id, amount)?;
        self.paid += amount;
        Ok(())
    }

    /// The balance as it would be without an existing payment, used when that
    /// payment is being edited
    pub fn without(&self, amount: Decimal) -> SaleBalance {
        SaleBalance {
            total: self.total,
            paid: self.paid - amount,
        }
    }

    /// Fails when a new total would leave the sale overpaid
    pub fn retotal(&self, total: Decimal) -> Result<SaleBalance, DomainError> {
        if exceeds(self.paid, total) {
            return Err(DomainError::TotalBelowPaid {
                total,
                paid: self.paid,
            });
        }
        Ok(SaleBalance {
            total,
            paid: self.paid,
        })
    }
}

/// One element of a batch payment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPair {
    pub sale_id: Uuid,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
}

/// Validate a whole batch against running balances.
///
/// Pairs are applied in order, so a second pair on the same sale is checked
/// against what the first one left. Returns the balance of every touched sale
/// after the batch; any failure rejects the batch as a whole.
pub fn plan_batch(
    balances: &HashMap<Uuid, SaleBalance>,
    pairs: &[BatchPair],
) -> Result<HashMap<Uuid, SaleBalance>, DomainError> {
    if pairs.is_empty() {
        return Err(DomainError::EmptyBatch);
    }
    let mut running: HashMap<Uuid, SaleBalance> = HashMap::new();
    for pair in pairs {
        let balance = match running.entry(pair.sale_id) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(
                balances
                    .get(&pair.sale_id)
                    .copied()
                    .ok_or(DomainError::UnknownSale(pair.sale_id))?,
            ),
        };
        balance.apply(pair.sale_id, pair.amount)?;
    }
    Ok(running)
}

/// A payment as seen by deposit allocation
#[derive(Debug, Clone)]
pub struct DepositCandidate {
    pub payment_id: Uuid,
    pub payment_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub amount: Decimal,
    pub deposited_amount: Decimal,
}

impl DepositCandidate {
    fn undeposited(&self) -> Decimal {
        (self.amount - self.deposited_amount).max(Decimal::ZERO)
    }
}

/// What a deposit did to one payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositAllocation {
    pub payment_id: Uuid,
    pub applied: Decimal,
    pub deposited_amount: Decimal,
    pub fully_deposited: bool,
}

/// Spread `amount` over the undeposited remainder of each candidate, oldest
/// payment first, until the amount runs out.
pub fn allocate_deposit(
    mut candidates: Vec<DepositCandidate>,
    amount: Decimal,
) -> Result<Vec<DepositAllocation>, DomainError> {
    ensure_positive("deposited_amount", amount)?;

    let available: Decimal = candidates.iter().map(DepositCandidate::undeposited).sum();
    if exceeds(amount, available) {
        return Err(DomainError::DepositExceedsUndeposited {
            requested: amount,
            available,
        });
    }

    candidates.sort_by_key(|c| (c.payment_date, c.created_at, c.payment_id));

    let mut remaining = amount;
    let mut allocations = Vec::new();
    for candidate in candidates {
        if remaining <= Decimal::ZERO {
            break;
        }
        let open = candidate.undeposited();
        if open <= Decimal::ZERO {
            continue;
        }
        let applied = remaining.min(open);
        remaining -= applied;
        let deposited_amount = candidate.deposited_amount + applied;
        allocations.push(DepositAllocation {
            payment_id: candidate.payment_id,
            applied,
            deposited_amount,
            fully_deposited: candidate.amount - deposited_amount <= EPSILON,
        });
    }
    Ok(allocations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn edit_is_checked_without_the_edited_payment() {
        let sale = Uuid::new_v4();
        let balance = SaleBalance::new(dec("100"), dec("100"));
        assert!(balance.check(sale, dec("10")).is_err());
        assert!(balance.without(dec("60")).check(sale, dec("60")).is_ok());
        assert!(balance.without(dec("60")).check(sale, dec("60.01")).is_err());
    }

    #[test]
    fn retotal_below_paid_fails() {
        let balance = SaleBalance::new(dec("100"), dec("80"));
        assert!(balance.retotal(dec("79.99")).is_err());
        assert_eq!(
            balance.retotal(dec("80")).unwrap().status(),
            PaymentStatus::Pagado
        );
    }

    #[test]
    fn batch_rejects_unknown_sale() {
        let pairs = vec![BatchPair {
            sale_id: Uuid::new_v4(),
            amount: dec("1"),
        }];
        assert!(matches!(
            plan_batch(&HashMap::new(), &pairs),
            Err(DomainError::UnknownSale(_))
        ));
    }

    #[test]
    fn deposit_partially_fills_the_newest_payment() {
        let older = Uuid::new_v4();
        let newer = Uuid::new_v4();
        let now = Utc::now();
        let candidates = vec![
            DepositCandidate {
                payment_id: newer,
                payment_date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
                created_at: now,
                amount: dec("50"),
                deposited_amount: dec("0"),
            },
            DepositCandidate {
                payment_id: older,
                payment_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                created_at: now,
                amount: dec("40"),
                deposited_amount: dec("10"),
            },
        ];

        let allocations = allocate_deposit(candidates, dec("45")).unwrap();
        assert_eq!(allocations.len(), 2);
        assert_eq!(allocations[0].payment_id, older);
        assert_eq!(allocations[0].applied, dec("30"));
        assert!(allocations[0].fully_deposited);
        assert_eq!(allocations[1].payment_id, newer);
        assert_eq!(allocations[1].applied, dec("15"));
        assert_eq!(allocations[1].deposited_amount, dec("15"));
        assert!(!allocations[1].fully_deposited);
    }

    #[test]
    fn deposit_larger_than_undeposited_fails() {
        let candidates = vec![DepositCandidate {
            payment_id: Uuid::new_v4(),
            payment_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            created_at: Utc::now(),
            amount: dec("40"),
            deposited_amount: dec("40"),
        }];
        assert_eq!(
            allocate_deposit(candidates, dec("0.01")),
            Err(DomainError::DepositExceedsUndeposited {
                requested: dec("0.01"),
                available: dec("0"),
            })
        );
    }
}
