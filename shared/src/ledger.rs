//! Stock ledger
//!
//! A [`StockBook`] is an in-memory unit of work over a set of inventory
//! records that the caller has already locked. Debits, credits and reversals
//! are applied to the book; the caller then persists the touched levels, the
//! movement drafts and the reversed movement ids inside the same transaction.
//!
//! Every quantity change made through the book produces exactly one movement
//! draft, except reversals, which delete the movement they undo.

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::models::{InventoryRecord, Movement, MovementType, DEFAULT_MINIMUM_STOCK};
use crate::{DomainError, Shortfall};

/// Identity of an inventory record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StockKey {
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
}

impl StockKey {
    pub fn new(presentation_id: Uuid, warehouse_id: Uuid) -> Self {
        Self {
            presentation_id,
            warehouse_id,
        }
    }
}

/// Current state of one record inside the book
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    /// `None` for a record the book created and the store has not seen yet
    pub record_id: Option<Uuid>,
    pub lot_id: Option<Uuid>,
    pub quantity: i32,
    pub minimum_stock: i32,
}

/// What a movement belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementOrigin {
    Manual,
    Sale(Uuid),
    Transfer(Uuid),
}

impl MovementOrigin {
    pub fn sale_id(&self) -> Option<Uuid> {
        match self {
            MovementOrigin::Sale(id) => Some(*id),
            _ => None,
        }
    }

    pub fn operation_id(&self) -> Option<Uuid> {
        match self {
            MovementOrigin::Transfer(id) => Some(*id),
            _ => None,
        }
    }
}

/// A movement waiting to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementDraft {
    pub movement_type: MovementType,
    pub presentation_id: Uuid,
    pub warehouse_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub quantity: i32,
    pub user_id: Uuid,
    pub reason: String,
    pub origin: MovementOrigin,
}

#[derive(Debug, Clone, Default)]
pub struct StockBook {
    levels: BTreeMap<StockKey, StockLevel>,
    touched: BTreeSet<StockKey>,
    movements: Vec<MovementDraft>,
    reversed: Vec<Uuid>,
}

impl StockBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a InventoryRecord>) -> Self {
        let mut book = Self::new();
        for record in records {
            book.load(record);
        }
        book
    }

    /// Add a record read from the store. Loading the same key twice keeps the
    /// first copy, which may already carry changes.
    pub fn load(&mut self, record: &InventoryRecord) {
        self.levels
            .entry(StockKey::new(record.presentation_id, record.warehouse_id))
            .or_insert(StockLevel {
                record_id: Some(record.id),
                lot_id: record.lot_id,
                quantity: record.quantity,
                minimum_stock: record.minimum_stock,
            });
    }

    pub fn level(&self, key: &StockKey) -> Option<&StockLevel> {
        self.levels.get(key)
    }

    /// Quantity on hand, zero when no record exists
    pub fn available(&self, key: &StockKey) -> i32 {
        self.levels.get(key).map(|l| l.quantity).unwrap_or(0)
    }

    /// Check that every demand can be served, summing demands on the same key.
    /// Reports every short line at once, in key order.
    pub fn ensure_available(&self, demands: &[(StockKey, i32)]) -> Result<(), DomainError> {
        let mut totals: BTreeMap<StockKey, i32> = BTreeMap::new();
        for (key, quantity) in demands {
            if *quantity <= 0 {
                return Err(DomainError::InvalidQuantity(*quantity));
            }
            let total = totals.entry(*key).or_insert(0);
            *total = total.saturating_add(*quantity);
        }

        let shortfalls: Vec<Shortfall> = totals
            .into_iter()
            .filter_map(|(key, requested)| {
                let available = self.available(&key);
                (requested > available).then_some(Shortfall {
                    presentation_id: key.presentation_id,
                    warehouse_id: key.warehouse_id,
                    requested,
                    available,
                })
            })
            .collect();

        if shortfalls.is_empty() {
            Ok(())
        } else {
            Err(DomainError::InsufficientStock { shortfalls })
        }
    }

    /// Take `quantity` units out of a record and log a `salida`.
    ///
    /// `lot_id` of `None` draws from whatever lot the record holds.
    pub fn debit(
        &mut self,
        key: StockKey,
        lot_id: Option<Uuid>,
        quantity: i32,
        user_id: Uuid,
        reason: impl Into<String>,
        origin: MovementOrigin,
    ) -> Result<MovementDraft, DomainError> {
        let lot_id = self.take(key, lot_id, quantity)?;
        Ok(self.record_movement(MovementDraft {
            movement_type: MovementType::Salida,
            presentation_id: key.presentation_id,
            warehouse_id: key.warehouse_id,
            lot_id,
            quantity,
            user_id,
            reason: reason.into(),
            origin,
        }))
    }

    /// Put `quantity` units into a record and log an `entrada`, creating the
    /// record when absent with `minimum_stock` or the default threshold.
    #[allow(clippy::too_many_arguments)]
    pub fn credit(
        &mut self,
        key: StockKey,
        lot_id: Option<Uuid>,
        quantity: i32,
        minimum_stock: Option<i32>,
        user_id: Uuid,
        reason: impl Into<String>,
        origin: MovementOrigin,
    ) -> Result<MovementDraft, DomainError> {
        let lot_id = self.put(key, lot_id, quantity, minimum_stock)?;
        Ok(self.record_movement(MovementDraft {
            movement_type: MovementType::Entrada,
            presentation_id: key.presentation_id,
            warehouse_id: key.warehouse_id,
            lot_id,
            quantity,
            user_id,
            reason: reason.into(),
            origin,
        }))
    }

    /// Undo a persisted movement at its own (presentation, warehouse) and
    /// mark it for deletion. No new movement is logged.
    ///
    /// Undoing a `salida` always returns the units, even after the record
    /// moved on to another lot. Undoing an `entrada` still requires the
    /// record to hold the movement's lot.
    pub fn reverse(&mut self, movement: &Movement) -> Result<Movement, DomainError> {
        if self.reversed.contains(&movement.id) {
            return Err(DomainError::MovementAlreadyReversed(movement.id));
        }
        let key = StockKey::new(movement.presentation_id, movement.warehouse_id);
        match movement.movement_type {
            MovementType::Salida => {
                self.restore(key, movement.lot_id, movement.quantity)?;
            }
            MovementType::Entrada => {
                self.take(key, movement.lot_id, movement.quantity)?;
            }
        }
        self.reversed.push(movement.id);
        Ok(movement.clone())
    }

    /// Levels changed since loading, in key order
    pub fn changes(&self) -> impl Iterator<Item = (&StockKey, &StockLevel)> {
        self.touched
            .iter()
            .filter_map(|key| self.levels.get(key).map(|level| (key, level)))
    }

    pub fn movements(&self) -> &[MovementDraft] {
        &self.movements
    }

    /// Ids of persisted movements undone by this book
    pub fn reversed(&self) -> &[Uuid] {
        &self.reversed
    }

    fn take(
        &mut self,
        key: StockKey,
        lot_id: Option<Uuid>,
        quantity: i32,
    ) -> Result<Option<Uuid>, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::InvalidQuantity(quantity));
        }
        let level = self
            .levels
            .get_mut(&key)
            .ok_or(DomainError::NoInventoryRecord {
                presentation_id: key.presentation_id,
                warehouse_id: key.warehouse_id,
            })?;
        if let Some(requested) = lot_id {
            if level.lot_id != Some(requested) {
                return Err(DomainError::LotMismatch {
                    presentation_id: key.presentation_id,
                    warehouse_id: key.warehouse_id,
                    requested,
                    current: level.lot_id,
                });
            }
        }
        if level.quantity < quantity {
            return Err(DomainError::InsufficientStock {
                shortfalls: vec![Shortfall {
                    presentation_id: key.presentation_id,
                    warehouse_id: key.warehouse_id,
                    requested: quantity,
                    available: level.quantity,
                }],
            });
        }
        level.quantity -= quantity;
        self.touched.insert(key);
        Ok(level.lot_id)
    }

    fn put(
        &mut self,
        key: StockKey,
        lot_id: Option<Uuid>,
        quantity: i32,
        minimum_stock: Option<i32>,
    ) -> Result<Option<Uuid>, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::InvalidQuantity(quantity));
        }
        let level = self.levels.entry(key).or_insert(StockLevel {
            record_id: None,
            lot_id,
            quantity: 0,
            minimum_stock: minimum_stock.unwrap_or(DEFAULT_MINIMUM_STOCK),
        });

        if let Some(incoming) = lot_id {
            if level.lot_id != Some(incoming) {
                // One active lot per record: a new lot may only replace an empty one
                if level.quantity > 0 {
                    return Err(DomainError::LotMismatch {
                        presentation_id: key.presentation_id,
                        warehouse_id: key.warehouse_id,
                        requested: incoming,
                        current: level.lot_id,
                    });
                }
                level.lot_id = Some(incoming);
            }
        }

        level.quantity = level
            .quantity
            .checked_add(quantity)
            .ok_or(DomainError::InvalidQuantity(quantity))?;
        self.touched.insert(key);
        Ok(level.lot_id)
    }

    /// Give back units taken by a `salida`. The record keeps whatever lot it
    /// holds now; `lot_id` only seeds a record that no longer exists.
    fn restore(
        &mut self,
        key: StockKey,
        lot_id: Option<Uuid>,
        quantity: i32,
    ) -> Result<Option<Uuid>, DomainError> {
        if quantity <= 0 {
            return Err(DomainError::InvalidQuantity(quantity));
        }
        let level = self.levels.entry(key).or_insert(StockLevel {
            record_id: None,
            lot_id,
            quantity: 0,
            minimum_stock: DEFAULT_MINIMUM_STOCK,
        });
        if level.lot_id.is_none() {
            level.lot_id = lot_id;
        }
        level.quantity = level
            .quantity
            .checked_add(quantity)
            .ok_or(DomainError::InvalidQuantity(quantity))?;
        self.touched.insert(key);
        Ok(level.lot_id)
    }

    fn record_movement(&mut self, draft: MovementDraft) -> MovementDraft {
        self.movements.push(draft.clone());
        draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(
        presentation_id: Uuid,
        warehouse_id: Uuid,
        lot_id: Option<Uuid>,
        quantity: i32,
    ) -> InventoryRecord {
        InventoryRecord {
            id: Uuid::new_v4(),
            presentation_id,
            warehouse_id,
            lot_id,
            quantity,
            minimum_stock: 4,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn debit_unknown_record_fails() {
        let mut book = StockBook::new();
        let key = StockKey::new(Uuid::new_v4(), Uuid::new_v4());
        let err = book
            .debit(key, None, 1, Uuid::new_v4(), "x", MovementOrigin::Manual)
            .unwrap_err();
        assert!(matches!(err, DomainError::NoInventoryRecord { .. }));
        assert!(book.movements().is_empty());
    }

    #[test]
    fn failed_debit_leaves_level_untouched() {
        let rec = record(Uuid::new_v4(), Uuid::new_v4(), Some(Uuid::new_v4()), 10);
        let key = StockKey::new(rec.presentation_id, rec.warehouse_id);
        let mut book = StockBook::from_records([&rec]);

        assert!(book
            .debit(key, None, 15, Uuid::new_v4(), "x", MovementOrigin::Manual)
            .is_err());
        assert_eq!(book.available(&key), 10);
        assert_eq!(book.changes().count(), 0);
    }

    #[test]
    fn credit_creates_record_with_default_threshold() {
        let key = StockKey::new(Uuid::new_v4(), Uuid::new_v4());
        let lot = Uuid::new_v4();
        let mut book = StockBook::new();
        let draft = book
            .credit(key, Some(lot), 5, None, Uuid::new_v4(), "in", MovementOrigin::Manual)
            .unwrap();

        assert_eq!(draft.movement_type, MovementType::Entrada);
        assert_eq!(draft.lot_id, Some(lot));
        let level = book.level(&key).unwrap();
        assert_eq!(level.record_id, None);
        assert_eq!(level.quantity, 5);
        assert_eq!(level.minimum_stock, DEFAULT_MINIMUM_STOCK);
    }

    #[test]
    fn credit_with_other_lot_only_replaces_empty_record() {
        let old_lot = Uuid::new_v4();
        let new_lot = Uuid::new_v4();
        let rec = record(Uuid::new_v4(), Uuid::new_v4(), Some(old_lot), 3);
        let key = StockKey::new(rec.presentation_id, rec.warehouse_id);
        let mut book = StockBook::from_records([&rec]);
        let user = Uuid::new_v4();

        assert!(matches!(
            book.credit(key, Some(new_lot), 1, None, user, "in", MovementOrigin::Manual),
            Err(DomainError::LotMismatch { .. })
        ));

        book.debit(key, None, 3, user, "out", MovementOrigin::Manual)
            .unwrap();
        book.credit(key, Some(new_lot), 2, None, user, "in", MovementOrigin::Manual)
            .unwrap();
        assert_eq!(book.level(&key).unwrap().lot_id, Some(new_lot));
    }

    #[test]
    fn ensure_available_sums_lines_for_same_key() {
        let rec = record(Uuid::new_v4(), Uuid::new_v4(), None, 10);
        let key = StockKey::new(rec.presentation_id, rec.warehouse_id);
        let book = StockBook::from_records([&rec]);

        assert!(book.ensure_available(&[(key, 6), (key, 4)]).is_ok());
        let err = book.ensure_available(&[(key, 6), (key, 5)]).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                shortfalls: vec![Shortfall {
                    presentation_id: key.presentation_id,
                    warehouse_id: key.warehouse_id,
                    requested: 11,
                    available: 10,
                }]
            }
        );
    }

    #[test]
    fn reverse_is_not_repeatable_within_a_book() {
        let rec = record(Uuid::new_v4(), Uuid::new_v4(), Some(Uuid::new_v4()), 10);
        let key = StockKey::new(rec.presentation_id, rec.warehouse_id);
        let mut book = StockBook::from_records([&rec]);
        let movement = Movement {
            id: Uuid::new_v4(),
            movement_type: MovementType::Salida,
            presentation_id: key.presentation_id,
            warehouse_id: key.warehouse_id,
            lot_id: rec.lot_id,
            quantity: 4,
            user_id: Uuid::new_v4(),
            reason: "sale".into(),
            sale_id: Some(Uuid::new_v4()),
            operation_id: None,
            created_at: Utc::now(),
        };

        book.reverse(&movement).unwrap();
        assert_eq!(book.available(&key), 14);
        assert!(matches!(
            book.reverse(&movement),
            Err(DomainError::MovementAlreadyReversed(id)) if id == movement.id
        ));
        assert_eq!(book.available(&key), 14);
        assert!(book.movements().is_empty());
        assert_eq!(book.reversed(), &[movement.id]);
    }
}
