//! Inter-warehouse transfers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::{MovementDraft, MovementOrigin, StockBook, StockKey};
use crate::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferLine {
    pub presentation_id: Uuid,
    /// Lot the caller expects to move; must match the origin record's lot
    pub lot_id: Option<Uuid>,
    pub quantity: i32,
}

/// Labels used in the reasons of both movements of each pair
#[derive(Debug, Clone)]
pub struct TransferEnds<'a> {
    pub origin_id: Uuid,
    pub origin_name: &'a str,
    pub destination_id: Uuid,
    pub destination_name: &'a str,
}

/// Short form of an operation id used in movement reasons
pub fn operation_tag(operation_id: Uuid) -> String {
    operation_id.simple().to_string()[..8].to_string()
}

/// Validate every line against the origin and destination records, then move
/// stock line by line. Returns the salida/entrada drafts in pairs.
///
/// The book must hold the records of both warehouses for every presentation
/// named in `lines`.
pub fn apply_transfer(
    book: &mut StockBook,
    ends: &TransferEnds<'_>,
    lines: &[TransferLine],
    user_id: Uuid,
    operation_id: Uuid,
) -> Result<Vec<MovementDraft>, DomainError> {
    if ends.origin_id == ends.destination_id {
        return Err(DomainError::SameWarehouse);
    }
    if lines.is_empty() {
        return Err(DomainError::EmptyTransfer);
    }

    let mut demands = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity <= 0 {
            return Err(DomainError::InvalidQuantity(line.quantity));
        }
        let from = StockKey::new(line.presentation_id, ends.origin_id);
        let to = StockKey::new(line.presentation_id, ends.destination_id);

        let moving_lot = match book.level(&from) {
            Some(level) => {
                if let Some(requested) = line.lot_id {
                    if level.lot_id != Some(requested) {
                        return Err(DomainError::LotMismatch {
                            presentation_id: line.presentation_id,
                            warehouse_id: ends.origin_id,
                            requested,
                            current: level.lot_id,
                        });
                    }
                }
                level.lot_id
            }
            None => None,
        };

        if let (Some(incoming), Some(existing)) = (moving_lot, book.level(&to)) {
            if existing.quantity > 0 && existing.lot_id != Some(incoming) {
                return Err(DomainError::LotMismatch {
                    presentation_id: line.presentation_id,
                    warehouse_id: ends.destination_id,
                    requested: incoming,
                    current: existing.lot_id,
                });
            }
        }

        demands.push((from, line.quantity));
    }
    book.ensure_available(&demands)?;

    let tag = operation_tag(operation_id);
    let origin = MovementOrigin::Transfer(operation_id);
    let mut drafts = Vec::with_capacity(lines.len() * 2);
    for line in lines {
        let from = StockKey::new(line.presentation_id, ends.origin_id);
        let to = StockKey::new(line.presentation_id, ends.destination_id);
        let threshold = book.level(&from).map(|level| level.minimum_stock);

        let out = book.debit(
            from,
            line.lot_id,
            line.quantity,
            user_id,
            format!("Transfer to {} (op {})", ends.destination_name, tag),
            origin,
        )?;
        let lot_id = out.lot_id;
        drafts.push(out);
        drafts.push(book.credit(
            to,
            lot_id,
            line.quantity,
            threshold,
            user_id,
            format!("Transfer from {} (op {})", ends.origin_name, tag),
            origin,
        )?);
    }
    Ok(drafts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_tag_is_eight_hex_chars() {
        let tag = operation_tag(Uuid::new_v4());
        assert_eq!(tag.len(), 8);
        assert!(tag.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn same_warehouse_is_rejected() {
        let warehouse = Uuid::new_v4();
        let ends = TransferEnds {
            origin_id: warehouse,
            origin_name: "A",
            destination_id: warehouse,
            destination_name: "A",
        };
        let mut book = StockBook::new();
        let lines = vec![TransferLine {
            presentation_id: Uuid::new_v4(),
            lot_id: None,
            quantity: 1,
        }];
        assert_eq!(
            apply_transfer(&mut book, &ends, &lines, Uuid::new_v4(), Uuid::new_v4()),
            Err(DomainError::SameWarehouse)
        );
    }
}
