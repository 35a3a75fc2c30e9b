//! Fixed-point money helpers
//!
//! Amounts are `rust_decimal::Decimal` from the request boundary to the
//! database; binary floats never appear.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::DomainError;

/// Tolerance for comparing balances against zero: 0.001
pub const EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Parse an exact decimal. Exponent notation and digit separators are refused
/// so that what the client typed is exactly what gets stored.
pub fn parse_exact(field: &'static str, raw: &str) -> Result<Decimal, DomainError> {
    let trimmed = raw.trim();
    let invalid = || DomainError::InvalidDecimal {
        field,
        value: raw.to_string(),
    };
    if trimmed.is_empty() || trimmed.contains(|c: char| matches!(c, 'e' | 'E' | '_')) {
        return Err(invalid());
    }
    Decimal::from_str(trimmed).map_err(|_| invalid())
}

/// Parse an exact decimal that must be strictly positive
pub fn parse_positive(field: &'static str, raw: &str) -> Result<Decimal, DomainError> {
    let value = parse_exact(field, raw)?;
    ensure_positive(field, value)
}

pub fn ensure_positive(field: &'static str, value: Decimal) -> Result<Decimal, DomainError> {
    if value <= Decimal::ZERO {
        return Err(DomainError::InvalidAmount { field });
    }
    Ok(value)
}

/// Money is stored with two decimals; finer values are refused, not rounded
pub const MONEY_SCALE: u32 = 2;

pub fn ensure_money_scale(field: &'static str, value: Decimal) -> Result<Decimal, DomainError> {
    if value.normalize().scale() > MONEY_SCALE {
        return Err(DomainError::TooPrecise {
            field,
            max_decimals: MONEY_SCALE,
        });
    }
    Ok(value)
}

/// True when `a` exceeds `b` by more than the rounding tolerance
pub fn exceeds(a: Decimal, b: Decimal) -> bool {
    a > b + EPSILON
}
