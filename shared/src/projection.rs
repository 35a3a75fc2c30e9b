//! Client purchase-frequency projection
//!
//! A client buying `total` worth of product and consuming
//! `daily_consumption_kg` a day is expected back after
//! `total / daily_consumption_kg` days.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::DomainError;

/// Frequencies longer than this are clamped
const MAX_FREQUENCY_DAYS: i64 = 3650;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseProjection {
    /// Days between purchases, rounded to two decimals
    pub frequency_days: Decimal,
    pub last_purchase_at: DateTime<Utc>,
    pub next_purchase_at: DateTime<Utc>,
}

/// Consumption is kept with two decimals, like the column it is stored in
pub const CONSUMPTION_SCALE: u32 = 2;

/// A daily consumption must be positive and carry at most two decimals
pub fn validate_daily_consumption(daily_consumption_kg: Decimal) -> Result<Decimal, DomainError> {
    if daily_consumption_kg <= Decimal::ZERO {
        return Err(DomainError::InvalidDailyConsumption);
    }
    if daily_consumption_kg.normalize().scale() > CONSUMPTION_SCALE {
        return Err(DomainError::TooPrecise {
            field: "daily_consumption_kg",
            max_decimals: CONSUMPTION_SCALE,
        });
    }
    Ok(daily_consumption_kg)
}

pub fn project_purchase(
    total: Decimal,
    daily_consumption_kg: Decimal,
    purchased_at: DateTime<Utc>,
) -> Result<PurchaseProjection, DomainError> {
    let daily = validate_daily_consumption(daily_consumption_kg)?;
    let max_days = Decimal::from(MAX_FREQUENCY_DAYS);

    let frequency_days = total
        .checked_div(daily)
        .map(|days| days.round_dp(2))
        .unwrap_or(max_days)
        .clamp(Decimal::ZERO, max_days);

    let seconds = frequency_days
        .checked_mul(Decimal::from(SECONDS_PER_DAY))
        .and_then(|s| s.trunc().to_i64())
        .unwrap_or(MAX_FREQUENCY_DAYS * SECONDS_PER_DAY)
        .clamp(0, MAX_FREQUENCY_DAYS * SECONDS_PER_DAY);

    Ok(PurchaseProjection {
        frequency_days,
        last_purchase_at: purchased_at,
        next_purchase_at: purchased_at + Duration::seconds(seconds),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn frequency_is_rounded_to_two_decimals() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let projection = project_purchase(dec("100"), dec("3"), at).unwrap();
        assert_eq!(projection.frequency_days, dec("33.33"));
        assert_eq!(
            projection.next_purchase_at,
            at + Duration::seconds(33 * 86_400 + 28_512)
        );
    }

    #[test]
    fn whole_days() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let projection = project_purchase(dec("150.00"), dec("10"), at).unwrap();
        assert_eq!(projection.frequency_days, dec("15"));
        assert_eq!(
            projection.next_purchase_at,
            Utc.with_ymd_and_hms(2024, 5, 16, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn consumption_finer_than_cents_is_refused() {
        let tiny = dec("0.0000000000000000000000000001");
        assert_eq!(
            project_purchase(dec("100.00"), tiny, Utc::now()),
            Err(DomainError::TooPrecise {
                field: "daily_consumption_kg",
                max_decimals: CONSUMPTION_SCALE
            })
        );
        assert!(validate_daily_consumption(dec("0.010")).is_ok());
    }

    #[test]
    fn huge_ratio_is_clamped() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let projection = project_purchase(Decimal::MAX, dec("0.01"), at).unwrap();
        assert_eq!(projection.frequency_days, Decimal::from(MAX_FREQUENCY_DAYS));
        assert_eq!(
            projection.next_purchase_at,
            at + Duration::days(MAX_FREQUENCY_DAYS)
        );
    }

    #[test]
    fn zero_consumption_is_rejected() {
        assert_eq!(
            project_purchase(dec("10"), Decimal::ZERO, Utc::now()),
            Err(DomainError::InvalidDailyConsumption)
        );
    }
}
