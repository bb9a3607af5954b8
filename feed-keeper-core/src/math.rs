//! Fixed-point price deviation and elapsed-time helpers.

use crate::{
    error::{KeeperError, KeeperResult},
    types::{PctNumber, Price, TimestampMs, PRICE_SCALE},
};
use alloy::primitives::U256;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Relative deviation of `new_price` from `old_price`, scaled by `PRICE_SCALE`.
///
/// `|new - old| * PRICE_SCALE / old`, truncated. A zero `old_price` means the
/// feed was never written and yields exactly `PRICE_SCALE` (100%). The product
/// is computed in 256 bits; a quotient beyond `Price::MAX` saturates.
pub fn price_deviation(new_price: Price, old_price: Price) -> Price {
    if old_price == 0 {
        return PRICE_SCALE;
    }
    let difference = new_price.abs_diff(old_price);
    let scaled = U256::from(difference) * U256::from(PRICE_SCALE) / U256::from(old_price);
    Price::try_from(scaled).unwrap_or(Price::MAX)
}

/// Deviation as a percentage, for threshold comparison and logging only.
pub fn price_deviation_pct(new_price: Price, old_price: Price) -> PctNumber {
    deviation_to_pct(price_deviation(new_price, old_price))
}

pub fn deviation_to_pct(deviation: Price) -> PctNumber {
    deviation as f64 * 100.0 / PRICE_SCALE as f64
}

/// Hours elapsed between a stored timestamp and now, both in milliseconds.
///
/// A current time before the stored time points at a clock or ordering bug
/// upstream and is rejected rather than clamped.
pub fn elapsed_hours(current: TimestampMs, stored: TimestampMs) -> KeeperResult<f64> {
    if current < stored {
        return Err(KeeperError::TimePrecondition { current, stored });
    }
    Ok((current - stored) as f64 / MILLIS_PER_HOUR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HOUR_MS: TimestampMs = 3_600_000;

    #[test]
    fn test_deviation_zero_old_price_is_full_scale() {
        assert_eq!(price_deviation(1, 0), PRICE_SCALE);
        assert_eq!(price_deviation(0, 0), PRICE_SCALE);
        assert_eq!(price_deviation_pct(42_00000000, 0), 100.0);
    }

    #[test]
    fn test_deviation_equal_prices_is_zero() {
        assert_eq!(price_deviation(100_00000000, 100_00000000), 0);
    }

    #[test]
    fn test_deviation_truncates() {
        // 0.5 / 100.5 = 0.00497512437...
        assert_eq!(price_deviation(100_00000000, 100_50000000), 497_512);
        // 0.5 / 100 = 0.005 exactly
        assert_eq!(price_deviation(100_50000000, 100_00000000), 500_000);
        assert_eq!(price_deviation(2, 3), 33_333_333);
    }

    #[test]
    fn test_deviation_pct() {
        let pct = price_deviation_pct(100_00000000, 100_50000000);
        assert!((pct - 0.497512).abs() < 1e-9);
        assert!(pct < 0.5);
        assert_eq!(price_deviation_pct(100_50000000, 100_00000000), 0.5);
    }

    #[test]
    fn test_deviation_does_not_overflow() {
        assert_eq!(price_deviation(Price::MAX, 1), Price::MAX);
        assert_eq!(price_deviation(0, Price::MAX), PRICE_SCALE);
    }

    #[test]
    fn test_elapsed_hours() {
        assert_eq!(elapsed_hours(7 * HOUR_MS, 0).unwrap(), 7.0);
        assert_eq!(elapsed_hours(HOUR_MS + HOUR_MS / 2, HOUR_MS).unwrap(), 0.5);
        assert_eq!(elapsed_hours(5, 5).unwrap(), 0.0);
    }

    #[test]
    fn test_elapsed_hours_never_updated_is_large() {
        let now = 1_700_000_000_000;
        assert!(elapsed_hours(now, 0).unwrap() > 400_000.0);
    }

    proptest! {
        #[test]
        fn prop_deviation_against_zero_is_full_scale(x in any::<u128>()) {
            prop_assert_eq!(price_deviation(x, 0), PRICE_SCALE);
        }

        #[test]
        fn prop_deviation_against_itself_is_zero(x in 1..u128::MAX) {
            prop_assert_eq!(price_deviation(x, x), 0);
        }

        #[test]
        fn prop_deviation_magnitude_is_direction_free(
            a in 1u128..1_000_000_00000000,
            b in 1u128..1_000_000_00000000,
        ) {
            // Both orderings recover the same absolute move, within one unit of
            // truncation per ordering.
            let ab = U256::from(price_deviation(a, b)) * U256::from(b);
            let ba = U256::from(price_deviation(b, a)) * U256::from(a);
            let diff = U256::from(a.abs_diff(b)) * U256::from(PRICE_SCALE);
            prop_assert!(ab <= diff && diff - ab < U256::from(b));
            prop_assert!(ba <= diff && diff - ba < U256::from(a));
        }

        #[test]
        fn prop_elapsed_rejects_time_travel(stored in 1u64..u64::MAX, back in 1u64..1_000_000) {
            let current = stored.saturating_sub(back);
            prop_assume!(current < stored);
            let is_precondition_error = matches!(
                elapsed_hours(current, stored),
                Err(KeeperError::TimePrecondition { .. })
            );
            prop_assert!(is_precondition_error);
        }
    }
}
