//! Discount calculations
//!
//! Pure conversion of a discount rule and a base price into a discount amount
//! and final price. All prices are integer minor units.

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors specific to discount calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DiscountError {
    /// The purchase amount falls below the rule's minimum-purchase threshold.
    #[error("purchase amount is below the minimum-purchase threshold")]
    ThresholdNotMet,

    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,
}

/// How a coupon reduces the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiscountRule {
    /// Take a percentage off the base price.
    PercentageOff {
        /// Whole percent, expected in `(0, 100]`.
        percent: u16,

        /// Largest discount the rule may produce, in minor units.
        cap: Option<u64>,
    },

    /// Take a fixed amount off the base price.
    AmountOff {
        /// Discount in minor units.
        amount: u64,
    },
}

impl DiscountRule {
    /// Stable string form of the rule kind, used for storage.
    #[must_use]
    pub const fn kind_as_str(&self) -> &'static str {
        match self {
            Self::PercentageOff { .. } => "percentage_off",
            Self::AmountOff { .. } => "amount_off",
        }
    }
}

/// Result of applying a discount rule to a base price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountOutcome {
    /// Discount in minor units. Never exceeds the base price.
    pub discount: u64,

    /// Base price minus discount, in minor units. Never negative.
    pub final_price: u64,
}

/// Calculate the discount amount in minor units for a percentage of a minor
/// unit amount, rounding midpoints away from zero.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the calculation overflows
/// or cannot be safely represented.
pub fn percent_of_minor(percent: &Percentage, minor: u64) -> Result<u64, DiscountError> {
    let minor = Decimal::from_u64(minor).ok_or(DiscountError::PercentConversion)?;

    ((*percent) * Decimal::ONE) // decimal_percentage doesn't expose the underlying Decimal
        .checked_mul(minor)
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or(DiscountError::PercentConversion)
}

/// Apply `rule` to a base price.
///
/// `purchase_amount` is the total being settled; when `min_purchase` is set
/// and the amount falls short, the rule does not apply at all. The discount
/// is clamped to the base price, so the final price is never negative.
///
/// # Errors
///
/// Returns [`DiscountError::ThresholdNotMet`] when the purchase amount is
/// below the minimum-purchase threshold, or
/// [`DiscountError::PercentConversion`] when percentage arithmetic cannot be
/// represented.
pub fn compute_discount(
    rule: &DiscountRule,
    min_purchase: Option<u64>,
    base_price: u64,
    purchase_amount: u64,
) -> Result<DiscountOutcome, DiscountError> {
    if let Some(threshold) = min_purchase
        && purchase_amount < threshold
    {
        return Err(DiscountError::ThresholdNotMet);
    }

    let discount = match rule {
        DiscountRule::PercentageOff { percent, cap } => {
            let ratio = Percentage::from(Decimal::new(i64::from(*percent), 2));
            let raw = percent_of_minor(&ratio, base_price)?;

            cap.map_or(raw, |cap| raw.min(cap))
        }
        DiscountRule::AmountOff { amount } => *amount,
    };

    let discount = discount.min(base_price);

    Ok(DiscountOutcome {
        discount,
        final_price: base_price - discount,
    })
}

/// Derive the percent saved when `discounted` replaces `original`, rounded to
/// two decimal places.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] when `original` is zero or a
/// value cannot be represented as a decimal.
pub fn percent_off(original: u64, discounted: u64) -> Result<Decimal, DiscountError> {
    let original_minor = Decimal::from_u64(original).ok_or(DiscountError::PercentConversion)?;

    if original_minor.is_zero() {
        return Err(DiscountError::PercentConversion);
    }

    let saved = Decimal::from_u64(original.saturating_sub(discounted))
        .ok_or(DiscountError::PercentConversion)?;

    Ok((saved / original_minor * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn percentage_discount_calculates_correctly() -> TestResult {
        let rule = DiscountRule::PercentageOff {
            percent: 25,
            cap: None,
        };

        let outcome = compute_discount(&rule, None, 200, 200)?;

        assert_eq!(outcome.discount, 50);
        assert_eq!(outcome.final_price, 150);

        Ok(())
    }

    #[test]
    fn percentage_discount_rounds_midpoint_away_from_zero() -> TestResult {
        let rule = DiscountRule::PercentageOff {
            percent: 15,
            cap: None,
        };

        // 15% of 150 is 22.5, which rounds to 23.
        let outcome = compute_discount(&rule, None, 150, 150)?;

        assert_eq!(outcome.discount, 23);
        assert_eq!(outcome.final_price, 127);

        Ok(())
    }

    #[test]
    fn percentage_discount_is_clamped_at_cap() -> TestResult {
        let rule = DiscountRule::PercentageOff {
            percent: 50,
            cap: Some(1_000),
        };

        let outcome = compute_discount(&rule, None, 10_000, 10_000)?;

        assert_eq!(outcome.discount, 1_000);
        assert_eq!(outcome.final_price, 9_000);

        Ok(())
    }

    #[test]
    fn percentage_cap_above_raw_discount_is_ignored() -> TestResult {
        let rule = DiscountRule::PercentageOff {
            percent: 10,
            cap: Some(5_000),
        };

        let outcome = compute_discount(&rule, None, 10_000, 10_000)?;

        assert_eq!(outcome.discount, 1_000);

        Ok(())
    }

    #[test]
    fn full_percentage_discount_reaches_zero() -> TestResult {
        let rule = DiscountRule::PercentageOff {
            percent: 100,
            cap: None,
        };

        let outcome = compute_discount(&rule, None, 4_999, 4_999)?;

        assert_eq!(outcome.discount, 4_999);
        assert_eq!(outcome.final_price, 0);

        Ok(())
    }

    #[test]
    fn fixed_discount_never_exceeds_base_price() -> TestResult {
        let rule = DiscountRule::AmountOff { amount: 500 };

        let outcome = compute_discount(&rule, None, 300, 300)?;

        assert_eq!(outcome.discount, 300);
        assert_eq!(outcome.final_price, 0);

        Ok(())
    }

    #[test]
    fn fixed_discount_below_base_price_applies_in_full() -> TestResult {
        let rule = DiscountRule::AmountOff { amount: 500 };

        let outcome = compute_discount(&rule, None, 2_000, 2_000)?;

        assert_eq!(outcome.discount, 500);
        assert_eq!(outcome.final_price, 1_500);

        Ok(())
    }

    #[test]
    fn purchase_below_threshold_is_rejected() {
        let rule = DiscountRule::AmountOff { amount: 500 };

        let result = compute_discount(&rule, Some(5_000), 2_000, 4_999);

        assert_eq!(result, Err(DiscountError::ThresholdNotMet));
    }

    #[test]
    fn purchase_at_threshold_is_accepted() -> TestResult {
        let rule = DiscountRule::AmountOff { amount: 500 };

        let outcome = compute_discount(&rule, Some(5_000), 2_000, 5_000)?;

        assert_eq!(outcome.discount, 500);

        Ok(())
    }

    #[test]
    fn percent_of_minor_calculates_correctly() -> TestResult {
        let percent = Percentage::from(0.25);
        let result = percent_of_minor(&percent, 200)?;

        assert_eq!(result, 50);

        Ok(())
    }

    #[test]
    fn percent_off_derives_whole_percentages() -> TestResult {
        assert_eq!(percent_off(10_000, 7_500)?, Decimal::new(2_500, 2));

        Ok(())
    }

    #[test]
    fn percent_off_rounds_to_two_decimal_places() -> TestResult {
        // (10000 - 6667) / 10000 = 33.33%
        assert_eq!(percent_off(10_000, 6_667)?, Decimal::new(3_333, 2));

        Ok(())
    }

    #[test]
    fn percent_off_zero_original_is_an_error() {
        assert_eq!(percent_off(0, 0), Err(DiscountError::PercentConversion));
    }
}
