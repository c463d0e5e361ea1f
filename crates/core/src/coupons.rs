//! Coupon rules
//!
//! Validation of coupon definitions against business constraints before they
//! are persisted. Checks run in a fixed order and short-circuit on the first
//! failure, so callers always get one stable reason per rejection.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    hash::Hash,
};

use jiff::Timestamp;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use thiserror::Error;

use crate::{
    discounts::DiscountRule,
    window::{InvalidWindow, ValidityWindow},
};

/// Reasons a coupon definition is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CouponRuleError {
    /// A coupon with the same normalized code already exists.
    #[error("a coupon with this code already exists")]
    DuplicateCode,

    /// The code is not 4-20 alphanumeric characters after uppercasing.
    #[error("coupon codes are 4-20 alphanumeric characters")]
    InvalidCodeFormat,

    /// The discount value is out of range for its type.
    #[error("discount value is out of range for its type")]
    InvalidDiscountValue,

    /// A max-discount cap that can never produce a discount.
    #[error("max-discount cap must be greater than zero")]
    InvalidCapForType,

    /// A minimum-purchase threshold that can never gate anything.
    #[error("minimum-purchase threshold must be greater than zero")]
    InvalidThreshold,

    /// The validity window's end is not strictly after its start.
    #[error("validity window end must be strictly after its start")]
    InvalidWindow,

    /// Usage caps are zero, or the per-user cap exceeds the total cap.
    #[error("usage caps must be at least one, with per-user no higher than total")]
    InvalidUsageCap,

    /// The coupon is scoped to a course the instructor does not own.
    #[error("coupon is scoped to a course the instructor does not own")]
    UnauthorizedCourseScope,
}

/// A normalized, format-checked coupon code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CouponCode(String);

impl CouponCode {
    /// Shortest accepted code length.
    pub const MIN_LEN: usize = 4;

    /// Longest accepted code length.
    pub const MAX_LEN: usize = 20;

    /// Uppercase `raw` and check the format.
    ///
    /// # Errors
    ///
    /// Returns [`CouponRuleError::InvalidCodeFormat`] unless the normalized
    /// code is 4-20 ASCII alphanumeric characters.
    pub fn parse(raw: &str) -> Result<Self, CouponRuleError> {
        let normalized = normalize_code(raw);

        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&normalized.len())
            || !normalized
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(CouponRuleError::InvalidCodeFormat);
        }

        Ok(Self(normalized))
    }

    /// The normalized code text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CouponCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        Display::fmt(&self.0, f)
    }
}

/// Uppercase a raw code the way codes are stored and compared.
#[must_use]
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// A coupon definition as submitted for create or update.
///
/// `C` is the caller's course identifier type. Window bounds stay raw here so
/// the validator can report [`CouponRuleError::InvalidWindow`] in its
/// documented position rather than at construction.
#[derive(Debug, Clone)]
pub struct CouponDraft<C> {
    /// Raw code as typed by the instructor.
    pub code: String,

    /// The discount the coupon grants.
    pub discount: DiscountRule,

    /// Minimum purchase amount, in minor units, for the coupon to apply.
    pub min_purchase: Option<u64>,

    /// Courses the coupon applies to. Empty means every course.
    pub scope: SmallVec<[C; 4]>,

    /// Total redemptions allowed. `None` means unlimited.
    pub max_uses: Option<u32>,

    /// Redemptions allowed per learner. `None` means unlimited.
    pub max_uses_per_user: Option<u32>,

    /// Window start.
    pub starts_at: Timestamp,

    /// Window end, exclusive.
    pub ends_at: Timestamp,

    /// Instructor-facing on/off toggle.
    pub enabled: bool,

    /// Restrict the coupon to a learner's first purchase.
    pub first_purchase_only: bool,
}

/// The artifacts of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedCoupon {
    /// The normalized, format-checked code.
    pub code: CouponCode,

    /// The checked validity window.
    pub window: ValidityWindow,
}

/// Validate a coupon draft.
///
/// `existing_codes` holds the normalized codes already persisted (excluding
/// the coupon itself on update); `owned_courses` is the requesting
/// instructor's course set.
///
/// # Errors
///
/// Returns the first failing [`CouponRuleError`], checked in this order:
/// code uniqueness, code format, discount value, discount cap, threshold,
/// window, usage caps, course scope.
pub fn validate_coupon<C>(
    draft: &CouponDraft<C>,
    existing_codes: &FxHashSet<String>,
    owned_courses: &FxHashSet<C>,
) -> Result<ValidatedCoupon, CouponRuleError>
where
    C: Copy + Eq + Hash,
{
    if existing_codes.contains(&normalize_code(&draft.code)) {
        return Err(CouponRuleError::DuplicateCode);
    }

    let code = CouponCode::parse(&draft.code)?;

    match draft.discount {
        DiscountRule::PercentageOff { percent, .. } if percent == 0 || percent > 100 => {
            return Err(CouponRuleError::InvalidDiscountValue);
        }
        DiscountRule::AmountOff { amount } if amount == 0 => {
            return Err(CouponRuleError::InvalidDiscountValue);
        }
        DiscountRule::PercentageOff { .. } | DiscountRule::AmountOff { .. } => {}
    }

    if let DiscountRule::PercentageOff { cap: Some(0), .. } = draft.discount {
        return Err(CouponRuleError::InvalidCapForType);
    }

    if draft.min_purchase == Some(0) {
        return Err(CouponRuleError::InvalidThreshold);
    }

    let window = ValidityWindow::new(draft.starts_at, draft.ends_at)
        .map_err(|InvalidWindow| CouponRuleError::InvalidWindow)?;

    match (draft.max_uses, draft.max_uses_per_user) {
        (Some(0), _) | (_, Some(0)) => return Err(CouponRuleError::InvalidUsageCap),
        (Some(total), Some(per_user)) if per_user > total => {
            return Err(CouponRuleError::InvalidUsageCap);
        }
        _ => {}
    }

    if !draft
        .scope
        .iter()
        .all(|course| owned_courses.contains(course))
    {
        return Err(CouponRuleError::UnauthorizedCourseScope);
    }

    Ok(ValidatedCoupon { code, window })
}
