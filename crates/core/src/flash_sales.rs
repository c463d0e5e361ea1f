//! Flash sale rules
//!
//! Validation of time-boxed discounted prices on a single course. The one
//! structural invariant lives here: enabled sales on the same course must
//! have pairwise non-overlapping windows.

use std::hash::Hash;

use jiff::Timestamp;
use rust_decimal::Decimal;
use rustc_hash::FxHashSet;
use thiserror::Error;

use crate::{
    discounts::{self, DiscountError},
    window::{InvalidWindow, ValidityWindow},
};

/// Reasons a flash sale definition is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FlashSaleRuleError {
    /// The course does not belong to the requesting instructor.
    #[error("flash sales can only be created on courses the instructor owns")]
    UnauthorizedCourse,

    /// The validity window's end is not strictly after its start.
    #[error("validity window end must be strictly after its start")]
    InvalidWindow,

    /// The discount price does not undercut the course's current price.
    #[error("discount price must be strictly below the course price")]
    InvalidDiscountPrice,

    /// Another enabled sale on the course already covers part of the window.
    #[error("an enabled flash sale already covers part of this window")]
    OverlappingWindow,

    /// Deriving the percent-off figure failed.
    #[error(transparent)]
    Discount(#[from] DiscountError),
}

/// A flash sale definition as submitted for create or update.
///
/// `C` is the caller's course identifier type.
#[derive(Debug, Clone)]
pub struct FlashSaleDraft<C> {
    /// The single course the sale applies to.
    pub course: C,

    /// Sale price in minor units. Must undercut the course price.
    pub discount_price: u64,

    /// Window start.
    pub starts_at: Timestamp,

    /// Window end, exclusive.
    pub ends_at: Timestamp,

    /// Instructor-facing on/off toggle.
    pub enabled: bool,

    /// Units available at the sale price. `None` means unlimited.
    pub max_quantity: Option<u32>,

    /// Show a countdown timer on the course page.
    pub show_countdown: bool,

    /// Display ordering when several sales could be shown. Presentation
    /// only; carries no correctness weight.
    pub priority: i16,
}

/// The artifacts of a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedFlashSale {
    /// The checked validity window.
    pub window: ValidityWindow,

    /// Percent saved against the course price, two decimal places.
    pub percent_off: Decimal,

    /// Requested toggle AND the window contains `now`. This is what a
    /// storefront may show as "live right now"; the stored flag stays the
    /// requested one so a scheduled sale activates when its window opens.
    pub live_now: bool,
}

/// Validate a flash sale draft.
///
/// `course_price` is the course's current price; `other_enabled_windows`
/// holds the windows of the course's *other* enabled sales (mutations must
/// exclude the sale being edited).
///
/// # Errors
///
/// Returns the first failing [`FlashSaleRuleError`], checked in this order:
/// course ownership, window, discount price, overlap.
pub fn validate_flash_sale<C>(
    draft: &FlashSaleDraft<C>,
    course_price: u64,
    owned_courses: &FxHashSet<C>,
    other_enabled_windows: &[ValidityWindow],
    now: Timestamp,
) -> Result<ValidatedFlashSale, FlashSaleRuleError>
where
    C: Copy + Eq + Hash,
{
    if !owned_courses.contains(&draft.course) {
        return Err(FlashSaleRuleError::UnauthorizedCourse);
    }

    let window = ValidityWindow::new(draft.starts_at, draft.ends_at)
        .map_err(|InvalidWindow| FlashSaleRuleError::InvalidWindow)?;

    if draft.discount_price >= course_price {
        return Err(FlashSaleRuleError::InvalidDiscountPrice);
    }

    // A disabled sale takes no slot in the schedule, so it cannot conflict.
    if draft.enabled && other_enabled_windows.iter().any(|w| w.overlaps(&window)) {
        return Err(FlashSaleRuleError::OverlappingWindow);
    }

    let percent_off = discounts::percent_off(course_price, draft.discount_price)?;

    Ok(ValidatedFlashSale {
        window,
        percent_off,
        live_now: draft.enabled && window.contains(now),
    })
}
