//! Promotion status resolution
//!
//! The effective status of a coupon or flash sale is derived from its stored
//! flags, its validity window and its usage counter every time it is read.
//! Nothing advances status in the background; time alone moves a promotion
//! from `Scheduled` through `Active` to `Expired`.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use crate::window::ValidityWindow;

/// Usage counter with an optional cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageBudget {
    /// Redemptions settled so far.
    pub used: u64,

    /// Total allowed redemptions. `None` means unlimited.
    pub cap: Option<u64>,
}

impl UsageBudget {
    /// A budget with no cap and nothing used.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            used: 0,
            cap: None,
        }
    }

    /// Whether the counter has reached its cap.
    #[must_use]
    pub fn exhausted(&self) -> bool {
        self.cap.is_some_and(|cap| self.used >= cap)
    }
}

/// The stored state a promotion's status is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionState {
    /// The instructor-facing on/off toggle.
    pub enabled: bool,

    /// Validity window.
    pub window: ValidityWindow,

    /// Usage counter and cap.
    pub usage: UsageBudget,
}

/// Effective promotion status at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotionStatus {
    /// The window has not opened yet.
    Scheduled,

    /// Enabled, inside the window, with budget remaining.
    Active,

    /// Inside an otherwise-active window, but the usage cap is reached.
    Exhausted,

    /// The toggle is off.
    Inactive,

    /// The window has closed.
    Expired,
}

impl PromotionStatus {
    /// Whether the promotion can be redeemed in this status.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// Resolve the effective status of a promotion at `now`.
///
/// A promotion past its window reads `Expired` no matter what its flags say.
/// Before that point the toggle wins, so a disabled promotion reads
/// `Inactive` even if its window has not opened. There is no terminal state:
/// toggling cycles `Inactive` and `Active`, while `Scheduled` is unreachable
/// once the window has opened.
#[must_use]
pub fn resolve(state: &PromotionState, now: Timestamp) -> PromotionStatus {
    if now >= state.window.ends_at() {
        return PromotionStatus::Expired;
    }

    if !state.enabled {
        return PromotionStatus::Inactive;
    }

    if now < state.window.starts_at() {
        return PromotionStatus::Scheduled;
    }

    if state.usage.exhausted() {
        return PromotionStatus::Exhausted;
    }

    PromotionStatus::Active
}
