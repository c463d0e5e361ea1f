//! Validity windows
//!
//! Half-open `[starts_at, ends_at)` time windows shared by coupons and flash
//! sales. The half-open shape matters: a promotion that ends exactly when
//! another begins does not conflict with it.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The window's end does not lie strictly after its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("validity window end must be strictly after its start")]
pub struct InvalidWindow;

/// A half-open `[starts_at, ends_at)` validity window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    starts_at: Timestamp,
    ends_at: Timestamp,
}

impl ValidityWindow {
    /// Create a window.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidWindow`] unless `ends_at` is strictly after
    /// `starts_at`.
    pub fn new(starts_at: Timestamp, ends_at: Timestamp) -> Result<Self, InvalidWindow> {
        if ends_at <= starts_at {
            return Err(InvalidWindow);
        }

        Ok(Self { starts_at, ends_at })
    }

    /// The inclusive start instant.
    #[must_use]
    pub const fn starts_at(&self) -> Timestamp {
        self.starts_at
    }

    /// The exclusive end instant.
    #[must_use]
    pub const fn ends_at(&self) -> Timestamp {
        self.ends_at
    }

    /// Whether `now` falls inside the window. Start inclusive, end exclusive.
    #[must_use]
    pub fn contains(&self, now: Timestamp) -> bool {
        self.starts_at <= now && now < self.ends_at
    }

    /// Whether two windows conflict.
    ///
    /// Touching boundaries do not conflict, so back-to-back promotions are
    /// always accepted.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.starts_at < other.ends_at && other.starts_at < self.ends_at
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn window(starts_at: &str, ends_at: &str) -> TestResult<ValidityWindow> {
        Ok(ValidityWindow::new(starts_at.parse()?, ends_at.parse()?)?)
    }

    #[test]
    fn rejects_end_before_start() -> TestResult {
        let result = ValidityWindow::new(
            "2024-01-02T00:00:00Z".parse()?,
            "2024-01-01T00:00:00Z".parse()?,
        );

        assert_eq!(result, Err(InvalidWindow));

        Ok(())
    }

    #[test]
    fn rejects_zero_length_window() -> TestResult {
        let instant: Timestamp = "2024-01-01T00:00:00Z".parse()?;

        assert_eq!(ValidityWindow::new(instant, instant), Err(InvalidWindow));

        Ok(())
    }

    #[test]
    fn contains_is_start_inclusive_end_exclusive() -> TestResult {
        let window = window("2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")?;

        assert!(window.contains("2024-01-01T10:00:00Z".parse()?));
        assert!(window.contains("2024-01-01T10:59:59Z".parse()?));
        assert!(!window.contains("2024-01-01T11:00:00Z".parse()?));
        assert!(!window.contains("2024-01-01T09:59:59Z".parse()?));

        Ok(())
    }

    #[test]
    fn adjacent_windows_do_not_overlap() -> TestResult {
        let morning = window("2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")?;
        let midday = window("2024-01-01T11:00:00Z", "2024-01-01T12:00:00Z")?;

        assert!(!morning.overlaps(&midday));
        assert!(!midday.overlaps(&morning));

        Ok(())
    }

    #[test]
    fn partially_overlapping_windows_conflict() -> TestResult {
        let first = window("2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")?;
        let second = window("2024-01-01T10:30:00Z", "2024-01-01T11:30:00Z")?;

        assert!(first.overlaps(&second));
        assert!(second.overlaps(&first));

        Ok(())
    }

    #[test]
    fn contained_window_conflicts() -> TestResult {
        let outer = window("2024-01-01T00:00:00Z", "2024-01-10T00:00:00Z")?;
        let inner = window("2024-01-04T00:00:00Z", "2024-01-05T00:00:00Z")?;

        assert!(outer.overlaps(&inner));
        assert!(inner.overlaps(&outer));

        Ok(())
    }

    #[test]
    fn disjoint_windows_do_not_conflict() -> TestResult {
        let january = window("2024-01-01T00:00:00Z", "2024-02-01T00:00:00Z")?;
        let march = window("2024-03-01T00:00:00Z", "2024-04-01T00:00:00Z")?;

        assert!(!january.overlaps(&march));
        assert!(!march.overlaps(&january));

        Ok(())
    }
}
