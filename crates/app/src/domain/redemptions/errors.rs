//! Redemption ledger errors.
//!
//! Everything except `StoreUnavailable` is an expected, recoverable outcome:
//! the purchase flow falls back to the undiscounted price. A store fault
//! must never be read as "redeemed".

use sqlx::{Error, error::ErrorKind};
use thiserror::Error;

/// SQLSTATEs the ledger treats as retryable: serialization failure and
/// deadlock detected.
const TRANSIENT_SQLSTATES: [&str; 2] = ["40001", "40P01"];

#[derive(Debug, Error)]
pub enum RedemptionError {
    #[error("promotion is not redeemable right now")]
    PromotionNotActive,

    #[error("promotion usage cap reached")]
    CapExceeded,

    #[error("learner reached the per-user cap")]
    UserCapExceeded,

    #[error("order already redeemed this promotion")]
    AlreadyRedeemed,

    #[error("promotion not found")]
    NotFound,

    #[error("storage conflict persisted across retries")]
    TransientConflict,

    #[error("storage unavailable")]
    StoreUnavailable(#[source] Error),
}

impl From<Error> for RedemptionError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        if let Some(db_error) = error.as_database_error() {
            if db_error
                .code()
                .is_some_and(|code| TRANSIENT_SQLSTATES.contains(&code.as_ref()))
            {
                return Self::TransientConflict;
            }

            if matches!(db_error.kind(), ErrorKind::UniqueViolation) {
                return Self::AlreadyRedeemed;
            }
        }

        Self::StoreUnavailable(error)
    }
}
