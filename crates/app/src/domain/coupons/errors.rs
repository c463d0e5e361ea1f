//! Coupons service errors.

use marquee::{coupons::CouponRuleError, discounts::DiscountError};
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CouponsServiceError {
    /// The definition failed a business rule.
    #[error(transparent)]
    Rule(#[from] CouponRuleError),

    /// Applying the coupon to a purchase failed.
    #[error(transparent)]
    Discount(#[from] DiscountError),

    #[error("coupon already exists")]
    AlreadyExists,

    #[error("coupon not found")]
    NotFound,

    #[error("coupon belongs to another instructor")]
    NotOwner,

    #[error("coupon has settled redemptions")]
    HasRedemptions,

    #[error("coupon is currently active")]
    CurrentlyActive,

    #[error("coupon is not redeemable right now")]
    NotActive,

    #[error("coupon does not apply to this course")]
    NotApplicable,

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for CouponsServiceError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::UniqueViolation) => Self::AlreadyExists,
            Some(ErrorKind::ForeignKeyViolation) => Self::InvalidReference,
            Some(ErrorKind::NotNullViolation) => Self::MissingRequiredData,
            Some(ErrorKind::CheckViolation) => Self::InvalidData,
            _ => Self::Sql(error),
        }
    }
}
