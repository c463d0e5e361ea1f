//! Flash sales service errors.

use marquee::flash_sales::FlashSaleRuleError;
use sqlx::{
    Error,
    error::{DatabaseError, ErrorKind},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlashSalesServiceError {
    /// The definition failed a business rule.
    #[error(transparent)]
    Rule(#[from] FlashSaleRuleError),

    #[error("flash sale already exists")]
    AlreadyExists,

    #[error("flash sale not found")]
    NotFound,

    #[error("flash sale belongs to another instructor")]
    NotOwner,

    #[error("flash sale has recorded sales")]
    HasSales,

    #[error("related resource not found")]
    InvalidReference,

    #[error("missing required data")]
    MissingRequiredData,

    #[error("invalid data")]
    InvalidData,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for FlashSalesServiceError {
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
