//! Redemptions Domain
//!
//! The ledger of settled redemptions, and the only code that mutates usage
//! and sold counters. Each redemption runs as one transaction around a
//! row-locked read, a conditional increment and a ledger insert, so N
//! concurrent attempts against a cap of K settle at most K rows.

pub mod errors;
pub mod records;
pub(crate) mod repository;
pub mod service;

pub use errors::RedemptionError;
pub use service::{PgRedemptionLedger, RedemptionLedger};
