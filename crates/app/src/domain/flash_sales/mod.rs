//! Flash Sales Domain
//!
//! Time-boxed discounted prices on a single course. The non-overlap
//! invariant is enforced by `marquee::flash_sales` on every create and
//! update; sold counters are only ever touched by the redemption ledger.

pub mod data;
pub mod errors;
pub mod records;
pub(crate) mod repository;
pub mod service;

pub use errors::FlashSalesServiceError;
pub use service::{FlashSalesService, PgFlashSalesService};
