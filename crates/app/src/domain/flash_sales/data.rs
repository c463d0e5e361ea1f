//! Flash Sales Data

use jiff::Timestamp;
use marquee::flash_sales::FlashSaleDraft;

use crate::domain::{courses::records::CourseUuid, flash_sales::records::FlashSaleUuid};

/// A flash sale as submitted for creation.
#[derive(Debug, Clone)]
pub struct NewFlashSale {
    pub uuid: FlashSaleUuid,

    /// The single course the sale applies to.
    pub course: CourseUuid,

    /// Sale price in minor units. Must undercut the course price.
    pub discount_price: u64,

    pub starts_at: Timestamp,
    pub ends_at: Timestamp,

    pub enabled: bool,
    pub max_quantity: Option<u32>,
    pub show_countdown: bool,
    pub priority: i16,
}

impl NewFlashSale {
    /// The rule-engine view of this submission.
    #[must_use]
    pub fn as_draft(&self) -> FlashSaleDraft<CourseUuid> {
        FlashSaleDraft {
            course: self.course,
            discount_price: self.discount_price,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            enabled: self.enabled,
            max_quantity: self.max_quantity,
            show_countdown: self.show_countdown,
            priority: self.priority,
        }
    }
}

/// A flash sale as submitted for update. The course never changes; move the
/// sale by deleting and recreating it.
#[derive(Debug, Clone)]
pub struct FlashSaleUpdate {
    pub discount_price: u64,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub enabled: bool,
    pub max_quantity: Option<u32>,
    pub show_countdown: bool,
    pub priority: i16,
}

impl FlashSaleUpdate {
    /// The rule-engine view of this submission, against the stored `course`.
    #[must_use]
    pub fn as_draft(&self, course: CourseUuid) -> FlashSaleDraft<CourseUuid> {
        FlashSaleDraft {
            course,
            discount_price: self.discount_price,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            enabled: self.enabled,
            max_quantity: self.max_quantity,
            show_countdown: self.show_countdown,
            priority: self.priority,
        }
    }
}
