//! Coupons Data

use jiff::Timestamp;
use marquee::{coupons::CouponDraft, discounts::DiscountRule};
use smallvec::SmallVec;

use crate::domain::{coupons::records::CouponUuid, courses::records::CourseUuid};

/// A coupon as submitted for creation.
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub uuid: CouponUuid,

    /// Raw code as typed by the instructor; normalized during validation.
    pub code: String,

    pub discount: DiscountRule,
    pub min_purchase: Option<u64>,

    /// Courses the coupon applies to. Empty means every course.
    pub scope: SmallVec<[CourseUuid; 4]>,

    pub max_uses: Option<u32>,
    pub max_uses_per_user: Option<u32>,

    pub starts_at: Timestamp,
    pub ends_at: Timestamp,

    pub enabled: bool,
    pub first_purchase_only: bool,
}

impl NewCoupon {
    /// The rule-engine view of this submission.
    #[must_use]
    pub fn as_draft(&self) -> CouponDraft<CourseUuid> {
        CouponDraft {
            code: self.code.clone(),
            discount: self.discount,
            min_purchase: self.min_purchase,
            scope: self.scope.clone(),
            max_uses: self.max_uses,
            max_uses_per_user: self.max_uses_per_user,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            enabled: self.enabled,
            first_purchase_only: self.first_purchase_only,
        }
    }
}

/// A coupon as submitted for update. The code is the coupon's identity and
/// never changes.
#[derive(Debug, Clone)]
pub struct CouponUpdate {
    pub discount: DiscountRule,
    pub min_purchase: Option<u64>,
    pub scope: SmallVec<[CourseUuid; 4]>,
    pub max_uses: Option<u32>,
    pub max_uses_per_user: Option<u32>,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub enabled: bool,
    pub first_purchase_only: bool,
}

impl CouponUpdate {
    /// The rule-engine view of this submission, under the stored `code`.
    #[must_use]
    pub fn as_draft(&self, code: &str) -> CouponDraft<CourseUuid> {
        CouponDraft {
            code: code.to_string(),
            discount: self.discount,
            min_purchase: self.min_purchase,
            scope: self.scope.clone(),
            max_uses: self.max_uses,
            max_uses_per_user: self.max_uses_per_user,
            starts_at: self.starts_at,
            ends_at: self.ends_at,
            enabled: self.enabled,
            first_purchase_only: self.first_purchase_only,
        }
    }
}
