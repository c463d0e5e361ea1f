//! Redemptions Records

use std::fmt::{Display, Formatter, Result as FmtResult};

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use serde::Serialize;
use sqlx::{FromRow, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    domain::{coupons::records::CouponUuid, flash_sales::records::FlashSaleUuid},
    uuids::TypedUuid,
};

/// Redemption UUID
pub type RedemptionUuid = TypedUuid<RedemptionRecord>;

/// Learner UUID
///
/// Learners live in the wider platform; here they are only an identity.
pub type LearnerUuid = TypedUuid<Learner>;

/// Marker for learner identities.
#[derive(Debug, Clone)]
pub struct Learner {}

/// Order UUID
///
/// The settled transaction a redemption is attributed to.
pub type OrderUuid = TypedUuid<Order>;

/// Marker for order identities.
#[derive(Debug, Clone)]
pub struct Order {}

/// Either kind of promotion the ledger can redeem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PromotionRef {
    Coupon(CouponUuid),
    FlashSale(FlashSaleUuid),
}

impl Display for PromotionRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Coupon(uuid) => write!(f, "coupon:{uuid}"),
            Self::FlashSale(uuid) => write!(f, "flash_sale:{uuid}"),
        }
    }
}

/// Redemption Record
///
/// One settled redemption. Never deleted or decremented; refunds are a
/// separate concern.
#[derive(Debug, Clone, Serialize)]
pub struct RedemptionRecord {
    pub uuid: RedemptionUuid,
    pub promotion: PromotionRef,
    pub learner_uuid: LearnerUuid,
    pub order_uuid: OrderUuid,
    pub redeemed_at: Timestamp,
}

impl<'r> FromRow<'r, PgRow> for RedemptionRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let coupon_uuid: Option<Uuid> = row.try_get("coupon_uuid")?;
        let flash_sale_uuid: Option<Uuid> = row.try_get("flash_sale_uuid")?;

        let promotion = match (coupon_uuid, flash_sale_uuid) {
            (Some(uuid), None) => PromotionRef::Coupon(CouponUuid::from_uuid(uuid)),
            (None, Some(uuid)) => PromotionRef::FlashSale(FlashSaleUuid::from_uuid(uuid)),
            _ => {
                return Err(sqlx::Error::ColumnDecode {
                    index: "coupon_uuid".to_string(),
                    source: "redemption row references neither or both promotion kinds".into(),
                });
            }
        };

        Ok(Self {
            uuid: RedemptionUuid::from_uuid(row.try_get("uuid")?),
            promotion,
            learner_uuid: LearnerUuid::from_uuid(row.try_get("learner_uuid")?),
            order_uuid: OrderUuid::from_uuid(row.try_get("order_uuid")?),
            redeemed_at: row.try_get::<SqlxTimestamp, _>("redeemed_at")?.to_jiff(),
        })
    }
}
