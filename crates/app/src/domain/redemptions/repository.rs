//! Redemptions Repository
//!
//! The `FOR UPDATE` reads here take the per-promotion row lock that
//! serializes concurrent redemptions; the increments are conditional on the
//! cap so the counter can never overshoot even without the lock.

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{Postgres, Transaction, query, query_as, query_scalar};

use crate::domain::{
    coupons::records::{CouponRecord, CouponUuid},
    flash_sales::records::{FlashSaleRecord, FlashSaleUuid},
    redemptions::records::{LearnerUuid, OrderUuid, PromotionRef, RedemptionRecord, RedemptionUuid},
};

const COUNT_COUPON_REDEMPTIONS_SQL: &str = include_str!("sql/count_coupon_redemptions.sql");
const COUNT_FLASH_SALE_REDEMPTIONS_SQL: &str = include_str!("sql/count_flash_sale_redemptions.sql");
const CREATE_REDEMPTION_SQL: &str = include_str!("sql/create_redemption.sql");
const INCREMENT_COUPON_USAGE_SQL: &str = include_str!("sql/increment_coupon_usage.sql");
const INCREMENT_FLASH_SALE_SOLD_SQL: &str = include_str!("sql/increment_flash_sale_sold.sql");
const LOCK_COUPON_SQL: &str = include_str!("sql/lock_coupon.sql");
const LOCK_FLASH_SALE_SQL: &str = include_str!("sql/lock_flash_sale.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgRedemptionsRepository;

impl PgRedemptionsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Read a coupon's current state under its row lock.
    pub(crate) async fn lock_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
    ) -> Result<Option<CouponRecord>, sqlx::Error> {
        query_as(LOCK_COUPON_SQL)
            .bind(coupon.into_uuid())
            .fetch_optional(&mut **tx)
            .await
    }

    /// Read a flash sale's current state under its row lock.
    pub(crate) async fn lock_flash_sale(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sale: FlashSaleUuid,
    ) -> Result<Option<FlashSaleRecord>, sqlx::Error> {
        query_as(LOCK_FLASH_SALE_SQL)
            .bind(sale.into_uuid())
            .fetch_optional(&mut **tx)
            .await
    }

    /// Increment a coupon's usage counter, conditional on its cap. Returns
    /// the number of rows updated: zero means the cap is already reached.
    pub(crate) async fn increment_coupon_usage(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(INCREMENT_COUPON_USAGE_SQL)
            .bind(coupon.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// Increment a flash sale's sold counter, conditional on its quantity.
    pub(crate) async fn increment_flash_sale_sold(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sale: FlashSaleUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(INCREMENT_FLASH_SALE_SOLD_SQL)
            .bind(sale.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// Settled redemptions of `promotion` by `learner`.
    pub(crate) async fn redemption_count(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        promotion: PromotionRef,
        learner: LearnerUuid,
    ) -> Result<u64, sqlx::Error> {
        let count: i64 = match promotion {
            PromotionRef::Coupon(uuid) => {
                query_scalar(COUNT_COUPON_REDEMPTIONS_SQL)
                    .bind(uuid.into_uuid())
                    .bind(learner.into_uuid())
                    .fetch_one(&mut **tx)
                    .await?
            }
            PromotionRef::FlashSale(uuid) => {
                query_scalar(COUNT_FLASH_SALE_REDEMPTIONS_SQL)
                    .bind(uuid.into_uuid())
                    .bind(learner.into_uuid())
                    .fetch_one(&mut **tx)
                    .await?
            }
        };

        u64::try_from(count).map_err(|e| sqlx::Error::ColumnDecode {
            index: "count".to_string(),
            source: Box::new(e),
        })
    }

    pub(crate) async fn create_redemption(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        promotion: PromotionRef,
        learner: LearnerUuid,
        order: OrderUuid,
        redeemed_at: Timestamp,
    ) -> Result<RedemptionRecord, sqlx::Error> {
        let (coupon_uuid, flash_sale_uuid) = match promotion {
            PromotionRef::Coupon(uuid) => (Some(uuid.into_uuid()), None),
            PromotionRef::FlashSale(uuid) => (None, Some(uuid.into_uuid())),
        };

        query_as(CREATE_REDEMPTION_SQL)
            .bind(RedemptionUuid::new().into_uuid())
            .bind(coupon_uuid)
            .bind(flash_sale_uuid)
            .bind(learner.into_uuid())
            .bind(order.into_uuid())
            .bind(SqlxTimestamp::from(redeemed_at))
            .fetch_one(&mut **tx)
            .await
    }
}
