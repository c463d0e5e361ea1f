//! Redemption Ledger
//!
//! `try_redeem` is the single write path for usage counters. Validation
//! failures are final; only storage-level serialization conflicts are
//! retried, a bounded number of times, before surfacing as
//! `TransientConflict`.

use async_trait::async_trait;
use jiff::Timestamp;
use marquee::status::PromotionStatus;
use mockall::automock;
use sqlx::{Postgres, Transaction};
use tracing::info;

use crate::{
    database::Db,
    domain::redemptions::{
        errors::RedemptionError,
        records::{LearnerUuid, OrderUuid, PromotionRef, RedemptionRecord},
        repository::PgRedemptionsRepository,
    },
};

/// Attempts before a persistent storage conflict is surfaced.
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct PgRedemptionLedger {
    db: Db,
    redemptions: PgRedemptionsRepository,
}

impl PgRedemptionLedger {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            redemptions: PgRedemptionsRepository::new(),
        }
    }

    async fn try_redeem_once(
        &self,
        promotion: PromotionRef,
        learner: LearnerUuid,
        order: OrderUuid,
        now: Timestamp,
    ) -> Result<RedemptionRecord, RedemptionError> {
        let mut tx = self.db.begin().await?;

        match promotion {
            PromotionRef::Coupon(uuid) => {
                let coupon = self
                    .redemptions
                    .lock_coupon(&mut tx, uuid)
                    .await?
                    .ok_or(RedemptionError::NotFound)?;

                check_redeemable(coupon.status(now))?;

                // The row lock is held, so this count cannot move under us.
                if let Some(per_user) = coupon.max_uses_per_user {
                    let used = self
                        .redemptions
                        .redemption_count(&mut tx, promotion, learner)
                        .await?;

                    if used >= u64::from(per_user) {
                        return Err(RedemptionError::UserCapExceeded);
                    }
                }

                if self
                    .redemptions
                    .increment_coupon_usage(&mut tx, uuid)
                    .await?
                    == 0
                {
                    return Err(RedemptionError::CapExceeded);
                }
            }
            PromotionRef::FlashSale(uuid) => {
                let sale = self
                    .redemptions
                    .lock_flash_sale(&mut tx, uuid)
                    .await?
                    .ok_or(RedemptionError::NotFound)?;

                check_redeemable(sale.status(now))?;

                if self
                    .redemptions
                    .increment_flash_sale_sold(&mut tx, uuid)
                    .await?
                    == 0
                {
                    return Err(RedemptionError::CapExceeded);
                }
            }
        }

        let record = self
            .redemptions
            .create_redemption(&mut tx, promotion, learner, order, now)
            .await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn read_count(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        promotion: PromotionRef,
        learner: LearnerUuid,
    ) -> Result<u64, RedemptionError> {
        Ok(self
            .redemptions
            .redemption_count(tx, promotion, learner)
            .await?)
    }
}

fn check_redeemable(status: PromotionStatus) -> Result<(), RedemptionError> {
    match status {
        PromotionStatus::Active => Ok(()),
        PromotionStatus::Exhausted => Err(RedemptionError::CapExceeded),
        PromotionStatus::Scheduled | PromotionStatus::Inactive | PromotionStatus::Expired => {
            Err(RedemptionError::PromotionNotActive)
        }
    }
}

#[async_trait]
impl RedemptionLedger for PgRedemptionLedger {
    #[tracing::instrument(
        name = "redemptions.ledger.try_redeem",
        skip(self),
        fields(promotion = %promotion, learner_uuid = %learner, order_uuid = %order),
        err
    )]
    async fn try_redeem(
        &self,
        promotion: PromotionRef,
        learner: LearnerUuid,
        order: OrderUuid,
        now: Timestamp,
    ) -> Result<RedemptionRecord, RedemptionError> {
        let mut attempt = 1;

        loop {
            match self.try_redeem_once(promotion, learner, order, now).await {
                Err(RedemptionError::TransientConflict) if attempt < MAX_ATTEMPTS => {
                    attempt += 1;
                }
                Ok(record) => {
                    info!(redemption_uuid = %record.uuid, attempt, "settled redemption");

                    return Ok(record);
                }
                result => return result,
            }
        }
    }

    async fn redemption_count(
        &self,
        promotion: PromotionRef,
        learner: LearnerUuid,
    ) -> Result<u64, RedemptionError> {
        let mut tx = self.db.begin().await?;

        let count = self.read_count(&mut tx, promotion, learner).await?;

        tx.commit().await?;

        Ok(count)
    }
}

#[automock]
#[async_trait]
pub trait RedemptionLedger: Send + Sync {
    /// Atomically settle one redemption of `promotion` for `learner`,
    /// attributed to `order`.
    async fn try_redeem(
        &self,
        promotion: PromotionRef,
        learner: LearnerUuid,
        order: OrderUuid,
        now: Timestamp,
    ) -> Result<RedemptionRecord, RedemptionError>;

    /// Settled redemptions of `promotion` by `learner`.
    async fn redemption_count(
        &self,
        promotion: PromotionRef,
        learner: LearnerUuid,
    ) -> Result<u64, RedemptionError>;
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use marquee::discounts::DiscountRule;
    use smallvec::smallvec;
    use testresult::TestResult;

    use crate::{
        domain::{
            coupons::{
                data::NewCoupon,
                records::CouponUuid,
                service::CouponsService,
            },
            flash_sales::{data::NewFlashSale, records::FlashSaleUuid, service::FlashSalesService},
        },
        test::TestContext,
    };

    use super::*;

    fn capped_coupon(code: &str, now: Timestamp, max_uses: Option<u32>) -> NewCoupon {
        NewCoupon {
            uuid: CouponUuid::new(),
            code: code.to_string(),
            discount: DiscountRule::PercentageOff {
                percent: 20,
                cap: None,
            },
            min_purchase: None,
            scope: smallvec![],
            max_uses,
            max_uses_per_user: None,
            starts_at: now - SignedDuration::from_hours(1),
            ends_at: now + SignedDuration::from_hours(24),
            enabled: true,
            first_purchase_only: false,
        }
    }

    #[tokio::test]
    async fn ten_concurrent_redemptions_against_a_cap_of_five() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let coupon = ctx
            .coupons
            .create_coupon(ctx.instructor, capped_coupon("RACE5", now, Some(5)))
            .await?;

        let mut handles = Vec::new();

        for _ in 0..10 {
            let ledger = ctx.ledger.clone();
            let promotion = PromotionRef::Coupon(coupon.uuid);

            handles.push(tokio::spawn(async move {
                ledger
                    .try_redeem(promotion, LearnerUuid::new(), OrderUuid::new(), now)
                    .await
            }));
        }

        let mut settled = 0;
        let mut capped = 0;

        for handle in handles {
            match handle.await? {
                Ok(_) => settled += 1,
                Err(RedemptionError::CapExceeded) => capped += 1,
                Err(other) => panic!("unexpected redemption failure: {other:?}"),
            }
        }

        assert_eq!(settled, 5, "exactly the cap settles");
        assert_eq!(capped, 5, "the rest fail with CapExceeded");

        let fetched = ctx.coupons.get_coupon(ctx.instructor, coupon.uuid).await?;

        assert_eq!(fetched.used_count, 5, "counter never overshoots the cap");

        Ok(())
    }

    #[tokio::test]
    async fn per_user_cap_is_enforced_per_learner() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let mut coupon = capped_coupon("ONEEACH", now, Some(10));
        coupon.max_uses_per_user = Some(1);

        let coupon = ctx.coupons.create_coupon(ctx.instructor, coupon).await?;
        let promotion = PromotionRef::Coupon(coupon.uuid);

        let learner = LearnerUuid::new();

        ctx.ledger
            .try_redeem(promotion, learner, OrderUuid::new(), now)
            .await?;

        let result = ctx
            .ledger
            .try_redeem(promotion, learner, OrderUuid::new(), now)
            .await;

        assert!(
            matches!(result, Err(RedemptionError::UserCapExceeded)),
            "expected UserCapExceeded, got {result:?}"
        );

        // A different learner still gets through.
        ctx.ledger
            .try_redeem(promotion, LearnerUuid::new(), OrderUuid::new(), now)
            .await?;

        assert_eq!(ctx.ledger.redemption_count(promotion, learner).await?, 1);

        Ok(())
    }

    #[tokio::test]
    async fn redemption_requires_an_active_promotion() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let mut scheduled = capped_coupon("LATER20", now, None);
        scheduled.starts_at = now + SignedDuration::from_hours(1);
        scheduled.ends_at = now + SignedDuration::from_hours(2);

        let mut disabled = capped_coupon("PAUSED20", now, None);
        disabled.enabled = false;

        for coupon in [scheduled, disabled] {
            let record = ctx.coupons.create_coupon(ctx.instructor, coupon).await?;

            let result = ctx
                .ledger
                .try_redeem(
                    PromotionRef::Coupon(record.uuid),
                    LearnerUuid::new(),
                    OrderUuid::new(),
                    now,
                )
                .await;

            assert!(
                matches!(result, Err(RedemptionError::PromotionNotActive)),
                "expected PromotionNotActive, got {result:?}"
            );
        }

        Ok(())
    }

    #[tokio::test]
    async fn exhausted_coupon_fails_with_cap_exceeded() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let coupon = ctx
            .coupons
            .create_coupon(ctx.instructor, capped_coupon("ONCE", now, Some(1)))
            .await?;

        let promotion = PromotionRef::Coupon(coupon.uuid);

        ctx.ledger
            .try_redeem(promotion, LearnerUuid::new(), OrderUuid::new(), now)
            .await?;

        let result = ctx
            .ledger
            .try_redeem(promotion, LearnerUuid::new(), OrderUuid::new(), now)
            .await;

        assert!(
            matches!(result, Err(RedemptionError::CapExceeded)),
            "expected CapExceeded, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn an_order_redeems_a_promotion_at_most_once() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let coupon = ctx
            .coupons
            .create_coupon(ctx.instructor, capped_coupon("IDEM20", now, None))
            .await?;

        let promotion = PromotionRef::Coupon(coupon.uuid);
        let learner = LearnerUuid::new();
        let order = OrderUuid::new();

        ctx.ledger.try_redeem(promotion, learner, order, now).await?;

        let result = ctx.ledger.try_redeem(promotion, learner, order, now).await;

        assert!(
            matches!(result, Err(RedemptionError::AlreadyRedeemed)),
            "expected AlreadyRedeemed, got {result:?}"
        );

        let fetched = ctx.coupons.get_coupon(ctx.instructor, coupon.uuid).await?;

        assert_eq!(fetched.used_count, 1, "failed settle must roll back");

        Ok(())
    }

    #[tokio::test]
    async fn unknown_promotion_is_not_found() {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let result = ctx
            .ledger
            .try_redeem(
                PromotionRef::Coupon(CouponUuid::new()),
                LearnerUuid::new(),
                OrderUuid::new(),
                now,
            )
            .await;

        assert!(
            matches!(result, Err(RedemptionError::NotFound)),
            "expected NotFound, got {result:?}"
        );
    }

    #[tokio::test]
    async fn flash_sale_quantity_caps_sales() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let course = ctx.create_course(10_000).await;

        let sale = ctx
            .flash_sales
            .create_flash_sale(
                ctx.instructor,
                NewFlashSale {
                    uuid: FlashSaleUuid::new(),
                    course,
                    discount_price: 7_500,
                    starts_at: now - SignedDuration::from_hours(1),
                    ends_at: now + SignedDuration::from_hours(24),
                    enabled: true,
                    max_quantity: Some(2),
                    show_countdown: false,
                    priority: 0,
                },
                now,
            )
            .await?;

        let promotion = PromotionRef::FlashSale(sale.uuid);

        for _ in 0..2 {
            ctx.ledger
                .try_redeem(promotion, LearnerUuid::new(), OrderUuid::new(), now)
                .await?;
        }

        let result = ctx
            .ledger
            .try_redeem(promotion, LearnerUuid::new(), OrderUuid::new(), now)
            .await;

        assert!(
            matches!(result, Err(RedemptionError::CapExceeded)),
            "expected CapExceeded, got {result:?}"
        );

        let fetched = ctx
            .flash_sales
            .get_flash_sale(ctx.instructor, sale.uuid)
            .await?;

        assert_eq!(fetched.sold_count, 2);

        Ok(())
    }
}
