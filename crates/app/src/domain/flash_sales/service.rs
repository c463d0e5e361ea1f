//! Flash Sales Service

use async_trait::async_trait;
use jiff::Timestamp;
use marquee::flash_sales::FlashSaleRuleError;
use mockall::automock;
use tracing::info;

use crate::{
    database::Db,
    domain::{
        courses::{
            records::{CourseUuid, InstructorUuid},
            repository::PgCoursesRepository,
        },
        flash_sales::{
            data::{FlashSaleUpdate, NewFlashSale},
            errors::FlashSalesServiceError,
            records::{FlashSaleRecord, FlashSaleUuid},
            repository::PgFlashSalesRepository,
        },
    },
};

#[derive(Debug, Clone)]
pub struct PgFlashSalesService {
    db: Db,
    flash_sales: PgFlashSalesRepository,
    courses: PgCoursesRepository,
}

impl PgFlashSalesService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            flash_sales: PgFlashSalesRepository::new(),
            courses: PgCoursesRepository::new(),
        }
    }

    async fn owned_flash_sale(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        instructor: InstructorUuid,
        sale: FlashSaleUuid,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError> {
        let record = self.flash_sales.get_flash_sale(tx, sale).await?;

        if record.instructor_uuid != instructor {
            return Err(FlashSalesServiceError::NotOwner);
        }

        Ok(record)
    }
}

#[async_trait]
impl FlashSalesService for PgFlashSalesService {
    #[tracing::instrument(
        name = "flash_sales.service.create_flash_sale",
        skip(self, sale),
        fields(
            instructor_uuid = %instructor,
            flash_sale_uuid = %sale.uuid,
            course_uuid = %sale.course
        ),
        err
    )]
    async fn create_flash_sale(
        &self,
        instructor: InstructorUuid,
        sale: NewFlashSale,
        now: Timestamp,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError> {
        let mut tx = self.db.begin().await?;

        let owned = self.courses.owned_course_uuids(&mut tx, instructor).await?;

        // Ownership is checked before the course row is ever read.
        if !owned.contains(&sale.course) {
            return Err(FlashSaleRuleError::UnauthorizedCourse.into());
        }

        let course = self.courses.get_course(&mut tx, sale.course).await?;

        let others = self
            .flash_sales
            .enabled_windows(&mut tx, sale.course, None)
            .await?;

        let validated = marquee::flash_sales::validate_flash_sale(
            &sale.as_draft(),
            course.price,
            &owned,
            &others,
            now,
        )?;

        let record = self
            .flash_sales
            .create_flash_sale(&mut tx, instructor, &sale, course.price, validated.window)
            .await?;

        tx.commit().await?;

        info!(
            flash_sale_uuid = %record.uuid,
            course_uuid = %record.course_uuid,
            live_now = validated.live_now,
            "created flash sale"
        );

        Ok(record)
    }

    #[tracing::instrument(
        name = "flash_sales.service.update_flash_sale",
        skip(self, update),
        fields(instructor_uuid = %instructor, flash_sale_uuid = %sale),
        err
    )]
    async fn update_flash_sale(
        &self,
        instructor: InstructorUuid,
        sale: FlashSaleUuid,
        update: FlashSaleUpdate,
        now: Timestamp,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self.owned_flash_sale(&mut tx, instructor, sale).await?;

        let owned = self.courses.owned_course_uuids(&mut tx, instructor).await?;
        let course = self.courses.get_course(&mut tx, record.course_uuid).await?;

        let others = self
            .flash_sales
            .enabled_windows(&mut tx, record.course_uuid, Some(sale))
            .await?;

        let validated = marquee::flash_sales::validate_flash_sale(
            &update.as_draft(record.course_uuid),
            course.price,
            &owned,
            &others,
            now,
        )?;

        let updated = self
            .flash_sales
            .update_flash_sale(&mut tx, sale, &update, validated.window)
            .await?;

        tx.commit().await?;

        info!(flash_sale_uuid = %sale, "updated flash sale");

        Ok(updated)
    }

    #[tracing::instrument(
        name = "flash_sales.service.delete_flash_sale",
        skip(self),
        fields(instructor_uuid = %instructor, flash_sale_uuid = %sale),
        err
    )]
    async fn delete_flash_sale(
        &self,
        instructor: InstructorUuid,
        sale: FlashSaleUuid,
    ) -> Result<(), FlashSalesServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self.owned_flash_sale(&mut tx, instructor, sale).await?;

        if record.sold_count > 0 {
            return Err(FlashSalesServiceError::HasSales);
        }

        let rows_affected = self.flash_sales.delete_flash_sale(&mut tx, sale).await?;

        if rows_affected == 0 {
            return Err(FlashSalesServiceError::NotFound);
        }

        tx.commit().await?;

        info!(flash_sale_uuid = %sale, "deleted flash sale");

        Ok(())
    }

    async fn get_flash_sale(
        &self,
        instructor: InstructorUuid,
        sale: FlashSaleUuid,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self.owned_flash_sale(&mut tx, instructor, sale).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn list_flash_sales_for_course(
        &self,
        course: CourseUuid,
    ) -> Result<Vec<FlashSaleRecord>, FlashSalesServiceError> {
        let mut tx = self.db.begin().await?;

        let records = self
            .flash_sales
            .list_flash_sales_for_course(&mut tx, course)
            .await?;

        tx.commit().await?;

        Ok(records)
    }

    async fn current_sale_price(
        &self,
        course: CourseUuid,
        now: Timestamp,
    ) -> Result<u64, FlashSalesServiceError> {
        let mut tx = self.db.begin().await?;

        let sale = self.flash_sales.current_sale(&mut tx, course, now).await?;

        let price = match sale {
            Some(sale) => sale.discount_price,
            None => self.courses.get_course(&mut tx, course).await?.price,
        };

        tx.commit().await?;

        Ok(price)
    }
}

#[automock]
#[async_trait]
pub trait FlashSalesService: Send + Sync {
    async fn create_flash_sale(
        &self,
        instructor: InstructorUuid,
        sale: NewFlashSale,
        now: Timestamp,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError>;

    async fn update_flash_sale(
        &self,
        instructor: InstructorUuid,
        sale: FlashSaleUuid,
        update: FlashSaleUpdate,
        now: Timestamp,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError>;

    async fn delete_flash_sale(
        &self,
        instructor: InstructorUuid,
        sale: FlashSaleUuid,
    ) -> Result<(), FlashSalesServiceError>;

    async fn get_flash_sale(
        &self,
        instructor: InstructorUuid,
        sale: FlashSaleUuid,
    ) -> Result<FlashSaleRecord, FlashSalesServiceError>;

    async fn list_flash_sales_for_course(
        &self,
        course: CourseUuid,
    ) -> Result<Vec<FlashSaleRecord>, FlashSalesServiceError>;

    /// The price a learner pays for `course` at `now`: the live sale's
    /// discount price when one applies, the course's own price otherwise.
    async fn current_sale_price(
        &self,
        course: CourseUuid,
        now: Timestamp,
    ) -> Result<u64, FlashSalesServiceError>;
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use crate::{
        domain::redemptions::{
            records::{LearnerUuid, OrderUuid, PromotionRef},
            service::RedemptionLedger,
        },
        test::TestContext,
    };

    use super::*;

    fn sale_for(course: CourseUuid, starts_at: Timestamp, ends_at: Timestamp) -> NewFlashSale {
        NewFlashSale {
            uuid: FlashSaleUuid::new(),
            course,
            discount_price: 7_500,
            starts_at,
            ends_at,
            enabled: true,
            max_quantity: None,
            show_countdown: true,
            priority: 0,
        }
    }

    #[tokio::test]
    async fn create_flash_sale_snapshots_the_course_price() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let course = ctx.create_course(10_000).await;

        let record = ctx
            .flash_sales
            .create_flash_sale(
                ctx.instructor,
                sale_for(
                    course,
                    now - SignedDuration::from_hours(1),
                    now + SignedDuration::from_hours(24),
                ),
                now,
            )
            .await?;

        assert_eq!(record.original_price, 10_000);
        assert_eq!(record.discount_price, 7_500);
        assert_eq!(record.percent_off()?, Decimal::new(2_500, 2));
        assert_eq!(record.sold_count, 0);

        Ok(())
    }

    #[tokio::test]
    async fn create_flash_sale_on_unowned_course_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let foreign_course = ctx.create_course_for(InstructorUuid::new(), 10_000).await;

        let result = ctx
            .flash_sales
            .create_flash_sale(
                ctx.instructor,
                sale_for(foreign_course, now, now + SignedDuration::from_hours(24)),
                now,
            )
            .await;

        assert!(
            matches!(
                result,
                Err(FlashSalesServiceError::Rule(
                    FlashSaleRuleError::UnauthorizedCourse
                ))
            ),
            "expected UnauthorizedCourse, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn discount_at_or_above_course_price_is_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let course = ctx.create_course(10_000).await;

        let mut sale = sale_for(course, now, now + SignedDuration::from_hours(24));
        sale.discount_price = 10_000;

        let result = ctx
            .flash_sales
            .create_flash_sale(ctx.instructor, sale, now)
            .await;

        assert!(
            matches!(
                result,
                Err(FlashSalesServiceError::Rule(
                    FlashSaleRuleError::InvalidDiscountPrice
                ))
            ),
            "expected InvalidDiscountPrice, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn overlapping_enabled_sales_on_one_course_are_rejected() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let course = ctx.create_course(10_000).await;
        let other_course = ctx.create_course(10_000).await;

        let start = now - SignedDuration::from_hours(24);

        ctx.flash_sales
            .create_flash_sale(
                ctx.instructor,
                sale_for(course, start, start + SignedDuration::from_hours(216)),
                now,
            )
            .await?;

        // Second window starts inside the first.
        let overlapping = sale_for(
            course,
            start + SignedDuration::from_hours(96),
            start + SignedDuration::from_hours(336),
        );

        let result = ctx
            .flash_sales
            .create_flash_sale(ctx.instructor, overlapping.clone(), now)
            .await;

        assert!(
            matches!(
                result,
                Err(FlashSalesServiceError::Rule(
                    FlashSaleRuleError::OverlappingWindow
                ))
            ),
            "expected OverlappingWindow, got {result:?}"
        );

        // Disabled, the same window is accepted.
        let mut disabled = overlapping.clone();
        disabled.uuid = FlashSaleUuid::new();
        disabled.enabled = false;

        ctx.flash_sales
            .create_flash_sale(ctx.instructor, disabled, now)
            .await?;

        // On another course, the same window is accepted.
        let mut elsewhere = overlapping;
        elsewhere.uuid = FlashSaleUuid::new();
        elsewhere.course = other_course;

        ctx.flash_sales
            .create_flash_sale(ctx.instructor, elsewhere, now)
            .await?;

        Ok(())
    }

    #[tokio::test]
    async fn back_to_back_sales_are_accepted() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let course = ctx.create_course(10_000).await;
        let boundary = now + SignedDuration::from_hours(24);

        ctx.flash_sales
            .create_flash_sale(
                ctx.instructor,
                sale_for(course, now - SignedDuration::from_hours(1), boundary),
                now,
            )
            .await?;

        ctx.flash_sales
            .create_flash_sale(
                ctx.instructor,
                sale_for(course, boundary, boundary + SignedDuration::from_hours(24)),
                now,
            )
            .await?;

        Ok(())
    }

    #[tokio::test]
    async fn update_excludes_itself_from_the_overlap_check() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let course = ctx.create_course(10_000).await;

        let record = ctx
            .flash_sales
            .create_flash_sale(
                ctx.instructor,
                sale_for(
                    course,
                    now - SignedDuration::from_hours(1),
                    now + SignedDuration::from_hours(24),
                ),
                now,
            )
            .await?;

        // Stretch the sale's own window; it overlaps only itself.
        let update = FlashSaleUpdate {
            discount_price: 6_000,
            starts_at: now - SignedDuration::from_hours(2),
            ends_at: now + SignedDuration::from_hours(48),
            enabled: true,
            max_quantity: Some(10),
            show_countdown: false,
            priority: 1,
        };

        let updated = ctx
            .flash_sales
            .update_flash_sale(ctx.instructor, record.uuid, update, now)
            .await?;

        assert_eq!(updated.discount_price, 6_000);
        assert_eq!(updated.max_quantity, Some(10));
        // The snapshot survives edits.
        assert_eq!(updated.original_price, 10_000);

        Ok(())
    }

    #[tokio::test]
    async fn delete_is_blocked_once_units_are_sold() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let course = ctx.create_course(10_000).await;

        let record = ctx
            .flash_sales
            .create_flash_sale(
                ctx.instructor,
                sale_for(
                    course,
                    now - SignedDuration::from_hours(1),
                    now + SignedDuration::from_hours(24),
                ),
                now,
            )
            .await?;

        ctx.ledger
            .try_redeem(
                PromotionRef::FlashSale(record.uuid),
                LearnerUuid::new(),
                OrderUuid::new(),
                now,
            )
            .await?;

        let result = ctx
            .flash_sales
            .delete_flash_sale(ctx.instructor, record.uuid)
            .await;

        assert!(
            matches!(result, Err(FlashSalesServiceError::HasSales)),
            "expected HasSales, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn unsold_sale_can_be_deleted() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let course = ctx.create_course(10_000).await;

        let record = ctx
            .flash_sales
            .create_flash_sale(
                ctx.instructor,
                sale_for(
                    course,
                    now - SignedDuration::from_hours(1),
                    now + SignedDuration::from_hours(24),
                ),
                now,
            )
            .await?;

        ctx.flash_sales
            .delete_flash_sale(ctx.instructor, record.uuid)
            .await?;

        let result = ctx
            .flash_sales
            .get_flash_sale(ctx.instructor, record.uuid)
            .await;

        assert!(
            matches!(result, Err(FlashSalesServiceError::NotFound)),
            "expected NotFound, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn current_sale_price_follows_the_window() -> TestResult {
        let ctx = TestContext::new().await;
        let now = Timestamp::now();

        let course = ctx.create_course(10_000).await;

        ctx.flash_sales
            .create_flash_sale(
                ctx.instructor,
                sale_for(
                    course,
                    now + SignedDuration::from_hours(1),
                    now + SignedDuration::from_hours(24),
                ),
                now,
            )
            .await?;

        // Before the window opens the course price stands.
        assert_eq!(ctx.flash_sales.current_sale_price(course, now).await?, 10_000);

        // Inside the window the sale price applies.
        let inside = now + SignedDuration::from_hours(2);
        assert_eq!(
            ctx.flash_sales.current_sale_price(course, inside).await?,
            7_500
        );

        Ok(())
    }
}
