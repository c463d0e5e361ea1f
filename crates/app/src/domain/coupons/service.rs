//! Coupons Service

use async_trait::async_trait;
use jiff::Timestamp;
use marquee::{coupons::normalize_code, discounts::DiscountOutcome};
use mockall::automock;
use tracing::info;

use crate::{
    database::Db,
    domain::{
        coupons::{
            data::{CouponUpdate, NewCoupon},
            errors::CouponsServiceError,
            records::{CouponRecord, CouponUuid},
            repository::PgCouponsRepository,
        },
        courses::{
            records::{CourseUuid, InstructorUuid},
            repository::PgCoursesRepository,
        },
    },
};

#[derive(Debug, Clone)]
pub struct PgCouponsService {
    db: Db,
    coupons: PgCouponsRepository,
    courses: PgCoursesRepository,
}

impl PgCouponsService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            coupons: PgCouponsRepository::new(),
            courses: PgCoursesRepository::new(),
        }
    }

    async fn owned_coupon(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        instructor: InstructorUuid,
        coupon: CouponUuid,
    ) -> Result<CouponRecord, CouponsServiceError> {
        let record = self.coupons.get_coupon(tx, coupon).await?;

        if record.instructor_uuid != instructor {
            return Err(CouponsServiceError::NotOwner);
        }

        Ok(record)
    }
}

#[async_trait]
impl CouponsService for PgCouponsService {
    #[tracing::instrument(
        name = "coupons.service.create_coupon",
        skip(self, coupon),
        fields(instructor_uuid = %instructor, coupon_uuid = %coupon.uuid),
        err
    )]
    async fn create_coupon(
        &self,
        instructor: InstructorUuid,
        coupon: NewCoupon,
    ) -> Result<CouponRecord, CouponsServiceError> {
        let mut tx = self.db.begin().await?;

        let existing = self.coupons.existing_codes(&mut tx, None).await?;
        let owned = self.courses.owned_course_uuids(&mut tx, instructor).await?;

        let validated = marquee::coupons::validate_coupon(&coupon.as_draft(), &existing, &owned)?;

        let record = self
            .coupons
            .create_coupon(&mut tx, instructor, &coupon, &validated.code, validated.window)
            .await?;

        tx.commit().await?;

        info!(coupon_uuid = %record.uuid, code = %record.code, "created coupon");

        Ok(record)
    }

    #[tracing::instrument(
        name = "coupons.service.update_coupon",
        skip(self, update),
        fields(instructor_uuid = %instructor, coupon_uuid = %coupon),
        err
    )]
    async fn update_coupon(
        &self,
        instructor: InstructorUuid,
        coupon: CouponUuid,
        update: CouponUpdate,
    ) -> Result<CouponRecord, CouponsServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self.owned_coupon(&mut tx, instructor, coupon).await?;

        // A coupon with settled redemptions is frozen; only the enabled
        // toggle remains available.
        if record.used_count > 0 {
            return Err(CouponsServiceError::HasRedemptions);
        }

        let existing = self.coupons.existing_codes(&mut tx, Some(coupon)).await?;
        let owned = self.courses.owned_course_uuids(&mut tx, instructor).await?;

        let validated =
            marquee::coupons::validate_coupon(&update.as_draft(&record.code), &existing, &owned)?;

        let updated = self
            .coupons
            .update_coupon(&mut tx, coupon, &update, validated.window)
            .await?;

        tx.commit().await?;

        info!(coupon_uuid = %coupon, "updated coupon");

        Ok(updated)
    }

    #[tracing::instrument(
        name = "coupons.service.set_coupon_enabled",
        skip(self),
        fields(instructor_uuid = %instructor, coupon_uuid = %coupon),
        err
    )]
    async fn set_coupon_enabled(
        &self,
        instructor: InstructorUuid,
        coupon: CouponUuid,
        enabled: bool,
    ) -> Result<(), CouponsServiceError> {
        let mut tx = self.db.begin().await?;

        self.owned_coupon(&mut tx, instructor, coupon).await?;

        let rows_affected = self.coupons.set_enabled(&mut tx, coupon, enabled).await?;

        if rows_affected == 0 {
            return Err(CouponsServiceError::NotFound);
        }

        tx.commit().await?;

        info!(coupon_uuid = %coupon, enabled, "toggled coupon");

        Ok(())
    }

    #[tracing::instrument(
        name = "coupons.service.delete_coupon",
        skip(self),
        fields(instructor_uuid = %instructor, coupon_uuid = %coupon),
        err
    )]
    async fn delete_coupon(
        &self,
        instructor: InstructorUuid,
        coupon: CouponUuid,
        now: Timestamp,
    ) -> Result<(), CouponsServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self.owned_coupon(&mut tx, instructor, coupon).await?;

        if record.used_count > 0 {
            return Err(CouponsServiceError::HasRedemptions);
        }

        if record.status(now).is_active() {
            return Err(CouponsServiceError::CurrentlyActive);
        }

        let rows_affected = self.coupons.delete_coupon(&mut tx, coupon).await?;

        if rows_affected == 0 {
            return Err(CouponsServiceError::NotFound);
        }

        tx.commit().await?;

        info!(coupon_uuid = %coupon, "deleted coupon");

        Ok(())
    }

    async fn get_coupon(
        &self,
        instructor: InstructorUuid,
        coupon: CouponUuid,
    ) -> Result<CouponRecord, CouponsServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self.owned_coupon(&mut tx, instructor, coupon).await?;

        tx.commit().await?;

        Ok(record)
    }

    async fn list_coupons(
        &self,
        instructor: InstructorUuid,
    ) -> Result<Vec<CouponRecord>, CouponsServiceError> {
        let mut tx = self.db.begin().await?;

        let records = self.coupons.list_coupons(&mut tx, instructor).await?;

        tx.commit().await?;

        Ok(records)
    }

    async fn preview_discount(
        &self,
        code: &str,
        course: CourseUuid,
        purchase_amount: u64,
        now: Timestamp,
    ) -> Result<DiscountOutcome, CouponsServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self
            .coupons
            .get_coupon_by_code(&mut tx, &normalize_code(code))
            .await?;

        if !record.status(now).is_active() {
            return Err(CouponsServiceError::NotActive);
        }

        if !record.applies_to(course) {
            return Err(CouponsServiceError::NotApplicable);
        }

        let course_record = self.courses.get_course(&mut tx, course).await?;

        tx.commit().await?;

        Ok(marquee::discounts::compute_discount(
            &record.discount,
            record.min_purchase,
            course_record.price,
            purchase_amount,
        )?)
    }
}

#[automock]
#[async_trait]
pub trait CouponsService: Send + Sync {
    async fn create_coupon(
        &self,
        instructor: InstructorUuid,
        coupon: NewCoupon,
    ) -> Result<CouponRecord, CouponsServiceError>;

    async fn update_coupon(
        &self,
        instructor: InstructorUuid,
        coupon: CouponUuid,
        update: CouponUpdate,
    ) -> Result<CouponRecord, CouponsServiceError>;

    async fn set_coupon_enabled(
        &self,
        instructor: InstructorUuid,
        coupon: CouponUuid,
        enabled: bool,
    ) -> Result<(), CouponsServiceError>;

    async fn delete_coupon(
        &self,
        instructor: InstructorUuid,
        coupon: CouponUuid,
        now: Timestamp,
    ) -> Result<(), CouponsServiceError>;

    async fn get_coupon(
        &self,
        instructor: InstructorUuid,
        coupon: CouponUuid,
    ) -> Result<CouponRecord, CouponsServiceError>;

    async fn list_coupons(
        &self,
        instructor: InstructorUuid,
    ) -> Result<Vec<CouponRecord>, CouponsServiceError>;

    async fn preview_discount(
        &self,
        code: &str,
        course: CourseUuid,
        purchase_amount: u64,
        now: Timestamp,
    ) -> Result<DiscountOutcome, CouponsServiceError>;
}
