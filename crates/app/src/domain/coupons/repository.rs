//! Coupons Repository

use jiff_sqlx::Timestamp as SqlxTimestamp;
use marquee::{coupons::CouponCode, discounts::DiscountRule, window::ValidityWindow};
use rustc_hash::{FxHashMap, FxHashSet};
use sqlx::{Postgres, Transaction, query, query_as, query_scalar};
use uuid::Uuid;

use crate::domain::{
    coupons::{
        data::{CouponUpdate, NewCoupon},
        records::{CouponRecord, CouponUuid},
    },
    courses::records::{CourseUuid, InstructorUuid},
};

const COLUMN_DISCOUNT_AMOUNT: &str = "discount_amount";
const COLUMN_MAX_DISCOUNT: &str = "max_discount";
const COLUMN_MIN_PURCHASE: &str = "min_purchase";

const CREATE_COUPON_SQL: &str = include_str!("sql/create_coupon.sql");
const CREATE_COUPON_COURSE_SQL: &str = include_str!("sql/create_coupon_course.sql");
const DELETE_COUPON_COURSES_SQL: &str = include_str!("sql/delete_coupon_courses.sql");
const DELETE_COUPON_SQL: &str = include_str!("sql/delete_coupon.sql");
const GET_COUPON_BY_CODE_SQL: &str = include_str!("sql/get_coupon_by_code.sql");
const GET_COUPON_SQL: &str = include_str!("sql/get_coupon.sql");
const LIST_COUPON_COURSES_FOR_INSTRUCTOR_SQL: &str =
    include_str!("sql/list_coupon_courses_for_instructor.sql");
const LIST_COUPON_COURSES_SQL: &str = include_str!("sql/list_coupon_courses.sql");
const LIST_COUPONS_SQL: &str = include_str!("sql/list_coupons.sql");
const LIST_EXISTING_CODES_SQL: &str = include_str!("sql/list_existing_codes.sql");
const SET_COUPON_ENABLED_SQL: &str = include_str!("sql/set_coupon_enabled.sql");
const UPDATE_COUPON_SQL: &str = include_str!("sql/update_coupon.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCouponsRepository;

impl PgCouponsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Normalized codes already persisted, optionally excluding one coupon
    /// (the one being updated).
    pub(crate) async fn existing_codes(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        exclude: Option<CouponUuid>,
    ) -> Result<FxHashSet<String>, sqlx::Error> {
        let codes: Vec<String> = query_scalar(LIST_EXISTING_CODES_SQL)
            .bind(exclude.map(CouponUuid::into_uuid))
            .fetch_all(&mut **tx)
            .await?;

        Ok(codes.into_iter().collect())
    }

    pub(crate) async fn create_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        instructor: InstructorUuid,
        coupon: &NewCoupon,
        code: &CouponCode,
        window: ValidityWindow,
    ) -> Result<CouponRecord, sqlx::Error> {
        let (discount_kind, discount_percent, discount_amount, max_discount) =
            to_discount_sql_values(&coupon.discount)?;

        let mut record: CouponRecord = query_as(CREATE_COUPON_SQL)
            .bind(coupon.uuid.into_uuid())
            .bind(instructor.into_uuid())
            .bind(code.as_str())
            .bind(discount_kind)
            .bind(discount_percent)
            .bind(discount_amount)
            .bind(max_discount)
            .bind(try_optional_i64_from_u64(
                coupon.min_purchase,
                COLUMN_MIN_PURCHASE,
            )?)
            .bind(coupon.max_uses.map(i64::from))
            .bind(coupon.max_uses_per_user.map(i64::from))
            .bind(SqlxTimestamp::from(window.starts_at()))
            .bind(SqlxTimestamp::from(window.ends_at()))
            .bind(coupon.enabled)
            .bind(coupon.first_purchase_only)
            .fetch_one(&mut **tx)
            .await?;

        record.scope = self
            .replace_scope(tx, coupon.uuid, &coupon.scope, false)
            .await?;

        Ok(record)
    }

    pub(crate) async fn get_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
    ) -> Result<CouponRecord, sqlx::Error> {
        let mut record: CouponRecord = query_as(GET_COUPON_SQL)
            .bind(coupon.into_uuid())
            .fetch_one(&mut **tx)
            .await?;

        record.scope = self.coupon_scope(tx, coupon).await?;

        Ok(record)
    }

    pub(crate) async fn get_coupon_by_code(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        code: &str,
    ) -> Result<CouponRecord, sqlx::Error> {
        let mut record: CouponRecord = query_as(GET_COUPON_BY_CODE_SQL)
            .bind(code)
            .fetch_one(&mut **tx)
            .await?;

        record.scope = self.coupon_scope(tx, record.uuid).await?;

        Ok(record)
    }

    pub(crate) async fn list_coupons(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        instructor: InstructorUuid,
    ) -> Result<Vec<CouponRecord>, sqlx::Error> {
        let mut records: Vec<CouponRecord> = query_as(LIST_COUPONS_SQL)
            .bind(instructor.into_uuid())
            .fetch_all(&mut **tx)
            .await?;

        let rows: Vec<(Uuid, Uuid)> = query_as(LIST_COUPON_COURSES_FOR_INSTRUCTOR_SQL)
            .bind(instructor.into_uuid())
            .fetch_all(&mut **tx)
            .await?;

        let mut scopes: FxHashMap<CouponUuid, Vec<CourseUuid>> = FxHashMap::default();

        for (coupon_uuid, course_uuid) in rows {
            scopes
                .entry(CouponUuid::from_uuid(coupon_uuid))
                .or_default()
                .push(CourseUuid::from_uuid(course_uuid));
        }

        for record in &mut records {
            if let Some(scope) = scopes.remove(&record.uuid) {
                record.scope = scope;
            }
        }

        Ok(records)
    }

    pub(crate) async fn update_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
        update: &CouponUpdate,
        window: ValidityWindow,
    ) -> Result<CouponRecord, sqlx::Error> {
        let (discount_kind, discount_percent, discount_amount, max_discount) =
            to_discount_sql_values(&update.discount)?;

        let mut record: CouponRecord = query_as(UPDATE_COUPON_SQL)
            .bind(coupon.into_uuid())
            .bind(discount_kind)
            .bind(discount_percent)
            .bind(discount_amount)
            .bind(max_discount)
            .bind(try_optional_i64_from_u64(
                update.min_purchase,
                COLUMN_MIN_PURCHASE,
            )?)
            .bind(update.max_uses.map(i64::from))
            .bind(update.max_uses_per_user.map(i64::from))
            .bind(SqlxTimestamp::from(window.starts_at()))
            .bind(SqlxTimestamp::from(window.ends_at()))
            .bind(update.enabled)
            .bind(update.first_purchase_only)
            .fetch_one(&mut **tx)
            .await?;

        record.scope = self.replace_scope(tx, coupon, &update.scope, true).await?;

        Ok(record)
    }

    pub(crate) async fn set_enabled(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
        enabled: bool,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(SET_COUPON_ENABLED_SQL)
            .bind(coupon.into_uuid())
            .bind(enabled)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    pub(crate) async fn delete_coupon(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_COUPON_SQL)
            .bind(coupon.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    async fn coupon_scope(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
    ) -> Result<Vec<CourseUuid>, sqlx::Error> {
        let uuids: Vec<Uuid> = query_scalar(LIST_COUPON_COURSES_SQL)
            .bind(coupon.into_uuid())
            .fetch_all(&mut **tx)
            .await?;

        Ok(uuids.into_iter().map(CourseUuid::from_uuid).collect())
    }

    async fn replace_scope(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        coupon: CouponUuid,
        scope: &[CourseUuid],
        clear_first: bool,
    ) -> Result<Vec<CourseUuid>, sqlx::Error> {
        if clear_first {
            query(DELETE_COUPON_COURSES_SQL)
                .bind(coupon.into_uuid())
                .execute(&mut **tx)
                .await?;
        }

        for course in scope {
            query(CREATE_COUPON_COURSE_SQL)
                .bind(coupon.into_uuid())
                .bind(course.into_uuid())
                .execute(&mut **tx)
                .await?;
        }

        Ok(scope.to_vec())
    }
}

fn to_discount_sql_values(
    discount: &DiscountRule,
) -> Result<(&'static str, Option<i16>, Option<i64>, Option<i64>), sqlx::Error> {
    let discount_kind = discount.kind_as_str();

    match *discount {
        DiscountRule::PercentageOff { percent, cap } => {
            let percent = i16::try_from(percent).map_err(|e| sqlx::Error::ColumnDecode {
                index: "discount_percent".to_string(),
                source: Box::new(e),
            })?;

            Ok((
                discount_kind,
                Some(percent),
                None,
                try_optional_i64_from_u64(cap, COLUMN_MAX_DISCOUNT)?,
            ))
        }
        DiscountRule::AmountOff { amount } => Ok((
            discount_kind,
            None,
            Some(try_i64_from_u64(amount, COLUMN_DISCOUNT_AMOUNT)?),
            None,
        )),
    }
}

fn try_optional_i64_from_u64(
    value: Option<u64>,
    column: &'static str,
) -> Result<Option<i64>, sqlx::Error> {
    value.map(|v| try_i64_from_u64(v, column)).transpose()
}

fn try_i64_from_u64(value: u64, column: &'static str) -> Result<i64, sqlx::Error> {
    i64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
