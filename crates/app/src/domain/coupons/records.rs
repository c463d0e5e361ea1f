//! Coupons Records

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use marquee::{
    discounts::DiscountRule,
    status::{PromotionState, PromotionStatus, UsageBudget},
    window::ValidityWindow,
};
use serde::Serialize;
use sqlx::{FromRow, Row, postgres::PgRow};

use crate::{
    domain::courses::records::{CourseUuid, InstructorUuid},
    uuids::TypedUuid,
};

/// Coupon UUID
pub type CouponUuid = TypedUuid<CouponRecord>;

/// Coupon Record
#[derive(Debug, Clone, Serialize)]
pub struct CouponRecord {
    pub uuid: CouponUuid,
    pub instructor_uuid: InstructorUuid,

    /// Normalized uppercase code.
    pub code: String,

    pub discount: DiscountRule,

    /// Minimum purchase amount, in minor units, for the coupon to apply.
    pub min_purchase: Option<u64>,

    /// Courses the coupon applies to. Empty means every course.
    /// Attached by the repository from the scope table.
    pub scope: Vec<CourseUuid>,

    pub max_uses: Option<u32>,
    pub max_uses_per_user: Option<u32>,
    pub used_count: u64,

    pub window: ValidityWindow,
    pub enabled: bool,
    pub first_purchase_only: bool,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CouponRecord {
    /// The stored state the status resolver derives from.
    #[must_use]
    pub fn state(&self) -> PromotionState {
        PromotionState {
            enabled: self.enabled,
            window: self.window,
            usage: UsageBudget {
                used: self.used_count,
                cap: self.max_uses.map(u64::from),
            },
        }
    }

    /// Effective status at `now`.
    #[must_use]
    pub fn status(&self, now: Timestamp) -> PromotionStatus {
        marquee::status::resolve(&self.state(), now)
    }

    /// Whether the coupon covers `course`.
    #[must_use]
    pub fn applies_to(&self, course: CourseUuid) -> bool {
        self.scope.is_empty() || self.scope.contains(&course)
    }
}

fn u64_column(row: &PgRow, column: &'static str) -> sqlx::Result<u64> {
    let value: i64 = row.try_get(column)?;

    u64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn optional_u64_column(row: &PgRow, column: &'static str) -> sqlx::Result<Option<u64>> {
    let value: Option<i64> = row.try_get(column)?;

    value
        .map(|v| {
            u64::try_from(v).map_err(|e| sqlx::Error::ColumnDecode {
                index: column.to_string(),
                source: Box::new(e),
            })
        })
        .transpose()
}

fn optional_u32_column(row: &PgRow, column: &'static str) -> sqlx::Result<Option<u32>> {
    let value: Option<i64> = row.try_get(column)?;

    value
        .map(|v| {
            u32::try_from(v).map_err(|e| sqlx::Error::ColumnDecode {
                index: column.to_string(),
                source: Box::new(e),
            })
        })
        .transpose()
}

fn discount_from_row(row: &PgRow) -> sqlx::Result<DiscountRule> {
    let kind: String = row.try_get("discount_kind")?;

    match kind.as_str() {
        "percentage_off" => {
            let percent: i16 = row.try_get("discount_percent")?;

            let percent = u16::try_from(percent).map_err(|e| sqlx::Error::ColumnDecode {
                index: "discount_percent".to_string(),
                source: Box::new(e),
            })?;

            Ok(DiscountRule::PercentageOff {
                percent,
                cap: optional_u64_column(row, "max_discount")?,
            })
        }
        "amount_off" => Ok(DiscountRule::AmountOff {
            amount: u64_column(row, "discount_amount")?,
        }),
        other => Err(sqlx::Error::ColumnDecode {
            index: "discount_kind".to_string(),
            source: format!("unknown discount kind {other:?}").into(),
        }),
    }
}

impl<'r> FromRow<'r, PgRow> for CouponRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let starts_at = row.try_get::<SqlxTimestamp, _>("starts_at")?.to_jiff();
        let ends_at = row.try_get::<SqlxTimestamp, _>("ends_at")?.to_jiff();

        let window =
            ValidityWindow::new(starts_at, ends_at).map_err(|e| sqlx::Error::ColumnDecode {
                index: "ends_at".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            uuid: CouponUuid::from_uuid(row.try_get("uuid")?),
            instructor_uuid: InstructorUuid::from_uuid(row.try_get("instructor_uuid")?),
            code: row.try_get("code")?,
            discount: discount_from_row(row)?,
            min_purchase: optional_u64_column(row, "min_purchase")?,
            scope: Vec::new(),
            max_uses: optional_u32_column(row, "max_uses")?,
            max_uses_per_user: optional_u32_column(row, "max_uses_per_user")?,
            used_count: u64_column(row, "used_count")?,
            window,
            enabled: row.try_get("enabled")?,
            first_purchase_only: row.try_get("first_purchase_only")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
