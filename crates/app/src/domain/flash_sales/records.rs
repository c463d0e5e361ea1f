//! Flash Sales Records

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use marquee::{
    discounts::{self, DiscountError},
    status::{PromotionState, PromotionStatus, UsageBudget},
    window::ValidityWindow,
};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, Row, postgres::PgRow};

use crate::{
    domain::courses::records::{CourseUuid, InstructorUuid},
    uuids::TypedUuid,
};

/// Flash Sale UUID
pub type FlashSaleUuid = TypedUuid<FlashSaleRecord>;

/// Flash Sale Record
#[derive(Debug, Clone, Serialize)]
pub struct FlashSaleRecord {
    pub uuid: FlashSaleUuid,
    pub course_uuid: CourseUuid,
    pub instructor_uuid: InstructorUuid,

    /// Course price snapshotted at creation, in minor units.
    pub original_price: u64,

    /// Sale price in minor units. Always below the original.
    pub discount_price: u64,

    pub window: ValidityWindow,
    pub enabled: bool,

    pub max_quantity: Option<u32>,
    pub sold_count: u64,

    pub show_countdown: bool,
    pub priority: i16,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FlashSaleRecord {
    /// Percent saved against the snapshotted price, two decimal places.
    /// Derived on read; never stored.
    ///
    /// # Errors
    ///
    /// Returns a [`DiscountError`] if the stored prices cannot be expressed
    /// as a percentage.
    pub fn percent_off(&self) -> Result<Decimal, DiscountError> {
        discounts::percent_off(self.original_price, self.discount_price)
    }

    /// The stored state the status resolver derives from.
    #[must_use]
    pub fn state(&self) -> PromotionState {
        PromotionState {
            enabled: self.enabled,
            window: self.window,
            usage: UsageBudget {
                used: self.sold_count,
                cap: self.max_quantity.map(u64::from),
            },
        }
    }

    /// Effective status at `now`.
    #[must_use]
    pub fn status(&self, now: Timestamp) -> PromotionStatus {
        marquee::status::resolve(&self.state(), now)
    }
}

fn u64_column(row: &PgRow, column: &'static str) -> sqlx::Result<u64> {
    let value: i64 = row.try_get(column)?;

    u64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

impl<'r> FromRow<'r, PgRow> for FlashSaleRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let starts_at = row.try_get::<SqlxTimestamp, _>("starts_at")?.to_jiff();
        let ends_at = row.try_get::<SqlxTimestamp, _>("ends_at")?.to_jiff();

        let window =
            ValidityWindow::new(starts_at, ends_at).map_err(|e| sqlx::Error::ColumnDecode {
                index: "ends_at".to_string(),
                source: Box::new(e),
            })?;

        let max_quantity: Option<i64> = row.try_get("max_quantity")?;

        let max_quantity = max_quantity
            .map(|v| {
                u32::try_from(v).map_err(|e| sqlx::Error::ColumnDecode {
                    index: "max_quantity".to_string(),
                    source: Box::new(e),
                })
            })
            .transpose()?;

        Ok(Self {
            uuid: FlashSaleUuid::from_uuid(row.try_get("uuid")?),
            course_uuid: CourseUuid::from_uuid(row.try_get("course_uuid")?),
            instructor_uuid: InstructorUuid::from_uuid(row.try_get("instructor_uuid")?),
            original_price: u64_column(row, "original_price")?,
            discount_price: u64_column(row, "discount_price")?,
            window,
            enabled: row.try_get("enabled")?,
            max_quantity,
            sold_count: u64_column(row, "sold_count")?,
            show_countdown: row.try_get("show_countdown")?,
            priority: row.try_get("priority")?,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
