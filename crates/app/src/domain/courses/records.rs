//! Courses Records

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use serde::Serialize;
use sqlx::{FromRow, Row, postgres::PgRow};

use crate::uuids::TypedUuid;

/// Course UUID
pub type CourseUuid = TypedUuid<CourseRecord>;

/// Instructor UUID
///
/// Instructors live in the wider platform; here they are only an identity.
pub type InstructorUuid = TypedUuid<Instructor>;

/// Marker for instructor identities.
#[derive(Debug, Clone)]
pub struct Instructor {}

/// Course Record
#[derive(Debug, Clone, Serialize)]
pub struct CourseRecord {
    pub uuid: CourseUuid,
    pub instructor_uuid: InstructorUuid,
    pub title: String,
    pub price: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl<'r> FromRow<'r, PgRow> for CourseRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let price_i64: i64 = row.try_get("price")?;

        let price = u64::try_from(price_i64).map_err(|e| sqlx::Error::ColumnDecode {
            index: "price".to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            uuid: CourseUuid::from_uuid(row.try_get("uuid")?),
            instructor_uuid: InstructorUuid::from_uuid(row.try_get("instructor_uuid")?),
            title: row.try_get("title")?,
            price,
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}
