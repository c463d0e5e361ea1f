//! Flash Sales Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use marquee::window::ValidityWindow;
use sqlx::{Postgres, Transaction, query, query_as};

use crate::domain::{
    courses::records::{CourseUuid, InstructorUuid},
    flash_sales::{
        data::{FlashSaleUpdate, NewFlashSale},
        records::{FlashSaleRecord, FlashSaleUuid},
    },
};

const CREATE_FLASH_SALE_SQL: &str = include_str!("sql/create_flash_sale.sql");
const CURRENT_SALE_SQL: &str = include_str!("sql/current_sale.sql");
const DELETE_FLASH_SALE_SQL: &str = include_str!("sql/delete_flash_sale.sql");
const GET_FLASH_SALE_SQL: &str = include_str!("sql/get_flash_sale.sql");
const LIST_ENABLED_WINDOWS_SQL: &str = include_str!("sql/list_enabled_windows.sql");
const LIST_FLASH_SALES_FOR_COURSE_SQL: &str = include_str!("sql/list_flash_sales_for_course.sql");
const UPDATE_FLASH_SALE_SQL: &str = include_str!("sql/update_flash_sale.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgFlashSalesRepository;

impl PgFlashSalesRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_flash_sale(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        instructor: InstructorUuid,
        sale: &NewFlashSale,
        original_price: u64,
        window: ValidityWindow,
    ) -> Result<FlashSaleRecord, sqlx::Error> {
        query_as(CREATE_FLASH_SALE_SQL)
            .bind(sale.uuid.into_uuid())
            .bind(sale.course.into_uuid())
            .bind(instructor.into_uuid())
            .bind(try_i64_from_u64(original_price, "original_price")?)
            .bind(try_i64_from_u64(sale.discount_price, "discount_price")?)
            .bind(SqlxTimestamp::from(window.starts_at()))
            .bind(SqlxTimestamp::from(window.ends_at()))
            .bind(sale.enabled)
            .bind(sale.max_quantity.map(i64::from))
            .bind(sale.show_countdown)
            .bind(sale.priority)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_flash_sale(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sale: FlashSaleUuid,
    ) -> Result<FlashSaleRecord, sqlx::Error> {
        query_as(GET_FLASH_SALE_SQL)
            .bind(sale.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn list_flash_sales_for_course(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        course: CourseUuid,
    ) -> Result<Vec<FlashSaleRecord>, sqlx::Error> {
        query_as(LIST_FLASH_SALES_FOR_COURSE_SQL)
            .bind(course.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }

    /// Windows of the course's enabled sales, optionally excluding one sale
    /// (the one being edited).
    pub(crate) async fn enabled_windows(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        course: CourseUuid,
        exclude: Option<FlashSaleUuid>,
    ) -> Result<Vec<ValidityWindow>, sqlx::Error> {
        let rows: Vec<(SqlxTimestamp, SqlxTimestamp)> = query_as(LIST_ENABLED_WINDOWS_SQL)
            .bind(course.into_uuid())
            .bind(exclude.map(FlashSaleUuid::into_uuid))
            .fetch_all(&mut **tx)
            .await?;

        rows.into_iter()
            .map(|(starts_at, ends_at)| {
                ValidityWindow::new(starts_at.to_jiff(), ends_at.to_jiff()).map_err(|e| {
                    sqlx::Error::ColumnDecode {
                        index: "ends_at".to_string(),
                        source: Box::new(e),
                    }
                })
            })
            .collect()
    }

    /// The sale currently offering a price on `course`, if any. Ties on
    /// overlapping windows cannot happen among enabled sales; priority only
    /// orders the display of a live sale against scheduled ones.
    pub(crate) async fn current_sale(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        course: CourseUuid,
        now: Timestamp,
    ) -> Result<Option<FlashSaleRecord>, sqlx::Error> {
        query_as(CURRENT_SALE_SQL)
            .bind(course.into_uuid())
            .bind(SqlxTimestamp::from(now))
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn update_flash_sale(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sale: FlashSaleUuid,
        update: &FlashSaleUpdate,
        window: ValidityWindow,
    ) -> Result<FlashSaleRecord, sqlx::Error> {
        query_as(UPDATE_FLASH_SALE_SQL)
            .bind(sale.into_uuid())
            .bind(try_i64_from_u64(update.discount_price, "discount_price")?)
            .bind(SqlxTimestamp::from(window.starts_at()))
            .bind(SqlxTimestamp::from(window.ends_at()))
            .bind(update.enabled)
            .bind(update.max_quantity.map(i64::from))
            .bind(update.show_countdown)
            .bind(update.priority)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn delete_flash_sale(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sale: FlashSaleUuid,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_FLASH_SALE_SQL)
            .bind(sale.into_uuid())
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

fn try_i64_from_u64(value: u64, column: &'static str) -> Result<i64, sqlx::Error> {
    i64::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}
