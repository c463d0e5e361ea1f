//! Courses Repository

use rustc_hash::FxHashSet;
use sqlx::{Postgres, Transaction, query_as, query_scalar};
use uuid::Uuid;

use crate::domain::courses::{
    data::NewCourse,
    records::{CourseRecord, CourseUuid, InstructorUuid},
};

const CREATE_COURSE_SQL: &str = include_str!("sql/create_course.sql");
const GET_COURSE_SQL: &str = include_str!("sql/get_course.sql");
const LIST_OWNED_COURSE_UUIDS_SQL: &str = include_str!("sql/list_owned_course_uuids.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgCoursesRepository;

impl PgCoursesRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_course(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        course: NewCourse,
    ) -> Result<CourseRecord, sqlx::Error> {
        let price_i64 = i64::try_from(course.price).map_err(|e| sqlx::Error::ColumnDecode {
            index: "price".to_string(),
            source: Box::new(e),
        })?;

        query_as::<Postgres, CourseRecord>(CREATE_COURSE_SQL)
            .bind(course.uuid.into_uuid())
            .bind(course.instructor.into_uuid())
            .bind(&course.title)
            .bind(price_i64)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_course(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        course: CourseUuid,
    ) -> Result<CourseRecord, sqlx::Error> {
        query_as::<Postgres, CourseRecord>(GET_COURSE_SQL)
            .bind(course.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    /// The set of course uuids owned by `instructor`, for scope checks.
    pub(crate) async fn owned_course_uuids(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        instructor: InstructorUuid,
    ) -> Result<FxHashSet<CourseUuid>, sqlx::Error> {
        let uuids: Vec<Uuid> = query_scalar(LIST_OWNED_COURSE_UUIDS_SQL)
            .bind(instructor.into_uuid())
            .fetch_all(&mut **tx)
            .await?;

        Ok(uuids.into_iter().map(CourseUuid::from_uuid).collect())
    }
}
