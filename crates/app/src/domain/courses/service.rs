//! Courses service.

use async_trait::async_trait;
use mockall::automock;

use crate::{
    database::Db,
    domain::courses::{
        data::NewCourse,
        errors::CoursesServiceError,
        records::{CourseRecord, CourseUuid},
        repository::PgCoursesRepository,
    },
};

#[derive(Debug, Clone)]
pub struct PgCoursesService {
    db: Db,
    repository: PgCoursesRepository,
}

impl PgCoursesService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            repository: PgCoursesRepository::new(),
        }
    }
}

#[async_trait]
impl CoursesService for PgCoursesService {
    async fn create_course(&self, course: NewCourse) -> Result<CourseRecord, CoursesServiceError> {
        let mut tx = self.db.begin().await?;

        let created = self.repository.create_course(&mut tx, course).await?;

        tx.commit().await?;

        Ok(created)
    }

    async fn get_course(&self, course: CourseUuid) -> Result<CourseRecord, CoursesServiceError> {
        let mut tx = self.db.begin().await?;

        let record = self.repository.get_course(&mut tx, course).await?;

        tx.commit().await?;

        Ok(record)
    }
}

#[automock]
#[async_trait]
pub trait CoursesService: Send + Sync {
    async fn create_course(&self, course: NewCourse) -> Result<CourseRecord, CoursesServiceError>;

    async fn get_course(&self, course: CourseUuid) -> Result<CourseRecord, CoursesServiceError>;
}
