//! Test context for service-level integration tests.

use crate::{
    database::Db,
    domain::{
        coupons::PgCouponsService,
        courses::{
            CoursesService, PgCoursesService,
            data::NewCourse,
            records::{CourseUuid, InstructorUuid},
        },
        flash_sales::PgFlashSalesService,
        redemptions::PgRedemptionLedger,
    },
};

use super::db::TestDb;

/// Services wired to a fresh per-test database, plus a default instructor
/// identity for fixtures.
pub struct TestContext {
    pub db: TestDb,
    pub instructor: InstructorUuid,
    pub courses: PgCoursesService,
    pub coupons: PgCouponsService,
    pub flash_sales: PgFlashSalesService,
    pub ledger: PgRedemptionLedger,
}

impl TestContext {
    pub async fn new() -> Self {
        let test_db = TestDb::new().await;
        let db = Db::new(test_db.pool().clone());

        Self {
            courses: PgCoursesService::new(db.clone()),
            coupons: PgCouponsService::new(db.clone()),
            flash_sales: PgFlashSalesService::new(db.clone()),
            ledger: PgRedemptionLedger::new(db),
            instructor: InstructorUuid::new(),
            db: test_db,
        }
    }

    /// Create a course owned by the default instructor.
    pub async fn create_course(&self, price: u64) -> CourseUuid {
        self.create_course_for(self.instructor, price).await
    }

    /// Create a course owned by `instructor`.
    pub async fn create_course_for(&self, instructor: InstructorUuid, price: u64) -> CourseUuid {
        let uuid = CourseUuid::new();

        self.courses
            .create_course(NewCourse {
                uuid,
                instructor,
                title: "Test Course".to_string(),
                price,
            })
            .await
            .expect("Failed to create test course");

        uuid
    }
}
