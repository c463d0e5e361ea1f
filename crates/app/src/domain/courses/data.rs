//! Courses Data

use crate::domain::courses::records::{CourseUuid, InstructorUuid};

/// A course as submitted for creation.
#[derive(Debug, Clone)]
pub struct NewCourse {
    pub uuid: CourseUuid,
    pub instructor: InstructorUuid,
    pub title: String,

    /// Price in minor units.
    pub price: u64,
}
