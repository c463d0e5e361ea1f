//! App Context

use std::sync::Arc;

use thiserror::Error;

use crate::{
    database::{self, Db},
    domain::{
        coupons::{CouponsService, PgCouponsService},
        courses::{CoursesService, PgCoursesService},
        flash_sales::{FlashSalesService, PgFlashSalesService},
        redemptions::{PgRedemptionLedger, RedemptionLedger},
    },
};

#[derive(Debug, Error)]
pub enum AppInitError {
    #[error("failed to connect to database")]
    Database(#[source] sqlx::Error),
}

#[derive(Clone)]
pub struct AppContext {
    pub courses: Arc<dyn CoursesService>,
    pub coupons: Arc<dyn CouponsService>,
    pub flash_sales: Arc<dyn FlashSalesService>,
    pub ledger: Arc<dyn RedemptionLedger>,
}

impl AppContext {
    /// Build application context from a database URL.
    ///
    /// # Errors
    ///
    /// Returns an error when establishing a database connection fails.
    pub async fn from_database_url(url: &str) -> Result<Self, AppInitError> {
        let pool = database::connect(url)
            .await
            .map_err(AppInitError::Database)?;

        let db = Db::new(pool);

        Ok(Self {
            courses: Arc::new(PgCoursesService::new(db.clone())),
            coupons: Arc::new(PgCouponsService::new(db.clone())),
            flash_sales: Arc::new(PgFlashSalesService::new(db.clone())),
            ledger: Arc::new(PgRedemptionLedger::new(db)),
        })
    }
}
