use std::sync::Arc;

use db::DBService;
use services::services::{
    attendance::AttendanceService,
    auth::{AuthService, JwtService},
    config::AppConfig,
    obras::ObraService,
    purchase_orders::PurchaseOrderService,
    quotations::QuotationService,
    requirements::RequirementService,
    roles::RoleService,
    trainings::TrainingService,
    users::UserService,
};
use sqlx::SqlitePool;
use utils::{
    pagination::{ListQuery, Page},
    validation::ValidationErrors,
};

/// Shared by every handler. Services are cheap to build from the pool, so
/// they are constructed per request.
#[derive(Clone)]
pub struct AppState {
    db: DBService,
    config: Arc<AppConfig>,
    auth: AuthService,
}

impl AppState {
    pub fn new(db: DBService, config: AppConfig) -> Self {
        let jwt = JwtService::new(&config.jwt_secret, config.jwt_ttl_minutes);
        let auth = AuthService::new(db.pool.clone(), jwt);
        Self {
            db,
            config: Arc::new(config),
            auth,
        }
    }

    pub fn db(&self) -> &DBService {
        &self.db
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Validated list window, capped at the configured page size
    pub fn page(&self, query: &ListQuery) -> Result<Page, ValidationErrors> {
        query.page(self.config.max_page_size)
    }

    pub fn obras(&self) -> ObraService {
        ObraService::new(self.pool().clone())
    }

    pub fn requirements(&self) -> RequirementService {
        RequirementService::new(self.pool().clone())
    }

    pub fn purchase_orders(&self) -> PurchaseOrderService {
        PurchaseOrderService::new(self.pool().clone(), self.config.igv_rate)
    }

    pub fn attendance(&self) -> AttendanceService {
        AttendanceService::new(self.pool().clone())
    }

    pub fn trainings(&self) -> TrainingService {
        TrainingService::new(self.pool().clone())
    }

    pub fn quotations(&self) -> QuotationService {
        QuotationService::new(self.pool().clone(), self.config.igv_rate)
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.pool().clone())
    }

    pub fn roles(&self) -> RoleService {
        RoleService::new(self.pool().clone())
    }
}
