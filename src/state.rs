//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum.

use std::sync::Arc;

use crate::config::environment::EnvironmentConfig;
use crate::database::DatabaseConnection;
use crate::repositories::{InMemoryTransportRepository, TransportRepository};
use crate::services::{
    BusService, DriverService, ImportService, ReportService, RouteService, StudentService,
};
use crate::utils::resilience::RetryPolicy;

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub students: StudentService,
    pub routes: RouteService,
    pub buses: BusService,
    pub drivers: DriverService,
    pub reports: ReportService,
    pub imports: ImportService,
    /// `None` cuando se usa el repositorio en memoria
    pub database: Option<DatabaseConnection>,
}

impl AppState {
    pub fn new(
        repository: Arc<dyn TransportRepository>,
        config: EnvironmentConfig,
        database: Option<DatabaseConnection>,
    ) -> Self {
        let retry_policy = RetryPolicy::with_max_retries(config.db_max_retries);
        let routes = RouteService::new(repository.clone(), retry_policy.clone());

        Self {
            students: StudentService::new(repository.clone(), retry_policy.clone()),
            buses: BusService::new(repository.clone(), retry_policy.clone()),
            drivers: DriverService::new(repository.clone(), retry_policy.clone()),
            reports: ReportService::new(repository.clone(), routes.clone(), config.reports_dir.clone()),
            imports: ImportService::new(repository, retry_policy),
            routes,
            config,
            database,
        }
    }

    /// Estado sin base de datos, respaldado por el repositorio en memoria
    pub fn in_memory(config: EnvironmentConfig) -> Self {
        Self::new(Arc::new(InMemoryTransportRepository::new()), config, None)
    }
}
