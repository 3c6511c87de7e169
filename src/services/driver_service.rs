//! Servicio de conductores

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::models::Driver;
use crate::repositories::TransportRepository;
use crate::utils::errors::{conflict_error, not_found_error, AppError, AppResult};
use crate::utils::resilience::{execute_with_resilience, RetryPolicy};
use crate::utils::validation::validate_phone;

#[derive(Clone)]
pub struct DriverService {
    repository: Arc<dyn TransportRepository>,
    retry_policy: RetryPolicy,
}

impl DriverService {
    pub fn new(repository: Arc<dyn TransportRepository>, retry_policy: RetryPolicy) -> Self {
        Self {
            repository,
            retry_policy,
        }
    }

    pub async fn get_all_drivers(&self) -> AppResult<Vec<Driver>> {
        self.repository.list_drivers().await
    }

    pub async fn get_driver_by_id(&self, id: Uuid) -> AppResult<Driver> {
        self.repository
            .get_driver(id)
            .await?
            .ok_or_else(|| not_found_error("Driver", &id.to_string()))
    }

    pub async fn add_driver(&self, mut driver: Driver) -> AppResult<Driver> {
        self.check(&mut driver, None).await?;

        let created = execute_with_resilience("add_driver", &self.retry_policy, || {
            self.repository.insert_driver(&driver)
        })
        .await?;

        info!("🧑‍✈️ Conductor creado: {}", created.full_name());
        Ok(created)
    }

    pub async fn update_driver(&self, mut driver: Driver) -> AppResult<Driver> {
        self.get_driver_by_id(driver.id).await?;
        let id = driver.id;
        self.check(&mut driver, Some(id)).await?;

        execute_with_resilience("update_driver", &self.retry_policy, || {
            self.repository.update_driver(&driver)
        })
        .await
    }

    pub async fn delete_driver(&self, id: Uuid) -> AppResult<()> {
        let deleted = execute_with_resilience("delete_driver", &self.retry_policy, || {
            self.repository.delete_driver(id)
        })
        .await?;

        if !deleted {
            return Err(not_found_error("Driver", &id.to_string()));
        }
        info!("🗑️ Conductor eliminado: {}", id);
        Ok(())
    }

    /// Conductores activos que ninguna ruta usa
    pub async fn available_drivers(&self) -> AppResult<Vec<Driver>> {
        let routes = self.repository.list_routes().await?;

        Ok(self
            .repository
            .list_drivers()
            .await?
            .into_iter()
            .filter(|d| d.is_active && !routes.iter().any(|r| r.uses_driver(d.id)))
            .collect())
    }

    async fn check(&self, driver: &mut Driver, exclude_id: Option<Uuid>) -> AppResult<()> {
        driver.first_name = driver.first_name.trim().to_string();
        driver.last_name = driver.last_name.trim().to_string();
        driver.license_number = driver.license_number.trim().to_string();

        if driver.first_name.is_empty() || driver.last_name.is_empty() {
            return Err(AppError::BadRequest("Driver first and last name are required".to_string()));
        }
        if driver.license_number.is_empty() {
            return Err(AppError::BadRequest("License number is required".to_string()));
        }
        if let Some(phone) = driver.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            if validate_phone(phone).is_err() {
                return Err(AppError::BadRequest(format!("Invalid phone format: {}", phone)));
            }
        }
        if self
            .repository
            .license_number_exists(&driver.license_number, exclude_id)
            .await?
        {
            return Err(conflict_error("Driver", "license number", &driver.license_number));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Route;
    use crate::repositories::InMemoryTransportRepository;
    use chrono::NaiveDate;

    fn service() -> (DriverService, Arc<InMemoryTransportRepository>) {
        let repo = Arc::new(InMemoryTransportRepository::new());
        (DriverService::new(repo.clone(), RetryPolicy::default()), repo)
    }

    #[tokio::test]
    async fn test_license_number_unique() {
        let (service, _) = service();
        service.add_driver(Driver::new("Dana", "Lopez", "CO-1")).await.unwrap();
        assert!(matches!(
            service.add_driver(Driver::new("Sam", "Reed", "CO-1")).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_phone_rejected() {
        let (service, _) = service();
        let mut driver = Driver::new("Dana", "Lopez", "CO-1");
        driver.phone = Some("555".to_string());
        assert!(matches!(service.add_driver(driver).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_available_drivers() {
        let (service, repo) = service();
        let routed = service.add_driver(Driver::new("Dana", "Lopez", "CO-1")).await.unwrap();
        let free = service.add_driver(Driver::new("Sam", "Reed", "CO-2")).await.unwrap();
        let mut retired = Driver::new("Lee", "Park", "CO-3");
        retired.is_active = false;
        service.add_driver(retired).await.unwrap();

        let mut route = Route::new("East", NaiveDate::from_ymd_opt(2025, 9, 2).unwrap());
        route.am_driver_id = Some(routed.id);
        repo.insert_route(&route).await.unwrap();

        let available = service.available_drivers().await.unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, free.id);
    }
}
