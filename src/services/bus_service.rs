//! Servicio de buses

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::models::Bus;
use crate::repositories::TransportRepository;
use crate::utils::errors::{bad_request_error, conflict_error, not_found_error, validation_error, AppResult};
use crate::utils::resilience::{execute_with_resilience, RetryPolicy};
use crate::utils::validation::validate_positive;

#[derive(Clone)]
pub struct BusService {
    repository: Arc<dyn TransportRepository>,
    retry_policy: RetryPolicy,
}

impl BusService {
    pub fn new(repository: Arc<dyn TransportRepository>, retry_policy: RetryPolicy) -> Self {
        Self {
            repository,
            retry_policy,
        }
    }

    pub async fn get_all_buses(&self) -> AppResult<Vec<Bus>> {
        self.repository.list_buses().await
    }

    pub async fn get_bus_by_id(&self, id: Uuid) -> AppResult<Bus> {
        self.repository
            .get_bus(id)
            .await?
            .ok_or_else(|| not_found_error("Bus", &id.to_string()))
    }

    pub async fn add_bus(&self, mut bus: Bus) -> AppResult<Bus> {
        self.check(&mut bus, None).await?;

        let created = execute_with_resilience("add_bus", &self.retry_policy, || {
            self.repository.insert_bus(&bus)
        })
        .await?;

        info!("🚌 Bus {} creado ({} plazas)", created.bus_number, created.seating_capacity);
        Ok(created)
    }

    pub async fn update_bus(&self, mut bus: Bus) -> AppResult<Bus> {
        self.get_bus_by_id(bus.id).await?;
        let id = bus.id;
        self.check(&mut bus, Some(id)).await?;

        execute_with_resilience("update_bus", &self.retry_policy, || {
            self.repository.update_bus(&bus)
        })
        .await
    }

    pub async fn delete_bus(&self, id: Uuid) -> AppResult<()> {
        let deleted = execute_with_resilience("delete_bus", &self.retry_policy, || {
            self.repository.delete_bus(id)
        })
        .await?;

        if !deleted {
            return Err(not_found_error("Bus", &id.to_string()));
        }
        info!("🗑️ Bus eliminado: {}", id);
        Ok(())
    }

    /// Estudiantes cuya asignación apunta a este bus
    pub async fn assigned_student_count(&self, bus_id: Uuid) -> AppResult<i64> {
        self.get_bus_by_id(bus_id).await?;
        self.repository.count_students_for_bus(bus_id).await
    }

    /// Buses en servicio que ninguna ruta usa (ni AM ni PM)
    pub async fn available_buses(&self) -> AppResult<Vec<Bus>> {
        let routes = self.repository.list_routes().await?;

        Ok(self
            .repository
            .list_buses()
            .await?
            .into_iter()
            .filter(|b| b.is_in_service() && !routes.iter().any(|r| r.uses_bus(b.id)))
            .collect())
    }

    async fn check(&self, bus: &mut Bus, exclude_id: Option<Uuid>) -> AppResult<()> {
        bus.bus_number = bus.bus_number.trim().to_string();
        if bus.bus_number.is_empty() {
            return Err(bad_request_error("Bus number is required"));
        }
        if validate_positive(bus.seating_capacity).is_err() {
            return Err(validation_error(
                "seating_capacity",
                "Seating capacity must be greater than zero",
            ));
        }
        if self
            .repository
            .bus_number_exists(&bus.bus_number, exclude_id)
            .await?
        {
            return Err(conflict_error("Bus", "number", &bus.bus_number));
        }
        Ok(())
    }
}
