//! Servicio de rutas
//!
//! Orquesta la construcción de rutas: alta y clonado, asignación de buses,
//! conductores y estudiantes, paradas, activación y estadísticas de
//! utilización. Las reglas de capacidad viven en `RoutePlan`; este servicio
//! carga el plan, aplica la regla en memoria y persiste el resultado.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::analytics::RouteUtilizationStats;
use crate::models::{
    Route, RouteAssignment, RoutePlan, RouteStatus, RouteStop, RouteTimeSlot, RouteValidationResult,
    Student,
};
use crate::repositories::TransportRepository;
use crate::utils::errors::{bad_request_error, conflict_error, not_found_error, AppError, AppResult};
use crate::utils::resilience::{execute_with_resilience, RetryPolicy};

const COMPASS_KEYWORDS: [&str; 4] = ["east", "west", "north", "south"];
const ADDRESS_BUS_STOP: &str = "Assigned by address";
const UNDERUTILIZED_THRESHOLD: f64 = 0.5;

/// Resultado de la asignación automática por dirección
#[derive(Debug, Default, Serialize)]
pub struct AddressAssignmentReport {
    pub updated_students: Vec<Student>,
    pub assignments: Vec<RouteAssignment>,
    pub skipped: Vec<String>,
}

#[derive(Clone)]
pub struct RouteService {
    repository: Arc<dyn TransportRepository>,
    retry_policy: RetryPolicy,
}

impl RouteService {
    pub fn new(repository: Arc<dyn TransportRepository>, retry_policy: RetryPolicy) -> Self {
        Self {
            repository,
            retry_policy,
        }
    }

    pub async fn get_all_routes(&self) -> AppResult<Vec<Route>> {
        self.repository.list_routes().await
    }

    pub async fn get_route_by_id(&self, id: Uuid) -> AppResult<Route> {
        self.repository
            .get_route(id)
            .await?
            .ok_or_else(|| not_found_error("Route", &id.to_string()))
    }

    /// Carga la ruta con sus buses, conductores, estudiantes y paradas
    pub async fn load_route_plan(&self, route_id: Uuid) -> AppResult<RoutePlan> {
        let route = self.get_route_by_id(route_id).await?;
        self.plan_for(route).await
    }

    async fn plan_for(&self, route: Route) -> AppResult<RoutePlan> {
        let am_bus = match route.am_bus_id {
            Some(id) => self.repository.get_bus(id).await?,
            None => None,
        };
        let pm_bus = match route.pm_bus_id {
            Some(id) => self.repository.get_bus(id).await?,
            None => None,
        };
        let am_driver = match route.am_driver_id {
            Some(id) => self.repository.get_driver(id).await?,
            None => None,
        };
        let pm_driver = match route.pm_driver_id {
            Some(id) => self.repository.get_driver(id).await?,
            None => None,
        };
        let students = self.repository.students_on_route(&route.route_name).await?;
        let stops = self.repository.stops_for_route(route.id).await?;

        Ok(RoutePlan::new(route)
            .with_am(am_bus, am_driver)
            .with_pm(pm_bus, pm_driver)
            .with_students(students)
            .with_stops(stops))
    }

    /// Nueva ruta: nombre obligatorio, fecha no pasada y par nombre+fecha único.
    /// Siempre empieza inactiva y en borrador.
    pub async fn create_new_route(&self, mut route: Route) -> AppResult<Route> {
        route.route_name = route.route_name.trim().to_string();
        if route.route_name.is_empty() {
            return Err(AppError::BadRequest("Route name is required".to_string()));
        }

        let today = Utc::now().date_naive();
        if route.route_date < today {
            return Err(AppError::BadRequest(format!(
                "Route date {} cannot be in the past",
                route.route_date
            )));
        }

        if !self
            .is_route_name_unique(&route.route_name, route.route_date, None)
            .await?
        {
            return Err(conflict_error("Route", "name", &route.route_name));
        }

        route.is_active = false;
        route.building_status = RouteStatus::Draft;

        let created = execute_with_resilience("create_route", &self.retry_policy, || {
            self.repository.insert_route(&route)
        })
        .await?;

        info!("✅ Ruta creada: {} ({})", created.route_name, created.route_date);
        Ok(created)
    }

    pub async fn update_route(&self, mut route: Route) -> AppResult<Route> {
        self.get_route_by_id(route.id).await?;

        route.route_name = route.route_name.trim().to_string();
        if route.route_name.is_empty() {
            return Err(AppError::BadRequest("Route name is required".to_string()));
        }
        if !self
            .is_route_name_unique(&route.route_name, route.route_date, Some(route.id))
            .await?
        {
            return Err(conflict_error("Route", "name", &route.route_name));
        }

        execute_with_resilience("update_route", &self.retry_policy, || {
            self.repository.update_route(&route)
        })
        .await
    }

    pub async fn delete_route(&self, id: Uuid) -> AppResult<()> {
        let deleted = execute_with_resilience("delete_route", &self.retry_policy, || {
            self.repository.delete_route(id)
        })
        .await?;

        if !deleted {
            return Err(not_found_error("Route", &id.to_string()));
        }
        info!("🗑️ Ruta eliminada: {}", id);
        Ok(())
    }

    pub async fn search_routes(&self, term: &str) -> AppResult<Vec<Route>> {
        let routes = self.repository.list_routes().await?;
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Ok(routes);
        }

        Ok(routes
            .into_iter()
            .filter(|r| {
                [Some(&r.route_name), r.description.as_ref(), r.school.as_ref()]
                    .into_iter()
                    .flatten()
                    .any(|field| field.to_lowercase().contains(&term))
            })
            .collect())
    }

    pub async fn is_route_name_unique(
        &self,
        route_name: &str,
        route_date: NaiveDate,
        exclude_id: Option<Uuid>,
    ) -> AppResult<bool> {
        Ok(!self
            .repository
            .route_exists(route_name, route_date, exclude_id)
            .await?)
    }

    pub async fn assign_bus_to_route(&self, route_id: Uuid, bus_id: Uuid, slot: RouteTimeSlot) -> AppResult<Route> {
        let mut route = self.get_route_by_id(route_id).await?;
        let bus = self
            .repository
            .get_bus(bus_id)
            .await?
            .ok_or_else(|| not_found_error("Bus", &bus_id.to_string()))?;
        if !bus.is_in_service() {
            return Err(AppError::BadRequest(format!(
                "Bus {} is not in service",
                bus.bus_number
            )));
        }

        if slot.includes_am() {
            route.am_bus_id = Some(bus_id);
        }
        if slot.includes_pm() {
            route.pm_bus_id = Some(bus_id);
        }

        let updated = execute_with_resilience("assign_bus_to_route", &self.retry_policy, || {
            self.repository.update_route(&route)
        })
        .await?;

        info!("🚌 Bus {} asignado a la ruta {} ({})", bus.bus_number, updated.route_name, slot);
        Ok(updated)
    }

    pub async fn assign_driver_to_route(
        &self,
        route_id: Uuid,
        driver_id: Uuid,
        slot: RouteTimeSlot,
    ) -> AppResult<Route> {
        let mut route = self.get_route_by_id(route_id).await?;
        let driver = self
            .repository
            .get_driver(driver_id)
            .await?
            .ok_or_else(|| not_found_error("Driver", &driver_id.to_string()))?;
        if !driver.is_active {
            return Err(AppError::BadRequest(format!(
                "Driver {} is not active",
                driver.full_name()
            )));
        }

        if slot.includes_am() {
            route.am_driver_id = Some(driver_id);
        }
        if slot.includes_pm() {
            route.pm_driver_id = Some(driver_id);
        }

        let updated = execute_with_resilience("assign_driver_to_route", &self.retry_policy, || {
            self.repository.update_route(&route)
        })
        .await?;

        info!(
            "🧑‍✈️ Conductor {} asignado a la ruta {} ({})",
            driver.full_name(),
            updated.route_name,
            slot
        );
        Ok(updated)
    }

    /// ¿Aceptaría la ruta a este estudiante ahora mismo?
    pub async fn can_assign_student_to_route(&self, student_id: Uuid, route_id: Uuid) -> AppResult<bool> {
        let plan = self.load_route_plan(route_id).await?;
        Ok(plan.can_accept(student_id))
    }

    pub async fn assign_student_to_route(
        &self,
        student_id: Uuid,
        route_id: Uuid,
        slot: RouteTimeSlot,
    ) -> AppResult<Student> {
        let mut plan = self.load_route_plan(route_id).await?;
        let mut student = self.student(student_id).await?;

        if !plan.try_add_student(&mut student, slot) {
            let reason = if plan.contains_student(student_id) {
                format!(
                    "Student {} is already assigned to route {}",
                    student.student_name, plan.route.route_name
                )
            } else {
                format!(
                    "Route {} is at capacity ({}/{} students)",
                    plan.route.route_name,
                    plan.assigned_count(),
                    plan.max_capacity()
                )
            };
            warn!("⚠️ Asignación rechazada: {}", reason);
            return Err(AppError::Conflict(reason));
        }

        let updated = execute_with_resilience("assign_student_to_route", &self.retry_policy, || {
            self.repository.update_student(&student)
        })
        .await?;

        info!(
            "✅ Estudiante {} asignado a {} [{}]",
            updated.student_name,
            plan.display_name(),
            slot
        );
        Ok(updated)
    }

    pub async fn remove_student_from_route(&self, student_id: Uuid, route_id: Uuid) -> AppResult<Student> {
        let mut plan = self.load_route_plan(route_id).await?;
        let mut student = self.student(student_id).await?;

        if !plan.try_remove_student(&mut student) {
            return Err(AppError::NotFound(format!(
                "Student {} is not assigned to route {}",
                student.student_name, plan.route.route_name
            )));
        }

        let updated = execute_with_resilience("remove_student_from_route", &self.retry_policy, || {
            self.repository.update_student(&student)
        })
        .await?;

        info!("➖ Estudiante {} retirado de {}", updated.student_name, plan.display_name());
        Ok(updated)
    }

    pub async fn validate_route_for_activation(&self, route_id: Uuid) -> AppResult<RouteValidationResult> {
        let plan = self.load_route_plan(route_id).await?;
        Ok(plan.validate_for_activation())
    }

    /// Activa la ruta si la validación lo permite (cualquier estado salvo archivada)
    pub async fn activate_route(&self, route_id: Uuid) -> AppResult<Route> {
        let plan = self.load_route_plan(route_id).await?;
        if plan.route.building_status == RouteStatus::Archived {
            return Err(AppError::BadRequest(format!(
                "Route {} is archived and cannot be activated",
                plan.route.route_name
            )));
        }

        self.ensure_can_activate(&plan)?;
        self.save_status(plan.route, RouteStatus::Active).await
    }

    pub async fn deactivate_route(&self, route_id: Uuid) -> AppResult<Route> {
        let route = self.get_route_by_id(route_id).await?;
        if route.building_status == RouteStatus::Archived {
            return Err(AppError::BadRequest(format!(
                "Route {} is archived",
                route.route_name
            )));
        }
        self.save_status(route, RouteStatus::Inactive).await
    }

    /// Cambia el estado de construcción respetando el grafo de transiciones
    pub async fn transition_route_status(&self, route_id: Uuid, next: RouteStatus) -> AppResult<Route> {
        let plan = self.load_route_plan(route_id).await?;
        let current = plan.route.building_status;
        if !current.can_transition_to(next) {
            return Err(AppError::BadRequest(format!(
                "Cannot move route {} from {:?} to {:?}",
                plan.route.route_name, current, next
            )));
        }

        if next == RouteStatus::Active {
            self.ensure_can_activate(&plan)?;
        }
        self.save_status(plan.route, next).await
    }

    fn ensure_can_activate(&self, plan: &RoutePlan) -> AppResult<()> {
        let validation = plan.validate_for_activation();
        if !validation.can_activate {
            warn!(
                "⚠️ Ruta {} no puede activarse: {}",
                plan.route.route_name,
                validation.summary
            );
            return Err(AppError::BadRequest(format!(
                "Route cannot be activated: {}",
                validation.issue_messages().join("; ")
            )));
        }
        Ok(())
    }

    async fn save_status(&self, mut route: Route, status: RouteStatus) -> AppResult<Route> {
        route.building_status = status;
        route.is_active = status == RouteStatus::Active;

        let updated = execute_with_resilience("update_route_status", &self.retry_policy, || {
            self.repository.update_route(&route)
        })
        .await?;

        info!("🔄 Ruta {} ahora {}", updated.route_name, status.indicator());
        Ok(updated)
    }

    pub async fn get_route_stops(&self, route_id: Uuid) -> AppResult<Vec<RouteStop>> {
        self.get_route_by_id(route_id).await?;
        self.repository.stops_for_route(route_id).await
    }

    /// Añade la parada al final de la ruta
    pub async fn add_stop_to_route(&self, route_id: Uuid, stop: RouteStop) -> AppResult<RouteStop> {
        self.get_route_by_id(route_id).await?;
        if stop.stop_name.trim().is_empty() {
            return Err(bad_request_error("Stop name is required"));
        }

        let stop = RouteStop { route_id, ..stop };
        let created = execute_with_resilience("add_stop_to_route", &self.retry_policy, || {
            self.repository.append_stop(&stop)
        })
        .await?;

        debug!("📍 Parada {} añadida en la posición {}", created.stop_name, created.stop_order);
        Ok(created)
    }

    pub async fn remove_stop_from_route(&self, route_id: Uuid, stop_id: Uuid) -> AppResult<()> {
        let removed = execute_with_resilience("remove_stop_from_route", &self.retry_policy, || {
            self.repository.delete_stop(route_id, stop_id)
        })
        .await?;

        if !removed {
            return Err(not_found_error("Route stop", &stop_id.to_string()));
        }
        Ok(())
    }

    /// Reordena las paradas según la secuencia de ids. La secuencia debe
    /// contener exactamente las paradas de la ruta; si no, no se guarda nada.
    pub async fn reorder_route_stops(&self, route_id: Uuid, ordered_ids: &[Uuid]) -> AppResult<Vec<RouteStop>> {
        self.get_route_by_id(route_id).await?;

        let stops = execute_with_resilience("reorder_route_stops", &self.retry_policy, || {
            self.repository.reorder_stops(route_id, ordered_ids)
        })
        .await?;

        info!("🔀 {} paradas reordenadas en la ruta {}", stops.len(), route_id);
        Ok(stops)
    }

    /// Copia la ruta (buses, conductores, datos y paradas) con otro nombre y fecha.
    /// Los estudiantes no se copian.
    pub async fn clone_route(&self, route_id: Uuid, new_name: &str, new_date: NaiveDate) -> AppResult<Route> {
        let source = self.get_route_by_id(route_id).await?;
        let stops = self.repository.stops_for_route(route_id).await?;

        let mut copy = Route::new(new_name, new_date);
        copy.description = source.description.clone();
        copy.school = source.school.clone();
        copy.boundaries = source.boundaries.clone();
        copy.am_bus_id = source.am_bus_id;
        copy.am_driver_id = source.am_driver_id;
        copy.pm_bus_id = source.pm_bus_id;
        copy.pm_driver_id = source.pm_driver_id;
        copy.distance = source.distance;
        copy.estimated_duration_minutes = source.estimated_duration_minutes;

        let created = self.create_new_route(copy).await?;
        for stop in stops {
            let mut new_stop = RouteStop::new(created.id, stop.stop_name, stop.scheduled_time);
            new_stop.address = stop.address;
            self.add_stop_to_route(created.id, new_stop).await?;
        }

        info!("📑 Ruta {} clonada como {}", source.route_name, created.route_name);
        Ok(created)
    }

    /// Planes de las rutas activas con plazas libres
    pub async fn routes_with_capacity(&self) -> AppResult<Vec<RoutePlan>> {
        let mut plans = Vec::new();
        for route in self.repository.list_routes().await? {
            if !route.is_active {
                continue;
            }
            let plan = self.plan_for(route).await?;
            if plan.available_capacity() > 0 {
                plans.push(plan);
            }
        }
        Ok(plans)
    }

    /// Estudiantes activos sin ruta AM ni PM
    pub async fn unassigned_students(&self) -> AppResult<Vec<Student>> {
        let students = self.repository.list_students().await?;
        Ok(students
            .into_iter()
            .filter(|s| s.active && !s.has_any_route())
            .collect())
    }

    pub async fn route_utilization_stats(&self) -> AppResult<RouteUtilizationStats> {
        let mut plans = Vec::new();
        for route in self.repository.list_routes().await? {
            plans.push(self.plan_for(route).await?);
        }
        let unassigned = self.unassigned_students().await?.len();

        Ok(summarize_utilization(&plans, unassigned))
    }

    /// Asigna cada estudiante a la primera ruta cuyas fronteras comparten un
    /// punto cardinal con su dirección, si el bus de esa ruta tiene plazas.
    pub async fn assign_students_by_address(&self, students: Vec<Student>) -> AppResult<AddressAssignmentReport> {
        let routes: Vec<Route> = self
            .repository
            .list_routes()
            .await?
            .into_iter()
            .filter(|r| r.boundaries.is_some())
            .collect();

        let mut report = AddressAssignmentReport::default();
        let today = Utc::now().date_naive();

        for mut student in students {
            let Some(address) = student.home_address.clone() else {
                report.skipped.push(format!("{}: no home address", student.student_name));
                continue;
            };

            let Some(route) = routes
                .iter()
                .find(|r| shares_compass_keyword(&address, r.boundaries.as_deref().unwrap_or_default()))
            else {
                report
                    .skipped
                    .push(format!("{}: no route matches '{}'", student.student_name, address));
                continue;
            };

            let Some(bus_id) = route.am_bus_id.or(route.pm_bus_id) else {
                report
                    .skipped
                    .push(format!("{}: route {} has no bus", student.student_name, route.route_name));
                continue;
            };
            let Some(bus) = self.repository.get_bus(bus_id).await? else {
                report
                    .skipped
                    .push(format!("{}: bus {} not found", student.student_name, bus_id));
                continue;
            };

            let riding = self.repository.count_students_for_bus(bus_id).await?;
            if riding >= i64::from(bus.seating_capacity) {
                report.skipped.push(format!(
                    "{}: bus {} is full ({}/{})",
                    student.student_name, bus.bus_number, riding, bus.seating_capacity
                ));
                continue;
            }

            let assignment = RouteAssignment::new(route.id, bus_id, today);
            let assignment = execute_with_resilience("insert_route_assignment", &self.retry_policy, || {
                self.repository.insert_assignment(&assignment)
            })
            .await?;

            student.route_assignment_id = Some(assignment.id);
            student.bus_stop = Some(ADDRESS_BUS_STOP.to_string());
            let updated = match execute_with_resilience("assign_student_by_address", &self.retry_policy, || {
                self.repository.update_student(&student)
            })
            .await
            {
                Ok(updated) => updated,
                Err(e) => {
                    error!("❌ No se pudo guardar la asignación de {}: {}", student.student_name, e);
                    report.skipped.push(format!("{}: {}", student.student_name, e));
                    continue;
                }
            };

            debug!("🏠 {} asignado a {} por dirección", updated.student_name, route.route_name);
            report.assignments.push(assignment);
            report.updated_students.push(updated);
        }

        info!(
            "🏠 Asignación por dirección: {} asignados, {} omitidos",
            report.updated_students.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    async fn student(&self, id: Uuid) -> AppResult<Student> {
        self.repository
            .get_student(id)
            .await?
            .ok_or_else(|| not_found_error("Student", &id.to_string()))
    }
}

fn compass_keywords(text: &str) -> Vec<&'static str> {
    let words: Vec<String> = text
        .split(|c: char| !c.is_ascii_alphanumeric())
        .map(str::to_ascii_lowercase)
        .collect();
    COMPASS_KEYWORDS
        .into_iter()
        .filter(|k| words.iter().any(|w| w == k))
        .collect()
}

fn shares_compass_keyword(address: &str, boundaries: &str) -> bool {
    let in_boundaries = compass_keywords(boundaries);
    compass_keywords(address)
        .iter()
        .any(|k| in_boundaries.contains(k))
}

fn summarize_utilization(plans: &[RoutePlan], unassigned: usize) -> RouteUtilizationStats {
    let with_capacity: Vec<&RoutePlan> = plans.iter().filter(|p| p.max_capacity() > 0).collect();
    let count = plans.len();

    let average = |values: Vec<f64>| {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };

    RouteUtilizationStats {
        total_routes: count,
        total_assigned_students: plans.iter().map(RoutePlan::assigned_count).sum(),
        total_unassigned_students: unassigned,
        total_capacity: plans.iter().map(|p| i64::from(p.max_capacity())).sum(),
        average_utilization_rate: average(plans.iter().map(RoutePlan::utilization_rate).collect()),
        routes_at_capacity: with_capacity.iter().filter(|p| p.is_at_capacity()).count(),
        underutilized_routes: with_capacity
            .iter()
            .filter(|p| p.utilization_rate() < UNDERUTILIZED_THRESHOLD)
            .count(),
        total_estimated_distance: plans
            .iter()
            .filter_map(|p| p.route.distance.and_then(|d| d.to_f64()))
            .sum(),
        total_estimated_minutes: plans
            .iter()
            .filter_map(|p| p.route.estimated_duration_minutes)
            .map(i64::from)
            .sum(),
        overall_efficiency_score: average(plans.iter().map(RoutePlan::efficiency_score).collect()),
        calculated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bus, Driver};
    use crate::repositories::InMemoryTransportRepository;
    use chrono::{Duration, NaiveTime};

    struct Fixture {
        service: RouteService,
        repo: Arc<InMemoryTransportRepository>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryTransportRepository::new());
        Fixture {
            service: RouteService::new(repo.clone(), RetryPolicy::default()),
            repo,
        }
    }

    fn tomorrow() -> NaiveDate {
        Utc::now().date_naive() + Duration::days(1)
    }

    impl Fixture {
        async fn route_with_bus(&self, name: &str, capacity: i32) -> Route {
            let route = self.service.create_new_route(Route::new(name, tomorrow())).await.unwrap();
            let bus = Bus::new(format!("Bus {}", name), capacity);
            let driver = Driver::new("Dana", name, format!("LIC-{}", name));
            self.repo.insert_bus(&bus).await.unwrap();
            self.repo.insert_driver(&driver).await.unwrap();
            self.service
                .assign_bus_to_route(route.id, bus.id, RouteTimeSlot::Am)
                .await
                .unwrap();
            self.service
                .assign_driver_to_route(route.id, driver.id, RouteTimeSlot::Am)
                .await
                .unwrap()
        }

        async fn student(&self, name: &str) -> Student {
            let student = Student::new(name);
            self.repo.insert_student(&student).await.unwrap()
        }
    }

    #[tokio::test]
    async fn test_create_route_rules() {
        let f = fixture();
        let yesterday = Utc::now().date_naive() - Duration::days(1);

        assert!(matches!(
            f.service.create_new_route(Route::new("  ", tomorrow())).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            f.service.create_new_route(Route::new("East", yesterday)).await,
            Err(AppError::BadRequest(_))
        ));

        let mut route = Route::new("East", tomorrow());
        route.is_active = true;
        route.building_status = RouteStatus::Active;
        let created = f.service.create_new_route(route).await.unwrap();
        assert!(!created.is_active);
        assert_eq!(created.building_status, RouteStatus::Draft);

        assert!(matches!(
            f.service.create_new_route(Route::new("East", tomorrow())).await,
            Err(AppError::Conflict(_))
        ));
        assert!(f.service.is_route_name_unique("East", tomorrow() + Duration::days(1), None).await.unwrap());
    }

    #[tokio::test]
    async fn test_east_capacity_scenario_through_service() {
        let f = fixture();
        let route = f.route_with_bus("East", 2).await;
        let s1 = f.student("S1").await;
        let s2 = f.student("S2").await;
        let s3 = f.student("S3").await;

        f.service.assign_student_to_route(s1.id, route.id, RouteTimeSlot::Am).await.unwrap();
        f.service.assign_student_to_route(s2.id, route.id, RouteTimeSlot::Am).await.unwrap();
        assert!(f.service.load_route_plan(route.id).await.unwrap().is_at_capacity());

        assert!(!f.service.can_assign_student_to_route(s3.id, route.id).await.unwrap());
        let rejected = f.service.assign_student_to_route(s3.id, route.id, RouteTimeSlot::Am).await;
        assert!(matches!(rejected, Err(AppError::Conflict(_))));
        assert_eq!(f.service.load_route_plan(route.id).await.unwrap().assigned_count(), 2);

        let removed = f.service.remove_student_from_route(s1.id, route.id).await.unwrap();
        assert_eq!(removed.am_route, None);
        assert_eq!(f.service.load_route_plan(route.id).await.unwrap().available_capacity(), 1);

        let added = f.service.assign_student_to_route(s3.id, route.id, RouteTimeSlot::Am).await.unwrap();
        assert_eq!(added.am_route.as_deref(), Some("East"));
    }

    #[tokio::test]
    async fn test_duplicate_assignment_is_conflict() {
        let f = fixture();
        let route = f.route_with_bus("East", 5).await;
        let s1 = f.student("S1").await;

        f.service.assign_student_to_route(s1.id, route.id, RouteTimeSlot::Both).await.unwrap();
        let again = f.service.assign_student_to_route(s1.id, route.id, RouteTimeSlot::Am).await;
        assert!(matches!(again, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_activation_flow() {
        let f = fixture();
        let route = f.route_with_bus("East", 5).await;

        let result = f.service.validate_route_for_activation(route.id).await.unwrap();
        assert!(!result.is_valid);
        assert!(f.service.activate_route(route.id).await.is_err());

        let s1 = f.student("S1").await;
        f.service.assign_student_to_route(s1.id, route.id, RouteTimeSlot::Am).await.unwrap();

        // Sin paradas sigue pudiendo activarse
        let active = f.service.activate_route(route.id).await.unwrap();
        assert!(active.is_active);
        assert_eq!(active.building_status, RouteStatus::Active);

        let inactive = f.service.deactivate_route(route.id).await.unwrap();
        assert!(!inactive.is_active);
        assert_eq!(inactive.building_status, RouteStatus::Inactive);

        let archived = f
            .service
            .transition_route_status(route.id, RouteStatus::Archived)
            .await
            .unwrap();
        assert_eq!(archived.building_status, RouteStatus::Archived);
        assert!(f.service.activate_route(route.id).await.is_err());
    }

    #[tokio::test]
    async fn test_transition_requires_valid_edge() {
        let f = fixture();
        let route = f.route_with_bus("North", 5).await;

        assert!(f
            .service
            .transition_route_status(route.id, RouteStatus::Review)
            .await
            .is_err());
        f.service
            .transition_route_status(route.id, RouteStatus::InProgress)
            .await
            .unwrap();
        f.service
            .transition_route_status(route.id, RouteStatus::Review)
            .await
            .unwrap();
        // Review → Active exige la validación de activación
        assert!(f
            .service
            .transition_route_status(route.id, RouteStatus::Active)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_stop_lifecycle() {
        let f = fixture();
        let route = f.route_with_bus("East", 5).await;
        let time = |m| NaiveTime::from_hms_opt(7, m, 0).unwrap();

        let a = f.service.add_stop_to_route(route.id, RouteStop::new(route.id, "A", time(0))).await.unwrap();
        let b = f.service.add_stop_to_route(route.id, RouteStop::new(route.id, "B", time(10))).await.unwrap();
        let c = f.service.add_stop_to_route(route.id, RouteStop::new(route.id, "C", time(20))).await.unwrap();
        assert_eq!((a.stop_order, b.stop_order, c.stop_order), (1, 2, 3));

        let reordered = f
            .service
            .reorder_route_stops(route.id, &[c.id, b.id, a.id])
            .await
            .unwrap();
        assert_eq!(reordered[0].id, c.id);

        let failed = f.service.reorder_route_stops(route.id, &[c.id, Uuid::new_v4(), a.id]).await;
        assert!(matches!(failed, Err(AppError::BadRequest(_))));
        let fresh = f.service.get_route_stops(route.id).await.unwrap();
        let order: Vec<Uuid> = fresh.iter().map(|s| s.id).collect();
        assert_eq!(order, vec![c.id, b.id, a.id]);

        f.service.remove_stop_from_route(route.id, b.id).await.unwrap();
        let fresh = f.service.get_route_stops(route.id).await.unwrap();
        let orders: Vec<i32> = fresh.iter().map(|s| s.stop_order).collect();
        assert_eq!(orders, vec![1, 2]);
        assert!(matches!(
            f.service.remove_stop_from_route(route.id, b.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_clone_route_copies_stops_but_not_students() {
        let f = fixture();
        let route = f.route_with_bus("East", 5).await;
        let time = NaiveTime::from_hms_opt(7, 0, 0).unwrap();
        f.service.add_stop_to_route(route.id, RouteStop::new(route.id, "A", time)).await.unwrap();
        let s1 = f.student("S1").await;
        f.service.assign_student_to_route(s1.id, route.id, RouteTimeSlot::Am).await.unwrap();

        let copy = f
            .service
            .clone_route(route.id, "East Copy", tomorrow())
            .await
            .unwrap();
        let plan = f.service.load_route_plan(copy.id).await.unwrap();
        assert_eq!(plan.stops().len(), 1);
        assert_eq!(plan.assigned_count(), 0);
        assert_eq!(plan.route.am_bus_id, route.am_bus_id);
        assert_eq!(plan.route.building_status, RouteStatus::Draft);
    }

    #[tokio::test]
    async fn test_utilization_stats_and_capacity_lists() {
        let f = fixture();
        let east = f.route_with_bus("East", 2).await;
        f.route_with_bus("West", 10).await;
        let s1 = f.student("S1").await;
        let s2 = f.student("S2").await;
        f.student("Loose").await;
        f.service.assign_student_to_route(s1.id, east.id, RouteTimeSlot::Am).await.unwrap();
        f.service.assign_student_to_route(s2.id, east.id, RouteTimeSlot::Am).await.unwrap();
        f.service.activate_route(east.id).await.unwrap();

        let stats = f.service.route_utilization_stats().await.unwrap();
        assert_eq!(stats.total_routes, 2);
        assert_eq!(stats.total_assigned_students, 2);
        assert_eq!(stats.total_unassigned_students, 1);
        assert_eq!(stats.total_capacity, 12);
        assert_eq!(stats.routes_at_capacity, 1);
        assert_eq!(stats.underutilized_routes, 1);
        assert!((stats.average_utilization_rate - 0.5).abs() < 1e-9);

        // East está llena y West no está activa
        assert!(f.service.routes_with_capacity().await.unwrap().is_empty());
        assert_eq!(f.service.unassigned_students().await.unwrap().len(), 1);
    }

    #[test]
    fn test_compass_keyword_matching() {
        assert!(shares_compass_keyword("12 East County Rd 4", "East of Hwy 287"));
        assert!(shares_compass_keyword("400 N South St", "SOUTH side"));
        assert!(!shares_compass_keyword("12 Eastwood Ln", "east"));
        assert!(!shares_compass_keyword("1 Main St", "North"));
    }

    #[tokio::test]
    async fn test_assign_students_by_address() {
        let f = fixture();
        let mut route = f.route_with_bus("East", 1).await;
        route.boundaries = Some("East of Hwy 287".to_string());
        let route = f.service.update_route(route).await.unwrap();

        let mut near = Student::new("Near");
        near.home_address = Some("12 East County Rd".to_string());
        let mut second = Student::new("Second");
        second.home_address = Some("40 East Main".to_string());
        let mut far = Student::new("Far");
        far.home_address = Some("9 West Rd".to_string());
        let homeless = Student::new("NoAddress");
        for s in [&near, &second, &far, &homeless] {
            f.repo.insert_student(s).await.unwrap();
        }

        let report = f
            .service
            .assign_students_by_address(vec![near, second, far, homeless])
            .await
            .unwrap();

        assert_eq!(report.updated_students.len(), 1);
        assert_eq!(report.assignments.len(), 1);
        assert_eq!(report.assignments[0].route_id, route.id);
        assert_eq!(report.updated_students[0].bus_stop.as_deref(), Some("Assigned by address"));
        assert_eq!(report.skipped.len(), 3);
        assert!(report.skipped.iter().any(|s| s.contains("is full")));
    }
}
