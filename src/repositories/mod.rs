//! Acceso a datos
//!
//! `TransportRepository` es el contrato que consumen los servicios. Hay dos
//! implementaciones: PostgreSQL (`PgTransportRepository`) y en memoria
//! (`InMemoryTransportRepository`), usada en tests y cuando no hay
//! `DATABASE_URL`.

pub mod memory_repository;
pub mod pg_repository;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{Bus, Driver, Family, Route, RouteAssignment, RouteStop, Student};
use crate::utils::errors::AppResult;

pub use memory_repository::InMemoryTransportRepository;
pub use pg_repository::PgTransportRepository;

#[async_trait]
pub trait TransportRepository: Send + Sync {
    // Estudiantes
    async fn list_students(&self) -> AppResult<Vec<Student>>;
    async fn get_student(&self, id: Uuid) -> AppResult<Option<Student>>;
    async fn insert_student(&self, student: &Student) -> AppResult<Student>;
    async fn update_student(&self, student: &Student) -> AppResult<Student>;
    async fn delete_student(&self, id: Uuid) -> AppResult<bool>;
    async fn student_number_exists(&self, number: &str, exclude_id: Option<Uuid>) -> AppResult<bool>;
    /// Estudiantes cuyo `am_route` o `pm_route` coincide exactamente con el nombre
    async fn students_on_route(&self, route_name: &str) -> AppResult<Vec<Student>>;
    async fn find_student_by_name_and_address(
        &self,
        student_name: &str,
        home_address: Option<&str>,
    ) -> AppResult<Option<Student>>;

    // Rutas
    async fn list_routes(&self) -> AppResult<Vec<Route>>;
    async fn get_route(&self, id: Uuid) -> AppResult<Option<Route>>;
    async fn route_name_exists(&self, route_name: &str) -> AppResult<bool>;
    async fn route_exists(
        &self,
        route_name: &str,
        route_date: NaiveDate,
        exclude_id: Option<Uuid>,
    ) -> AppResult<bool>;
    async fn insert_route(&self, route: &Route) -> AppResult<Route>;
    async fn update_route(&self, route: &Route) -> AppResult<Route>;
    async fn delete_route(&self, id: Uuid) -> AppResult<bool>;

    // Paradas
    /// Paradas de la ruta ordenadas por `stop_order`
    async fn stops_for_route(&self, route_id: Uuid) -> AppResult<Vec<RouteStop>>;
    /// Inserta la parada al final (orden N+1) en una única unidad de trabajo
    async fn append_stop(&self, stop: &RouteStop) -> AppResult<RouteStop>;
    /// Elimina la parada y renumera el resto 1..N-1 en la misma unidad de trabajo
    async fn delete_stop(&self, route_id: Uuid, stop_id: Uuid) -> AppResult<bool>;
    /// Aplica el nuevo orden de forma atómica: o se actualizan todas las
    /// paradas o ninguna
    async fn reorder_stops(&self, route_id: Uuid, ordered_ids: &[Uuid]) -> AppResult<Vec<RouteStop>>;

    // Buses
    async fn list_buses(&self) -> AppResult<Vec<Bus>>;
    async fn get_bus(&self, id: Uuid) -> AppResult<Option<Bus>>;
    async fn bus_number_exists(&self, bus_number: &str, exclude_id: Option<Uuid>) -> AppResult<bool>;
    async fn insert_bus(&self, bus: &Bus) -> AppResult<Bus>;
    async fn update_bus(&self, bus: &Bus) -> AppResult<Bus>;
    async fn delete_bus(&self, id: Uuid) -> AppResult<bool>;

    // Conductores
    async fn list_drivers(&self) -> AppResult<Vec<Driver>>;
    async fn get_driver(&self, id: Uuid) -> AppResult<Option<Driver>>;
    async fn license_number_exists(&self, license_number: &str, exclude_id: Option<Uuid>) -> AppResult<bool>;
    async fn insert_driver(&self, driver: &Driver) -> AppResult<Driver>;
    async fn update_driver(&self, driver: &Driver) -> AppResult<Driver>;
    async fn delete_driver(&self, id: Uuid) -> AppResult<bool>;

    // Asignaciones
    async fn insert_assignment(&self, assignment: &RouteAssignment) -> AppResult<RouteAssignment>;
    /// Estudiantes cuya asignación apunta a este bus
    async fn count_students_for_bus(&self, bus_id: Uuid) -> AppResult<i64>;

    // Familias
    async fn list_families(&self) -> AppResult<Vec<Family>>;
    async fn insert_family(&self, family: &Family) -> AppResult<Family>;
}
