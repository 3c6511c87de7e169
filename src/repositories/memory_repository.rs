//! Repositorio en memoria
//!
//! Todas las tablas viven detrás de un único `RwLock`; cada escritura toma el
//! lock de escritura una sola vez, valida primero y muta después, de modo que
//! una operación fallida no deja cambios a medias.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::TransportRepository;
use crate::models::route_stop::{plan_stop_order, renumber_stops};
use crate::models::{Bus, Driver, Family, Route, RouteAssignment, RouteStop, Student};
use crate::utils::errors::{conflict_error, not_found_error, AppResult};

#[derive(Debug, Default)]
struct Tables {
    students: HashMap<Uuid, Student>,
    routes: HashMap<Uuid, Route>,
    stops: HashMap<Uuid, RouteStop>,
    buses: HashMap<Uuid, Bus>,
    drivers: HashMap<Uuid, Driver>,
    assignments: HashMap<Uuid, RouteAssignment>,
    families: HashMap<Uuid, Family>,
}

impl Tables {
    fn route_stops(&self, route_id: Uuid) -> Vec<RouteStop> {
        let mut stops: Vec<RouteStop> = self
            .stops
            .values()
            .filter(|s| s.route_id == route_id)
            .cloned()
            .collect();
        stops.sort_by_key(|s| s.stop_order);
        stops
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTransportRepository {
    tables: RwLock<Tables>,
}

impl InMemoryTransportRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_by<T: Clone, K: Ord>(values: impl Iterator<Item = T>, key: impl Fn(&T) -> K) -> Vec<T> {
    let mut list: Vec<T> = values.collect();
    list.sort_by_key(|v| key(v));
    list
}

#[async_trait]
impl TransportRepository for InMemoryTransportRepository {
    async fn list_students(&self) -> AppResult<Vec<Student>> {
        let tables = self.tables.read().await;
        Ok(sorted_by(tables.students.values().cloned(), |s| s.student_name.clone()))
    }

    async fn get_student(&self, id: Uuid) -> AppResult<Option<Student>> {
        Ok(self.tables.read().await.students.get(&id).cloned())
    }

    async fn insert_student(&self, student: &Student) -> AppResult<Student> {
        let mut tables = self.tables.write().await;
        if let Some(number) = &student.student_number {
            if tables.students.values().any(|s| s.student_number.as_ref() == Some(number)) {
                return Err(conflict_error("Student", "number", number));
            }
        }
        tables.students.insert(student.id, student.clone());
        Ok(student.clone())
    }

    async fn update_student(&self, student: &Student) -> AppResult<Student> {
        let mut tables = self.tables.write().await;
        if !tables.students.contains_key(&student.id) {
            return Err(not_found_error("Student", &student.id.to_string()));
        }
        if let Some(number) = &student.student_number {
            if tables
                .students
                .values()
                .any(|s| s.id != student.id && s.student_number.as_ref() == Some(number))
            {
                return Err(conflict_error("Student", "number", number));
            }
        }
        tables.students.insert(student.id, student.clone());
        Ok(student.clone())
    }

    async fn delete_student(&self, id: Uuid) -> AppResult<bool> {
        Ok(self.tables.write().await.students.remove(&id).is_some())
    }

    async fn student_number_exists(&self, number: &str, exclude_id: Option<Uuid>) -> AppResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .students
            .values()
            .any(|s| Some(s.id) != exclude_id && s.student_number.as_deref() == Some(number)))
    }

    async fn students_on_route(&self, route_name: &str) -> AppResult<Vec<Student>> {
        let tables = self.tables.read().await;
        let on_route = tables.students.values().filter(|s| {
            s.am_route.as_deref() == Some(route_name) || s.pm_route.as_deref() == Some(route_name)
        });
        Ok(sorted_by(on_route.cloned(), |s| s.student_name.clone()))
    }

    async fn find_student_by_name_and_address(
        &self,
        student_name: &str,
        home_address: Option<&str>,
    ) -> AppResult<Option<Student>> {
        let tables = self.tables.read().await;
        Ok(tables
            .students
            .values()
            .find(|s| s.student_name == student_name && s.home_address.as_deref() == home_address)
            .cloned())
    }

    async fn list_routes(&self) -> AppResult<Vec<Route>> {
        let tables = self.tables.read().await;
        Ok(sorted_by(tables.routes.values().cloned(), |r| {
            (r.route_name.clone(), r.route_date)
        }))
    }

    async fn get_route(&self, id: Uuid) -> AppResult<Option<Route>> {
        Ok(self.tables.read().await.routes.get(&id).cloned())
    }

    async fn route_name_exists(&self, route_name: &str) -> AppResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.routes.values().any(|r| r.route_name == route_name))
    }

    async fn route_exists(
        &self,
        route_name: &str,
        route_date: NaiveDate,
        exclude_id: Option<Uuid>,
    ) -> AppResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables.routes.values().any(|r| {
            Some(r.id) != exclude_id && r.route_name == route_name && r.route_date == route_date
        }))
    }

    async fn insert_route(&self, route: &Route) -> AppResult<Route> {
        let mut tables = self.tables.write().await;
        if tables
            .routes
            .values()
            .any(|r| r.route_name == route.route_name && r.route_date == route.route_date)
        {
            return Err(conflict_error("Route", "name", &route.route_name));
        }
        tables.routes.insert(route.id, route.clone());
        Ok(route.clone())
    }

    async fn update_route(&self, route: &Route) -> AppResult<Route> {
        let mut tables = self.tables.write().await;
        if !tables.routes.contains_key(&route.id) {
            return Err(not_found_error("Route", &route.id.to_string()));
        }
        if tables.routes.values().any(|r| {
            r.id != route.id && r.route_name == route.route_name && r.route_date == route.route_date
        }) {
            return Err(conflict_error("Route", "name", &route.route_name));
        }
        tables.routes.insert(route.id, route.clone());
        Ok(route.clone())
    }

    async fn delete_route(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.routes.remove(&id).is_none() {
            return Ok(false);
        }
        tables.stops.retain(|_, s| s.route_id != id);

        let removed: Vec<Uuid> = tables
            .assignments
            .values()
            .filter(|a| a.route_id == id)
            .map(|a| a.id)
            .collect();
        tables.assignments.retain(|_, a| a.route_id != id);
        for student in tables.students.values_mut() {
            if student.route_assignment_id.is_some_and(|a| removed.contains(&a)) {
                student.route_assignment_id = None;
            }
        }
        Ok(true)
    }

    async fn stops_for_route(&self, route_id: Uuid) -> AppResult<Vec<RouteStop>> {
        Ok(self.tables.read().await.route_stops(route_id))
    }

    async fn append_stop(&self, stop: &RouteStop) -> AppResult<RouteStop> {
        let mut tables = self.tables.write().await;
        if !tables.routes.contains_key(&stop.route_id) {
            return Err(not_found_error("Route", &stop.route_id.to_string()));
        }
        let mut created = stop.clone();
        created.stop_order = tables.route_stops(stop.route_id).len() as i32 + 1;
        tables.stops.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_stop(&self, route_id: Uuid, stop_id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        match tables.stops.get(&stop_id) {
            Some(stop) if stop.route_id == route_id => {}
            _ => return Ok(false),
        }
        tables.stops.remove(&stop_id);

        let mut remaining = tables.route_stops(route_id);
        renumber_stops(&mut remaining);
        for stop in remaining {
            tables.stops.insert(stop.id, stop);
        }
        Ok(true)
    }

    async fn reorder_stops(&self, route_id: Uuid, ordered_ids: &[Uuid]) -> AppResult<Vec<RouteStop>> {
        let mut tables = self.tables.write().await;
        let current = tables.route_stops(route_id);
        let plan = plan_stop_order(&current, ordered_ids)?;

        for (stop_id, stop_order) in plan {
            if let Some(stop) = tables.stops.get_mut(&stop_id) {
                stop.stop_order = stop_order;
            }
        }
        Ok(tables.route_stops(route_id))
    }

    async fn list_buses(&self) -> AppResult<Vec<Bus>> {
        let tables = self.tables.read().await;
        Ok(sorted_by(tables.buses.values().cloned(), |b| b.bus_number.clone()))
    }

    async fn get_bus(&self, id: Uuid) -> AppResult<Option<Bus>> {
        Ok(self.tables.read().await.buses.get(&id).cloned())
    }

    async fn bus_number_exists(&self, bus_number: &str, exclude_id: Option<Uuid>) -> AppResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .buses
            .values()
            .any(|b| Some(b.id) != exclude_id && b.bus_number == bus_number))
    }

    async fn insert_bus(&self, bus: &Bus) -> AppResult<Bus> {
        let mut tables = self.tables.write().await;
        if tables.buses.values().any(|b| b.bus_number == bus.bus_number) {
            return Err(conflict_error("Bus", "number", &bus.bus_number));
        }
        tables.buses.insert(bus.id, bus.clone());
        Ok(bus.clone())
    }

    async fn update_bus(&self, bus: &Bus) -> AppResult<Bus> {
        let mut tables = self.tables.write().await;
        if !tables.buses.contains_key(&bus.id) {
            return Err(not_found_error("Bus", &bus.id.to_string()));
        }
        if tables
            .buses
            .values()
            .any(|b| b.id != bus.id && b.bus_number == bus.bus_number)
        {
            return Err(conflict_error("Bus", "number", &bus.bus_number));
        }
        tables.buses.insert(bus.id, bus.clone());
        Ok(bus.clone())
    }

    async fn delete_bus(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.buses.remove(&id).is_none() {
            return Ok(false);
        }
        for route in tables.routes.values_mut() {
            if route.am_bus_id == Some(id) {
                route.am_bus_id = None;
            }
            if route.pm_bus_id == Some(id) {
                route.pm_bus_id = None;
            }
        }
        Ok(true)
    }

    async fn list_drivers(&self) -> AppResult<Vec<Driver>> {
        let tables = self.tables.read().await;
        Ok(sorted_by(tables.drivers.values().cloned(), |d| {
            (d.last_name.clone(), d.first_name.clone())
        }))
    }

    async fn get_driver(&self, id: Uuid) -> AppResult<Option<Driver>> {
        Ok(self.tables.read().await.drivers.get(&id).cloned())
    }

    async fn license_number_exists(&self, license_number: &str, exclude_id: Option<Uuid>) -> AppResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .drivers
            .values()
            .any(|d| Some(d.id) != exclude_id && d.license_number == license_number))
    }

    async fn insert_driver(&self, driver: &Driver) -> AppResult<Driver> {
        let mut tables = self.tables.write().await;
        if tables
            .drivers
            .values()
            .any(|d| d.license_number == driver.license_number)
        {
            return Err(conflict_error("Driver", "license number", &driver.license_number));
        }
        tables.drivers.insert(driver.id, driver.clone());
        Ok(driver.clone())
    }

    async fn update_driver(&self, driver: &Driver) -> AppResult<Driver> {
        let mut tables = self.tables.write().await;
        if !tables.drivers.contains_key(&driver.id) {
            return Err(not_found_error("Driver", &driver.id.to_string()));
        }
        if tables
            .drivers
            .values()
            .any(|d| d.id != driver.id && d.license_number == driver.license_number)
        {
            return Err(conflict_error("Driver", "license number", &driver.license_number));
        }
        tables.drivers.insert(driver.id, driver.clone());
        Ok(driver.clone())
    }

    async fn delete_driver(&self, id: Uuid) -> AppResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.drivers.remove(&id).is_none() {
            return Ok(false);
        }
        for route in tables.routes.values_mut() {
            if route.am_driver_id == Some(id) {
                route.am_driver_id = None;
            }
            if route.pm_driver_id == Some(id) {
                route.pm_driver_id = None;
            }
        }
        Ok(true)
    }

    async fn insert_assignment(&self, assignment: &RouteAssignment) -> AppResult<RouteAssignment> {
        let mut tables = self.tables.write().await;
        if !tables.routes.contains_key(&assignment.route_id) {
            return Err(not_found_error("Route", &assignment.route_id.to_string()));
        }
        if !tables.buses.contains_key(&assignment.bus_id) {
            return Err(not_found_error("Bus", &assignment.bus_id.to_string()));
        }
        tables.assignments.insert(assignment.id, assignment.clone());
        Ok(assignment.clone())
    }

    async fn count_students_for_bus(&self, bus_id: Uuid) -> AppResult<i64> {
        let tables = self.tables.read().await;
        let count = tables
            .students
            .values()
            .filter_map(|s| s.route_assignment_id)
            .filter_map(|id| tables.assignments.get(&id))
            .filter(|a| a.bus_id == bus_id)
            .count();
        Ok(count as i64)
    }

    async fn list_families(&self) -> AppResult<Vec<Family>> {
        let tables = self.tables.read().await;
        Ok(sorted_by(tables.families.values().cloned(), |f| f.parent_guardian.clone()))
    }

    async fn insert_family(&self, family: &Family) -> AppResult<Family> {
        let mut tables = self.tables.write().await;
        tables.families.insert(family.id, family.clone());
        Ok(family.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::errors::AppError;
    use chrono::NaiveTime;

    async fn route_with_stops(repo: &InMemoryTransportRepository, names: &[&str]) -> (Route, Vec<RouteStop>) {
        let route = Route::new("East", NaiveDate::from_ymd_opt(2025, 9, 2).unwrap());
        repo.insert_route(&route).await.unwrap();

        let mut stops = Vec::new();
        for (i, name) in names.iter().enumerate() {
            let time = NaiveTime::from_hms_opt(7, i as u32 * 10, 0).unwrap();
            stops.push(repo.append_stop(&RouteStop::new(route.id, *name, time)).await.unwrap());
        }
        (route, stops)
    }

    fn orders(stops: &[RouteStop]) -> Vec<(String, i32)> {
        stops.iter().map(|s| (s.stop_name.clone(), s.stop_order)).collect()
    }

    #[tokio::test]
    async fn test_append_assigns_next_order() {
        let repo = InMemoryTransportRepository::new();
        let (_, stops) = route_with_stops(&repo, &["A", "B", "C"]).await;
        let order: Vec<i32> = stops.iter().map(|s| s.stop_order).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_reorder_reverses_stops() {
        let repo = InMemoryTransportRepository::new();
        let (route, stops) = route_with_stops(&repo, &["A", "B", "C"]).await;

        let ids = vec![stops[2].id, stops[1].id, stops[0].id];
        repo.reorder_stops(route.id, &ids).await.unwrap();

        let fresh = repo.stops_for_route(route.id).await.unwrap();
        assert_eq!(
            orders(&fresh),
            vec![("C".to_string(), 1), ("B".to_string(), 2), ("A".to_string(), 3)]
        );
    }

    #[tokio::test]
    async fn test_failed_reorder_leaves_stops_untouched() {
        let repo = InMemoryTransportRepository::new();
        let (route, stops) = route_with_stops(&repo, &["A", "B", "C"]).await;
        let before = repo.stops_for_route(route.id).await.unwrap();

        let ids = vec![stops[2].id, Uuid::new_v4(), stops[0].id];
        let result = repo.reorder_stops(route.id, &ids).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let fresh = repo.stops_for_route(route.id).await.unwrap();
        assert_eq!(fresh, before);
    }

    #[tokio::test]
    async fn test_delete_stop_renumbers_remaining() {
        let repo = InMemoryTransportRepository::new();
        let (route, stops) = route_with_stops(&repo, &["A", "B", "C"]).await;

        assert!(repo.delete_stop(route.id, stops[0].id).await.unwrap());
        assert!(!repo.delete_stop(route.id, stops[0].id).await.unwrap());

        let fresh = repo.stops_for_route(route.id).await.unwrap();
        assert_eq!(orders(&fresh), vec![("B".to_string(), 1), ("C".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_route_name_and_date_unique() {
        let repo = InMemoryTransportRepository::new();
        let date = NaiveDate::from_ymd_opt(2025, 9, 2).unwrap();
        repo.insert_route(&Route::new("East", date)).await.unwrap();

        let duplicate = repo.insert_route(&Route::new("East", date)).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
        assert!(repo.route_exists("East", date, None).await.unwrap());
        assert!(!repo.route_exists("east", date, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_count_students_for_bus_follows_assignments() {
        let repo = InMemoryTransportRepository::new();
        let route = Route::new("West", NaiveDate::from_ymd_opt(2025, 9, 2).unwrap());
        let bus = Bus::new("Bus #4", 30);
        repo.insert_route(&route).await.unwrap();
        repo.insert_bus(&bus).await.unwrap();

        let assignment = RouteAssignment::new(route.id, bus.id, route.route_date);
        repo.insert_assignment(&assignment).await.unwrap();

        let mut student = Student::new("Ava");
        student.route_assignment_id = Some(assignment.id);
        repo.insert_student(&student).await.unwrap();
        repo.insert_student(&Student::new("Ben")).await.unwrap();

        assert_eq!(repo.count_students_for_bus(bus.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_bus_clears_route_references() {
        let repo = InMemoryTransportRepository::new();
        let bus = Bus::new("Bus #9", 40);
        let mut route = Route::new("North", NaiveDate::from_ymd_opt(2025, 9, 2).unwrap());
        route.am_bus_id = Some(bus.id);
        route.pm_bus_id = Some(bus.id);
        repo.insert_bus(&bus).await.unwrap();
        repo.insert_route(&route).await.unwrap();

        assert!(repo.delete_bus(bus.id).await.unwrap());
        let route = repo.get_route(route.id).await.unwrap().unwrap();
        assert_eq!(route.am_bus_id, None);
        assert_eq!(route.pm_bus_id, None);
    }

    #[tokio::test]
    async fn test_same_name_routes_share_riders() {
        let repo = InMemoryTransportRepository::new();
        let first = Route::new("East", NaiveDate::from_ymd_opt(2025, 9, 2).unwrap());
        let second = Route::new("East", NaiveDate::from_ymd_opt(2025, 9, 3).unwrap());
        repo.insert_route(&first).await.unwrap();
        repo.insert_route(&second).await.unwrap();
        assert!(repo.insert_route(&first).await.is_err());

        let mut ava = Student::new("Ava");
        ava.am_route = Some("East".to_string());
        repo.insert_student(&ava).await.unwrap();

        // Los estudiantes guardan solo el nombre de la ruta
        let riders = repo.students_on_route("East").await.unwrap();
        assert_eq!(riders.len(), 1);
        assert_eq!(riders[0].id, ava.id);
    }
}
