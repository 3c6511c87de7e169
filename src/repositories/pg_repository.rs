//! Repositorio PostgreSQL
//!
//! Las lecturas usan el pool directamente; las escrituras de varios pasos
//! (paradas) se ejecutan dentro de `execute_with_transaction`.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use super::TransportRepository;
use crate::database::DatabaseConnection;
use crate::models::route_stop::plan_stop_order;
use crate::models::{Bus, Driver, Family, Route, RouteAssignment, RouteStop, Student};
use crate::utils::errors::{not_found_error, AppError, AppResult};
use crate::utils::resilience::execute_with_transaction;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Clone, Debug)]
pub struct PgTransportRepository {
    connection: DatabaseConnection,
}

impl PgTransportRepository {
    pub fn new(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

/// Convierte una violación de unicidad en `Conflict`
fn map_unique_violation(err: sqlx::Error, what: &str) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return AppError::Conflict(format!("{} already exists", what));
        }
    }
    AppError::Database(err)
}

#[async_trait]
impl TransportRepository for PgTransportRepository {
    async fn list_students(&self) -> AppResult<Vec<Student>> {
        let students = sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY student_name")
            .fetch_all(self.connection.pool())
            .await?;
        Ok(students)
    }

    async fn get_student(&self, id: Uuid) -> AppResult<Option<Student>> {
        let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE id = $1")
            .bind(id)
            .fetch_optional(self.connection.pool())
            .await?;
        Ok(student)
    }

    async fn insert_student(&self, student: &Student) -> AppResult<Student> {
        let created = sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (
                id, student_number, student_name, grade, school, home_address, city, state, zip,
                home_phone, parent_guardian, emergency_phone, bus_stop, am_route, pm_route, active,
                family_id, route_assignment_id, transportation_notes, medical_notes, enrollment_date,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            RETURNING *
            "#,
        )
        .bind(student.id)
        .bind(&student.student_number)
        .bind(&student.student_name)
        .bind(&student.grade)
        .bind(&student.school)
        .bind(&student.home_address)
        .bind(&student.city)
        .bind(&student.state)
        .bind(&student.zip)
        .bind(&student.home_phone)
        .bind(&student.parent_guardian)
        .bind(&student.emergency_phone)
        .bind(&student.bus_stop)
        .bind(&student.am_route)
        .bind(&student.pm_route)
        .bind(student.active)
        .bind(student.family_id)
        .bind(student.route_assignment_id)
        .bind(&student.transportation_notes)
        .bind(&student.medical_notes)
        .bind(student.enrollment_date)
        .bind(student.created_at)
        .fetch_one(self.connection.pool())
        .await
        .map_err(|e| map_unique_violation(e, "Student number"))?;

        Ok(created)
    }

    async fn update_student(&self, student: &Student) -> AppResult<Student> {
        let updated = sqlx::query_as::<_, Student>(
            r#"
            UPDATE students SET
                student_number = $2, student_name = $3, grade = $4, school = $5, home_address = $6,
                city = $7, state = $8, zip = $9, home_phone = $10, parent_guardian = $11,
                emergency_phone = $12, bus_stop = $13, am_route = $14, pm_route = $15, active = $16,
                family_id = $17, route_assignment_id = $18, transportation_notes = $19,
                medical_notes = $20, enrollment_date = $21
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(student.id)
        .bind(&student.student_number)
        .bind(&student.student_name)
        .bind(&student.grade)
        .bind(&student.school)
        .bind(&student.home_address)
        .bind(&student.city)
        .bind(&student.state)
        .bind(&student.zip)
        .bind(&student.home_phone)
        .bind(&student.parent_guardian)
        .bind(&student.emergency_phone)
        .bind(&student.bus_stop)
        .bind(&student.am_route)
        .bind(&student.pm_route)
        .bind(student.active)
        .bind(student.family_id)
        .bind(student.route_assignment_id)
        .bind(&student.transportation_notes)
        .bind(&student.medical_notes)
        .bind(student.enrollment_date)
        .fetch_optional(self.connection.pool())
        .await
        .map_err(|e| map_unique_violation(e, "Student number"))?;

        updated.ok_or_else(|| not_found_error("Student", &student.id.to_string()))
    }

    async fn delete_student(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(self.connection.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn student_number_exists(&self, number: &str, exclude_id: Option<Uuid>) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM students WHERE student_number = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(number)
        .bind(exclude_id)
        .fetch_one(self.connection.pool())
        .await?;
        Ok(exists.0)
    }

    async fn students_on_route(&self, route_name: &str) -> AppResult<Vec<Student>> {
        let students = sqlx::query_as::<_, Student>(
            "SELECT * FROM students WHERE am_route = $1 OR pm_route = $1 ORDER BY student_name",
        )
        .bind(route_name)
        .fetch_all(self.connection.pool())
        .await?;
        Ok(students)
    }

    async fn find_student_by_name_and_address(
        &self,
        student_name: &str,
        home_address: Option<&str>,
    ) -> AppResult<Option<Student>> {
        let student = sqlx::query_as::<_, Student>(
            "SELECT * FROM students WHERE student_name = $1 AND home_address IS NOT DISTINCT FROM $2 LIMIT 1",
        )
        .bind(student_name)
        .bind(home_address)
        .fetch_optional(self.connection.pool())
        .await?;
        Ok(student)
    }

    async fn list_routes(&self) -> AppResult<Vec<Route>> {
        let routes = sqlx::query_as::<_, Route>("SELECT * FROM routes ORDER BY route_name, route_date")
            .fetch_all(self.connection.pool())
            .await?;
        Ok(routes)
    }

    async fn get_route(&self, id: Uuid) -> AppResult<Option<Route>> {
        let route = sqlx::query_as::<_, Route>("SELECT * FROM routes WHERE id = $1")
            .bind(id)
            .fetch_optional(self.connection.pool())
            .await?;
        Ok(route)
    }

    async fn route_name_exists(&self, route_name: &str) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM routes WHERE route_name = $1)")
            .bind(route_name)
            .fetch_one(self.connection.pool())
            .await?;
        Ok(exists.0)
    }

    async fn route_exists(
        &self,
        route_name: &str,
        route_date: NaiveDate,
        exclude_id: Option<Uuid>,
    ) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM routes
                WHERE route_name = $1 AND route_date = $2 AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(route_name)
        .bind(route_date)
        .bind(exclude_id)
        .fetch_one(self.connection.pool())
        .await?;
        Ok(exists.0)
    }

    async fn insert_route(&self, route: &Route) -> AppResult<Route> {
        let created = sqlx::query_as::<_, Route>(
            r#"
            INSERT INTO routes (
                id, route_name, route_date, description, school, boundaries, is_active, building_status,
                am_bus_id, am_driver_id, pm_bus_id, pm_driver_id, distance, estimated_duration_minutes,
                created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(route.id)
        .bind(&route.route_name)
        .bind(route.route_date)
        .bind(&route.description)
        .bind(&route.school)
        .bind(&route.boundaries)
        .bind(route.is_active)
        .bind(route.building_status)
        .bind(route.am_bus_id)
        .bind(route.am_driver_id)
        .bind(route.pm_bus_id)
        .bind(route.pm_driver_id)
        .bind(route.distance)
        .bind(route.estimated_duration_minutes)
        .bind(route.created_at)
        .fetch_one(self.connection.pool())
        .await
        .map_err(|e| map_unique_violation(e, "Route with this name and date"))?;

        Ok(created)
    }

    async fn update_route(&self, route: &Route) -> AppResult<Route> {
        let updated = sqlx::query_as::<_, Route>(
            r#"
            UPDATE routes SET
                route_name = $2, route_date = $3, description = $4, school = $5, boundaries = $6,
                is_active = $7, building_status = $8, am_bus_id = $9, am_driver_id = $10,
                pm_bus_id = $11, pm_driver_id = $12, distance = $13, estimated_duration_minutes = $14
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(route.id)
        .bind(&route.route_name)
        .bind(route.route_date)
        .bind(&route.description)
        .bind(&route.school)
        .bind(&route.boundaries)
        .bind(route.is_active)
        .bind(route.building_status)
        .bind(route.am_bus_id)
        .bind(route.am_driver_id)
        .bind(route.pm_bus_id)
        .bind(route.pm_driver_id)
        .bind(route.distance)
        .bind(route.estimated_duration_minutes)
        .fetch_optional(self.connection.pool())
        .await
        .map_err(|e| map_unique_violation(e, "Route with this name and date"))?;

        updated.ok_or_else(|| not_found_error("Route", &route.id.to_string()))
    }

    async fn delete_route(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM routes WHERE id = $1")
            .bind(id)
            .execute(self.connection.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn stops_for_route(&self, route_id: Uuid) -> AppResult<Vec<RouteStop>> {
        let stops = sqlx::query_as::<_, RouteStop>(
            "SELECT * FROM route_stops WHERE route_id = $1 ORDER BY stop_order",
        )
        .bind(route_id)
        .fetch_all(self.connection.pool())
        .await?;
        Ok(stops)
    }

    async fn append_stop(&self, stop: &RouteStop) -> AppResult<RouteStop> {
        let stop = stop.clone();
        execute_with_transaction(&self.connection, "append_stop", move |tx| {
            Box::pin(async move {
                // Bloquea la ruta para serializar altas concurrentes
                sqlx::query("SELECT id FROM routes WHERE id = $1 FOR UPDATE")
                    .bind(stop.route_id)
                    .fetch_optional(&mut **tx)
                    .await?
                    .ok_or_else(|| not_found_error("Route", &stop.route_id.to_string()))?;

                let (next_order,): (i32,) = sqlx::query_as(
                    "SELECT COALESCE(MAX(stop_order), 0) + 1 FROM route_stops WHERE route_id = $1",
                )
                .bind(stop.route_id)
                .fetch_one(&mut **tx)
                .await?;

                let created = sqlx::query_as::<_, RouteStop>(
                    r#"
                    INSERT INTO route_stops (id, route_id, stop_name, address, stop_order, scheduled_time)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING *
                    "#,
                )
                .bind(stop.id)
                .bind(stop.route_id)
                .bind(&stop.stop_name)
                .bind(&stop.address)
                .bind(next_order)
                .bind(stop.scheduled_time)
                .fetch_one(&mut **tx)
                .await?;

                Ok(created)
            })
        })
        .await
    }

    async fn delete_stop(&self, route_id: Uuid, stop_id: Uuid) -> AppResult<bool> {
        execute_with_transaction(&self.connection, "delete_stop", move |tx| {
            Box::pin(async move {
                let deleted = sqlx::query("DELETE FROM route_stops WHERE id = $1 AND route_id = $2")
                    .bind(stop_id)
                    .bind(route_id)
                    .execute(&mut **tx)
                    .await?;
                if deleted.rows_affected() == 0 {
                    return Ok(false);
                }

                sqlx::query(
                    r#"
                    UPDATE route_stops SET stop_order = ordered.new_order
                    FROM (
                        SELECT id, ROW_NUMBER() OVER (ORDER BY stop_order)::int AS new_order
                        FROM route_stops WHERE route_id = $1
                    ) AS ordered
                    WHERE route_stops.id = ordered.id
                    "#,
                )
                .bind(route_id)
                .execute(&mut **tx)
                .await?;

                Ok(true)
            })
        })
        .await
    }

    async fn reorder_stops(&self, route_id: Uuid, ordered_ids: &[Uuid]) -> AppResult<Vec<RouteStop>> {
        let ordered_ids = ordered_ids.to_vec();
        execute_with_transaction(&self.connection, "reorder_stops", move |tx| {
            Box::pin(async move {
                let current = sqlx::query_as::<_, RouteStop>(
                    "SELECT * FROM route_stops WHERE route_id = $1 ORDER BY stop_order FOR UPDATE",
                )
                .bind(route_id)
                .fetch_all(&mut **tx)
                .await?;

                let plan = plan_stop_order(&current, &ordered_ids)?;
                for (stop_id, stop_order) in plan {
                    sqlx::query("UPDATE route_stops SET stop_order = $1 WHERE id = $2 AND route_id = $3")
                        .bind(stop_order)
                        .bind(stop_id)
                        .bind(route_id)
                        .execute(&mut **tx)
                        .await?;
                }

                let reordered = sqlx::query_as::<_, RouteStop>(
                    "SELECT * FROM route_stops WHERE route_id = $1 ORDER BY stop_order",
                )
                .bind(route_id)
                .fetch_all(&mut **tx)
                .await?;

                Ok(reordered)
            })
        })
        .await
    }

    async fn list_buses(&self) -> AppResult<Vec<Bus>> {
        let buses = sqlx::query_as::<_, Bus>("SELECT * FROM buses ORDER BY bus_number")
            .fetch_all(self.connection.pool())
            .await?;
        Ok(buses)
    }

    async fn get_bus(&self, id: Uuid) -> AppResult<Option<Bus>> {
        let bus = sqlx::query_as::<_, Bus>("SELECT * FROM buses WHERE id = $1")
            .bind(id)
            .fetch_optional(self.connection.pool())
            .await?;
        Ok(bus)
    }

    async fn bus_number_exists(&self, bus_number: &str, exclude_id: Option<Uuid>) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM buses WHERE bus_number = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(bus_number)
        .bind(exclude_id)
        .fetch_one(self.connection.pool())
        .await?;
        Ok(exists.0)
    }

    async fn insert_bus(&self, bus: &Bus) -> AppResult<Bus> {
        let created = sqlx::query_as::<_, Bus>(
            r#"
            INSERT INTO buses (id, bus_number, seating_capacity, vin, license_number, make, model, year, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(bus.id)
        .bind(&bus.bus_number)
        .bind(bus.seating_capacity)
        .bind(&bus.vin)
        .bind(&bus.license_number)
        .bind(&bus.make)
        .bind(&bus.model)
        .bind(bus.year)
        .bind(bus.status)
        .bind(bus.created_at)
        .fetch_one(self.connection.pool())
        .await
        .map_err(|e| map_unique_violation(e, "Bus number"))?;

        Ok(created)
    }

    async fn update_bus(&self, bus: &Bus) -> AppResult<Bus> {
        let updated = sqlx::query_as::<_, Bus>(
            r#"
            UPDATE buses SET
                bus_number = $2, seating_capacity = $3, vin = $4, license_number = $5,
                make = $6, model = $7, year = $8, status = $9
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(bus.id)
        .bind(&bus.bus_number)
        .bind(bus.seating_capacity)
        .bind(&bus.vin)
        .bind(&bus.license_number)
        .bind(&bus.make)
        .bind(&bus.model)
        .bind(bus.year)
        .bind(bus.status)
        .fetch_optional(self.connection.pool())
        .await
        .map_err(|e| map_unique_violation(e, "Bus number"))?;

        updated.ok_or_else(|| not_found_error("Bus", &bus.id.to_string()))
    }

    async fn delete_bus(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM buses WHERE id = $1")
            .bind(id)
            .execute(self.connection.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_drivers(&self) -> AppResult<Vec<Driver>> {
        let drivers = sqlx::query_as::<_, Driver>("SELECT * FROM drivers ORDER BY last_name, first_name")
            .fetch_all(self.connection.pool())
            .await?;
        Ok(drivers)
    }

    async fn get_driver(&self, id: Uuid) -> AppResult<Option<Driver>> {
        let driver = sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE id = $1")
            .bind(id)
            .fetch_optional(self.connection.pool())
            .await?;
        Ok(driver)
    }

    async fn license_number_exists(&self, license_number: &str, exclude_id: Option<Uuid>) -> AppResult<bool> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM drivers WHERE license_number = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(license_number)
        .bind(exclude_id)
        .fetch_one(self.connection.pool())
        .await?;
        Ok(exists.0)
    }

    async fn insert_driver(&self, driver: &Driver) -> AppResult<Driver> {
        let created = sqlx::query_as::<_, Driver>(
            r#"
            INSERT INTO drivers (id, first_name, last_name, license_number, license_expiration, phone, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(driver.id)
        .bind(&driver.first_name)
        .bind(&driver.last_name)
        .bind(&driver.license_number)
        .bind(driver.license_expiration)
        .bind(&driver.phone)
        .bind(driver.is_active)
        .bind(driver.created_at)
        .fetch_one(self.connection.pool())
        .await
        .map_err(|e| map_unique_violation(e, "Driver license number"))?;

        Ok(created)
    }

    async fn update_driver(&self, driver: &Driver) -> AppResult<Driver> {
        let updated = sqlx::query_as::<_, Driver>(
            r#"
            UPDATE drivers SET
                first_name = $2, last_name = $3, license_number = $4,
                license_expiration = $5, phone = $6, is_active = $7
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(driver.id)
        .bind(&driver.first_name)
        .bind(&driver.last_name)
        .bind(&driver.license_number)
        .bind(driver.license_expiration)
        .bind(&driver.phone)
        .bind(driver.is_active)
        .fetch_optional(self.connection.pool())
        .await
        .map_err(|e| map_unique_violation(e, "Driver license number"))?;

        updated.ok_or_else(|| not_found_error("Driver", &driver.id.to_string()))
    }

    async fn delete_driver(&self, id: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM drivers WHERE id = $1")
            .bind(id)
            .execute(self.connection.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_assignment(&self, assignment: &RouteAssignment) -> AppResult<RouteAssignment> {
        let created = sqlx::query_as::<_, RouteAssignment>(
            r#"
            INSERT INTO route_assignments (id, route_id, bus_id, guardian_id, assignment_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(assignment.id)
        .bind(assignment.route_id)
        .bind(assignment.bus_id)
        .bind(assignment.guardian_id)
        .bind(assignment.assignment_date)
        .fetch_one(self.connection.pool())
        .await?;
        Ok(created)
    }

    async fn count_students_for_bus(&self, bus_id: Uuid) -> AppResult<i64> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM students s
            JOIN route_assignments ra ON ra.id = s.route_assignment_id
            WHERE ra.bus_id = $1
            "#,
        )
        .bind(bus_id)
        .fetch_one(self.connection.pool())
        .await?;
        Ok(count)
    }

    async fn list_families(&self) -> AppResult<Vec<Family>> {
        let families = sqlx::query_as::<_, Family>("SELECT * FROM families ORDER BY parent_guardian")
            .fetch_all(self.connection.pool())
            .await?;
        Ok(families)
    }

    async fn insert_family(&self, family: &Family) -> AppResult<Family> {
        let created = sqlx::query_as::<_, Family>(
            r#"
            INSERT INTO families (
                id, parent_guardian, address, city, state, county, zip,
                home_phone, cell_phone, emergency_contact, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(family.id)
        .bind(&family.parent_guardian)
        .bind(&family.address)
        .bind(&family.city)
        .bind(&family.state)
        .bind(&family.county)
        .bind(&family.zip)
        .bind(&family.home_phone)
        .bind(&family.cell_phone)
        .bind(&family.emergency_contact)
        .bind(family.created_at)
        .fetch_one(self.connection.pool())
        .await?;
        Ok(created)
    }
}
