//! Servicio de estudiantes
//!
//! Validación y persistencia de estudiantes. Toda escritura pasa por
//! `execute_with_resilience`.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::analytics::StudentStatistics;
use crate::models::Student;
use crate::repositories::TransportRepository;
use crate::utils::errors::{bad_request_error, not_found_error, AppError, AppResult};
use crate::utils::resilience::{execute_with_resilience, RetryPolicy};
use crate::utils::validation::{validate_grade, validate_phone, validate_state, validate_zip};

#[derive(Clone)]
pub struct StudentService {
    repository: Arc<dyn TransportRepository>,
    retry_policy: RetryPolicy,
}

impl StudentService {
    pub fn new(repository: Arc<dyn TransportRepository>, retry_policy: RetryPolicy) -> Self {
        Self {
            repository,
            retry_policy,
        }
    }

    pub async fn get_all_students(&self) -> AppResult<Vec<Student>> {
        let students = self.repository.list_students().await?;
        debug!("📋 {} estudiantes cargados", students.len());
        Ok(students)
    }

    pub async fn get_student_by_id(&self, id: Uuid) -> AppResult<Student> {
        self.repository
            .get_student(id)
            .await?
            .ok_or_else(|| not_found_error("Student", &id.to_string()))
    }

    /// Reglas de negocio de un estudiante. Devuelve la lista de problemas
    /// encontrados (vacía si es válido).
    pub async fn validate_student(&self, student: &Student) -> AppResult<Vec<String>> {
        let mut errors = Vec::new();

        if student.student_name.trim().is_empty() {
            errors.push("Student name is required".to_string());
        }

        if let Some(number) = non_blank(&student.student_number) {
            if self
                .repository
                .student_number_exists(number, Some(student.id))
                .await?
            {
                errors.push(format!("Student number {} is already in use", number));
            }
        }

        if let Some(grade) = non_blank(&student.grade) {
            if validate_grade(grade).is_err() {
                errors.push(format!("Invalid grade: {}", grade));
            }
        }

        for (label, phone) in [
            ("home phone", &student.home_phone),
            ("emergency phone", &student.emergency_phone),
        ] {
            if let Some(phone) = non_blank(phone) {
                if validate_phone(phone).is_err() {
                    errors.push(format!("Invalid {} format: {}", label, phone));
                }
            }
        }

        if let Some(state) = non_blank(&student.state) {
            if validate_state(state).is_err() {
                errors.push(format!("State must be a 2-letter abbreviation: {}", state));
            }
        }

        if let Some(zip) = non_blank(&student.zip) {
            if validate_zip(zip).is_err() {
                errors.push(format!("Invalid ZIP code: {}", zip));
            }
        }

        // Una ruta nueva para el estudiante ocupa plaza: misma regla de cupo
        // que la asignación desde la ruta
        let stored = self.repository.get_student(student.id).await?;
        let mut checked: Vec<&str> = Vec::new();
        for (label, route) in [("AM", &student.am_route), ("PM", &student.pm_route)] {
            let Some(route_name) = non_blank(route) else {
                continue;
            };
            if !self.repository.route_name_exists(route_name).await? {
                errors.push(format!("{} route '{}' does not exist", label, route_name));
                continue;
            }

            let already_rides = stored.as_ref().map_or(false, |s| {
                s.am_route.as_deref() == Some(route_name) || s.pm_route.as_deref() == Some(route_name)
            });
            if already_rides || checked.contains(&route_name) {
                continue;
            }
            checked.push(route_name);

            let (riders, capacity) = self.route_load(route_name, student.id).await?;
            if riders as i64 >= i64::from(capacity) {
                errors.push(format!(
                    "Route '{}' is at capacity ({}/{} students)",
                    route_name, riders, capacity
                ));
            }
        }

        Ok(errors)
    }

    /// Estudiantes en la ruta (sin contar `student_id`) y la mayor capacidad
    /// de bus entre las rutas con ese nombre
    async fn route_load(&self, route_name: &str, student_id: Uuid) -> AppResult<(usize, i32)> {
        let routes = self.repository.list_routes().await?;
        let mut capacity = 0;
        for route in routes.iter().filter(|r| r.route_name == route_name) {
            for bus_id in [route.am_bus_id, route.pm_bus_id].into_iter().flatten() {
                if let Some(bus) = self.repository.get_bus(bus_id).await? {
                    capacity = capacity.max(bus.seating_capacity);
                }
            }
        }

        let riders = self
            .repository
            .students_on_route(route_name)
            .await?
            .iter()
            .filter(|s| s.id != student_id)
            .count();
        Ok((riders, capacity))
    }

    pub async fn add_student(&self, student: Student) -> AppResult<Student> {
        self.ensure_valid(&student).await?;

        let created = execute_with_resilience("add_student", &self.retry_policy, || {
            self.repository.insert_student(&student)
        })
        .await?;

        info!("✅ Estudiante creado: {} ({})", created.student_name, created.id);
        Ok(created)
    }

    pub async fn update_student(&self, student: Student) -> AppResult<Student> {
        self.get_student_by_id(student.id).await?;
        self.ensure_valid(&student).await?;

        let updated = execute_with_resilience("update_student", &self.retry_policy, || {
            self.repository.update_student(&student)
        })
        .await?;

        info!("✅ Estudiante actualizado: {}", updated.id);
        Ok(updated)
    }

    pub async fn delete_student(&self, id: Uuid) -> AppResult<()> {
        let deleted = execute_with_resilience("delete_student", &self.retry_policy, || {
            self.repository.delete_student(id)
        })
        .await?;

        if !deleted {
            return Err(not_found_error("Student", &id.to_string()));
        }
        info!("🗑️ Estudiante eliminado: {}", id);
        Ok(())
    }

    pub async fn update_active_status(&self, id: Uuid, active: bool) -> AppResult<Student> {
        let mut student = self.get_student_by_id(id).await?;
        student.active = active;

        let updated = execute_with_resilience("update_student_active_status", &self.retry_policy, || {
            self.repository.update_student(&student)
        })
        .await?;

        info!(
            "🔄 Estudiante {} marcado como {}",
            id,
            if active { "activo" } else { "inactivo" }
        );
        Ok(updated)
    }

    pub async fn assign_student_to_bus_stop(&self, id: Uuid, bus_stop: &str) -> AppResult<Student> {
        if bus_stop.trim().is_empty() {
            return Err(bad_request_error("Bus stop is required"));
        }

        let mut student = self.get_student_by_id(id).await?;
        student.bus_stop = Some(bus_stop.trim().to_string());

        execute_with_resilience("assign_student_to_bus_stop", &self.retry_policy, || {
            self.repository.update_student(&student)
        })
        .await
    }

    /// Búsqueda sin distinguir mayúsculas en nombre, número, dirección y tutor
    pub async fn search_students(&self, term: &str) -> AppResult<Vec<Student>> {
        let students = self.repository.list_students().await?;
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return Ok(students);
        }

        Ok(students
            .into_iter()
            .filter(|s| {
                [
                    Some(&s.student_name),
                    s.student_number.as_ref(),
                    s.home_address.as_ref(),
                    s.parent_guardian.as_ref(),
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&term))
            })
            .collect())
    }

    pub async fn students_by_grade(&self, grade: &str) -> AppResult<Vec<Student>> {
        let students = self.repository.list_students().await?;
        Ok(students
            .into_iter()
            .filter(|s| s.grade.as_deref() == Some(grade))
            .collect())
    }

    /// Estudiantes en la ruta (AM o PM), por nombre exacto
    pub async fn students_by_route(&self, route_name: &str) -> AppResult<Vec<Student>> {
        self.repository.students_on_route(route_name).await
    }

    /// Estudiantes activos a los que les falta información de contacto o transporte
    pub async fn students_with_missing_info(&self) -> AppResult<Vec<Student>> {
        let students = self.repository.list_students().await?;
        Ok(students
            .into_iter()
            .filter(|s| s.active)
            .filter(|s| {
                non_blank(&s.home_address).is_none()
                    || non_blank(&s.parent_guardian).is_none()
                    || (non_blank(&s.home_phone).is_none() && non_blank(&s.emergency_phone).is_none())
                    || non_blank(&s.grade).is_none()
            })
            .collect())
    }

    pub async fn student_statistics(&self) -> AppResult<StudentStatistics> {
        let students = self.repository.list_students().await?;

        let mut stats = StudentStatistics {
            total: students.len(),
            ..StudentStatistics::default()
        };
        for student in &students {
            if student.active {
                stats.active += 1;
            } else {
                stats.inactive += 1;
            }
            if student.am_route.is_some() {
                stats.with_am_route += 1;
            }
            if student.pm_route.is_some() {
                stats.with_pm_route += 1;
            }
            if !student.has_any_route() {
                stats.unassigned += 1;
            }
        }
        Ok(stats)
    }

    async fn ensure_valid(&self, student: &Student) -> AppResult<()> {
        let errors = self.validate_student(student).await?;
        if errors.is_empty() {
            return Ok(());
        }
        warn!("⚠️ Estudiante inválido {}: {}", student.student_name, errors.join("; "));
        Err(AppError::BadRequest(errors.join("; ")))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
