//! Modelo de Student
//!
//! Mapea a la tabla `students`. Las rutas AM/PM se referencian por nombre,
//! comparando exactamente (sensible a mayúsculas) con `routes.route_name`.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::route::RouteTimeSlot;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Student {
    pub id: Uuid,
    pub student_number: Option<String>,
    pub student_name: String,
    pub grade: Option<String>,
    pub school: Option<String>,
    pub home_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub home_phone: Option<String>,
    pub parent_guardian: Option<String>,
    pub emergency_phone: Option<String>,
    pub bus_stop: Option<String>,
    pub am_route: Option<String>,
    pub pm_route: Option<String>,
    pub active: bool,
    pub family_id: Option<Uuid>,
    pub route_assignment_id: Option<Uuid>,
    pub transportation_notes: Option<String>,
    pub medical_notes: Option<String>,
    pub enrollment_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Student {
    /// Estudiante activo sin rutas asignadas
    pub fn new(student_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_number: None,
            student_name: student_name.into(),
            grade: None,
            school: None,
            home_address: None,
            city: None,
            state: None,
            zip: None,
            home_phone: None,
            parent_guardian: None,
            emergency_phone: None,
            bus_stop: None,
            am_route: None,
            pm_route: None,
            active: true,
            family_id: None,
            route_assignment_id: None,
            transportation_notes: None,
            medical_notes: None,
            enrollment_date: None,
            created_at: Utc::now(),
        }
    }

    /// Dirección completa omitiendo las partes vacías
    pub fn full_address(&self) -> String {
        [&self.home_address, &self.city, &self.state, &self.zip]
            .iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// ¿Viaja el estudiante en esta ruta para el turno indicado?
    pub fn rides_route(&self, route_name: &str, slot: RouteTimeSlot) -> bool {
        let am = self.am_route.as_deref() == Some(route_name);
        let pm = self.pm_route.as_deref() == Some(route_name);
        match slot {
            RouteTimeSlot::Am => am,
            RouteTimeSlot::Pm => pm,
            RouteTimeSlot::Both => am || pm,
        }
    }

    pub fn has_any_route(&self) -> bool {
        self.am_route.is_some() || self.pm_route.is_some()
    }
}
