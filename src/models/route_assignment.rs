//! Modelo de RouteAssignment
//!
//! Vincula una ruta con un bus (y opcionalmente un tutor) en una fecha.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct RouteAssignment {
    pub id: Uuid,
    pub route_id: Uuid,
    pub bus_id: Uuid,
    pub guardian_id: Option<Uuid>,
    pub assignment_date: NaiveDate,
}

impl RouteAssignment {
    pub fn new(route_id: Uuid, bus_id: Uuid, assignment_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            route_id,
            bus_id,
            guardian_id: None,
            assignment_date,
        }
    }
}
