//! Modelo de Bus
//!
//! Vehículo de la flota escolar. Mapea a la tabla `buses`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Estado del bus - mapea al ENUM bus_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "bus_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BusStatus {
    #[default]
    Active,
    Maintenance,
    OutOfService,
    Retired,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Bus {
    pub id: Uuid,
    pub bus_number: String,
    pub seating_capacity: i32,
    pub vin: Option<String>,
    pub license_number: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub status: BusStatus,
    pub created_at: DateTime<Utc>,
}

impl Bus {
    pub fn new(bus_number: impl Into<String>, seating_capacity: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            bus_number: bus_number.into(),
            seating_capacity,
            vin: None,
            license_number: None,
            make: None,
            model: None,
            year: None,
            status: BusStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn is_in_service(&self) -> bool {
        self.status == BusStatus::Active
    }
}
