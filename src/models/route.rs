//! Modelo de Route
//!
//! Este módulo contiene el struct Route, su estado de construcción y el
//! turno (AM/PM) de las asignaciones. Mapea a la tabla `routes`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Estado de construcción de la ruta - mapea al ENUM route_building_status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Type, PartialEq, Eq)]
#[sqlx(type_name = "route_building_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Draft,
    InProgress,
    Review,
    Active,
    Inactive,
    Archived,
}

impl RouteStatus {
    /// Transiciones permitidas:
    /// Draft → InProgress → Review → Active ⇄ Inactive → Archived
    pub fn can_transition_to(self, next: RouteStatus) -> bool {
        use RouteStatus::*;
        matches!(
            (self, next),
            (Draft, InProgress)
                | (InProgress, Review)
                | (Review, Active)
                | (Active, Inactive)
                | (Inactive, Active)
                | (Inactive, Archived)
        )
    }

    pub fn indicator(self) -> &'static str {
        match self {
            RouteStatus::Draft => "📝 Draft",
            RouteStatus::InProgress => "🔄 Building",
            RouteStatus::Review => "👀 Review",
            RouteStatus::Active => "✅ Active",
            RouteStatus::Inactive => "⏸️ Inactive",
            RouteStatus::Archived => "📦 Archived",
        }
    }
}

/// Turno de la ruta al que aplica una asignación
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RouteTimeSlot {
    #[default]
    #[serde(rename = "AM")]
    Am,
    #[serde(rename = "PM")]
    Pm,
    #[serde(rename = "Both")]
    Both,
}

impl RouteTimeSlot {
    pub fn includes_am(self) -> bool {
        matches!(self, RouteTimeSlot::Am | RouteTimeSlot::Both)
    }

    pub fn includes_pm(self) -> bool {
        matches!(self, RouteTimeSlot::Pm | RouteTimeSlot::Both)
    }
}

impl std::fmt::Display for RouteTimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteTimeSlot::Am => write!(f, "AM"),
            RouteTimeSlot::Pm => write!(f, "PM"),
            RouteTimeSlot::Both => write!(f, "Both"),
        }
    }
}

/// Route principal - mapea a la tabla routes
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct Route {
    pub id: Uuid,
    pub route_name: String,
    pub route_date: NaiveDate,
    pub description: Option<String>,
    pub school: Option<String>,
    /// Palabras clave de zona (p. ej. "east of Hwy 287") para la asignación por dirección
    pub boundaries: Option<String>,
    pub is_active: bool,
    pub building_status: RouteStatus,
    pub am_bus_id: Option<Uuid>,
    pub am_driver_id: Option<Uuid>,
    pub pm_bus_id: Option<Uuid>,
    pub pm_driver_id: Option<Uuid>,
    /// Distancia en millas
    pub distance: Option<Decimal>,
    pub estimated_duration_minutes: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl Route {
    /// Ruta nueva: inactiva y en borrador hasta completar su configuración
    pub fn new(route_name: impl Into<String>, route_date: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            route_name: route_name.into(),
            route_date,
            description: None,
            school: None,
            boundaries: None,
            is_active: false,
            building_status: RouteStatus::Draft,
            am_bus_id: None,
            am_driver_id: None,
            pm_bus_id: None,
            pm_driver_id: None,
            distance: None,
            estimated_duration_minutes: None,
            created_at: Utc::now(),
        }
    }

    /// ¿Usa este bus en alguno de sus turnos?
    pub fn uses_bus(&self, bus_id: Uuid) -> bool {
        self.am_bus_id == Some(bus_id) || self.pm_bus_id == Some(bus_id)
    }

    pub fn uses_driver(&self, driver_id: Uuid) -> bool {
        self.am_driver_id == Some(driver_id) || self.pm_driver_id == Some(driver_id)
    }
}
