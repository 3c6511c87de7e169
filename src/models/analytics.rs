//! Modelos de Analytics
//!
//! Estadísticas agregadas de utilización de rutas y de estudiantes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Utilización global de las rutas
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteUtilizationStats {
    pub total_routes: usize,
    pub total_assigned_students: usize,
    pub total_unassigned_students: usize,
    pub total_capacity: i64,
    pub average_utilization_rate: f64,
    pub routes_at_capacity: usize,
    /// Rutas con utilización < 50 %
    pub underutilized_routes: usize,
    pub total_estimated_distance: f64,
    pub total_estimated_minutes: i64,
    pub overall_efficiency_score: f64,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StudentStatistics {
    pub total: usize,
    pub active: usize,
    pub inactive: usize,
    pub with_am_route: usize,
    pub with_pm_route: usize,
    pub unassigned: usize,
}
