use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{Route, RoutePlan, RouteStatus, RouteStop, RouteTimeSlot, Student};
use crate::utils::validation::validate_not_empty;

// Request para crear una ruta
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRouteRequest {
    #[validate(length(min = 1, max = 50), custom = "validate_not_empty")]
    pub route_name: String,
    pub route_date: NaiveDate,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub school: Option<String>,
    pub boundaries: Option<String>,
    pub distance: Option<Decimal>,
    #[validate(range(min = 0))]
    pub estimated_duration_minutes: Option<i32>,
}

impl CreateRouteRequest {
    pub fn into_route(self) -> Route {
        let mut route = Route::new(self.route_name, self.route_date);
        route.description = self.description;
        route.school = self.school;
        route.boundaries = self.boundaries;
        route.distance = self.distance;
        route.estimated_duration_minutes = self.estimated_duration_minutes;
        route
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateRouteRequest {
    #[validate(length(min = 1, max = 50))]
    pub route_name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub school: Option<String>,
    pub boundaries: Option<String>,
    pub distance: Option<Decimal>,
    #[validate(range(min = 0))]
    pub estimated_duration_minutes: Option<i32>,
}

impl UpdateRouteRequest {
    pub fn apply_to(self, route: &mut Route) {
        if let Some(v) = self.route_name {
            route.route_name = v;
        }
        if let Some(v) = self.description {
            route.description = Some(v);
        }
        if let Some(v) = self.school {
            route.school = Some(v);
        }
        if let Some(v) = self.boundaries {
            route.boundaries = Some(v);
        }
        if let Some(v) = self.distance {
            route.distance = Some(v);
        }
        if let Some(v) = self.estimated_duration_minutes {
            route.estimated_duration_minutes = Some(v);
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RouteSearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderStopsRequest {
    pub stop_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddStopRequest {
    #[validate(length(min = 1, max = 100), custom = "validate_not_empty")]
    pub stop_name: String,
    #[validate(length(max = 200))]
    pub address: Option<String>,
    pub scheduled_time: NaiveTime,
}

#[derive(Debug, Deserialize)]
pub struct AssignBusRequest {
    pub bus_id: Uuid,
    #[serde(default)]
    pub slot: RouteTimeSlot,
}

#[derive(Debug, Deserialize)]
pub struct AssignDriverRequest {
    pub driver_id: Uuid,
    #[serde(default)]
    pub slot: RouteTimeSlot,
}

#[derive(Debug, Deserialize)]
pub struct TransitionStatusRequest {
    pub status: RouteStatus,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CloneRouteRequest {
    #[validate(length(min = 1, max = 50))]
    pub new_name: String,
    pub new_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct CanAssignQuery {
    pub student_id: Uuid,
}

// Response con el plan completo de la ruta y sus valores derivados
#[derive(Debug, Serialize)]
pub struct RoutePlanResponse {
    pub route: Route,
    pub display_name: String,
    pub status_indicator: String,
    pub assigned_count: usize,
    pub max_capacity: i32,
    pub available_capacity: usize,
    pub is_at_capacity: bool,
    pub utilization_rate: f64,
    pub efficiency_score: f64,
    pub estimated_total_minutes: i64,
    pub has_am_assignment: bool,
    pub has_pm_assignment: bool,
    pub stops: Vec<RouteStop>,
    pub students: Vec<Student>,
}

impl From<&RoutePlan> for RoutePlanResponse {
    fn from(plan: &RoutePlan) -> Self {
        Self {
            route: plan.route.clone(),
            display_name: plan.display_name(),
            status_indicator: plan.status_indicator().to_string(),
            assigned_count: plan.assigned_count(),
            max_capacity: plan.max_capacity(),
            available_capacity: plan.available_capacity(),
            is_at_capacity: plan.is_at_capacity(),
            utilization_rate: plan.utilization_rate(),
            efficiency_score: plan.efficiency_score(),
            estimated_total_minutes: plan.estimated_total_time().num_minutes(),
            has_am_assignment: plan.has_am_assignment(),
            has_pm_assignment: plan.has_pm_assignment(),
            stops: plan.stops().to_vec(),
            students: plan.assigned_students().to_vec(),
        }
    }
}
