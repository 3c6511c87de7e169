//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos que mapean al schema
//! PostgreSQL y el agregado `RoutePlan` con las reglas de asignación.

pub mod analytics;
pub mod bus;
pub mod driver;
pub mod family;
pub mod route;
pub mod route_assignment;
pub mod route_plan;
pub mod route_stop;
pub mod student;

pub use bus::{Bus, BusStatus};
pub use driver::Driver;
pub use family::Family;
pub use route::{Route, RouteStatus, RouteTimeSlot};
pub use route_assignment::RouteAssignment;
pub use route_plan::{ActivationIssue, RouteChange, RoutePlan, RouteValidationResult};
pub use route_stop::RouteStop;
pub use student::Student;
