//! Services module
//!
//! Este módulo contiene la lógica de negocio de la aplicación. Cada servicio
//! recibe el repositorio compartido y la política de reintentos.

pub mod bus_service;
pub mod driver_service;
pub mod import_service;
pub mod report_service;
pub mod route_service;
pub mod student_service;

pub use bus_service::BusService;
pub use driver_service::DriverService;
pub use import_service::{ImportService, ImportSummary};
pub use report_service::ReportService;
pub use route_service::{AddressAssignmentReport, RouteService};
pub use student_service::StudentService;
