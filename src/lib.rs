//! School bus routing
//!
//! Gestión de rutas escolares: estudiantes, rutas AM/PM, buses, conductores,
//! paradas y reportes, sobre PostgreSQL o un repositorio en memoria.

pub mod config;
pub mod database;
pub mod dto;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use routes::create_app_router;
pub use state::AppState;
