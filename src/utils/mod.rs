//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores, validación
//! y ejecución resiliente de operaciones de base de datos.

pub mod errors;
pub mod resilience;
pub mod validation;

pub use errors::{AppError, AppResult};
