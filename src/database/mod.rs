//! Módulo de base de datos
//!
//! Maneja la conexión, las transacciones y las migraciones de PostgreSQL.

pub mod connection;

pub use connection::DatabaseConnection;
