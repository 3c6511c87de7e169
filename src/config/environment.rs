//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno y variables de configuración.
//! Todas las variables tienen un valor por defecto razonable para desarrollo.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::Level;

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    /// Sin `DATABASE_URL` el servidor usa el repositorio en memoria
    pub database_url: Option<String>,
    pub reports_dir: PathBuf,
    pub db_max_retries: u32,
    pub cors_origins: Vec<String>,
    pub log_level: Level,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
            database_url: None,
            reports_dir: PathBuf::from("reports"),
            db_max_retries: 3,
            cors_origins: Vec::new(),
            log_level: Level::DEBUG,
        }
    }
}

impl EnvironmentConfig {
    /// Leer la configuración desde variables de entorno
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            environment: env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            port: parse_or("PORT", defaults.port),
            host: env::var("HOST").unwrap_or(defaults.host),
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            reports_dir: env::var("REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.reports_dir),
            db_max_retries: parse_or("DB_MAX_RETRIES", defaults.db_max_retries),
            cors_origins: env::var("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            log_level: parse_or("LOG_LEVEL", defaults.log_level),
        }
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la dirección del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("⚠️ Valor inválido para {}: '{}', usando el valor por defecto", key, raw);
                default
            }
        },
        Err(_) => default,
    }
}
