//! Ejecución resiliente de operaciones de base de datos
//!
//! Reintentos acotados con backoff exponencial para fallos transitorios
//! y un envoltorio transaccional con rollback automático.

use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;

use futures::future::BoxFuture;
use sqlx::{Postgres, Transaction};
use tracing::{debug, error, info, warn};

use crate::database::DatabaseConnection;
use crate::utils::errors::{AppError, AppResult};

/// Códigos SQLSTATE de PostgreSQL considerados transitorios
pub const TRANSIENT_SQLSTATE_CODES: [&str; 12] = [
    "08000", // connection_exception
    "08001", // sqlclient_unable_to_establish_sqlconnection
    "08003", // connection_does_not_exist
    "08004", // sqlserver_rejected_establishment_of_sqlconnection
    "08006", // connection_failure
    "08007", // transaction_resolution_unknown
    "57P01", // admin_shutdown
    "57P02", // crash_shutdown
    "57P03", // cannot_connect_now
    "53300", // too_many_connections
    "40001", // serialization_failure
    "40P01", // deadlock_detected
];

/// Política de reintentos
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Espera antes del reintento tras el intento `attempt` (base 0):
    /// min(base * 2^attempt, max)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Determina si un error merece un reintento
pub fn is_transient_error(err: &AppError) -> bool {
    match err {
        AppError::Timeout(_) => true,
        AppError::Database(db_err) => is_transient_sqlx_error(db_err),
        _ => false,
    }
}

fn is_transient_sqlx_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Io(io) => matches!(
            io.kind(),
            ErrorKind::TimedOut
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::ConnectionRefused
                | ErrorKind::BrokenPipe
        ),
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| TRANSIENT_SQLSTATE_CODES.contains(&code.as_ref()))
            .unwrap_or(false),
        _ => false,
    }
}

/// Ejecuta una operación con reintentos y backoff exponencial.
///
/// La operación se invoca como máximo `max_retries + 1` veces. Los errores no
/// transitorios se propagan inmediatamente; si todos los intentos fallan de
/// forma transitoria se devuelve [`AppError::RetriesExhausted`].
pub async fn execute_with_resilience<T, F, Fut>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    if operation_name.trim().is_empty() {
        return Err(AppError::Internal("operation name is required".to_string()));
    }

    debug!(
        operation = operation_name,
        max_retries = policy.max_retries,
        "🔁 Iniciando operación resiliente"
    );

    let mut attempt: u32 = 0;
    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(
                        "✅ Operación {} completada en el intento {}",
                        operation_name,
                        attempt + 1
                    );
                }
                return Ok(value);
            }
            Err(err) if is_transient_error(&err) => {
                if attempt >= policy.max_retries {
                    error!(
                        "❌ Operación {} agotó sus {} intentos: {}",
                        operation_name,
                        attempt + 1,
                        err
                    );
                    return Err(AppError::RetriesExhausted {
                        operation: operation_name.to_string(),
                        attempts: attempt + 1,
                        source: Box::new(err),
                    });
                }

                let delay = policy.backoff_delay(attempt);
                warn!(
                    "⚠️ Operación {} falló en el intento {}, reintentando en {}ms: {}",
                    operation_name,
                    attempt + 1,
                    delay.as_millis(),
                    err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                error!(
                    "❌ Operación {} falló de forma permanente tras {} intento(s): {}",
                    operation_name,
                    attempt + 1,
                    err
                );
                return Err(err);
            }
        }
    }
}

/// Ejecuta una operación dentro de una transacción: commit si termina bien,
/// rollback ante cualquier error.
pub async fn execute_with_transaction<T, F>(
    connection: &DatabaseConnection,
    operation_name: &str,
    operation: F,
) -> AppResult<T>
where
    T: Send,
    F: for<'c> FnOnce(&'c mut Transaction<'static, Postgres>) -> BoxFuture<'c, AppResult<T>>,
{
    let mut tx = connection.begin_write().await?;
    debug!("🔒 Iniciando operación transaccional: {}", operation_name);

    match operation(&mut tx).await {
        Ok(value) => {
            tx.commit().await?;
            debug!("✅ Transacción completada: {}", operation_name);
            Ok(value)
        }
        Err(err) => {
            error!("↩️ Rollback de la transacción {}: {}", operation_name, err);
            if let Err(rollback_err) = tx.rollback().await {
                error!("❌ Error durante el rollback de {}: {}", operation_name, rollback_err);
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_default_backoff_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(4000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(8000));
        assert_eq!(policy.backoff_delay(4), Duration::from_millis(10_000));
        assert_eq!(policy.backoff_delay(40), Duration::from_millis(10_000));
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient_error(&AppError::Timeout("slow".to_string())));
        assert!(is_transient_error(&AppError::Database(sqlx::Error::PoolTimedOut)));
        assert!(is_transient_error(&AppError::Database(sqlx::Error::Io(
            std::io::Error::new(ErrorKind::ConnectionReset, "reset")
        ))));
        assert!(!is_transient_error(&AppError::Database(sqlx::Error::RowNotFound)));
        assert!(!is_transient_error(&AppError::NotFound("route".to_string())));
    }

    #[tokio::test]
    async fn test_transient_failure_exhausts_retries() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy(3);

        let result: AppResult<()> = execute_with_resilience("always_timeout", &policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Timeout("connection timeout".to_string())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(AppError::RetriesExhausted { operation, attempts, source }) => {
                assert_eq!(operation, "always_timeout");
                assert_eq!(attempts, 4);
                assert!(matches!(*source, AppError::Timeout(_)));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_transient_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy(3);

        let result: AppResult<()> = execute_with_resilience("not_found", &policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::NotFound("student".to_string())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy(3);

        let result = execute_with_resilience("flaky", &policy, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    Err(AppError::Database(sqlx::Error::PoolTimedOut))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let calls = AtomicU32::new(0);
        let policy = fast_policy(0);

        let result: AppResult<()> = execute_with_resilience("single", &policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Timeout("t".to_string())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(AppError::RetriesExhausted { attempts: 1, .. })));
    }

    #[tokio::test]
    async fn test_blank_operation_name_rejected() {
        let result: AppResult<()> =
            execute_with_resilience("  ", &fast_policy(1), || async { Ok(()) }).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }
}
