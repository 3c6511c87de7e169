use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info, warn};

use school_bus_routing::config::{DatabaseConfig, EnvironmentConfig};
use school_bus_routing::database::DatabaseConnection;
use school_bus_routing::repositories::PgTransportRepository;
use school_bus_routing::{create_app_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();
    let config = EnvironmentConfig::from_env();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    info!("🚌 School Bus Routing API");
    info!("================================================");
    info!("🌍 Entorno: {}", config.environment);

    let app_state = match config.database_url.clone() {
        Some(url) => {
            let connection = match DatabaseConnection::connect(&DatabaseConfig::new(url)).await {
                Ok(conn) => conn,
                Err(e) => {
                    error!("❌ Error conectando a la base de datos: {}", e);
                    return Err(anyhow::anyhow!("Error de base de datos: {}", e));
                }
            };
            connection.run_migrations().await?;

            let repository = Arc::new(PgTransportRepository::new(connection.clone()));
            AppState::new(repository, config.clone(), Some(connection))
        }
        None => {
            warn!("⚠️ DATABASE_URL no configurada, usando repositorio en memoria");
            AppState::in_memory(config.clone())
        }
    };

    tokio::fs::create_dir_all(&config.reports_dir).await?;
    info!("📁 Reportes en {}", config.reports_dir.display());

    let app = create_app_router(app_state);
    let addr: SocketAddr = config.server_url().parse()?;

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Estado del servicio");
    info!("🎒 /api/students - Estudiantes");
    info!("🛣️ /api/routes - Rutas, paradas y asignaciones");
    info!("🚌 /api/buses - Buses");
    info!("👤 /api/drivers - Conductores");
    info!("📄 /api/reports - Exportaciones y horarios");
    info!("📥 /api/import - Importación de familias y estudiantes");

    // Iniciar servidor en background
    let server_handle = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                error!("❌ Error del servidor: {}", e);
                e
            })
    });

    // Esperar a que el servidor termine
    if let Err(e) = server_handle.await? {
        error!("❌ Servidor terminó con error: {}", e);
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
