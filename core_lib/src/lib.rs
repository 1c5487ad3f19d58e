//! Core library for the file service: storage, metadata, and route handlers.

pub mod config;
pub mod database;
pub mod error;
pub mod files;
pub mod handlers;
pub mod middleware;

pub use config::AppConfig;
pub use database::{get_database_pool, run_migrations, DatabaseManager};
pub use error::{AppError, Result};
pub use files::{
    BlobStore, FileManager, FileRecord, FileRepositoryTrait, FileUpload, LocalBlobStore,
    MemoryFileRepository, Preview, SqliteFileRepository,
};
pub use handlers::routes::create_routes;
pub use middleware::cors::{cors_layer_from_config, cors_layer_permissive};

use axum::{extract::DefaultBodyLimit, Router};
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub file_manager: FileManager,
    pub db_manager: Option<DatabaseManager>,
}

impl AppState {
    pub fn new(file_manager: FileManager) -> Self {
        Self {
            app_name: "filedesk".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            file_manager,
            db_manager: None,
        }
    }

    pub fn with_database(mut self, db_manager: DatabaseManager) -> Self {
        self.db_manager = Some(db_manager);
        self
    }
}

pub fn create_app(state: AppState) -> Router {
    create_app_with_config(state, &AppConfig::default())
}

pub fn create_app_with_config(state: AppState, config: &AppConfig) -> Router {
    let mut router = Router::new().merge(create_routes());

    router = router.layer(DefaultBodyLimit::max(config.max_upload_bytes()));

    router = router.layer(cors_layer_from_config(&config.cors));

    router = middleware::logging::with_request_logging(router);

    router.with_state(state)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
