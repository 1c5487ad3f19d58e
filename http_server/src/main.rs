//! Main entry point for the file service binary

use anyhow::Result;
use filedesk_core::{
    config::DatabaseConfig, create_app_with_config, get_database_pool, run_migrations,
    run_server, AppConfig, AppState, DatabaseManager, FileManager, FileRepositoryTrait,
    LocalBlobStore, MemoryFileRepository, SqliteFileRepository,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());
    info!("Upload directory: {}", config.files.upload_dir.display());

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    let (repository, db_manager) = match initialize_database(&config.database).await {
        Ok((db_manager, repository)) => {
            info!("Metadata store: SQLite ({})", config.database.url);
            (repository, Some(db_manager))
        }
        Err(e) => {
            warn!(
                "Failed to initialize database, falling back to in-memory metadata: {}",
                e
            );
            let repository: Arc<dyn FileRepositoryTrait> = Arc::new(MemoryFileRepository::new());
            (repository, None)
        }
    };

    let blobs = Arc::new(LocalBlobStore::new(config.files.upload_dir.clone()));
    let file_manager = FileManager::new(repository, blobs);

    file_manager
        .initialize()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize file manager: {}", e))?;

    match file_manager.check_consistency().await {
        Ok(report) if report.is_consistent() => {
            info!("Metadata and blob storage are consistent");
        }
        Ok(report) => {
            warn!(
                records_without_blob = ?report.records_without_blob,
                blobs_without_record = ?report.blobs_without_record,
                "Metadata and blob storage disagree"
            );
        }
        Err(e) => warn!("Consistency check failed: {}", e),
    }

    let mut state = AppState::new(file_manager);
    if let Some(db_manager) = db_manager {
        state = state.with_database(db_manager);
    }

    info!("App: {} v{}", state.app_name, state.version);

    let app = create_app_with_config(state, &config);

    run_server(app, addr).await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn initialize_database(
    config: &DatabaseConfig,
) -> Result<(DatabaseManager, Arc<dyn FileRepositoryTrait>)> {
    let pool = get_database_pool(config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?;

    run_migrations(pool.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run database migrations: {}", e))?;

    let db_manager = DatabaseManager::new(pool.clone());
    let repository: Arc<dyn FileRepositoryTrait> = Arc::new(SqliteFileRepository::new(pool));

    Ok((db_manager, repository))
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if cfg!(debug_assertions) {
            "debug"
        } else {
            "info"
        };

        format!(
            "filedesk={level},filedesk_core={level},tower_http=debug,axum=debug",
            level = default_level
        )
        .into()
    });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
