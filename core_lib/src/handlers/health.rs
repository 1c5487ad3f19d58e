//! Health check handler

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::warn;

use crate::AppState;

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let mut healthy = true;

    let metadata_status = match state.file_manager.health_check().await {
        Ok(()) => "healthy".to_string(),
        Err(e) => {
            warn!("Metadata store health check failed: {}", e);
            healthy = false;
            format!("unhealthy: {}", e)
        }
    };

    let database_status = match &state.db_manager {
        Some(db_manager) => match db_manager.health_check().await {
            Ok(()) => "healthy".to_string(),
            Err(e) => {
                warn!("Database health check failed: {}", e);
                healthy = false;
                format!("unhealthy: {}", e)
            }
        },
        None => "not configured".to_string(),
    };

    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(json!({
            "status": if healthy { "healthy" } else { "unhealthy" },
            "app": state.app_name,
            "version": state.version,
            "timestamp": chrono::Utc::now().timestamp(),
            "metadata_store": metadata_status,
            "database": database_status,
            "storage_root": state.file_manager.storage_root().display().to_string(),
        })),
    )
}
