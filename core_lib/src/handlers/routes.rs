//! Top-level route table

use axum::{routing::get, Router};

use super::{files::create_file_routes, health::handle_health};
use crate::AppState;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handle_health))
        .merge(create_file_routes())
}
