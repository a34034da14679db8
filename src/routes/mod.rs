use axum::Router;

use crate::{error::AppError, state::SharedState};

/// Swagger UI.
pub mod docs;
/// Health check route.
pub mod health;
/// Room routes.
pub mod room;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(room::router())
        .merge(docs::router())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found() -> AppError {
    AppError::NotFound("page not found".into())
}
