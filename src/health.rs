use axum::extract::State;

use crate::error::AppError;
use crate::response::Envelope;
use crate::state::AppState;

/// Answers 200 once the database responds to `SELECT 1`.
pub async fn health_check_handler(State(state): State<AppState>) -> Result<Envelope<()>, AppError> {
    tracing::trace!("health_check started");

    let health = state.health.clone();
    crate::run_blocking(move || health.ping().map_err(AppError::from)).await?;

    Ok(Envelope::message("Database connection is healthy"))
}
