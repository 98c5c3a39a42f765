//! Administrative handlers

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{validate_admin_key, ApiResponse, AppError, AppState, ADMIN_KEY_HEADER};

/// Response body for the migration endpoint
#[derive(Serialize)]
pub struct MigrateResponse {
    /// Total number of runner invocations recorded for this database
    pub migration_runs: i64,
}

/// POST /api/admin/migrate - Run database migrations
///
/// Guarded by the `X-API-Key` header. The key must be explicitly configured;
/// with no key set every request is rejected.
pub async fn run_migrations(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ApiResponse<MigrateResponse>>, AppError> {
    let provided = request
        .headers()
        .get(ADMIN_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !validate_admin_key(provided, state.config.admin_api_key.as_deref()) {
        warn!("Rejected admin migration request - invalid or missing API key");
        return Err(AppError::unauthorized("Invalid API key"));
    }

    let migration_runs = state.db.run_migrations()?;
    info!(migration_runs, "Admin-triggered migration completed");

    Ok(ApiResponse::ok_with_message(
        MigrateResponse { migration_runs },
        "Migrations completed",
    ))
}
