//! Dashboard statistics endpoint

use axum::{extract::State, routing::get, Json, Router};

use super::service_error;
use crate::{middleware::AuthUser, models::DashboardStats, utils::AppResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/stats", get(get_dashboard_stats))
}

async fn get_dashboard_stats(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DashboardStats>> {
    let stats = state
        .audit
        .get_dashboard_stats(&auth_user.caller())
        .await
        .map_err(|e| service_error(e, "Failed to fetch dashboard statistics"))?;

    Ok(Json(stats))
}
