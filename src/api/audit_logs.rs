//! Audit log API endpoints

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use super::{query_params, service_error};
use crate::{
    middleware::AuthUser,
    models::{AuditFilterOptions, AuditLogFilter, AuditLogPage},
    utils::AppResult,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_audit_logs))
        .route("/export", get(export_audit_logs))
        .route("/filters", get(get_filter_options))
}

async fn list_audit_logs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    query: Result<Query<AuditLogFilter>, QueryRejection>,
) -> AppResult<Json<AuditLogPage>> {
    let filter = query_params(query)?;
    let page = state
        .audit
        .list_audit_logs(&auth_user.caller(), &filter)
        .await
        .map_err(|e| service_error(e, "Failed to fetch audit logs"))?;

    Ok(Json(page))
}

async fn export_audit_logs(
    State(state): State<AppState>,
    auth_user: AuthUser,
    query: Result<Query<AuditLogFilter>, QueryRejection>,
) -> AppResult<(StatusCode, [(String, String); 2], String)> {
    let filter = query_params(query)?;
    let csv = state
        .audit
        .export_audit_logs(&auth_user.caller(), &filter)
        .await
        .map_err(|e| service_error(e, "Failed to export audit logs"))?;

    let filename = format!("audit-logs-{}.csv", Utc::now().format("%Y-%m-%d"));

    Ok((
        StatusCode::OK,
        [
            (
                "Content-Type".to_string(),
                "text/csv; charset=utf-8".to_string(),
            ),
            (
                "Content-Disposition".to_string(),
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    ))
}

async fn get_filter_options(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<AuditFilterOptions>> {
    let options = state
        .audit
        .filter_options(&auth_user.caller())
        .await
        .map_err(|e| service_error(e, "Failed to fetch audit log filters"))?;

    Ok(Json(options))
}
