//! API routes and handlers
//!
//! This module defines all API endpoints and their routing.

use axum::{
    extract::{rejection::QueryRejection, Query},
    routing::get,
    Router,
};
use tracing::error;

use crate::services::AuditServiceError;
use crate::utils::{AppError, AppResult};
use crate::AppState;

mod audit_logs;
mod dashboard;
mod health;

pub use health::*;

/// Public API routes (no authentication required)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // Health check endpoints
        .route("/health", get(health::health_check))
        .route("/health/detailed", get(health::health_check_detailed))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
}

/// Protected API routes (authentication required)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .nest("/audit-logs", audit_logs::routes())
        .nest("/dashboard", dashboard::routes())
}

/// Unwrap query parameters; a malformed query is a JSON 400
fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> AppResult<T> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

/// Map a service failure to a response. Store failures are logged in full
/// and answered with `message` only.
fn service_error(err: AuditServiceError, message: &str) -> AppError {
    match err {
        AuditServiceError::Unauthorized => {
            AppError::unauthorized("Caller is not associated with a municipality")
        }
        AuditServiceError::InvalidFilter(errors) => errors.into(),
        AuditServiceError::ExportTooLarge { matched, limit } => AppError::bad_request(format!(
            "Export matches {} entries, above the limit of {}; narrow the filter",
            matched, limit
        )),
        other => {
            error!(error = %other, "{}", message);
            AppError::internal(message)
        }
    }
}
