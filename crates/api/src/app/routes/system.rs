use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use vault_infra::projections::audit_conservation;

use crate::app::{dto, errors, services::AppServices};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub fn audit_router() -> Router {
    Router::new().route("/conservation", get(conservation))
}

/// Replays the audit log and compares it with live balances.
pub async fn conservation(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    match audit_conservation(&services.ledger) {
        Ok(report) => Json(dto::ConservationResponse::from(&report)).into_response(),
        Err(e) => errors::audit_error_to_response(e),
    }
}
