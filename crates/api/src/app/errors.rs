use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use vault_infra::audit_log::AuditLogError;
use vault_infra::ledger::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::InvalidAmount(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_amount", msg),
        e @ LedgerError::InsufficientBalance { .. } => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_balance", e.to_string())
        }
        e @ LedgerError::ReentrancyRejected { .. } => {
            json_error(StatusCode::CONFLICT, "reentrancy_rejected", e.to_string())
        }
        e @ LedgerError::Busy { .. } => json_error(StatusCode::CONFLICT, "account_busy", e.to_string()),
        e @ LedgerError::Overflow => json_error(StatusCode::UNPROCESSABLE_ENTITY, "overflow", e.to_string()),
        LedgerError::Payout(e) => json_error(StatusCode::BAD_GATEWAY, "payout_failed", e.to_string()),
        LedgerError::AuditLog(e) => audit_error_to_response(e),
        e @ (LedgerError::Invariant(_) | LedgerError::Poisoned) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", e.to_string())
        }
    }
}

pub fn audit_error_to_response(err: AuditLogError) -> axum::response::Response {
    match err {
        AuditLogError::InvalidQuery(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_query", msg),
        e => json_error(StatusCode::INTERNAL_SERVER_ERROR, "audit_log_error", e.to_string()),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
