//! Read-only audit log inspection.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use vault_infra::audit_log::{AuditLog, EventFilter, Pagination};

use crate::app::{dto, errors, services::AppServices};

pub fn router() -> Router {
    Router::new().route("/", get(list_events))
}

/// GET /events?account=X&kind=deposit&from=1&to=100&limit=50&after=0
///
/// Entries come back in sequence order. `next_after` is set when the page is
/// full and more entries may follow.
pub async fn list_events(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::EventListQuery>,
) -> axum::response::Response {
    let mut filter = EventFilter::all();
    if let Some(raw) = query.account.as_deref() {
        match dto::parse_account_id(raw) {
            Ok(account) => filter.account = Some(account),
            Err(resp) => return resp,
        }
    }
    if let Some(raw) = query.kind.as_deref() {
        match dto::parse_kind(raw) {
            Ok(kind) => filter.kind = Some(kind),
            Err(resp) => return resp,
        }
    }
    filter.from_sequence = query.from;
    filter.to_sequence = query.to;

    let page = Pagination::new(query.limit, query.after);
    let after = page.after.max(filter.from_sequence.unwrap_or(1).saturating_sub(1));

    let log = services.ledger.audit_log();
    let entries = match log.page(&filter, after, page.limit as usize) {
        Ok(v) => v,
        Err(e) => return errors::audit_error_to_response(e),
    };
    let head = match log.head() {
        Ok(v) => v,
        Err(e) => return errors::audit_error_to_response(e),
    };

    let next_after = if entries.len() == page.limit as usize {
        entries.last().map(|e| e.sequence)
    } else {
        None
    };

    Json(dto::EventListResponse {
        head,
        events: entries.iter().map(dto::EntryResponse::from).collect(),
        next_after,
    })
    .into_response()
}
