use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use vault_core::{AccountId, Amount};
use vault_infra::audit_log::AuditEntry;
use vault_infra::ledger::LedgerError;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_accounts))
        .route("/:id/balance", get(get_balance))
        .route("/:id/deposit", post(deposit))
        .route("/:id/withdraw", post(withdraw))
        .route("/:id/history", get(get_history))
}

pub async fn list_accounts(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let balances: Vec<dto::BalanceResponse> = services
        .ledger
        .accounts()
        .into_iter()
        .map(|id| dto::BalanceResponse::new(id, services.ledger.balance_of(id)))
        .collect();

    Json(serde_json::json!({
        "accounts": balances,
        "total_held": services.ledger.total_held().to_ether_string(),
    }))
    .into_response()
}

pub async fn get_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let account = match dto::parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    Json(dto::BalanceResponse::new(account, services.ledger.balance_of(account))).into_response()
}

pub async fn deposit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::AmountRequest>, JsonRejection>,
) -> axum::response::Response {
    let (account, amount) = match parse_mutation(&id, body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    run_mutation(services, account, amount, |services, account, amount| {
        services.ledger.deposit(account, amount)
    })
    .await
}

pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::AmountRequest>, JsonRejection>,
) -> axum::response::Response {
    let (account, amount) = match parse_mutation(&id, body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    run_mutation(services, account, amount, |services, account, amount| {
        services.ledger.withdraw(account, amount)
    })
    .await
}

/// GET /accounts/:id/history?order=asc|desc
pub async fn get_history(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(query): Query<dto::HistoryQuery>,
) -> axum::response::Response {
    let account = match dto::parse_account_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let order = match dto::parse_order(query.order.as_deref(), services.history.order()) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let view = services.history.reconstruct_ordered(account, order).await;
    Json(dto::HistoryResponse::new(account, &view)).into_response()
}

fn parse_mutation(
    id: &str,
    body: Result<Json<dto::AmountRequest>, JsonRejection>,
) -> Result<(AccountId, Amount), axum::response::Response> {
    let account = dto::parse_account_id(id)?;
    let amount = dto::parse_amount_body(body)?;
    Ok((account, amount))
}

/// Ledger calls may wait on a busy account, so they run off the async workers.
async fn run_mutation<F>(
    services: Arc<AppServices>,
    account: AccountId,
    amount: Amount,
    op: F,
) -> axum::response::Response
where
    F: FnOnce(&AppServices, AccountId, Amount) -> Result<AuditEntry, LedgerError> + Send + 'static,
{
    let joined = tokio::task::spawn_blocking(move || {
        let result = op(&services, account, amount);
        result.map(|entry| (entry, services.ledger.balance_of(account)))
    })
    .await;

    match joined {
        Ok(Ok((entry, balance))) => (
            StatusCode::CREATED,
            Json(dto::MutationResponse {
                entry: dto::EntryResponse::from(&entry),
                balance: dto::BalanceResponse::new(account, balance),
            }),
        )
            .into_response(),
        Ok(Err(e)) => errors::ledger_error_to_response(e),
        Err(e) => {
            tracing::error!(error = %e, "ledger task failed");
            errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "ledger task failed")
        }
    }
}
