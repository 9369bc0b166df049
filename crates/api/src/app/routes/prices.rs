use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::app::{dto, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_prices))
        .route("/refresh", post(refresh))
        .route("/reset", post(reset_to_live))
}

/// GET /prices?ids=bitcoin,ethereum&vs_currency=usd
///
/// Missing parameters fall back to the feed's configured symbols and currency.
pub async fn get_prices(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::PriceQuery>,
) -> axum::response::Response {
    let feed = &services.prices;
    let ids = match query.ids.as_deref() {
        Some(raw) => vault_infra::config::parse_symbols(raw),
        None => feed.symbols().to_vec(),
    };
    let currency = query
        .vs_currency
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| feed.currency().to_string());

    Json(feed.get_prices(&ids, currency.trim()).await).into_response()
}

pub async fn refresh(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    Json(services.prices.refresh().await).into_response()
}

pub async fn reset_to_live(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    Json(services.prices.reset_to_live().await).into_response()
}
