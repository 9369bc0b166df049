use axum::Router;

pub mod accounts;
pub mod events;
pub mod prices;
pub mod system;

/// Router for every endpoint except `/health`.
pub fn router() -> Router {
    Router::new()
        .nest("/accounts", accounts::router())
        .nest("/events", events::router())
        .nest("/prices", prices::router())
        .nest("/audit", system::audit_router())
}
