//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: ledger, audit log, history and price feed wiring
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and input parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use vault_infra::config::VaultConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: &VaultConfig) -> Router {
    build_router(Arc::new(services::build_services(config)))
}

/// Router over already-wired services; tests use this to inject collaborators.
pub fn build_router(services: Arc<services::AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(Extension(services))
        .layer(ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::trace_requests)))
}
