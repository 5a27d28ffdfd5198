//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store backend, award service and notification worker
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs and path parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use sourcing_infra::EngineConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, BootstrapError};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &EngineConfig) -> Result<Router, BootstrapError> {
    let services = services::build_services(config).await?;
    Ok(build_app_with(Arc::new(services)))
}

/// Build the router around already wired services.
pub fn build_app_with(services: Arc<AppServices>) -> Router {
    // Protected routes: require gateway tenant + principal headers.
    let protected = routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn(middleware::gateway_context))
            .layer(Extension(services)),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
