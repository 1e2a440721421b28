//! Router construction for the sankey server.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use crate::service::SankeyService;

/// Build the axum router with all routes and middleware.
pub fn build_router(service: Arc<SankeyService>) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/get-sankey-data", get(handlers::get_sankey_data))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(service)
}
