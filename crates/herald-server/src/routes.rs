//! Route table of the herald HTTP surface

use crate::handlers::{
    AppState, account, health_check, publish, reserve, subscribe, unreserve,
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::trace::TraceLayer;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Account endpoints
        .route("/v1/account", get(account))
        .route("/v1/account/reservation", post(reserve))
        .route("/v1/account/reservation/{topic}", delete(unreserve))
        // Topic endpoints
        .route("/{topic}", put(publish).post(publish))
        .route("/{topic}/json", get(subscribe))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
