use super::{AppState, handlers};
use axum::Router;
use axum::routing::get;

/// Builds the Axum router with all data routes and shared state.
pub fn build(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/rates", get(handlers::get_all_rates))
        .route("/rates/{exchange}", get(handlers::get_exchange_rates))
        .route("/status", get(handlers::get_status))
        .with_state(state)
}
