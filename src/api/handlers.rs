use super::AppState;
use super::models::{AllRatesResponse, ExchangeRatesResponse, StatusResponse};
use axum::{
    extract::{Path, State},
    response::Json,
};

/// GET /health: simple liveness check
pub async fn health() -> &'static str {
    "OK"
}

/// GET /rates: every cached snapshot, keyed by exchange
pub async fn get_all_rates(State(state): State<AppState>) -> Json<AllRatesResponse> {
    let exchanges = state.cache.get_all_rates().into_iter().collect();
    Json(AllRatesResponse {
        last_update: state.cache.get_last_update(),
        exchanges,
    })
}

/// GET /rates/{exchange}: one exchange's snapshot (e.g. binance).
/// Unknown or not-yet-refreshed exchanges return an empty list.
pub async fn get_exchange_rates(
    State(state): State<AppState>,
    Path(exchange): Path<String>,
) -> Json<ExchangeRatesResponse> {
    let exchange = exchange.to_lowercase();
    let rates = state.cache.get_rates(&exchange);
    Json(ExchangeRatesResponse { exchange, rates })
}

/// GET /status: per-exchange refresh bookkeeping
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        last_update: state.cache.get_last_update(),
        exchanges: state.status.all(),
    })
}
