use crate::models::Snapshot;
use crate::refresh::ExchangeStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Response for GET /rates
#[derive(Serialize)]
pub struct AllRatesResponse {
    pub last_update: Option<DateTime<Utc>>,
    pub exchanges: BTreeMap<String, Snapshot>,
}

/// Response for GET /rates/{exchange}
#[derive(Serialize)]
pub struct ExchangeRatesResponse {
    pub exchange: String,
    pub rates: Snapshot,
}

/// Response for GET /status
#[derive(Serialize)]
pub struct StatusResponse {
    pub last_update: Option<DateTime<Utc>>,
    pub exchanges: Vec<ExchangeStatus>,
}
