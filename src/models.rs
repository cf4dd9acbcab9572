use serde::Serialize;

/// One normalized funding-rate record.
///
/// `rate` is always a fraction of notional (0.0001 == 0.01%), and
/// `next_funding` is an RFC 3339 timestamp in the configured zone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundingRate {
    pub symbol: String,
    pub rate: f64,
    pub next_funding: String,
    pub volume_24h: f64,
    pub volume_usdt_24h: f64,
}

/// Every record one adapter call produced, in emission order.
pub type Snapshot = Vec<FundingRate>;
