use crate::auth::CredentialProvider;
use crate::errors::ExchangeError;
use crate::models::Snapshot;
use crate::timezone::Zone;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub mod binance;
pub mod bingx;
pub mod bybit;
pub mod gate;
pub mod htx;
pub mod hyperliquid;
pub mod kucoin;
pub mod mexc;
pub mod okx;

pub use binance::Binance;
pub use bingx::BingX;
pub use bybit::Bybit;
pub use gate::Gate;
pub use htx::Htx;
pub use hyperliquid::Hyperliquid;
pub use kucoin::KuCoin;
pub use mexc::Mexc;
pub use okx::Okx;

/// Identifiers of every supported exchange, as returned by [`Exchange::name`].
pub const ALL: [&str; 9] = [
    "binance",
    "bingx",
    "bybit",
    "gate",
    "htx",
    "hyperliquid",
    "kucoin",
    "mexc",
    "okx",
];

#[async_trait]
pub trait Exchange: Send + Sync {
    /// Stable identifier, also used as the cache key.
    fn name(&self) -> &'static str;

    /// Fetches every funding rate the exchange lists, normalized.
    ///
    /// Malformed individual records are skipped. Transport and envelope
    /// failures, and error codes reported by the exchange, fail the call.
    async fn fetch_funding_rates(&self) -> Result<Snapshot, ExchangeError>;
}

/// Fixed delay between sequential per-symbol requests. There is no backoff.
pub const PACING_DELAY: Duration = Duration::from_millis(100);

/// Process-wide pieces every adapter is built from.
#[derive(Clone)]
pub struct Context {
    pub client: reqwest::Client,
    pub zone: Zone,
}

impl Context {
    pub fn new(timeout: Duration, zone: Zone) -> Result<Self, ExchangeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("funding-aggregator/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, zone })
    }
}

/// Sends a request and decodes its JSON body.
/// Non-2xx statuses surface as transport errors, bad bodies as parse errors.
pub(crate) async fn read_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> Result<T, ExchangeError> {
    let body = request.send().await?.error_for_status()?.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// The item list of an envelope whose status has already been checked.
/// Exchanges send `null` or nothing at all when there are no items.
pub(crate) fn payload_list(payload: Option<Value>) -> Result<Vec<Value>, ExchangeError> {
    let found = match payload {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => return Ok(items),
        Some(Value::Object(_)) => "an object",
        Some(Value::String(_)) => "a string",
        Some(Value::Number(_)) => "a number",
        Some(Value::Bool(_)) => "a boolean",
    };
    Err(ExchangeError::UnexpectedData(format!(
        "expected a list payload, got {found}"
    )))
}

/// Builds the adapter registered under `name`, if there is one.
pub fn build(
    name: &str,
    ctx: &Context,
    okx_credentials: Arc<dyn CredentialProvider>,
) -> Option<Arc<dyn Exchange>> {
    let exchange: Arc<dyn Exchange> = match name {
        "binance" => Arc::new(Binance::new(ctx)),
        "bingx" => Arc::new(BingX::new(ctx)),
        "bybit" => Arc::new(Bybit::new(ctx)),
        "gate" => Arc::new(Gate::new(ctx)),
        "htx" => Arc::new(Htx::new(ctx)),
        "hyperliquid" => Arc::new(Hyperliquid::new(ctx)),
        "kucoin" => Arc::new(KuCoin::new(ctx)),
        "mexc" => Arc::new(Mexc::new(ctx)),
        "okx" => Arc::new(Okx::new(ctx, okx_credentials)),
        _ => return None,
    };
    Some(exchange)
}

/// Name-to-adapter mapping for the enabled exchanges. Unknown names are ignored.
pub fn registry(
    enabled: &[String],
    ctx: &Context,
    okx_credentials: Arc<dyn CredentialProvider>,
) -> BTreeMap<&'static str, Arc<dyn Exchange>> {
    enabled
        .iter()
        .filter_map(|name| build(name, ctx, Arc::clone(&okx_credentials)))
        .map(|ex| (ex.name(), ex))
        .collect()
}

#[cfg(test)]
pub(crate) fn test_context() -> Context {
    Context::new(Duration::from_secs(5), Zone::Named(chrono_tz::UTC))
        .expect("client builds")
}
