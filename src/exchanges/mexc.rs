use super::{Context, Exchange, PACING_DELAY, read_json};
use crate::errors::{ExchangeError, RecordError};
use crate::models::{FundingRate, Snapshot};
use crate::normalize::{EpochUnit, Flex, FundingCycle, TimePolicy, amount_or_zero, parse_rate};
use crate::timezone::Zone;
use async_trait::async_trait;
use chrono::Utc;
use ordered_float::OrderedFloat;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const BASE_URL: &str = "https://contract.mexc.com";

const TIME: TimePolicy = TimePolicy::new(EpochUnit::Millis, FundingCycle::EIGHT_HOURLY);

/// Tickers at or below this 24h notional are not worth a funding request.
pub const MIN_NOTIONAL_USD: f64 = 1000.0;

/// Only the most traded contracts get the per-symbol funding request.
pub const TOP_N: usize = 20;

/// `data` stays raw until `success` is checked: failures carry `null` or `{}`.
#[derive(Debug, Deserialize)]
struct MexcResponse {
    success: bool,

    #[serde(default)]
    code: i64,

    #[serde(default)]
    message: Option<String>,

    #[serde(default)]
    data: Option<Value>,
}

impl MexcResponse {
    fn into_data<T: DeserializeOwned>(self) -> Result<T, ExchangeError> {
        if !self.success {
            return Err(ExchangeError::upstream(
                self.code,
                self.message.unwrap_or_else(|| "request failed".to_string()),
            ));
        }
        match self.data {
            None | Some(Value::Null) => Err(ExchangeError::UnexpectedData(
                "MEXC response without data".into(),
            )),
            Some(data) => Ok(serde_json::from_value(data)?),
        }
    }
}

/// One contract from the ticker list: symbol plus its 24h volumes.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub symbol: String,
    pub volume_24h: f64,
    pub notional_24h: f64,
}

#[derive(Debug, Deserialize)]
struct MexcTicker {
    symbol: String,
    volume24: Option<Flex>,
    amount24: Option<Flex>,
}

#[derive(Debug, Deserialize)]
struct MexcFunding {
    #[serde(rename = "fundingRate")]
    funding_rate: Option<Flex>,

    #[serde(rename = "nextSettleTime")]
    next_settle_time: Option<Flex>,
}

/// Keeps candidates strictly above `floor`, most traded first, at most `cap`.
pub fn select_top(mut candidates: Vec<Candidate>, floor: f64, cap: usize) -> Vec<Candidate> {
    candidates.retain(|c| c.notional_24h > floor);
    // stable sort keeps ticker order between equal volumes
    candidates.sort_by_key(|c| std::cmp::Reverse(OrderedFloat(c.notional_24h)));
    candidates.truncate(cap);
    candidates
}

pub struct Mexc {
    client: reqwest::Client,
    zone: Zone,
    base_url: String,
    pacing: Duration,
}

impl Mexc {
    pub fn new(ctx: &Context) -> Self {
        Self {
            client: ctx.client.clone(),
            zone: ctx.zone,
            base_url: BASE_URL.to_string(),
            pacing: PACING_DELAY,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    async fn fetch_candidates(&self) -> Result<Vec<Candidate>, ExchangeError> {
        let url = format!("{}/api/v1/contract/ticker", self.base_url);
        let response: MexcResponse = read_json(self.client.get(&url)).await?;

        Ok(response
            .into_data::<Vec<Value>>()?
            .into_iter()
            .filter_map(|t| serde_json::from_value::<MexcTicker>(t).ok())
            .map(|t| Candidate {
                volume_24h: amount_or_zero(t.volume24.as_ref()),
                notional_24h: amount_or_zero(t.amount24.as_ref()),
                symbol: t.symbol,
            })
            .collect())
    }

    async fn fetch_funding(&self, symbol: &str) -> Result<MexcFunding, ExchangeError> {
        let url = format!("{}/api/v1/contract/funding_rate/{symbol}", self.base_url);
        let response: MexcResponse = read_json(self.client.get(&url)).await?;
        response.into_data()
    }

    fn to_record(
        &self,
        candidate: Candidate,
        funding: MexcFunding,
    ) -> Result<FundingRate, RecordError> {
        let rate = parse_rate("fundingRate", funding.funding_rate.as_ref())?;
        let next_funding = TIME.next_funding(
            &self.zone,
            funding.next_settle_time.as_ref().and_then(Flex::as_i64),
            Utc::now(),
        );

        Ok(FundingRate {
            symbol: candidate.symbol,
            rate,
            next_funding,
            volume_24h: candidate.volume_24h,
            volume_usdt_24h: candidate.notional_24h,
        })
    }
}

#[async_trait]
impl Exchange for Mexc {
    fn name(&self) -> &'static str {
        "mexc"
    }

    /// The ticker list has volumes but no settlement times, so funding is
    /// fetched per symbol for the top contracts only, one paced request each.
    async fn fetch_funding_rates(&self) -> Result<Snapshot, ExchangeError> {
        let candidates = self.fetch_candidates().await?;
        let total = candidates.len();
        let selected = select_top(candidates, MIN_NOTIONAL_USD, TOP_N);

        tracing::info!(
            "[{}] {} of {} contracts selected for funding lookup",
            self.name(),
            selected.len(),
            total
        );

        let mut rates = Snapshot::with_capacity(selected.len());
        for (i, candidate) in selected.into_iter().enumerate() {
            if i > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            let funding = match self.fetch_funding(&candidate.symbol).await {
                Ok(funding) => funding,
                Err(e) => {
                    tracing::warn!(
                        "[{}] {} funding request failed: {e}",
                        self.name(),
                        candidate.symbol
                    );
                    continue;
                }
            };

            let symbol = candidate.symbol.clone();
            match self.to_record(candidate, funding) {
                Ok(rate) => rates.push(rate),
                Err(e) => tracing::debug!("[{}] skipping {symbol}: {e}", self.name()),
            }
        }

        tracing::info!("[{}] fetched {} funding rates", self.name(), rates.len());
        Ok(rates)
    }
}
