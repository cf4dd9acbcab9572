use super::{Context, Exchange, payload_list, read_json};
use crate::errors::{ExchangeError, RecordError};
use crate::models::{FundingRate, Snapshot};
use crate::normalize::{EpochUnit, Flex, FundingCycle, TimePolicy, collect_valid, parse_rate};
use crate::timezone::Zone;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

const BASE_URL: &str = "https://open-api.bingx.com";

const TIME: TimePolicy = TimePolicy::new(EpochUnit::Millis, FundingCycle::EIGHT_HOURLY);

#[derive(Debug, Deserialize)]
struct BingXResponse {
    code: i64,

    #[serde(default)]
    msg: String,

    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PremiumIndex {
    symbol: String,

    #[serde(rename = "lastFundingRate")]
    last_funding_rate: Option<Flex>,

    #[serde(rename = "nextFundingTime")]
    next_funding_time: Option<Flex>,
}

pub struct BingX {
    client: reqwest::Client,
    zone: Zone,
    base_url: String,
}

impl BingX {
    pub fn new(ctx: &Context) -> Self {
        Self {
            client: ctx.client.clone(),
            zone: ctx.zone,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse_record(&self, item: Value, now: DateTime<Utc>) -> Result<FundingRate, RecordError> {
        let raw: PremiumIndex = serde_json::from_value(item)?;
        let rate = parse_rate("lastFundingRate", raw.last_funding_rate.as_ref())?;
        let next_funding = TIME.next_funding(
            &self.zone,
            raw.next_funding_time.as_ref().and_then(Flex::as_i64),
            now,
        );

        // BingX publishes no volumes on this endpoint
        Ok(FundingRate {
            symbol: raw.symbol,
            rate,
            next_funding,
            volume_24h: 0.0,
            volume_usdt_24h: 0.0,
        })
    }
}

#[async_trait]
impl Exchange for BingX {
    fn name(&self) -> &'static str {
        "bingx"
    }

    async fn fetch_funding_rates(&self) -> Result<Snapshot, ExchangeError> {
        let url = format!("{}/openApi/swap/v2/quote/premiumIndex", self.base_url);
        let response: BingXResponse = read_json(self.client.get(&url)).await?;

        // BingX signals errors via code, not just HTTP status
        if response.code != 0 {
            return Err(ExchangeError::upstream(response.code, response.msg));
        }

        let items = payload_list(response.data)?;
        let now = Utc::now();
        let rates = collect_valid(
            self.name(),
            items.into_iter().map(|item| self.parse_record(item, now)),
        );

        tracing::info!("[{}] fetched {} funding rates", self.name(), rates.len());
        Ok(rates)
    }
}
