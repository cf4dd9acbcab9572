use super::{Context, Exchange, read_json};
use crate::errors::{ExchangeError, RecordError};
use crate::models::{FundingRate, Snapshot};
use crate::normalize::{
    EpochUnit, Flex, FundingCycle, TimePolicy, amount_or_zero, collect_valid, parse_rate,
};
use crate::timezone::Zone;
use crate::volume::{Volume, VolumeBook};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

const BASE_URL: &str = "https://fapi.binance.com";

/// Binance settles USDⓈ-M perpetuals at 00:00, 08:00 and 16:00 UTC.
const TIME: TimePolicy = TimePolicy::new(EpochUnit::Millis, FundingCycle::EIGHT_HOURLY);

/// The raw JSON shape of one /fapi/v1/premiumIndex entry
#[derive(Debug, Deserialize)]
struct PremiumIndex {
    symbol: String,

    #[serde(rename = "lastFundingRate")]
    last_funding_rate: Option<Flex>,

    #[serde(rename = "nextFundingTime")]
    next_funding_time: Option<Flex>,
}

/// One /fapi/v1/ticker/24hr entry, used only for volumes
#[derive(Debug, Deserialize)]
struct Ticker24h {
    symbol: String,
    volume: Option<Flex>,

    #[serde(rename = "quoteVolume")]
    quote_volume: Option<Flex>,
}

pub struct Binance {
    client: reqwest::Client,
    zone: Zone,
    base_url: String,
}

impl Binance {
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

    async fn fetch_premium_index(&self) -> Result<Vec<Value>, ExchangeError> {
        let url = format!("{}/fapi/v1/premiumIndex", self.base_url);
        read_json(self.client.get(&url)).await
    }

    async fn fetch_volumes(&self) -> Result<VolumeBook, ExchangeError> {
        let url = format!("{}/fapi/v1/ticker/24hr", self.base_url);
        let tickers: Vec<Value> = read_json(self.client.get(&url)).await?;

        Ok(tickers
            .into_iter()
            .filter_map(|t| serde_json::from_value::<Ticker24h>(t).ok())
            .map(|t| {
                let volume = Volume {
                    base: amount_or_zero(t.volume.as_ref()),
                    quote: amount_or_zero(t.quote_volume.as_ref()),
                };
                (t.symbol, volume)
            })
            .collect())
    }

    fn parse_record(
        &self,
        item: Value,
        volumes: &VolumeBook,
        now: DateTime<Utc>,
    ) -> Result<FundingRate, RecordError> {
        let raw: PremiumIndex = serde_json::from_value(item)?;
        let rate = parse_rate("lastFundingRate", raw.last_funding_rate.as_ref())?;
        let next_funding = TIME.next_funding(
            &self.zone,
            raw.next_funding_time.as_ref().and_then(Flex::as_i64),
            now,
        );
        let volume = volumes.lookup(&raw.symbol);

        Ok(FundingRate {
            symbol: raw.symbol,
            rate,
            next_funding,
            volume_24h: volume.base,
            volume_usdt_24h: volume.quote,
        })
    }
}

#[async_trait]
impl Exchange for Binance {
    fn name(&self) -> &'static str {
        "binance"
    }

    /// Hits premiumIndex for rates and ticker/24hr for volumes in parallel,
    /// then joins them by symbol.
    async fn fetch_funding_rates(&self) -> Result<Snapshot, ExchangeError> {
        let (index, volumes) = tokio::join!(self.fetch_premium_index(), self.fetch_volumes());
        let index = index?;
        let volumes = VolumeBook::or_empty(self.name(), volumes);

        let now = Utc::now();
        let rates = collect_valid(
            self.name(),
            index
                .into_iter()
                .map(|item| self.parse_record(item, &volumes, now)),
        );

        tracing::info!("[{}] fetched {} funding rates", self.name(), rates.len());
        Ok(rates)
    }
}
