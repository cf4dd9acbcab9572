use super::{Context, Exchange, payload_list, read_json};
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

const BASE_URL: &str = "https://api.hbdm.com";

const TIME: TimePolicy = TimePolicy::new(EpochUnit::Millis, FundingCycle::EIGHT_HOURLY);

/// HTX wraps every payload in `{"status": "ok" | "error", ...}`.
/// Market endpoints spell the error fields with hyphens.
#[derive(Debug, Deserialize)]
struct HtxEnvelope {
    status: String,

    #[serde(default, alias = "err-code")]
    err_code: Option<Flex>,

    #[serde(default, alias = "err-msg")]
    err_msg: Option<String>,

    #[serde(default)]
    data: Option<Value>,

    #[serde(default)]
    ticks: Option<Value>,
}

impl HtxEnvelope {
    fn check(self) -> Result<Self, ExchangeError> {
        if self.status == "ok" {
            return Ok(self);
        }
        let code = match &self.err_code {
            Some(Flex::Num(n)) => n.to_string(),
            Some(Flex::Str(s)) => s.clone(),
            None => self.status.clone(),
        };
        Err(ExchangeError::upstream(
            code,
            self.err_msg.unwrap_or_else(|| self.status.clone()),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct HtxFundingRate {
    symbol: String,
    contract_code: Option<String>,
    funding_rate: Option<Flex>,
    funding_time: Option<Flex>,
}

impl HtxFundingRate {
    /// Linear swaps are keyed `BTC-USDT`; older payloads only carry `BTC`.
    fn contract(&self) -> String {
        self.contract_code
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| format!("{}-USDT", self.symbol))
    }
}

#[derive(Debug, Deserialize)]
struct HtxTick {
    contract_code: String,
    amount: Option<Flex>,
    vol: Option<Flex>,
    trade_turnover: Option<Flex>,
}

pub struct Htx {
    client: reqwest::Client,
    zone: Zone,
    base_url: String,
}

impl Htx {
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

    async fn fetch_rates(&self) -> Result<Vec<Value>, ExchangeError> {
        let url = format!("{}/linear-swap-api/v1/swap_batch_funding_rate", self.base_url);
        let envelope: HtxEnvelope = read_json(self.client.get(&url)).await?;
        payload_list(envelope.check()?.data)
    }

    async fn fetch_volumes(&self) -> Result<VolumeBook, ExchangeError> {
        let url = format!("{}/linear-swap-ex/market/detail/batch_merged", self.base_url);
        let envelope: HtxEnvelope = read_json(self.client.get(&url)).await?;

        Ok(payload_list(envelope.check()?.ticks)?
            .into_iter()
            .filter_map(|t| serde_json::from_value::<HtxTick>(t).ok())
            .map(|t| {
                // `amount` is in coin; `vol` counts contracts and is only a stand-in
                let base = t.amount.as_ref().or(t.vol.as_ref());
                let volume = Volume {
                    base: amount_or_zero(base),
                    quote: amount_or_zero(t.trade_turnover.as_ref()),
                };
                (t.contract_code, volume)
            })
            .collect())
    }

    fn parse_record(
        &self,
        item: Value,
        volumes: &VolumeBook,
        now: DateTime<Utc>,
    ) -> Result<FundingRate, RecordError> {
        let raw: HtxFundingRate = serde_json::from_value(item)?;
        let rate = parse_rate("funding_rate", raw.funding_rate.as_ref())?;
        let next_funding = TIME.next_funding(
            &self.zone,
            raw.funding_time.as_ref().and_then(Flex::as_i64),
            now,
        );
        let contract = raw.contract();
        let volume = volumes.lookup(&contract);

        Ok(FundingRate {
            symbol: contract,
            rate,
            next_funding,
            volume_24h: volume.base,
            volume_usdt_24h: volume.quote,
        })
    }
}

#[async_trait]
impl Exchange for Htx {
    fn name(&self) -> &'static str {
        "htx"
    }

    async fn fetch_funding_rates(&self) -> Result<Snapshot, ExchangeError> {
        let (rates, volumes) = tokio::join!(self.fetch_rates(), self.fetch_volumes());
        let rates = rates?;
        let volumes = VolumeBook::or_empty(self.name(), volumes);

        let now = Utc::now();
        let rates = collect_valid(
            self.name(),
            rates
                .into_iter()
                .map(|item| self.parse_record(item, &volumes, now)),
        );

        tracing::info!("[{}] fetched {} funding rates", self.name(), rates.len());
        Ok(rates)
    }
}
