use super::{Context, Exchange, PACING_DELAY, payload_list, read_json};
use crate::auth::{CredentialProvider, Credentials};
use crate::errors::{ExchangeError, RecordError};
use crate::models::{FundingRate, Snapshot};
use crate::normalize::{EpochUnit, Flex, FundingCycle, TimePolicy, parse_rate};
use crate::timezone::Zone;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const BASE_URL: &str = "https://www.okx.com";

const INSTRUMENTS_PATH: &str = "/api/v5/public/instruments?instType=SWAP";

const TIME: TimePolicy = TimePolicy::new(EpochUnit::Millis, FundingCycle::EIGHT_HOURLY);

#[derive(Debug, Deserialize)]
struct OkxResponse {
    code: String,

    #[serde(default)]
    msg: String,

    #[serde(default)]
    data: Option<Value>,
}

impl OkxResponse {
    fn into_data(self) -> Result<Vec<Value>, ExchangeError> {
        if self.code != "0" {
            return Err(ExchangeError::upstream(self.code, self.msg));
        }
        payload_list(self.data)
    }
}

#[derive(Debug, Deserialize)]
struct Instrument {
    #[serde(rename = "instId")]
    inst_id: String,

    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OkxFundingRate {
    #[serde(rename = "instId")]
    inst_id: String,

    #[serde(rename = "fundingRate")]
    funding_rate: Option<Flex>,

    #[serde(rename = "fundingTime")]
    funding_time: Option<Flex>,
}

/// OKX perpetual swaps. Every request is signed, so the adapter refuses to
/// run without a full set of credentials.
pub struct Okx {
    client: reqwest::Client,
    zone: Zone,
    base_url: String,
    pacing: Duration,
    credentials: Arc<dyn CredentialProvider>,
}

impl Okx {
    pub fn new(ctx: &Context, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            client: ctx.client.clone(),
            zone: ctx.zone,
            base_url: BASE_URL.to_string(),
            pacing: PACING_DELAY,
            credentials,
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

    fn credentials(&self) -> Result<Credentials, ExchangeError> {
        self.credentials
            .credentials()
            .filter(Credentials::is_complete)
            .ok_or_else(|| {
                ExchangeError::Config(
                    "OKX API key, secret and passphrase must all be set".to_string(),
                )
            })
    }

    async fn signed_get(
        &self,
        creds: &Credentials,
        request_path: &str,
    ) -> Result<OkxResponse, ExchangeError> {
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        let signature = creds.sign(&timestamp, "GET", request_path, "")?;

        let request = self
            .client
            .get(format!("{}{request_path}", self.base_url))
            .header("OK-ACCESS-KEY", &creds.api_key)
            .header("OK-ACCESS-SIGN", signature)
            .header("OK-ACCESS-TIMESTAMP", timestamp)
            .header("OK-ACCESS-PASSPHRASE", &creds.passphrase)
            .header("Content-Type", "application/json");

        read_json(request).await
    }

    async fn fetch_instruments(&self, creds: &Credentials) -> Result<Vec<String>, ExchangeError> {
        let data = self.signed_get(creds, INSTRUMENTS_PATH).await?.into_data()?;

        Ok(data
            .into_iter()
            .filter_map(|item| serde_json::from_value::<Instrument>(item).ok())
            .filter(|inst| inst.state.as_deref().is_none_or(|s| s == "live"))
            .map(|inst| inst.inst_id)
            .collect())
    }

    async fn fetch_funding(
        &self,
        creds: &Credentials,
        inst_id: &str,
    ) -> Result<Option<Value>, ExchangeError> {
        let path = format!("/api/v5/public/funding-rate?instId={inst_id}");
        let data = self.signed_get(creds, &path).await?.into_data()?;
        Ok(data.into_iter().next())
    }

    fn parse_record(&self, item: Value) -> Result<FundingRate, RecordError> {
        let raw: OkxFundingRate = serde_json::from_value(item)?;
        let rate = parse_rate("fundingRate", raw.funding_rate.as_ref())?;
        let next_funding = TIME.next_funding(
            &self.zone,
            raw.funding_time.as_ref().and_then(Flex::as_i64),
            Utc::now(),
        );

        // no volumes on the public funding endpoint
        Ok(FundingRate {
            symbol: raw.inst_id,
            rate,
            next_funding,
            volume_24h: 0.0,
            volume_usdt_24h: 0.0,
        })
    }
}

#[async_trait]
impl Exchange for Okx {
    fn name(&self) -> &'static str {
        "okx"
    }

    async fn fetch_funding_rates(&self) -> Result<Snapshot, ExchangeError> {
        let creds = self.credentials()?;

        let instruments = self.fetch_instruments(&creds).await?;
        tracing::info!("[{}] {} swap instruments listed", self.name(), instruments.len());

        let mut rates = Snapshot::with_capacity(instruments.len());
        for (i, inst_id) in instruments.iter().enumerate() {
            if i > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            let item = match self.fetch_funding(&creds, inst_id).await {
                Ok(Some(item)) => item,
                Ok(None) => {
                    tracing::debug!("[{}] no funding data for {inst_id}", self.name());
                    continue;
                }
                Err(e) => {
                    tracing::warn!("[{}] {inst_id} funding request failed: {e}", self.name());
                    continue;
                }
            };

            match self.parse_record(item) {
                Ok(rate) if rate.rate != 0.0 => rates.push(rate),
                Ok(_) => {}
                Err(e) => tracing::debug!("[{}] skipping {inst_id}: {e}", self.name()),
            }

            if (i + 1) % 50 == 0 {
                tracing::debug!(
                    "[{}] processed {}/{} instruments",
                    self.name(),
                    i + 1,
                    instruments.len()
                );
            }
        }

        tracing::info!("[{}] fetched {} funding rates", self.name(), rates.len());
        Ok(rates)
    }
}
