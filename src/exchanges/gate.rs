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

const BASE_URL: &str = "https://api.gateio.ws";

/// Gate reports `funding_next_apply` in epoch seconds.
const TIME: TimePolicy = TimePolicy::new(EpochUnit::Seconds, FundingCycle::EIGHT_HOURLY);

#[derive(Debug, Deserialize)]
struct GateContract {
    name: String,
    funding_rate: Option<Flex>,
    funding_next_apply: Option<Flex>,

    #[serde(default)]
    in_delisting: bool,
}

#[derive(Debug, Deserialize)]
struct GateTicker {
    contract: String,
    volume_24h_base: Option<Flex>,
    volume_24h_quote: Option<Flex>,
}

pub struct Gate {
    client: reqwest::Client,
    zone: Zone,
    base_url: String,
}

impl Gate {
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

    async fn fetch_contracts(&self) -> Result<Vec<Value>, ExchangeError> {
        let url = format!("{}/api/v4/futures/usdt/contracts", self.base_url);
        read_json(self.client.get(&url)).await
    }

    async fn fetch_volumes(&self) -> Result<VolumeBook, ExchangeError> {
        let url = format!("{}/api/v4/futures/usdt/tickers", self.base_url);
        let tickers: Vec<Value> = read_json(self.client.get(&url)).await?;

        Ok(tickers
            .into_iter()
            .filter_map(|t| serde_json::from_value::<GateTicker>(t).ok())
            .map(|t| {
                let volume = Volume {
                    base: amount_or_zero(t.volume_24h_base.as_ref()),
                    quote: amount_or_zero(t.volume_24h_quote.as_ref()),
                };
                (t.contract, volume)
            })
            .collect())
    }

    /// `Ok(None)` for contracts being delisted.
    fn parse_record(
        &self,
        item: Value,
        volumes: &VolumeBook,
        now: DateTime<Utc>,
    ) -> Result<Option<FundingRate>, RecordError> {
        let contract: GateContract = serde_json::from_value(item)?;
        if contract.in_delisting {
            return Ok(None);
        }

        let rate = parse_rate("funding_rate", contract.funding_rate.as_ref())?;
        let next_funding = TIME.next_funding(
            &self.zone,
            contract.funding_next_apply.as_ref().and_then(Flex::as_i64),
            now,
        );
        let volume = volumes.lookup(&contract.name);

        Ok(Some(FundingRate {
            symbol: contract.name,
            rate,
            next_funding,
            volume_24h: volume.base,
            volume_usdt_24h: volume.quote,
        }))
    }
}

#[async_trait]
impl Exchange for Gate {
    fn name(&self) -> &'static str {
        "gate"
    }

    async fn fetch_funding_rates(&self) -> Result<Snapshot, ExchangeError> {
        let (contracts, volumes) = tokio::join!(self.fetch_contracts(), self.fetch_volumes());
        let contracts = contracts?;
        let volumes = VolumeBook::or_empty(self.name(), volumes);

        let now = Utc::now();
        let rates = collect_valid(
            self.name(),
            contracts
                .into_iter()
                .filter_map(|item| self.parse_record(item, &volumes, now).transpose()),
        );

        tracing::info!("[{}] fetched {} funding rates", self.name(), rates.len());
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::test_context;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve_contracts(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/api/v4/futures/usdt/contracts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "BTC_USDT", "funding_rate": "0.000075", "funding_next_apply": 1714550400, "in_delisting": false},
                {"name": "LUNA_USDT", "funding_rate": "0.0001", "funding_next_apply": 1714550400, "in_delisting": true},
                {"name": "ETH_USDT", "funding_rate": "-0.00001", "funding_next_apply": 1714550400.0}
            ])))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn drops_delisting_contracts_and_joins_tickers() {
        let server = MockServer::start().await;
        serve_contracts(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v4/futures/usdt/tickers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"contract": "BTC_USDT", "volume_24h_base": "2100", "volume_24h_quote": "134000000"},
                {"contract": "LUNA_USDT", "volume_24h_base": "1", "volume_24h_quote": "1"}
            ])))
            .mount(&server)
            .await;

        let rates = Gate::new(&test_context())
            .with_base_url(server.uri())
            .fetch_funding_rates()
            .await
            .unwrap();

        let symbols: Vec<_> = rates.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC_USDT", "ETH_USDT"]);
        assert_eq!(rates[0].next_funding, "2024-05-01T08:00:00Z");
        assert_eq!(rates[0].volume_24h, 2100.0);
        assert_eq!(rates[0].volume_usdt_24h, 134_000_000.0);
        assert_eq!(rates[1].next_funding, "2024-05-01T08:00:00Z");
        assert_eq!(rates[1].volume_usdt_24h, 0.0);
    }

    #[tokio::test]
    async fn ticker_outage_keeps_rates() {
        let server = MockServer::start().await;
        serve_contracts(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v4/futures/usdt/tickers"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let rates = Gate::new(&test_context())
            .with_base_url(server.uri())
            .fetch_funding_rates()
            .await
            .unwrap();

        assert_eq!(rates.len(), 2);
        assert!(rates.iter().all(|r| r.volume_24h == 0.0));
    }
}
