use super::{Context, Exchange, payload_list, read_json};
use crate::errors::{ExchangeError, RecordError};
use crate::models::{FundingRate, Snapshot};
use crate::normalize::{
    EpochUnit, Flex, FundingCycle, TimePolicy, amount_or_zero, collect_valid, parse_rate,
};
use crate::timezone::Zone;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

const BASE_URL: &str = "https://api.bybit.com";

const TIME: TimePolicy = TimePolicy::new(EpochUnit::Millis, FundingCycle::EIGHT_HOURLY);

#[derive(Debug, Deserialize)]
struct BybitResponse {
    #[serde(rename = "retCode")]
    ret_code: i64,

    #[serde(rename = "retMsg", default)]
    ret_msg: String,

    #[serde(default)]
    result: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct BybitTicker {
    symbol: String,

    #[serde(rename = "fundingRate")]
    funding_rate: Option<Flex>,

    #[serde(rename = "nextFundingTime")]
    next_funding_time: Option<Flex>,

    #[serde(rename = "volume24h")]
    volume_24h: Option<Flex>,

    #[serde(rename = "turnover24h")]
    turnover_24h: Option<Flex>,
}

pub struct Bybit {
    client: reqwest::Client,
    zone: Zone,
    base_url: String,
}

impl Bybit {
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
        let ticker: BybitTicker = serde_json::from_value(item)?;
        let rate = parse_rate("fundingRate", ticker.funding_rate.as_ref())?;
        let next_funding = TIME.next_funding(
            &self.zone,
            ticker.next_funding_time.as_ref().and_then(Flex::as_i64),
            now,
        );

        // the linear tickers carry their own 24h volume, no join needed
        Ok(FundingRate {
            symbol: ticker.symbol,
            rate,
            next_funding,
            volume_24h: amount_or_zero(ticker.volume_24h.as_ref()),
            volume_usdt_24h: amount_or_zero(ticker.turnover_24h.as_ref()),
        })
    }
}

#[async_trait]
impl Exchange for Bybit {
    fn name(&self) -> &'static str {
        "bybit"
    }

    async fn fetch_funding_rates(&self) -> Result<Snapshot, ExchangeError> {
        let url = format!("{}/v5/market/tickers?category=linear", self.base_url);
        let response: BybitResponse = read_json(self.client.get(&url)).await?;

        // Bybit signals errors via retCode, not just HTTP status
        if response.ret_code != 0 {
            return Err(ExchangeError::upstream(response.ret_code, response.ret_msg));
        }

        let list = response
            .result
            .and_then(|mut result| result.get_mut("list").map(Value::take));
        let items = payload_list(list)?;
        let now = Utc::now();
        let rates = collect_valid(
            self.name(),
            items.into_iter().map(|item| self.parse_record(item, now)),
        );

        tracing::info!("[{}] fetched {} funding rates", self.name(), rates.len());
        Ok(rates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::exchanges::test_context;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(body: Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v5/market/tickers"))
            .and(query_param("category", "linear"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn reads_inline_volumes() {
        let server = serve(json!({
            "retCode": 0,
            "retMsg": "OK",
            "result": {
                "category": "linear",
                "list": [
                    {
                        "symbol": "BTCUSDT",
                        "fundingRate": "0.0001",
                        "nextFundingTime": "1714550400000",
                        "volume24h": "52000.1",
                        "turnover24h": "3300000000.5"
                    },
                    {"symbol": "BTC-26APR24", "fundingRate": "", "nextFundingTime": "0"}
                ]
            }
        }))
        .await;

        let rates = Bybit::new(&test_context())
            .with_base_url(server.uri())
            .fetch_funding_rates()
            .await
            .unwrap();

        assert_eq!(rates.len(), 1);
        assert_eq!(rates[0].next_funding, "2024-05-01T08:00:00Z");
        assert_eq!(rates[0].volume_24h, 52000.1);
        assert_eq!(rates[0].volume_usdt_24h, 3_300_000_000.5);
    }

    #[tokio::test]
    async fn ret_code_is_an_upstream_error() {
        for result in [json!({}), Value::Null, json!({"list": null})] {
            let server = serve(json!({
                "retCode": 10006,
                "retMsg": "Too many visits!",
                "result": result
            }))
            .await;

            let err = Bybit::new(&test_context())
                .with_base_url(server.uri())
                .fetch_funding_rates()
                .await
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::Upstream);
            assert_eq!(err.to_string(), "Upstream API error 10006: Too many visits!");
        }
    }

    #[tokio::test]
    async fn empty_result_is_an_empty_batch() {
        let server = serve(json!({"retCode": 0, "retMsg": "OK", "result": null})).await;

        let rates = Bybit::new(&test_context())
            .with_base_url(server.uri())
            .fetch_funding_rates()
            .await
            .unwrap();

        assert!(rates.is_empty());
    }

    #[tokio::test]
    async fn http_failure_is_a_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v5/market/tickers"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = Bybit::new(&test_context())
            .with_base_url(server.uri())
            .fetch_funding_rates()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}
