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

const BASE_URL: &str = "https://api-futures.kucoin.com";

/// KuCoin's success code. Anything else is an API error.
const SUCCESS: &str = "200000";

/// Without a settlement timestamp the next funding is assumed an hour out.
const TIME: TimePolicy = TimePolicy::new(EpochUnit::Millis, FundingCycle::HoursFromNow(1));

#[derive(Debug, Deserialize)]
struct KuCoinResponse {
    code: String,

    #[serde(default)]
    msg: Option<String>,

    #[serde(default)]
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct KuCoinContract {
    symbol: String,

    #[serde(rename = "fundingFeeRate")]
    funding_fee_rate: Option<Flex>,

    #[serde(rename = "nextFundingRateDateTime")]
    next_funding_rate_date_time: Option<Flex>,

    #[serde(rename = "volumeOf24h")]
    volume_of_24h: Option<Flex>,

    #[serde(rename = "turnoverOf24h")]
    turnover_of_24h: Option<Flex>,
}

pub struct KuCoin {
    client: reqwest::Client,
    zone: Zone,
    base_url: String,
}

impl KuCoin {
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
        let contract: KuCoinContract = serde_json::from_value(item)?;
        let rate = parse_rate("fundingFeeRate", contract.funding_fee_rate.as_ref())?;
        let next_funding = TIME.next_funding(
            &self.zone,
            contract
                .next_funding_rate_date_time
                .as_ref()
                .and_then(Flex::as_i64),
            now,
        );

        Ok(FundingRate {
            symbol: contract.symbol,
            rate,
            next_funding,
            volume_24h: amount_or_zero(contract.volume_of_24h.as_ref()),
            volume_usdt_24h: amount_or_zero(contract.turnover_of_24h.as_ref()),
        })
    }
}

#[async_trait]
impl Exchange for KuCoin {
    fn name(&self) -> &'static str {
        "kucoin"
    }

    async fn fetch_funding_rates(&self) -> Result<Snapshot, ExchangeError> {
        let url = format!("{}/api/v1/contracts/active", self.base_url);
        let response: KuCoinResponse = read_json(self.client.get(&url)).await?;

        if response.code != SUCCESS {
            let message = response.msg.unwrap_or_default();
            return Err(ExchangeError::upstream(response.code, message));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use crate::exchanges::test_context;
    use chrono::TimeDelta;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(body: Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/contracts/active"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn parses_contracts_and_skips_null_rates() {
        let server = serve(json!({
            "code": "200000",
            "data": [
                {"symbol": "XBTUSDTM", "fundingFeeRate": 0.000153, "volumeOf24h": 9500.5, "turnoverOf24h": 610000000.0},
                {"symbol": "ETHUSDTM", "fundingFeeRate": null, "volumeOf24h": 1.0},
                {"symbol": "SOLUSDTM", "fundingFeeRate": "0.0001", "nextFundingRateDateTime": 1714550400000i64}
            ]
        }))
        .await;
        let started = Utc::now();

        let rates = KuCoin::new(&test_context())
            .with_base_url(server.uri())
            .fetch_funding_rates()
            .await
            .unwrap();

        assert_eq!(rates.len(), 2);
        assert_eq!(rates[0].symbol, "XBTUSDTM");
        assert_eq!(rates[0].volume_usdt_24h, 610_000_000.0);

        // no timestamp: an hour from the call
        let next = DateTime::parse_from_rfc3339(&rates[0].next_funding)
            .unwrap()
            .with_timezone(&Utc);
        assert!(next >= started + TimeDelta::minutes(59));
        assert!(next <= Utc::now() + TimeDelta::hours(1));

        assert_eq!(rates[1].next_funding, "2024-05-01T08:00:00Z");
    }

    #[tokio::test]
    async fn non_success_code_fails() {
        for data in [None, Some(Value::Null), Some(json!({}))] {
            let mut body = json!({"code": "429000", "msg": "Too Many Requests"});
            if let Some(data) = data {
                body["data"] = data;
            }
            let server = serve(body).await;

            let err = KuCoin::new(&test_context())
                .with_base_url(server.uri())
                .fetch_funding_rates()
                .await
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::Upstream);
            assert_eq!(err.to_string(), "Upstream API error 429000: Too Many Requests");
        }
    }
}
