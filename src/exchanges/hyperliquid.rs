use super::{Context, Exchange, read_json};
use crate::errors::{ExchangeError, RecordError};
use crate::models::{FundingRate, Snapshot};
use crate::normalize::{
    EpochUnit, Flex, FundingCycle, TimePolicy, amount_or_zero, collect_valid, parse_rate,
};
use crate::timezone::Zone;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const BASE_URL: &str = "https://api.hyperliquid.xyz";

/// Hyperliquid pays funding every hour and never says when.
const TIME: TimePolicy = TimePolicy::new(EpochUnit::Millis, FundingCycle::HOURLY);

/// Assets trading less than this notional over 24h are dropped.
pub const MIN_NOTIONAL_USD: f64 = 1000.0;

#[derive(Serialize)]
struct InfoRequest {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// `metaAndAssetCtxs` answers with `[meta, [ctx, ...]]`; contexts line up with
/// `meta.universe` by index.
#[derive(Debug, Deserialize)]
struct Meta {
    universe: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,

    #[serde(rename = "isDelisted", default)]
    is_delisted: bool,
}

#[derive(Debug, Deserialize)]
struct AssetContext {
    funding: Option<Flex>,

    /// 24h volume in USD
    #[serde(rename = "dayNtlVlm")]
    day_ntl_vlm: Option<Flex>,

    /// 24h volume in the asset itself
    #[serde(rename = "dayBaseVlm")]
    day_base_vlm: Option<Flex>,
}

pub struct Hyperliquid {
    client: reqwest::Client,
    zone: Zone,
    base_url: String,
}

impl Hyperliquid {
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

    /// `Ok(None)` for delisted or thinly traded assets.
    fn parse_record(
        &self,
        asset: Value,
        ctx: Value,
        now: DateTime<Utc>,
    ) -> Result<Option<FundingRate>, RecordError> {
        let asset: Asset = serde_json::from_value(asset)?;
        if asset.is_delisted {
            return Ok(None);
        }

        let ctx: AssetContext = serde_json::from_value(ctx)?;
        let notional = amount_or_zero(ctx.day_ntl_vlm.as_ref());
        if notional < MIN_NOTIONAL_USD {
            return Ok(None);
        }

        let rate = parse_rate("funding", ctx.funding.as_ref())?;

        Ok(Some(FundingRate {
            symbol: asset.name,
            rate,
            next_funding: TIME.next_funding(&self.zone, None, now),
            volume_24h: amount_or_zero(ctx.day_base_vlm.as_ref()),
            volume_usdt_24h: notional,
        }))
    }
}

#[async_trait]
impl Exchange for Hyperliquid {
    fn name(&self) -> &'static str {
        "hyperliquid"
    }

    async fn fetch_funding_rates(&self) -> Result<Snapshot, ExchangeError> {
        let url = format!("{}/info", self.base_url);
        let request = self.client.post(&url).json(&InfoRequest {
            kind: "metaAndAssetCtxs",
        });
        let (meta, contexts): (Meta, Vec<Value>) = read_json(request).await?;

        if meta.universe.len() != contexts.len() {
            tracing::warn!(
                "[{}] universe has {} assets but {} contexts, extra entries ignored",
                self.name(),
                meta.universe.len(),
                contexts.len()
            );
        }

        let now = Utc::now();
        let rates = collect_valid(
            self.name(),
            meta.universe
                .into_iter()
                .zip(contexts)
                .filter_map(|(asset, ctx)| self.parse_record(asset, ctx, now).transpose()),
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
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn filters_delisted_and_low_volume_assets() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/info"))
            .and(body_json(json!({"type": "metaAndAssetCtxs"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"universe": [
                    {"name": "BTC", "szDecimals": 5, "maxLeverage": 50},
                    {"name": "OLD", "szDecimals": 0, "maxLeverage": 3, "isDelisted": true},
                    {"name": "TINY", "szDecimals": 0, "maxLeverage": 3},
                    {"name": "ETH", "szDecimals": 4, "maxLeverage": 50}
                ]},
                [
                    {"funding": "0.0000125", "dayNtlVlm": "1200000000.0", "dayBaseVlm": "18000.5"},
                    {"funding": "0.0001", "dayNtlVlm": "5000000.0"},
                    {"funding": "0.0001", "dayNtlVlm": "999.99"},
                    {"funding": "-0.00000625", "dayNtlVlm": "600000000.0"}
                ]
            ])))
            .mount(&server)
            .await;
        let started = Utc::now();

        let rates = Hyperliquid::new(&test_context())
            .with_base_url(server.uri())
            .fetch_funding_rates()
            .await
            .unwrap();

        let symbols: Vec<_> = rates.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BTC", "ETH"]);
        assert_eq!(rates[0].volume_24h, 18000.5);
        assert_eq!(rates[0].volume_usdt_24h, 1_200_000_000.0);
        assert_eq!(rates[1].volume_24h, 0.0);

        let next = DateTime::parse_from_rfc3339(&rates[0].next_funding).unwrap();
        assert!(next.with_timezone(&Utc) >= started);
        assert_eq!(next.timestamp() % 3600, 0);
    }

    #[tokio::test]
    async fn unexpected_shape_is_a_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "bad"})))
            .mount(&server)
            .await;

        let err = Hyperliquid::new(&test_context())
            .with_base_url(server.uri())
            .fetch_funding_rates()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Decode);
    }
}
