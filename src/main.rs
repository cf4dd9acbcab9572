use funding_aggregator::api::ApiServer;
use funding_aggregator::auth::EnvCredentials;
use funding_aggregator::cache::RatesCache;
use funding_aggregator::config::{Config, LogFormat};
use funding_aggregator::exchanges::{self, Context};
use funding_aggregator::refresh::{Refresher, StatusBoard};
use funding_aggregator::timezone::Zone;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }

    tracing::info!(
        "Funding aggregator starting: exchanges: {:?}, refresh every {}s, port {}",
        config.exchanges,
        config.refresh_interval.as_secs(),
        config.api_port
    );

    let zone = Zone::resolve(config.timezone.as_deref());
    let ctx = Context::new(config.http_timeout, zone)?;
    let registry = exchanges::registry(&config.exchanges, &ctx, Arc::new(EnvCredentials::okx()));

    let cache = RatesCache::new();
    let status = StatusBoard::new();

    // the metrics recorder must exist before the first refresh round
    let server = ApiServer::new(cache.clone(), status.clone());

    // ── 1. Spawn one refresh loop per exchange ─────────────────────
    let refresher = Arc::new(Refresher::new(
        cache,
        status,
        registry.into_values(),
        config.refresh_interval,
    ));
    let _handles = refresher.spawn();

    // ── 2. Serve the cache until Ctrl+C ────────────────────────────
    server.run(config.api_port).await
}
