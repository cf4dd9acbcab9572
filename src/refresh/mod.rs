pub mod status;

use crate::cache::RatesCache;
use crate::errors::ErrorKind;
use crate::exchanges::Exchange;
use chrono::Utc;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub use status::{ExchangeStatus, StatusBoard};

/// What one adapter call did to the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Updated {
        exchange: &'static str,
        records: usize,
    },
    Failed {
        exchange: &'static str,
        kind: ErrorKind,
        error: String,
    },
}

impl RefreshOutcome {
    pub fn exchange(&self) -> &'static str {
        match self {
            RefreshOutcome::Updated { exchange, .. } | RefreshOutcome::Failed { exchange, .. } => {
                *exchange
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RefreshOutcome::Updated { .. })
    }
}

/// Drives adapters and writes their results into the cache.
///
/// There is no retry: a failed refresh is recorded and the previous snapshot
/// stays in place until the next scheduled attempt.
pub struct Refresher {
    cache: RatesCache,
    status: StatusBoard,
    exchanges: Vec<Arc<dyn Exchange>>,
    interval: Duration,
}

impl Refresher {
    pub fn new(
        cache: RatesCache,
        status: StatusBoard,
        exchanges: impl IntoIterator<Item = Arc<dyn Exchange>>,
        interval: Duration,
    ) -> Self {
        let exchanges: Vec<_> = exchanges.into_iter().collect();
        for ex in &exchanges {
            status.register(ex.name());
        }
        Self {
            cache,
            status,
            exchanges,
            interval,
        }
    }

    pub async fn refresh_one(&self, exchange: &dyn Exchange) -> RefreshOutcome {
        let name = exchange.name();
        let started = Instant::now();

        let outcome = match self.cache.update_rates(exchange).await {
            Ok(records) => {
                tracing::info!(
                    "[{name}] cached {records} rates in {:.1}s",
                    started.elapsed().as_secs_f64()
                );
                metrics::gauge!("funding_rates_records", "exchange" => name).set(records as f64);
                RefreshOutcome::Updated {
                    exchange: name,
                    records,
                }
            }
            Err(e) => {
                tracing::error!("[{name}] refresh failed, keeping previous snapshot: {e}");
                RefreshOutcome::Failed {
                    exchange: name,
                    kind: e.kind(),
                    error: e.to_string(),
                }
            }
        };

        let label = if outcome.is_success() { "ok" } else { "error" };
        metrics::counter!("funding_refresh_total", "exchange" => name, "outcome" => label)
            .increment(1);
        metrics::histogram!("funding_refresh_duration_seconds", "exchange" => name)
            .record(started.elapsed().as_secs_f64());

        self.status.record(&outcome, Utc::now());
        outcome
    }

    /// Refreshes every exchange concurrently, once.
    pub async fn refresh_all(&self) -> Vec<RefreshOutcome> {
        join_all(self.exchanges.iter().map(|ex| self.refresh_one(ex.as_ref()))).await
    }

    /// Spawns one refresh loop per exchange. A slow exchange only ever delays
    /// its own next round.
    pub fn spawn(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        (0..self.exchanges.len())
            .map(|i| {
                let refresher = Arc::clone(&self);
                tokio::spawn(async move {
                    let exchange = Arc::clone(&refresher.exchanges[i]);
                    let mut ticker = tokio::time::interval(refresher.interval);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    loop {
                        ticker.tick().await;
                        refresher.refresh_one(exchange.as_ref()).await;
                    }
                })
            })
            .collect()
    }
}
