#![allow(dead_code)]

use async_trait::async_trait;
use funding_aggregator::{Exchange, ExchangeError, FundingRate, Snapshot};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn rate(symbol: &str, rate: f64) -> FundingRate {
    FundingRate {
        symbol: symbol.to_string(),
        rate,
        next_funding: "2024-05-01T08:00:00Z".to_string(),
        volume_24h: 10.0,
        volume_usdt_24h: 1_000_000.0,
    }
}

/// An exchange that replays scripted results, one per call.
/// Once the script runs out every call fails with a transport-like error.
pub struct FakeExchange {
    name: &'static str,
    script: Mutex<VecDeque<Result<Snapshot, ExchangeError>>>,
    calls: AtomicUsize,
}

impl FakeExchange {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            script: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn then_ok(self, rates: Snapshot) -> Self {
        self.script.lock().unwrap().push_back(Ok(rates));
        self
    }

    pub fn then_err(self, err: ExchangeError) -> Self {
        self.script.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Exchange for FakeExchange {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_funding_rates(&self) -> Result<Snapshot, ExchangeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(ExchangeError::UnexpectedData("script exhausted".into())))
    }
}
