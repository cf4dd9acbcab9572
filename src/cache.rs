use crate::errors::ExchangeError;
use crate::exchanges::Exchange;
use crate::models::Snapshot;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct CacheState {
    rates: HashMap<String, Snapshot>,
    last_update: Option<DateTime<Utc>>,
}

/// Latest known-good snapshot per exchange.
///
/// Cloning is cheap and every clone shares the same state. One lock guards the
/// map and `last_update` together, and it is never held across network I/O.
#[derive(Clone, Default)]
pub struct RatesCache {
    inner: Arc<RwLock<CacheState>>,
}

impl RatesCache {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking writer cannot leave the state half-written: swaps are a
    // single insert plus a timestamp store.
    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs the adapter and, only if it succeeds, replaces that exchange's
    /// snapshot. A failed call leaves the cache exactly as it was.
    pub async fn update_rates(&self, exchange: &dyn Exchange) -> Result<usize, ExchangeError> {
        let rates = exchange.fetch_funding_rates().await?;
        let count = rates.len();
        self.store(exchange.name(), rates);
        Ok(count)
    }

    /// Replaces one exchange's snapshot and advances `last_update`.
    pub fn store(&self, exchange: &str, rates: Snapshot) {
        let now = Utc::now();
        let mut state = self.write();
        state.rates.insert(exchange.to_string(), rates);
        // never move backwards, even if the clock does
        state.last_update = Some(state.last_update.map_or(now, |prev| prev.max(now)));
    }

    /// A copy of one exchange's snapshot; empty if nothing is cached yet.
    pub fn get_rates(&self, exchange: &str) -> Snapshot {
        self.read().rates.get(exchange).cloned().unwrap_or_default()
    }

    /// A copy of every cached snapshot.
    pub fn get_all_rates(&self) -> HashMap<String, Snapshot> {
        self.read().rates.clone()
    }

    /// When any exchange last refreshed successfully.
    pub fn get_last_update(&self) -> Option<DateTime<Utc>> {
        self.read().last_update
    }

    /// Names of the exchanges with a cached snapshot, sorted.
    pub fn exchanges(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().rates.keys().cloned().collect();
        names.sort();
        names
    }
}
