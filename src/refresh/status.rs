use super::RefreshOutcome;
use crate::errors::ErrorKind;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

/// How the most recent refreshes of one exchange went.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeStatus {
    pub exchange: String,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    /// Record count of the last successful refresh
    pub records: usize,
    pub last_error: Option<String>,
    pub last_error_kind: Option<ErrorKind>,
    pub consecutive_failures: u32,
}

impl ExchangeStatus {
    fn new(exchange: &str) -> Self {
        Self {
            exchange: exchange.to_string(),
            last_attempt: None,
            last_success: None,
            records: 0,
            last_error: None,
            last_error_kind: None,
            consecutive_failures: 0,
        }
    }
}

/// Per-exchange refresh bookkeeping, written concurrently by refresh tasks.
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<DashMap<String, ExchangeStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an exchange before its first refresh so it shows up as pending.
    pub fn register(&self, exchange: &str) {
        self.inner
            .entry(exchange.to_string())
            .or_insert_with(|| ExchangeStatus::new(exchange));
    }

    pub fn record(&self, outcome: &RefreshOutcome, at: DateTime<Utc>) {
        let mut entry = self
            .inner
            .entry(outcome.exchange().to_string())
            .or_insert_with(|| ExchangeStatus::new(outcome.exchange()));
        let status = entry.value_mut();
        status.last_attempt = Some(at);

        match outcome {
            RefreshOutcome::Updated { records, .. } => {
                status.last_success = Some(at);
                status.records = *records;
                status.last_error = None;
                status.last_error_kind = None;
                status.consecutive_failures = 0;
            }
            RefreshOutcome::Failed { kind, error, .. } => {
                // keep `records` and `last_success`: the cache still serves them
                status.last_error = Some(error.clone());
                status.last_error_kind = Some(*kind);
                status.consecutive_failures = status.consecutive_failures.saturating_add(1);
            }
        }
    }

    pub fn get(&self, exchange: &str) -> Option<ExchangeStatus> {
        self.inner.get(exchange).map(|r| r.clone())
    }

    /// Every tracked exchange, sorted by name.
    pub fn all(&self) -> Vec<ExchangeStatus> {
        let mut all: Vec<ExchangeStatus> = self.inner.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.exchange.cmp(&b.exchange));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_keep_last_success() {
        let board = StatusBoard::new();
        let t0 = Utc::now();
        board.record(
            &RefreshOutcome::Updated {
                exchange: "gate",
                records: 42,
            },
            t0,
        );
        let t1 = t0 + chrono::TimeDelta::seconds(60);
        board.record(
            &RefreshOutcome::Failed {
                exchange: "gate",
                kind: ErrorKind::Transport,
                error: "timed out".into(),
            },
            t1,
        );
        board.record(
            &RefreshOutcome::Failed {
                exchange: "gate",
                kind: ErrorKind::Transport,
                error: "timed out".into(),
            },
            t1,
        );

        let status = board.get("gate").unwrap();
        assert_eq!(status.last_success, Some(t0));
        assert_eq!(status.last_attempt, Some(t1));
        assert_eq!(status.records, 42);
        assert_eq!(status.consecutive_failures, 2);
        assert_eq!(status.last_error_kind, Some(ErrorKind::Transport));
    }

    #[test]
    fn success_clears_errors() {
        let board = StatusBoard::new();
        let now = Utc::now();
        board.record(
            &RefreshOutcome::Failed {
                exchange: "okx",
                kind: ErrorKind::Config,
                error: "no keys".into(),
            },
            now,
        );
        board.record(
            &RefreshOutcome::Updated {
                exchange: "okx",
                records: 3,
            },
            now,
        );

        let status = board.get("okx").unwrap();
        assert_eq!(status.last_error, None);
        assert_eq!(status.consecutive_failures, 0);
    }

    #[test]
    fn failure_streak_saturates() {
        let board = StatusBoard::new();
        board.register("htx");
        board.inner.get_mut("htx").unwrap().consecutive_failures = u32::MAX;

        board.record(
            &RefreshOutcome::Failed {
                exchange: "htx",
                kind: ErrorKind::Transport,
                error: "connection reset".into(),
            },
            Utc::now(),
        );

        assert_eq!(board.get("htx").unwrap().consecutive_failures, u32::MAX);
    }

    #[test]
    fn registered_exchanges_are_listed_sorted() {
        let board = StatusBoard::new();
        board.register("mexc");
        board.register("binance");
        board.register("mexc");

        let names: Vec<_> = board.all().into_iter().map(|s| s.exchange).collect();
        assert_eq!(names, vec!["binance", "mexc"]);
        assert_eq!(board.get("mexc").unwrap().last_attempt, None);
    }
}
