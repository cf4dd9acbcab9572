mod helpers;

use funding_aggregator::{ExchangeError, RatesCache};
use helpers::{FakeExchange, rate};
use std::sync::Arc;

#[tokio::test]
async fn successful_update_replaces_snapshot() {
    let cache = RatesCache::new();
    let binance = FakeExchange::new("binance")
        .then_ok(vec![rate("BTCUSDT", 0.0001), rate("ETHUSDT", 0.0002)])
        .then_ok(vec![rate("SOLUSDT", -0.0003)]);

    assert_eq!(cache.update_rates(&binance).await.unwrap(), 2);
    let first_update = cache.get_last_update().unwrap();
    assert_eq!(cache.update_rates(&binance).await.unwrap(), 1);

    let rates = cache.get_rates("binance");
    assert_eq!(rates, vec![rate("SOLUSDT", -0.0003)]);
    assert!(cache.get_last_update().unwrap() >= first_update);
}

#[tokio::test]
async fn failed_update_leaves_everything_untouched() {
    let cache = RatesCache::new();
    let a = FakeExchange::new("a")
        .then_ok(vec![rate("A1", 0.0001)])
        .then_err(ExchangeError::upstream(10006, "Too many visits!"));
    let b = FakeExchange::new("b").then_ok(vec![rate("B1", 0.0005)]);

    cache.update_rates(&a).await.unwrap();
    cache.update_rates(&b).await.unwrap();
    let before_all = cache.get_all_rates();
    let before_update = cache.get_last_update();

    let err = cache.update_rates(&a).await.unwrap_err();
    assert!(matches!(err, ExchangeError::Upstream { .. }));

    assert_eq!(cache.get_all_rates(), before_all);
    assert_eq!(cache.get_rates("a"), vec![rate("A1", 0.0001)]);
    assert_eq!(cache.get_rates("b"), vec![rate("B1", 0.0005)]);
    assert_eq!(cache.get_last_update(), before_update);
}

#[tokio::test]
async fn failure_before_any_success_caches_nothing() {
    let cache = RatesCache::new();
    let okx = FakeExchange::new("okx").then_err(ExchangeError::Config("no keys".into()));

    assert!(cache.update_rates(&okx).await.is_err());
    assert!(cache.get_rates("okx").is_empty());
    assert!(cache.get_all_rates().is_empty());
    assert_eq!(cache.get_last_update(), None);
}

#[tokio::test]
async fn returned_snapshots_are_copies() {
    let cache = RatesCache::new();
    let bybit = FakeExchange::new("bybit").then_ok(vec![rate("BTCUSDT", 0.0001)]);
    cache.update_rates(&bybit).await.unwrap();

    let mut one = cache.get_rates("bybit");
    one[0].rate = 0.5;
    one.push(rate("INJECTED", 0.0));

    let mut all = cache.get_all_rates();
    all.get_mut("bybit").unwrap().clear();
    all.insert("fake".into(), vec![rate("X", 0.0)]);

    assert_eq!(cache.get_rates("bybit"), vec![rate("BTCUSDT", 0.0001)]);
    assert_eq!(cache.get_all_rates().len(), 1);
    assert!(cache.get_rates("fake").is_empty());
}

#[tokio::test]
async fn concurrent_updates_to_distinct_exchanges() {
    let cache = RatesCache::new();
    let names = ["binance", "bingx", "bybit", "gate", "htx", "hyperliquid", "kucoin", "mexc", "okx"];

    let handles: Vec<_> = names
        .iter()
        .enumerate()
        .map(|(i, &name)| {
            let cache = cache.clone();
            let exchange = Arc::new(
                FakeExchange::new(name).then_ok((0..=i).map(|n| rate(&format!("S{n}"), 0.0001)).collect()),
            );
            tokio::spawn(async move { cache.update_rates(exchange.as_ref()).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let all = cache.get_all_rates();
    assert_eq!(all.len(), names.len());
    for (i, name) in names.iter().enumerate() {
        assert_eq!(all[*name].len(), i + 1);
    }
    assert_eq!(cache.exchanges().len(), names.len());
}
