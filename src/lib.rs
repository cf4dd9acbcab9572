//! Perpetual-futures funding rates from several exchanges, normalized into one
//! record shape and served from a shared in-memory cache.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod errors;
pub mod exchanges;
pub mod models;
pub mod normalize;
pub mod refresh;
pub mod timezone;
pub mod volume;

pub use cache::RatesCache;
pub use errors::{ErrorKind, ExchangeError};
pub use exchanges::Exchange;
pub use models::{FundingRate, Snapshot};
