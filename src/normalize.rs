//! Shared rules for turning heterogeneous upstream records into [`FundingRate`]s.
//!
//! Exchanges disagree on almost everything: rates arrive as strings or numbers,
//! sometimes percentage-scaled; next-funding times arrive in seconds or
//! milliseconds, or not at all. Adapters decode into their own raw shapes and
//! lean on these helpers for the parts they have in common.

use crate::errors::RecordError;
use crate::models::{FundingRate, Snapshot};
use crate::timezone::Zone;
use chrono::{DateTime, TimeDelta, Utc};
use serde::Deserialize;

/// A numeric field that may be encoded as a JSON number or a JSON string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Flex {
    Num(f64),
    Str(String),
}

impl Flex {
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Flex::Num(n) => *n,
            Flex::Str(s) => s.trim().parse().ok()?,
        };
        value.is_finite().then_some(value)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Flex::Str(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))
            }
            Flex::Num(n) if n.is_finite() => Some(*n as i64),
            Flex::Num(_) => None,
        }
    }
}

/// Reads an optional volume-like field, treating anything unusable as zero.
pub fn amount_or_zero(value: Option<&Flex>) -> f64 {
    value.and_then(Flex::as_f64).unwrap_or(0.0)
}

/// Brings a raw funding rate into fraction form.
///
/// Values above 1 in magnitude are taken to be percentages and divided by 100.
/// Anything still not strictly inside (-1, 1) afterwards is rejected.
pub fn normalize_rate(raw: f64) -> Option<f64> {
    if !raw.is_finite() {
        return None;
    }
    let rate = if raw.abs() > 1.0 { raw / 100.0 } else { raw };
    (rate.abs() < 1.0).then_some(rate)
}

/// Parses and normalizes a rate field, or explains why the record is unusable.
pub fn parse_rate(field: &'static str, value: Option<&Flex>) -> Result<f64, RecordError> {
    let value = value.ok_or(RecordError::Missing(field))?;
    let raw = value.as_f64().ok_or_else(|| RecordError::Invalid {
        field,
        value: format!("{value:?}"),
    })?;
    normalize_rate(raw).ok_or_else(|| RecordError::Invalid {
        field,
        value: raw.to_string(),
    })
}

/// Native unit of an exchange's epoch timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochUnit {
    Seconds,
    Millis,
}

impl EpochUnit {
    /// Zero and negative values mean "not provided".
    pub fn to_utc(self, raw: i64) -> Option<DateTime<Utc>> {
        if raw <= 0 {
            return None;
        }
        match self {
            EpochUnit::Seconds => DateTime::from_timestamp(raw, 0),
            EpochUnit::Millis => DateTime::from_timestamp_millis(raw),
        }
    }
}

/// How to synthesize a next-funding time the exchange did not send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingCycle {
    /// Next multiple of this many hours since the Unix epoch, in UTC.
    /// `EveryHours(8)` lands on 00:00, 08:00 and 16:00 UTC.
    EveryHours(u32),
    /// A fixed number of hours after now.
    HoursFromNow(u32),
}

impl FundingCycle {
    pub const HOURLY: Self = FundingCycle::EveryHours(1);
    pub const EIGHT_HOURLY: Self = FundingCycle::EveryHours(8);

    /// Always strictly later than `now`.
    pub fn next_after(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            FundingCycle::EveryHours(hours) => {
                let period = i64::from(hours.max(1)) * 3600;
                let next = (now.timestamp().div_euclid(period) + 1) * period;
                DateTime::from_timestamp(next, 0)
                    .unwrap_or_else(|| now + TimeDelta::seconds(period))
            }
            FundingCycle::HoursFromNow(hours) => now + TimeDelta::hours(i64::from(hours.max(1))),
        }
    }
}

/// Per-exchange timestamp handling: the native unit plus the fallback cycle.
#[derive(Debug, Clone, Copy)]
pub struct TimePolicy {
    pub unit: EpochUnit,
    pub fallback: FundingCycle,
}

impl TimePolicy {
    pub const fn new(unit: EpochUnit, fallback: FundingCycle) -> Self {
        Self { unit, fallback }
    }

    /// Projects the upstream timestamp (or the synthesized one) into `zone`.
    pub fn next_funding(&self, zone: &Zone, raw: Option<i64>, now: DateTime<Utc>) -> String {
        let ts = raw
            .and_then(|raw| self.unit.to_utc(raw))
            .unwrap_or_else(|| self.fallback.next_after(now));
        zone.format(ts)
    }
}

/// Collects the records that parsed, logging and dropping the rest.
pub fn collect_valid<I>(exchange: &str, records: I) -> Snapshot
where
    I: IntoIterator<Item = Result<FundingRate, RecordError>>,
{
    let mut skipped = 0usize;
    let rates: Snapshot = records
        .into_iter()
        .filter_map(|record| match record {
            Ok(rate) => Some(rate),
            Err(e) => {
                skipped += 1;
                tracing::debug!("[{exchange}] skipping record: {e}");
                None
            }
        })
        .collect();

    if skipped > 0 {
        tracing::debug!("[{exchange}] skipped {skipped} malformed records");
    }
    rates
}
