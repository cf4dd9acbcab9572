use chrono::{DateTime, Local, SecondsFormat, Utc};
use chrono_tz::Tz;

/// The zone every `next_funding` timestamp is projected into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Zone {
    Named(Tz),
    #[default]
    Local,
}

impl Zone {
    /// Resolves an IANA zone name such as `Europe/Moscow`.
    /// Unset or unknown names fall back to the process's local zone.
    pub fn resolve(name: Option<&str>) -> Self {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            tracing::warn!("TIMEZONE not set, using local time");
            return Zone::Local;
        };

        match name.parse::<Tz>() {
            Ok(tz) => Zone::Named(tz),
            Err(e) => {
                tracing::warn!("Unknown timezone {name:?} ({e}), falling back to local time");
                Zone::Local
            }
        }
    }

    /// Formats an instant as RFC 3339 with second precision in this zone.
    pub fn format(&self, ts: DateTime<Utc>) -> String {
        match self {
            Zone::Named(tz) => ts
                .with_timezone(tz)
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            Zone::Local => ts
                .with_timezone(&Local)
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}
