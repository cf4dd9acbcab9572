use crate::exchanges;
use anyhow::{Context as _, bail};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// IANA zone for `next_funding` timestamps; local time when unset
    pub timezone: Option<String>,
    pub exchanges: Vec<String>,
    pub refresh_interval: Duration,
    pub http_timeout: Duration,
    pub api_port: u16,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: None,
            exchanges: exchanges::ALL.iter().map(|s| s.to_string()).collect(),
            refresh_interval: Duration::from_secs(60),
            http_timeout: Duration::from_secs(10),
            api_port: 3000,
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, falling back to defaults for
    /// unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let timezone = get("TIMEZONE");

        // default to every supported exchange if EXCHANGES is not set
        let exchanges = match get("EXCHANGES") {
            Some(list) => parse_exchanges(&list)?,
            None => defaults.exchanges,
        };

        let refresh_interval = match get("REFRESH_INTERVAL_SECS") {
            Some(v) => Duration::from_secs(positive_secs("REFRESH_INTERVAL_SECS", &v)?),
            None => defaults.refresh_interval,
        };

        let http_timeout = match get("HTTP_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(positive_secs("HTTP_TIMEOUT_SECS", &v)?),
            None => defaults.http_timeout,
        };

        let api_port = match get("API_PORT") {
            Some(v) => v
                .parse::<u16>()
                .with_context(|| format!("API_PORT must be a valid port number (1-65535), got {v:?}"))?,
            None => defaults.api_port,
        };

        let log_format = match get("LOG_FORMAT").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => bail!("LOG_FORMAT must be `text` or `json`, got {other:?}"),
        };

        Ok(Self {
            timezone,
            exchanges,
            refresh_interval,
            http_timeout,
            api_port,
            log_format,
        })
    }
}

fn parse_exchanges(list: &str) -> anyhow::Result<Vec<String>> {
    let mut names = Vec::new();
    for name in list.split(',').map(|s| s.trim().to_lowercase()) {
        if name.is_empty() || names.contains(&name) {
            continue;
        }
        if !exchanges::ALL.contains(&name.as_str()) {
            bail!(
                "unknown exchange {name:?} in EXCHANGES, expected any of {}",
                exchanges::ALL.join(", ")
            );
        }
        names.push(name);
    }
    if names.is_empty() {
        bail!("EXCHANGES must name at least one exchange");
    }
    Ok(names)
}

fn positive_secs(key: &str, value: &str) -> anyhow::Result<u64> {
    match value.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => bail!("{key} must be a positive number of seconds, got {value:?}"),
    }
}
