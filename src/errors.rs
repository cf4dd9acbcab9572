use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Unexpected data from exchange: {0}")]
    UnexpectedData(String),

    /// Non-success status embedded in an otherwise well-formed response body.
    #[error("Upstream API error {code}: {message}")]
    Upstream { code: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a failed adapter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Decode,
    Upstream,
    Config,
}

impl ExchangeError {
    pub fn upstream(code: impl ToString, message: impl Into<String>) -> Self {
        Self::Upstream {
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            // reqwest reports body decoding through the same error type
            Self::Http(e) if e.is_decode() => ErrorKind::Decode,
            Self::Http(_) => ErrorKind::Transport,
            Self::Parse(_) | Self::UnexpectedData(_) => ErrorKind::Decode,
            Self::Upstream { .. } => ErrorKind::Upstream,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

/// A single malformed record inside an otherwise valid batch.
/// Adapters log and skip these; they never fail a call.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("missing field `{0}`")]
    Missing(&'static str),

    #[error("invalid value for `{field}`: {value}")]
    Invalid { field: &'static str, value: String },

    #[error("malformed record: {0}")]
    Shape(#[from] serde_json::Error),
}
