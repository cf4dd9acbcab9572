use crate::errors::ExchangeError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// API key, secret and passphrase for an exchange that signs requests.
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub secret_key: String,
    pub passphrase: String,
}

impl Credentials {
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            passphrase: passphrase.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.secret_key.is_empty() && !self.passphrase.is_empty()
    }

    /// `base64(HMAC-SHA256(secret, timestamp + method + path + body))`
    pub fn sign(
        &self,
        timestamp: &str,
        method: &str,
        request_path: &str,
        body: &str,
    ) -> Result<String, ExchangeError> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ExchangeError::Config(format!("invalid signing key: {e}")))?;
        mac.update(timestamp.as_bytes());
        mac.update(method.as_bytes());
        mac.update(request_path.as_bytes());
        mac.update(body.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &mask(&self.api_key))
            .field("secret_key", &"***")
            .field("passphrase", &"***")
            .finish()
    }
}

fn mask(value: &str) -> String {
    match value.get(..4) {
        Some(prefix) if value.len() > 8 => format!("{prefix}..."),
        _ if value.is_empty() => String::new(),
        _ => "***".to_string(),
    }
}

/// Source of secrets for an authenticated adapter.
pub trait CredentialProvider: Send + Sync {
    /// `None` when nothing is configured. Partially filled credentials are
    /// returned as-is; callers check [`Credentials::is_complete`].
    fn credentials(&self) -> Option<Credentials>;
}

impl CredentialProvider for Credentials {
    fn credentials(&self) -> Option<Credentials> {
        Some(self.clone())
    }
}

/// Reads the three secrets from environment variables on every call.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    key_var: &'static str,
    secret_var: &'static str,
    passphrase_var: &'static str,
}

impl EnvCredentials {
    pub const fn new(
        key_var: &'static str,
        secret_var: &'static str,
        passphrase_var: &'static str,
    ) -> Self {
        Self {
            key_var,
            secret_var,
            passphrase_var,
        }
    }

    pub const fn okx() -> Self {
        Self::new("OKX_API_KEY", "OKX_SECRET_KEY", "OKX_PASSPHRASE")
    }
}

impl CredentialProvider for EnvCredentials {
    fn credentials(&self) -> Option<Credentials> {
        let read = |var: &str| std::env::var(var).unwrap_or_default().trim().to_string();
        let creds = Credentials::new(
            read(self.key_var),
            read(self.secret_var),
            read(self.passphrase_var),
        );
        if creds.api_key.is_empty() && creds.secret_key.is_empty() && creds.passphrase.is_empty() {
            None
        } else {
            Some(creds)
        }
    }
}
