use crate::errors::ExchangeError;
use std::collections::HashMap;

/// Trailing 24h volume for one symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Volume {
    /// In the instrument's base asset.
    pub base: f64,
    /// In quote currency (USDT for linear swaps).
    pub quote: f64,
}

/// Symbol-keyed volumes from an exchange's secondary volume endpoint.
///
/// Lookups are by exact exchange-native symbol. Unknown symbols get zero
/// volumes rather than an error, so a partial volume feed never drops a rate.
#[derive(Debug, Default)]
pub struct VolumeBook {
    by_symbol: HashMap<String, Volume>,
}

impl VolumeBook {
    pub fn lookup(&self, symbol: &str) -> Volume {
        self.by_symbol.get(symbol).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }

    /// Settles a volume fetch. A failed fetch degrades to an empty book
    /// so the enclosing funding-rate call can still succeed.
    pub fn or_empty(exchange: &str, fetched: Result<VolumeBook, ExchangeError>) -> VolumeBook {
        match fetched {
            Ok(book) => {
                tracing::debug!("[{exchange}] loaded volumes for {} symbols", book.len());
                book
            }
            Err(e) => {
                tracing::warn!("[{exchange}] volume data unavailable, using zero volumes: {e}");
                VolumeBook::default()
            }
        }
    }
}

impl FromIterator<(String, Volume)> for VolumeBook {
    fn from_iter<I: IntoIterator<Item = (String, Volume)>>(iter: I) -> Self {
        Self {
            by_symbol: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_symbols_have_zero_volume() {
        let book: VolumeBook = [(
            "BTCUSDT".to_string(),
            Volume {
                base: 12.5,
                quote: 800_000.0,
            },
        )]
        .into_iter()
        .collect();

        assert_eq!(book.lookup("BTCUSDT").quote, 800_000.0);
        assert_eq!(book.lookup("ETHUSDT"), Volume::default());
    }

    #[test]
    fn failed_fetch_degrades_to_empty() {
        let book = VolumeBook::or_empty(
            "test",
            Err(ExchangeError::UnexpectedData("boom".into())),
        );
        assert!(book.is_empty());
        assert_eq!(book.lookup("ANY"), Volume::default());
    }
}
