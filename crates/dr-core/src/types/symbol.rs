//! Trading pair identifiers.
//!
//! The exchange addresses a pair by its concatenated form (`BTCUSDT`), while
//! sizing logic needs to know the quote asset separately, so both halves are
//! kept.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A base/quote trading pair. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol {
    base: String,
    quote: String,
}

impl Symbol {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self { base: base.into(), quote: quote.into() }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Exchange pair identifier, e.g. `BTCUSDT`.
    pub fn pair(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Self::new("BTC", "USDT")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_concatenates() {
        let sym = Symbol::new("ETH", "USDT");
        assert_eq!(sym.pair(), "ETHUSDT");
        assert_eq!(sym.to_string(), "ETH/USDT");
    }

    #[test]
    fn deserializes_from_config_shape() {
        let sym: Symbol = serde_json::from_str(r#"{"base": "SOL", "quote": "USDT"}"#).unwrap();
        assert_eq!(sym.base(), "SOL");
        assert_eq!(sym.quote(), "USDT");
    }
}
