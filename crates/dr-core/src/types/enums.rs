//! Enumerations used throughout the trading bot.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BotError;

// ---------------------------------------------------------------------------
// Order / signal direction
// ---------------------------------------------------------------------------

/// Buy or sell. Used both as an order side and as the model's signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire representation expected by the exchange.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Position side
// ---------------------------------------------------------------------------

/// Direction of the account's exposure in one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Flat,
    Long,
    Short,
}

impl PositionSide {
    /// Derive the side from the exchange's signed position amount.
    pub fn from_amount(amount: f64) -> Self {
        if amount < 0.0 {
            Self::Short
        } else if amount != 0.0 {
            Self::Long
        } else {
            Self::Flat
        }
    }

    /// Order side that flattens this position, if any.
    pub fn closing_side(self) -> Option<Side> {
        match self {
            Self::Long => Some(Side::Sell),
            Self::Short => Some(Side::Buy),
            Self::Flat => None,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flat => f.write_str("flat"),
            Self::Long => f.write_str("long"),
            Self::Short => f.write_str("short"),
        }
    }
}

// ---------------------------------------------------------------------------
// Order type
// ---------------------------------------------------------------------------

/// Order types the bot places. Positions are only opened and flattened at market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderType {
    #[default]
    Market,
}

impl OrderType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Market => "MARKET",
        }
    }
}

// ---------------------------------------------------------------------------
// Candle interval
// ---------------------------------------------------------------------------

/// Candle widths accepted by the exchange's kline endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
    D3,
    W1,
}

impl Interval {
    /// Every valid interval, shortest first.
    pub const ALL: [Interval; 14] = [
        Self::M1,
        Self::M3,
        Self::M5,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H2,
        Self::H4,
        Self::H6,
        Self::H8,
        Self::H12,
        Self::D1,
        Self::D3,
        Self::W1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H2 => "2h",
            Self::H4 => "4h",
            Self::H6 => "6h",
            Self::H8 => "8h",
            Self::H12 => "12h",
            Self::D1 => "1d",
            Self::D3 => "3d",
            Self::W1 => "1w",
        }
    }

    /// Width of one candle in seconds.
    pub fn seconds(self) -> u64 {
        match self {
            Self::M1 => 60,
            Self::M3 => 180,
            Self::M5 => 300,
            Self::M15 => 900,
            Self::M30 => 1_800,
            Self::H1 => 3_600,
            Self::H2 => 7_200,
            Self::H4 => 14_400,
            Self::H6 => 21_600,
            Self::H8 => 28_800,
            Self::H12 => 43_200,
            Self::D1 => 86_400,
            Self::D3 => 259_200,
            Self::W1 => 604_800,
        }
    }
}

impl FromStr for Interval {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|i| i.as_str() == s).ok_or_else(|| {
            let valid: Vec<&str> = Self::ALL.iter().map(|i| i.as_str()).collect();
            BotError::Config(format!("{s} not a valid interval, must be one of: {}", valid.join(", ")))
        })
    }
}

impl TryFrom<String> for Interval {
    type Error = BotError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_side_from_amount() {
        assert_eq!(PositionSide::from_amount(-2.5), PositionSide::Short);
        assert_eq!(PositionSide::from_amount(3.0), PositionSide::Long);
        assert_eq!(PositionSide::from_amount(0.0), PositionSide::Flat);
    }

    #[test]
    fn closing_side_is_opposite_of_exposure() {
        assert_eq!(PositionSide::Long.closing_side(), Some(Side::Sell));
        assert_eq!(PositionSide::Short.closing_side(), Some(Side::Buy));
        assert_eq!(PositionSide::Flat.closing_side(), None);
    }

    #[test]
    fn interval_parse_and_seconds() {
        let i: Interval = "4h".parse().unwrap();
        assert_eq!(i, Interval::H4);
        assert_eq!(i.seconds(), 14_400);
        assert_eq!("1w".parse::<Interval>().unwrap().seconds(), 604_800);
    }

    #[test]
    fn invalid_interval_is_config_error() {
        let err = "2d".parse::<Interval>().unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
        assert!(err.to_string().contains("1m, 3m"));
    }

    #[test]
    fn interval_serde_uses_wire_string() {
        let i: Interval = serde_json::from_str("\"15m\"").unwrap();
        assert_eq!(i, Interval::M15);
        assert_eq!(serde_json::to_string(&Interval::D1).unwrap(), "\"1d\"");
        assert!(serde_json::from_str::<Interval>("\"7m\"").is_err());
    }

    #[test]
    fn side_wire_format() {
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
        assert_eq!(Side::Sell.to_string(), "SELL");
        assert_eq!(OrderType::default().as_str(), "MARKET");
    }
}
