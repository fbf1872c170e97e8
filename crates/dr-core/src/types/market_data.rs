//! Market data structures.
//!
//! # Timestamp convention
//!
//! Candle timestamps are kept exactly as the exchange sends them:
//! **milliseconds since Unix epoch**.

use serde::{Deserialize, Serialize};

use crate::error::BotError;

// ---------------------------------------------------------------------------
// Candle (kline)
// ---------------------------------------------------------------------------

/// One fixed-width OHLCV bar.
///
/// The kline endpoint returns each bar as a positional array:
///
/// ```text
/// [openTime, "open", "high", "low", "close", "volume", closeTime,
///  "quoteAssetVolume", numberOfTrades, "takerBuyBaseAssetVolume",
///  "takerBuyQuoteAssetVolume", "ignore"]
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: u64,
    pub quote_asset_volume: f64,
    pub trade_count: u64,
    pub taker_buy_base_volume: f64,
    pub taker_buy_quote_volume: f64,
}

impl Candle {
    /// Parse one positional kline array.
    pub fn from_kline(v: &serde_json::Value) -> Result<Self, BotError> {
        let arr = v.as_array().ok_or_else(|| BotError::Parse(format!("kline is not an array: {v}")))?;
        if arr.len() < 11 {
            return Err(BotError::Parse(format!("kline has {} fields, expected at least 11", arr.len())));
        }

        let candle = Self {
            open_time: int_field(arr, 0, "openTime")?,
            open: float_field(arr, 1, "open")?,
            high: float_field(arr, 2, "high")?,
            low: float_field(arr, 3, "low")?,
            close: float_field(arr, 4, "close")?,
            volume: float_field(arr, 5, "volume")?,
            close_time: int_field(arr, 6, "closeTime")?,
            quote_asset_volume: float_field(arr, 7, "quoteAssetVolume")?,
            trade_count: int_field(arr, 8, "numberOfTrades")?,
            taker_buy_base_volume: float_field(arr, 9, "takerBuyBaseAssetVolume")?,
            taker_buy_quote_volume: float_field(arr, 10, "takerBuyQuoteAssetVolume")?,
        };

        if candle.open_time >= candle.close_time {
            return Err(BotError::Parse(format!(
                "kline openTime {} is not before closeTime {}",
                candle.open_time, candle.close_time
            )));
        }
        Ok(candle)
    }
}

/// Parse a kline response body (array of positional arrays).
pub fn parse_klines(v: &serde_json::Value) -> Result<Vec<Candle>, BotError> {
    let rows = v.as_array().ok_or_else(|| BotError::Parse(format!("klines response is not an array: {v}")))?;
    rows.iter().map(Candle::from_kline).collect()
}

/// Closing prices of a candle series, oldest first.
pub fn close_prices(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

// ---------------------------------------------------------------------------
// JSON field helpers
// ---------------------------------------------------------------------------

/// Decimal fields arrive as strings; accept plain numbers as well.
fn float_field(arr: &[serde_json::Value], idx: usize, name: &str) -> Result<f64, BotError> {
    let v = &arr[idx];
    v.as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| v.as_f64())
        .ok_or_else(|| BotError::Parse(format!("kline field {name} is not numeric: {v}")))
}

fn int_field(arr: &[serde_json::Value], idx: usize, name: &str) -> Result<u64, BotError> {
    let v = &arr[idx];
    v.as_u64().ok_or_else(|| BotError::Parse(format!("kline field {name} is not an integer: {v}")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn kline(open_time: u64, close: &str) -> serde_json::Value {
        json!([
            open_time, "100.0", "110.0", "95.0", close, "12.5", open_time + 59_999,
            "1250.0", 42, "6.0", "600.0", "0"
        ])
    }

    #[test]
    fn parses_positional_kline() {
        let c = Candle::from_kline(&kline(1_600_000_000_000, "105.5")).unwrap();
        assert_eq!(c.open_time, 1_600_000_000_000);
        assert_eq!(c.close_time, 1_600_000_059_999);
        assert_eq!(c.close, 105.5);
        assert_eq!(c.trade_count, 42);
        assert_eq!(c.taker_buy_quote_volume, 600.0);
    }

    #[test]
    fn close_prices_keep_order() {
        let body = json!([kline(0, "1.0"), kline(60_000, "2.0"), kline(120_000, "3.0")]);
        let candles = parse_klines(&body).unwrap();
        assert_eq!(close_prices(&candles), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn rejects_short_or_malformed_rows() {
        assert!(Candle::from_kline(&json!([1, "2"])).is_err());
        let mut bad = kline(0, "1.0");
        bad[4] = json!("not-a-number");
        assert!(matches!(Candle::from_kline(&bad), Err(BotError::Parse(_))));
        assert!(parse_klines(&json!({"code": -1121, "msg": "Invalid symbol."})).is_err());
    }

    #[test]
    fn rejects_inverted_times() {
        let mut bad = kline(10_000, "1.0");
        bad[6] = json!(5_000);
        assert!(Candle::from_kline(&bad).is_err());
    }
}
