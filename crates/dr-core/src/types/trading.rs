//! Trading-related data structures — orders, positions, and signal records.

use serde::{Deserialize, Serialize};

use super::enums::{OrderType, PositionSide, Side};

// ---------------------------------------------------------------------------
// Order
// ---------------------------------------------------------------------------

/// An order request. Created per trading action and never persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Exchange pair identifier (e.g. `"BTCUSDT"`).
    pub symbol: String,
    pub side: Side,
    /// Base-asset quantity.
    pub quantity: f64,
    pub order_type: OrderType,
}

impl Order {
    pub fn market(symbol: impl Into<String>, side: Side, quantity: f64) -> Self {
        Self { symbol: symbol.into(), side, quantity, order_type: OrderType::Market }
    }
}

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A position snapshot as reported by the exchange.
///
/// Never cached across cycles: the exchange is the only source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Exchange pair identifier.
    pub symbol: String,
    /// Net position amount (positive = long, negative = short).
    pub position_amt: f64,
    /// Average entry price.
    pub entry_price: f64,
    /// Unrealized PnL.
    pub unrealized_pnl: f64,
}

impl Position {
    pub fn side(&self) -> PositionSide {
        PositionSide::from_amount(self.position_amt)
    }

    /// Unsigned size of the position.
    pub fn amount(&self) -> f64 {
        self.position_amt.abs()
    }

    /// Parse one entry of the account snapshot's `positions` array.
    ///
    /// Decimal fields arrive as strings; missing optional fields default to zero.
    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        let num = |key: &str| -> Option<f64> {
            let f = v.get(key)?;
            f.as_str().and_then(|s| s.parse().ok()).or_else(|| f.as_f64())
        };
        Some(Self {
            symbol: v.get("symbol")?.as_str()?.to_string(),
            position_amt: num("positionAmt")?,
            entry_price: num("entryPrice").unwrap_or(0.0),
            unrealized_pnl: num("unrealizedProfit").or_else(|| num("unRealizedProfit")).unwrap_or(0.0),
        })
    }
}

// ---------------------------------------------------------------------------
// Signal record (append-only log entry)
// ---------------------------------------------------------------------------

/// One row written to the external signal log per engine cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRecord {
    pub model_id: String,
    /// Milliseconds since Unix epoch.
    pub time_logged: u64,
    pub signal_issued: Side,
    pub ft_value: f64,
    pub current_price: f64,
}

impl SignalRecord {
    /// Build a record, rounding `ft_value` to 15 and `current_price` to 2 decimals.
    pub fn new(model_id: impl Into<String>, time_logged: u64, signal: Side, ft: f64, price: f64) -> Self {
        Self {
            model_id: model_id.into(),
            time_logged,
            signal_issued: signal,
            ft_value: round_dp(ft, 15),
            current_price: round_dp(price, 2),
        }
    }
}

/// Round half away from zero to `dp` decimal places.
pub fn round_dp(value: f64, dp: u32) -> f64 {
    let factor = 10f64.powi(dp as i32);
    (value * factor).round() / factor
}
