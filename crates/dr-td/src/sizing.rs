//! Order sizing for opening orders.
//!
//! The bot assumes control of the whole account: an opening order commits the
//! margin balance, capped at a fixed notional, scaled by a safety ratio and
//! rounded to the precision the order API accepts.

use dr_core::config::TradingConfig;
use dr_core::round_dp;

/// Sizing parameters, resolved once from the trading config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderSizing {
    /// Upper bound on the quote notional of one order.
    pub max_trade_notional: f64,
    /// Share of the tradable notional actually committed.
    pub margin_ratio: f64,
    /// Decimal places for the base quantity.
    pub quantity_precision: u32,
}

impl OrderSizing {
    pub fn from_config(cfg: &TradingConfig) -> Self {
        Self {
            max_trade_notional: cfg.max_trade_notional,
            margin_ratio: cfg.margin_ratio,
            quantity_precision: cfg.quantity_precision,
        }
    }

    /// Base-asset quantity for an opening order.
    ///
    /// `min(max_trade_notional, margin_balance) / mark_price * margin_ratio`,
    /// rounded to `quantity_precision`. Returns 0 for a non-positive price or balance.
    pub fn base_quantity(&self, margin_balance: f64, mark_price: f64) -> f64 {
        if !(mark_price > 0.0) || !(margin_balance > 0.0) {
            return 0.0;
        }
        let tradable = self.max_trade_notional.min(margin_balance);
        let raw = tradable / mark_price * self.margin_ratio;
        round_dp(raw, self.quantity_precision)
    }
}

impl Default for OrderSizing {
    fn default() -> Self {
        Self::from_config(&TradingConfig::default())
    }
}

/// Render a quantity for the order API without exponent notation.
pub fn format_quantity(quantity: f64) -> String {
    quantity.to_string()
}
