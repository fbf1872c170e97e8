//! Held-out futures backtest.
//!
//! Replays a close series through trained parameters, flipping between a long
//! and a short position whenever the signal changes side, and compares the
//! outcome with buying at the first close and holding.
//!
//! Step `i` sees `closes[..=i]` and fills at `closes[i - 1]`, the open of the
//! interval being traded. Trading starts at `len(theta) + 2` so the first
//! signal has a full lookback behind it. Commission is charged on every fill.

use anyhow::Result;
use dr_core::{BotError, PositionSide, Side};
use serde::Serialize;
use tracing::{debug, info};

use crate::signal::{compute_ft, normalise_diffs, signal_side};
use crate::state::ModelState;

/// Portfolio state after one simulated step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRow {
    pub index: usize,
    pub signal: Side,
    pub ft: f64,
    /// Fill price for this step.
    pub price: f64,
    /// Order side executed when the position flipped.
    pub action: Option<Side>,
    pub position: PositionSide,
    pub usd_balance: f64,
    pub base_balance: f64,
    /// Quote proceeds of the borrowed base, held aside while a short is open.
    pub short_usd: f64,
    pub portfolio_usd: f64,
    pub portfolio_base: f64,
}

/// Per-step ledger plus the final totals of both strategies.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub rows: Vec<LedgerRow>,
    /// Quote value after force-closing the last position.
    pub model_total: f64,
    pub buy_hold_total: f64,
}

/// Cash, holdings, and the open short of the simulated account.
#[derive(Debug)]
struct Book {
    keep: f64,
    usd: f64,
    base: f64,
    short_base: f64,
    short_usd: f64,
    position: PositionSide,
}

impl Book {
    fn new(start_funds: f64, commission: f64) -> Self {
        Self {
            keep: 1.0 - commission,
            usd: start_funds,
            base: 0.0,
            short_base: 0.0,
            short_usd: 0.0,
            position: PositionSide::Flat,
        }
    }

    /// Buy back the borrowed base with the set-aside proceeds; the difference stays in `base`.
    fn cover(&mut self, price: f64) {
        let bought = self.short_usd / price * self.keep;
        self.base += bought - self.short_base;
        self.short_base = 0.0;
        self.short_usd = 0.0;
        self.position = PositionSide::Flat;
    }

    fn go_long(&mut self, price: f64) {
        if self.position == PositionSide::Short {
            self.cover(price);
        }
        self.base += self.usd / price * self.keep;
        self.usd = 0.0;
        self.position = PositionSide::Long;
    }

    fn go_short(&mut self, price: f64) {
        if self.position == PositionSide::Long {
            self.usd = price * self.base * self.keep;
            self.base = 0.0;
        }
        self.short_base = self.usd / price * self.keep;
        self.short_usd = price * self.short_base;
        self.position = PositionSide::Short;
    }

    /// Flatten at `price` and return the quote value of the account.
    fn close_out(&mut self, price: f64) -> f64 {
        match self.position {
            PositionSide::Long => {
                self.usd += price * self.base * self.keep;
                self.base = 0.0;
            }
            PositionSide::Short => {
                self.cover(price);
                self.usd += self.base * price;
                self.base = 0.0;
            }
            PositionSide::Flat => {
                self.usd += self.base * price;
                self.base = 0.0;
            }
        }
        self.position = PositionSide::Flat;
        self.usd
    }
}

/// Run the long/short backtest of `state` over `closes`.
///
/// Fails with `InsufficientData` when the series leaves no step to trade.
pub fn simulate(closes: &[f64], state: &ModelState, commission: f64, start_funds: f64) -> Result<SimulationReport> {
    if !(0.0..1.0).contains(&commission) {
        return Err(BotError::Config(format!("commission must be in [0, 1), got {commission}")).into());
    }
    if !(start_funds.is_finite() && start_funds > 0.0) {
        return Err(BotError::Config(format!("start funds must be positive, got {start_funds}")).into());
    }
    let start = state.theta.len() + 2;
    if closes.len() <= start {
        return Err(BotError::InsufficientData { needed: start + 1, got: closes.len() }.into());
    }
    if closes.iter().any(|c| !(c.is_finite() && *c > 0.0)) {
        return Err(BotError::BusinessRule("close prices must be positive".into()).into());
    }

    // Ft over closes[..=i] is ft[i - 1] of the whole series: the recursion only looks back.
    let x = normalise_diffs(closes, state.mean, state.std);
    let ft = compute_ft(&x, &state.theta);

    let mut book = Book::new(start_funds, commission);
    let mut rows = Vec::with_capacity(closes.len() - start);
    for i in start..closes.len() {
        let ft_i = ft[i - 1];
        let signal = signal_side(ft_i);
        let price = closes[i - 1];

        let action = match (signal, book.position) {
            (Side::Buy, PositionSide::Flat | PositionSide::Short) => {
                book.go_long(price);
                Some(Side::Buy)
            }
            (Side::Sell, PositionSide::Flat | PositionSide::Long) => {
                book.go_short(price);
                Some(Side::Sell)
            }
            _ => None,
        };
        if let Some(side) = action {
            debug!("step {i}: Ft={ft_i:.6} -> {side} at {price}");
        }

        rows.push(LedgerRow {
            index: i,
            signal,
            ft: ft_i,
            price,
            action,
            position: book.position,
            usd_balance: book.usd,
            base_balance: book.base,
            short_usd: book.short_usd,
            portfolio_usd: price * book.base + book.usd,
            portfolio_base: book.base + book.usd / price,
        });
    }

    let final_price = closes[closes.len() - 2];
    let model_total = book.close_out(final_price);
    let keep = 1.0 - commission;
    let buy_hold_total = final_price * (start_funds / closes[0] * keep) * keep;
    info!("simulation over {} steps: model total={model_total:.2}, buy/hold total={buy_hold_total:.2}", rows.len());

    Ok(SimulationReport { rows, model_total, buy_hold_total })
}

#[cfg(test)]
mod tests {
    use super::*;

    // M = 1, so trading starts at index 5.
    fn state(theta: Vec<f64>) -> ModelState {
        ModelState::new(theta, 0.0, 1.0)
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn too_short_series_is_insufficient_data() {
        let closes = [100.0, 101.0, 102.0, 103.0, 104.0];
        let err = simulate(&closes, &state(vec![1.0, 0.0, 0.0]), 0.001, 1000.0).unwrap_err();
        assert!(matches!(err.downcast_ref::<BotError>(), Some(BotError::InsufficientData { needed: 6, got: 5 })));
    }

    #[test]
    fn bad_commission_rejected() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let err = simulate(&closes, &state(vec![1.0, 0.0, 0.0]), 1.5, 1000.0).unwrap_err();
        assert!(matches!(err.downcast_ref::<BotError>(), Some(BotError::Config(_))));
    }

    #[test]
    fn positive_signal_buys_once_and_holds() {
        let c = 0.001;
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let report = simulate(&closes, &state(vec![1.0, 0.0, 0.0]), c, 1000.0).unwrap();

        assert_eq!(report.rows.len(), 5);
        assert_eq!(report.rows[0].index, 5);
        assert_eq!(report.rows[0].price, 104.0);
        assert_eq!(report.rows[0].action, Some(Side::Buy));
        assert!(report.rows[1..].iter().all(|r| r.action.is_none() && r.position == PositionSide::Long));

        let base = 1000.0 / 104.0 * (1.0 - c);
        assert_close(report.rows[0].base_balance, base);
        assert_close(report.rows[0].usd_balance, 0.0);
        assert_close(report.model_total, 108.0 * base * (1.0 - c));
        assert_close(report.buy_hold_total, 108.0 * (1000.0 / 100.0 * (1.0 - c)) * (1.0 - c));
        assert!(report.model_total < report.buy_hold_total);
    }

    #[test]
    fn negative_signal_profits_from_falling_prices() {
        let c = 0.001;
        let closes: Vec<f64> = (0..10).map(|i| 200.0 - i as f64).collect();
        let report = simulate(&closes, &state(vec![-1.0, 0.0, 0.0]), c, 1000.0).unwrap();

        assert_eq!(report.rows[0].action, Some(Side::Sell));
        assert!(report.rows.iter().all(|r| r.position == PositionSide::Short));
        // Cash is untouched while the short runs.
        assert_close(report.rows[4].usd_balance, 1000.0);

        let short_base = 1000.0 / 196.0 * (1.0 - c);
        let short_usd = 196.0 * short_base;
        assert_close(report.rows[0].short_usd, short_usd);
        let remainder = short_usd / 192.0 * (1.0 - c) - short_base;
        assert_close(report.model_total, 1000.0 + remainder * 192.0);
        assert!(report.model_total > 1000.0);
    }

    #[test]
    fn alternating_signal_flips_every_step() {
        // Strong negative feedback: Ft changes sign every step.
        let theta = vec![0.5, 0.0, -5.0];
        let closes = vec![100.0; 12];

        let free = simulate(&closes, &state(theta.clone()), 0.0, 1000.0).unwrap();
        let actions: Vec<_> = free.rows.iter().map(|r| r.action).collect();
        assert!(actions.iter().all(Option::is_some));
        assert!(actions.windows(2).all(|w| w[0] != w[1]));
        assert_close(free.model_total, 1000.0);
        assert_close(free.buy_hold_total, 1000.0);

        let charged = simulate(&closes, &state(theta), 0.01, 1000.0).unwrap();
        assert!(charged.model_total < free.model_total);
    }

    #[test]
    fn ledger_serialises_camel_case() {
        let closes: Vec<f64> = (0..8).map(|i| 100.0 + i as f64).collect();
        let report = simulate(&closes, &state(vec![1.0, 0.0, 0.0]), 0.0, 1000.0).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["rows"][0]["action"], "BUY");
        assert_eq!(json["rows"][0]["position"], "long");
        assert!(json["modelTotal"].is_number());
        assert!(json["buyHoldTotal"].is_number());
    }
}
