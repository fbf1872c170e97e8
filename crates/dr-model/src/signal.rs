//! Recursive autoregressive signal.
//!
//! For a normalised difference series `x` and weights `theta` of length `M + 2`:
//!
//! ```text
//! Ft[t] = tanh(theta · [1, x[t-M..t-1], Ft[t-1]])   for t >= M
//! Ft[t] = 0                                           for t <  M
//! ```
//!
//! Each value feeds the next, so the whole series is recomputed on every call.

use std::path::Path;

use anyhow::Result;
use dr_core::{BotError, Side};
use tracing::{debug, info};

use crate::state::ModelState;

/// `(close[i] - close[i-1] - mean) / std` for every consecutive pair.
pub fn normalise_diffs(closes: &[f64], mean: f64, std: f64) -> Vec<f64> {
    closes.windows(2).map(|w| (w[1] - w[0] - mean) / std).collect()
}

/// Weighted input at step `t`: bias, the last `m` differences, and the previous signal.
fn activation(theta: &[f64], x: &[f64], t: usize, prev: f64) -> f64 {
    let m = theta.len() - 2;
    let lags: f64 = theta[1..=m].iter().zip(&x[t - m..t]).map(|(w, xi)| w * xi).sum();
    theta[0] + lags + theta[m + 1] * prev
}

/// The full `Ft` series for `x`, computed as a forward loop.
///
/// Values before index `M` are zero; every other value lies in `[-1, 1]`.
pub fn compute_ft(x: &[f64], theta: &[f64]) -> Vec<f64> {
    assert!(theta.len() >= 2, "theta needs at least a bias and a feedback weight");
    let m = theta.len() - 2;
    let mut ft = vec![0.0; x.len()];
    let mut prev = 0.0;
    for t in m..x.len() {
        ft[t] = activation(theta, x, t, prev).tanh();
        prev = ft[t];
    }
    ft
}

/// BUY when `ft >= 0`, SELL otherwise.
pub fn signal_side(ft: f64) -> Side {
    if ft < 0.0 { Side::Sell } else { Side::Buy }
}

/// Per-step strategy returns net of the `commission` charged on position changes.
///
/// `R[0] = 0`, `R[t] = Ft[t-1] * x[t] - commission * |Ft[t] - Ft[t-1]|`.
pub fn strategy_returns(ft: &[f64], x: &[f64], commission: f64) -> Vec<f64> {
    let mut r = Vec::with_capacity(x.len());
    if x.is_empty() {
        return r;
    }
    r.push(0.0);
    for t in 1..x.len() {
        r.push(ft[t - 1] * x[t] - commission * (ft[t] - ft[t - 1]).abs());
    }
    r
}

/// Holds trained parameters and turns a close-price series into a signal.
#[derive(Debug, Default)]
pub struct SignalModel {
    state: Option<ModelState>,
}

impl SignalModel {
    /// An empty model; [`get_signal`](Self::get_signal) fails until parameters are loaded.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: ModelState) -> Result<Self> {
        let mut model = Self::new();
        model.set_state(state)?;
        Ok(model)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let mut model = Self::new();
        model.load(path)?;
        Ok(model)
    }

    /// Load and validate parameters from a model file.
    pub fn load(&mut self, path: &Path) -> Result<()> {
        let state = ModelState::load(path)?;
        info!("loaded model {} (M={}, mean={}, std={})", path.display(), state.m, state.mean, state.std);
        self.state = Some(state);
        Ok(())
    }

    pub fn set_state(&mut self, state: ModelState) -> Result<()> {
        state.validate()?;
        self.state = Some(state);
        Ok(())
    }

    fn loaded(&self) -> Result<&ModelState, BotError> {
        self.state
            .as_ref()
            .ok_or_else(|| BotError::NotInitialized("model parameters must be loaded before use".into()))
    }

    /// `Ft` for every difference in `closes`.
    pub fn ft_series(&self, closes: &[f64]) -> Result<Vec<f64>> {
        let state = self.loaded()?;
        if closes.len() <= state.m {
            return Err(BotError::InsufficientData { needed: state.m, got: closes.len() }.into());
        }
        let x = normalise_diffs(closes, state.mean, state.std);
        Ok(compute_ft(&x, &state.theta))
    }

    /// Signal for the latest step: BUY when `Ft >= 0`, SELL otherwise.
    pub fn get_signal(&self, closes: &[f64]) -> Result<(Side, f64)> {
        let ft = self.ft_series(closes)?.last().copied().unwrap_or(0.0);
        let side = signal_side(ft);
        debug!("Ft={ft} -> {side}");
        Ok((side, ft))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closes() -> Vec<f64> {
        // Deterministic zig-zag with drift.
        (0..120).map(|i| 100.0 + i as f64 * 0.5 + if i % 3 == 0 { 4.0 } else { -2.0 }).collect()
    }

    fn model(theta: Vec<f64>) -> SignalModel {
        SignalModel::from_state(ModelState::new(theta, 0.1, 3.0)).unwrap()
    }

    #[test]
    fn diffs_are_normalised() {
        assert_eq!(normalise_diffs(&[10.0, 13.0, 12.0], 1.0, 2.0), vec![1.0, -1.0]);
        assert!(normalise_diffs(&[10.0], 0.0, 1.0).is_empty());
    }

    #[test]
    fn ft_is_zero_before_window_and_bounded_after() {
        let x = normalise_diffs(&closes(), 0.1, 3.0);
        let theta = vec![5.0, -3.0, 8.0, 2.0, -7.0, 4.0, 9.0];
        let ft = compute_ft(&x, &theta);
        assert_eq!(ft.len(), x.len());
        assert!(ft[..5].iter().all(|&v| v == 0.0));
        assert!(ft[5..].iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn ft_feeds_back_previous_value() {
        // bias 0, one lag weight 0, feedback 1: Ft[t] = tanh(Ft[t-1]) stays zero.
        let ft = compute_ft(&[1.0, 2.0, 3.0], &[0.0, 0.0, 1.0]);
        assert_eq!(ft, vec![0.0, 0.0, 0.0]);
        // bias 1: Ft[1] = tanh(1), Ft[2] = tanh(1 + tanh(1)).
        let ft = compute_ft(&[1.0, 2.0, 3.0], &[1.0, 0.0, 1.0]);
        assert_eq!(ft[1], 1.0_f64.tanh());
        assert_eq!(ft[2], (1.0 + 1.0_f64.tanh()).tanh());
    }

    #[test]
    fn returns_start_at_zero_and_charge_commission() {
        let r = strategy_returns(&[0.0, 1.0, 1.0], &[0.5, 2.0, -1.0], 0.1);
        assert_eq!(r, vec![0.0, -0.1, -1.0]);
    }

    #[test]
    fn signal_sign_follows_ft() {
        let long = model(vec![1.0, 0.0, 0.0]);
        assert_eq!(long.get_signal(&closes()).unwrap().0, Side::Buy);
        let short = model(vec![-1.0, 0.0, 0.0]);
        let (side, ft) = short.get_signal(&closes()).unwrap();
        assert_eq!(side, Side::Sell);
        assert!(ft < 0.0);
    }

    #[test]
    fn signal_is_deterministic() {
        let m = model(vec![0.3, -0.2, 0.5, 0.1, 0.4]);
        assert_eq!(m.get_signal(&closes()).unwrap(), m.get_signal(&closes()).unwrap());
    }

    #[test]
    fn zero_ft_is_buy() {
        let m = model(vec![0.0, 0.0, 0.0]);
        assert_eq!(m.get_signal(&closes()).unwrap(), (Side::Buy, 0.0));
    }

    #[test]
    fn unloaded_model_is_not_initialized() {
        let err = SignalModel::new().get_signal(&closes()).unwrap_err();
        assert!(matches!(err.downcast_ref::<BotError>(), Some(BotError::NotInitialized(_))));
    }

    #[test]
    fn series_must_be_longer_than_window() {
        let m = model(vec![0.1; 7]);
        let err = m.get_signal(&closes()[..5]).unwrap_err();
        match err.downcast_ref::<BotError>() {
            Some(BotError::InsufficientData { needed, got }) => {
                assert_eq!((*needed, *got), (5, 5));
            }
            other => panic!("expected InsufficientData, got {other:?}"),
        }
        assert!(m.get_signal(&closes()[..6]).is_ok());
    }
}
