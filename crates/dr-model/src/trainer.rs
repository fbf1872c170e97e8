//! Offline training.
//!
//! Gradient ascent on the Sharpe ratio of the strategy returns. The analytic
//! gradient is carried forward through the `Ft` recursion with a running
//! `dFt/dtheta` accumulator, so step `t` reuses the derivative from `t - 1`.

use anyhow::Result;
use dr_core::BotError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::signal::{compute_ft, strategy_returns};
use crate::state::ModelState;

/// Hyper-parameters of one training run.
#[derive(Debug, Clone)]
pub struct TrainParams {
    /// Number of training differences.
    pub n: usize,
    /// Number of held-out differences after the training window.
    pub p: usize,
    /// Lookback window.
    pub m: usize,
    pub epochs: usize,
    /// Cost charged per unit change of `Ft`.
    pub commission: f64,
    pub learning_rate: f64,
    /// Seed for the initial weights.
    pub seed: u64,
    pub dataset_name: Option<String>,
}

impl Default for TrainParams {
    fn default() -> Self {
        Self {
            n: 1000,
            p: 200,
            m: 15,
            epochs: 2500,
            commission: 0.001,
            learning_rate: 0.3,
            seed: 0,
            dataset_name: None,
        }
    }
}

/// Training and held-out series, normalised with the training statistics.
#[derive(Debug, Clone)]
pub struct TrainSplit {
    pub train: Vec<f64>,
    pub test: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

/// Split the price differences into the last `n + p` values and normalise.
///
/// `train = diffs[-(n+p)..-p]`, `test = diffs[-p..]`; the mean and population
/// standard deviation come from `train` only.
pub fn split_series(closes: &[f64], n: usize, p: usize) -> Result<TrainSplit, BotError> {
    let diffs: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    if diffs.len() < n + p {
        return Err(BotError::InsufficientData { needed: n + p, got: closes.len() });
    }
    let tail = &diffs[diffs.len() - (n + p)..];
    let (train, test) = tail.split_at(n);

    let mean = mean(train);
    let std = (train.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / train.len() as f64).sqrt();
    if !(std > 0.0) {
        return Err(BotError::Config("training differences have zero variance".into()));
    }
    let normalise = |v: &[f64]| v.iter().map(|d| (d - mean) / std).collect::<Vec<_>>();
    Ok(TrainSplit { train: normalise(train), test: normalise(test), mean, std })
}

fn mean(v: &[f64]) -> f64 {
    if v.is_empty() { 0.0 } else { v.iter().sum::<f64>() / v.len() as f64 }
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Sharpe ratio `A / sqrt(B - A^2)` of a return series, `A = mean(R)`, `B = mean(R^2)`.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let a = mean(returns);
    let b = returns.iter().map(|r| r * r).sum::<f64>() / returns.len().max(1) as f64;
    a / (b - a * a).sqrt()
}

/// Gradient of the Sharpe ratio with respect to `theta`, and the Sharpe ratio itself.
///
/// A degenerate return series (non-finite Sharpe or gradient) yields a zero gradient.
pub fn sharpe_gradient(x: &[f64], theta: &[f64], commission: f64) -> (Vec<f64>, f64) {
    let m = theta.len() - 2;
    let t_len = x.len();
    let ft = compute_ft(x, theta);
    let r = strategy_returns(&ft, x, commission);

    let a = mean(&r);
    let s = sharpe_ratio(&r);
    let zero = vec![0.0; theta.len()];
    if !s.is_finite() || a == 0.0 {
        return (zero, 0.0);
    }

    let ds_da = s * (1.0 + s * s) / a;
    let ds_db = -(s.powi(3)) / 2.0 / (a * a);
    let da_dr = 1.0 / t_len as f64;

    let feedback = theta[m + 1];
    let mut grad = zero.clone();
    let mut dfp = zero.clone();
    let mut features = vec![0.0; theta.len()];

    for t in m..t_len {
        let prev = if t == 0 { 0.0 } else { ft[t - 1] };
        features[0] = 1.0;
        features[1..=m].copy_from_slice(&x[t - m..t]);
        features[m + 1] = prev;

        let step = sign(ft[t] - prev);
        let dr_df = -commission * step;
        let dr_dfp = x[t] + commission * step;
        let db_dr = 2.0 / t_len as f64 * r[t];
        let ds_dr = ds_da * da_dr + ds_db * db_dr;
        let dtanh = 1.0 - ft[t] * ft[t];

        for k in 0..theta.len() {
            let df = dtanh * (features[k] + feedback * dfp[k]);
            grad[k] += ds_dr * (dr_df * df + dr_dfp * dfp[k]);
            dfp[k] = df;
        }
    }

    if grad.iter().any(|g| !g.is_finite()) {
        return (zero, s);
    }
    (grad, s)
}

/// Fits [`ModelState`] parameters to a close-price series.
#[derive(Debug, Clone, Default)]
pub struct Trainer {
    params: TrainParams,
}

impl Trainer {
    pub fn new(params: TrainParams) -> Self {
        Self { params }
    }

    /// Run every epoch and return the trained parameters with their metadata.
    pub fn train(&self, closes: &[f64]) -> Result<ModelState> {
        let p = &self.params;
        if p.n <= p.m {
            return Err(BotError::Config(format!("N ({}) must exceed the window M ({})", p.n, p.m)).into());
        }
        let split = split_series(closes, p.n, p.p)?;

        let mut rng = StdRng::seed_from_u64(p.seed);
        let mut theta: Vec<f64> = (0..p.m + 2).map(|_| rng.gen_range(0.0..1.0)).collect();
        let mut sharpes = Vec::with_capacity(p.epochs);

        info!(
            "training: N={} P={} M={} epochs={} commission={} learning_rate={}",
            p.n, p.p, p.m, p.epochs, p.commission, p.learning_rate
        );
        for epoch in 0..p.epochs {
            let (grad, sharpe) = sharpe_gradient(&split.train, &theta, p.commission);
            for (w, g) in theta.iter_mut().zip(&grad) {
                *w += g * p.learning_rate;
            }
            sharpes.push(sharpe);
            if (epoch + 1) % 100 == 0 || epoch + 1 == p.epochs {
                debug!("epoch {}/{}: sharpe={sharpe:.6}", epoch + 1, p.epochs);
            }
        }

        let test_sharpe = held_out_sharpe(&split.test, &theta, p.commission);
        info!(
            "training finished: final train sharpe={:.6}, held-out sharpe={test_sharpe:.6}",
            sharpes.last().copied().unwrap_or(0.0)
        );

        let state = ModelState {
            theta,
            mean: split.mean,
            std: split.std,
            m: p.m,
            sharpes: Some(sharpes),
            n: Some(p.n),
            p: Some(p.p),
            epochs: Some(p.epochs),
            commission: Some(p.commission),
            learning_rate: Some(p.learning_rate),
            train_dataset_name: p.dataset_name.clone(),
        };
        state.validate()?;
        Ok(state)
    }
}

/// Sharpe ratio of the strategy over already-normalised held-out differences.
pub fn held_out_sharpe(x: &[f64], theta: &[f64], commission: f64) -> f64 {
    let ft = compute_ft(x, theta);
    sharpe_ratio(&strategy_returns(&ft, x, commission))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mean-reverting series with a repeating pattern.
    fn closes(len: usize) -> Vec<f64> {
        let pattern = [3.0, -1.5, 2.0, -4.0, 1.0, 0.5, -2.5];
        let mut px = 1000.0;
        let mut out = vec![px];
        for i in 0..len - 1 {
            px += pattern[i % pattern.len()] + (i as f64 * 0.37).sin();
            out.push(px);
        }
        out
    }

    fn params() -> TrainParams {
        TrainParams { n: 80, p: 20, m: 3, epochs: 30, commission: 0.001, learning_rate: 0.3, seed: 7, dataset_name: None }
    }

    #[test]
    fn split_uses_tail_and_training_stats() {
        let closes = [0.0, 1.0, 3.0, 6.0, 10.0, 15.0];
        // diffs 1,2,3,4,5; n=2, p=1 -> train [3,4], test [5]
        let split = split_series(&closes, 2, 1).unwrap();
        assert_eq!(split.mean, 3.5);
        assert_eq!(split.std, 0.5);
        assert_eq!(split.train, vec![-1.0, 1.0]);
        assert_eq!(split.test, vec![3.0]);
    }

    #[test]
    fn short_series_is_insufficient() {
        let err = split_series(&[1.0, 2.0, 3.0], 2, 1).unwrap_err();
        assert!(matches!(err, BotError::InsufficientData { needed: 3, got: 3 }));
    }

    #[test]
    fn flat_series_has_no_variance() {
        assert!(matches!(split_series(&[5.0; 10], 4, 2), Err(BotError::Config(_))));
    }

    #[test]
    fn degenerate_returns_give_zero_gradient() {
        // All-zero x makes every return zero.
        let (grad, s) = sharpe_gradient(&[0.0; 20], &[0.1, 0.2, 0.3], 0.0);
        assert!(grad.iter().all(|&g| g == 0.0));
        assert_eq!(s, 0.0);
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let split = split_series(&closes(120), 100, 10).unwrap();
        let theta = vec![0.2, -0.1, 0.3, 0.05, 0.4];
        let (grad, _) = sharpe_gradient(&split.train, &theta, 0.0);

        let eps = 1e-6;
        for k in 0..theta.len() {
            let mut up = theta.clone();
            let mut down = theta.clone();
            up[k] += eps;
            down[k] -= eps;
            let numeric = (held_out_sharpe(&split.train, &up, 0.0) - held_out_sharpe(&split.train, &down, 0.0)) / (2.0 * eps);
            assert!(
                (grad[k] - numeric).abs() < 1e-4 * (1.0 + numeric.abs()),
                "theta[{k}]: analytic {} vs numeric {numeric}",
                grad[k]
            );
        }
    }

    #[test]
    fn training_produces_valid_reproducible_state() {
        let closes = closes(150);
        let trainer = Trainer::new(params());
        let a = trainer.train(&closes).unwrap();
        let b = trainer.train(&closes).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.theta.len(), 5);
        assert_eq!(a.sharpes.as_ref().map(Vec::len), Some(30));
        assert_eq!(a.n, Some(80));
        a.validate().unwrap();
    }

    #[test]
    fn training_improves_in_sample_sharpe() {
        let state = Trainer::new(TrainParams { epochs: 50, learning_rate: 0.01, ..params() }).train(&closes(150)).unwrap();
        let sharpes = state.sharpes.unwrap();
        let best = sharpes.iter().copied().fold(f64::MIN, f64::max);
        assert!(best > sharpes[0]);
    }

    #[test]
    fn window_must_fit_training_set() {
        let err = Trainer::new(TrainParams { n: 3, ..params() }).train(&closes(150)).unwrap_err();
        assert!(matches!(err.downcast_ref::<BotError>(), Some(BotError::Config(_))));
    }
}
