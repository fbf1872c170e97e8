//! The polling trading loop.
//!
//! Each cycle fetches candles, computes the model signal, re-reads the open
//! position from the exchange, executes the actions [`plan`] returns through
//! the [`RetryExecutor`], and emits one [`SignalRecord`]. The position is never
//! cached between cycles.
//!
//! A failed trading action aborts the rest of that cycle. The loop then waits
//! for the next candle as usual, unless `halt_on_trade_failure` is set, in
//! which case [`TradingEngine::run`] returns the error.

use std::time::Duration;

use anyhow::Result;
use dr_core::config::AppConfig;
use dr_core::time_util::{now_ms, now_secs};
use dr_core::{BotError, Interval, PositionSide, Side, SignalRecord, Symbol, close_prices};
use dr_model::SignalModel;
use dr_td::retry::is_retryable;
use dr_td::{FuturesApi, RetryExecutor};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::keepalive::KeepAlive;
use crate::position::{TradeAction, plan};
use crate::sink::{SignalSink, emit};

/// Engine parameters, resolved once from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub symbol: Symbol,
    pub interval: Interval,
    pub candle_limit: u32,
    /// Identifier written into signal records.
    pub model_id: String,
    /// `false` computes and records signals without placing orders.
    pub execute_trades: bool,
    pub halt_on_trade_failure: bool,
    pub sleep_interval: Duration,
    /// Extra seconds after the candle close before polling again.
    pub close_skew_secs: u64,
    pub keepalive_url: Option<String>,
    pub keepalive_interval: Duration,
}

impl EngineSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            symbol: cfg.trading.symbol.clone(),
            interval: cfg.trading.interval,
            candle_limit: cfg.trading.candle_limit,
            model_id: cfg.model.model_id(),
            execute_trades: cfg.trading.execute_trades,
            halt_on_trade_failure: cfg.trading.halt_on_trade_failure,
            sleep_interval: Duration::from_secs(cfg.schedule.sleep_interval_secs),
            close_skew_secs: cfg.schedule.close_skew_secs,
            keepalive_url: cfg.schedule.keepalive_url.clone(),
            keepalive_interval: Duration::from_secs(cfg.schedule.keepalive_interval_secs),
        }
    }
}

/// What one cycle observed and did.
#[derive(Debug)]
pub struct CycleOutcome {
    pub signal: Side,
    pub ft: f64,
    /// Close of the latest (still open) candle.
    pub current_price: f64,
    /// Close time of the last completed candle, in seconds.
    pub last_close_secs: u64,
    /// When the next candle closes, in seconds.
    pub next_poll_secs: u64,
    /// Position read before trading; `None` when no trading was attempted.
    pub position: Option<PositionSide>,
    /// Actions that completed, in order.
    pub executed: Vec<TradeAction>,
    /// The error that aborted trading this cycle, if any.
    pub trade_error: Option<anyhow::Error>,
}

/// Drives one symbol from candles to orders.
pub struct TradingEngine<A, S> {
    api: A,
    model: SignalModel,
    sink: S,
    retry: RetryExecutor,
    settings: EngineSettings,
}

impl<A: FuturesApi, S: SignalSink> TradingEngine<A, S> {
    pub fn new(api: A, model: SignalModel, sink: S, retry: RetryExecutor, settings: EngineSettings) -> Self {
        Self { api, model, sink, retry, settings }
    }

    /// Run one full cycle.
    ///
    /// Errors before trading (candles, signal) are returned. Trading errors
    /// are reported in [`CycleOutcome::trade_error`]; the signal record is
    /// emitted either way.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let pair = self.settings.symbol.pair();
        debug!("fetching candles for {pair} {}", self.settings.interval);
        let candles = self.api.get_candles(&pair, self.settings.interval.as_str(), self.settings.candle_limit).await?;
        debug!("got {} candles", candles.len());
        if candles.len() < 2 {
            return Err(BotError::InsufficientData { needed: 1, got: candles.len() }.into());
        }

        // The last candle is still open.
        let last_close_secs = candles[candles.len() - 2].close_time / 1000;
        let next_poll_secs = last_close_secs + self.settings.interval.seconds();
        info!("last close at {last_close_secs}, next poll at {next_poll_secs}");

        let closes = close_prices(&candles);
        let current_price = closes.last().copied().unwrap_or_default();
        info!("checking for signal");
        let (signal, ft) = self.model.get_signal(&closes)?;
        info!("Ft={ft} signal={signal}");

        let mut outcome = CycleOutcome {
            signal,
            ft,
            current_price,
            last_close_secs,
            next_poll_secs,
            position: None,
            executed: Vec::new(),
            trade_error: None,
        };

        if self.settings.execute_trades {
            if let Err(e) = self.trade(&pair, signal, &mut outcome).await {
                error!("trading aborted for this cycle: {e:#}");
                outcome.trade_error = Some(e);
            }
        } else {
            info!("dry run, no orders placed for {signal}");
        }

        let record = SignalRecord::new(&self.settings.model_id, now_ms(), signal, ft, current_price);
        emit(&self.sink, &record).await;

        Ok(outcome)
    }

    async fn trade(&self, pair: &str, signal: Side, outcome: &mut CycleOutcome) -> Result<()> {
        let current = self.api.get_current_position(pair).await?.unwrap_or(PositionSide::Flat);
        outcome.position = Some(current);

        let actions = plan(current, signal);
        if actions.is_empty() {
            info!("holding current {current} position");
            return Ok(());
        }
        info!("OPENING POSITION: {signal} from {current}");

        for action in actions {
            match action {
                TradeAction::Close => {
                    self.retry.execute(action.label(), || self.api.close_position(pair)).await?;
                }
                TradeAction::Open(side) => {
                    let symbol = &self.settings.symbol;
                    self.retry.execute(action.label(), || self.api.open_position(symbol, side)).await?;
                }
            }
            outcome.executed.push(action);
        }
        info!("TRADE COMPLETED SUCCESSFULLY");
        Ok(())
    }

    /// Sleep in `sleep_interval` steps until `next_poll_secs + close_skew_secs`.
    ///
    /// Returns `false` if shutdown was requested while waiting.
    async fn wait_until(&self, next_poll_secs: u64, keepalive: &mut KeepAlive, shutdown: &mut watch::Receiver<bool>) -> bool {
        let deadline = next_poll_secs + self.settings.close_skew_secs;
        while now_secs() < deadline {
            debug!("waiting for next poll at {deadline}, now {}", now_secs());
            keepalive.tick().await;
            tokio::select! {
                _ = tokio::time::sleep(self.settings.sleep_interval) => {},
                _ = shutdown.changed() => return false,
            }
        }
        true
    }

    /// Run cycles until shutdown is signalled.
    ///
    /// Transient failures before trading are retried after `sleep_interval`;
    /// other pre-trade failures are returned. Trading failures end the run
    /// only when `halt_on_trade_failure` is set.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut keepalive = KeepAlive::new(self.settings.keepalive_url.clone(), self.settings.keepalive_interval);
        info!(
            "entering trading loop for {} ({}), keep-alive {}",
            self.settings.symbol,
            self.settings.interval,
            if keepalive.is_enabled() { "on" } else { "off" }
        );

        loop {
            if *shutdown.borrow() {
                info!("shutdown requested");
                return Ok(());
            }

            let next_poll_secs = match self.run_cycle().await {
                Ok(outcome) => {
                    if let Some(e) = outcome.trade_error {
                        if self.settings.halt_on_trade_failure {
                            return Err(e);
                        }
                    }
                    outcome.next_poll_secs
                }
                Err(e) if is_retryable(&e) => {
                    warn!("cycle failed, retrying in {:?}: {e:#}", self.settings.sleep_interval);
                    now_secs()
                }
                Err(e) => return Err(e),
            };

            if !self.wait_until(next_poll_secs, &mut keepalive, &mut shutdown).await {
                info!("shutdown requested");
                return Ok(());
            }
        }
    }
}
