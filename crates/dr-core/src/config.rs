//! Configuration parsing for the trading bot.
//!
//! All components read their settings from a single JSON config file, loaded
//! once at startup and passed by reference into each constructor. Every field
//! except the model location has a production default.
//!
//! # Example config
//!
//! ```json
//! {
//!   "bot": { "module_name": "reggie", "log_path": "/tmp/log" },
//!   "exchange": { "api_key": "...", "secret_key": "...", "use_testnet": true },
//!   "model": { "id": "reggie-2.0", "path": "models/reggie.json" },
//!   "trading": { "symbol": { "base": "BTC", "quote": "USDT" }, "interval": "1d" },
//!   "retry": { "max_retries": 2, "delay_secs": 5 },
//!   "schedule": { "sleep_interval_secs": 20 },
//!   "signal_log": { "path": "signals.jsonl" }
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::BotError;
use crate::types::{Interval, Symbol};

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Module metadata (name, log path).
    #[serde(default)]
    pub bot: ModuleMeta,

    /// Exchange credentials and endpoints.
    #[serde(default)]
    pub exchange: ExchangeConfig,

    /// Trained model location.
    pub model: ModelConfig,

    #[serde(default)]
    pub trading: TradingConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub signal_log: SignalLogConfig,
}

/// Module metadata block.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleMeta {
    #[serde(default = "default_module_name")]
    pub module_name: String,
    pub log_path: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ModuleMeta {
    fn default() -> Self {
        Self { module_name: default_module_name(), log_path: None, log_level: default_log_level() }
    }
}

/// Exchange credentials, endpoints, and safety ceilings.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// API key. Empty means "read `BINANCE_API_KEY` from the environment".
    #[serde(default)]
    pub api_key: String,

    /// API secret (HMAC-SHA256 signing). Empty means "read `BINANCE_API_SECRET`".
    #[serde(default)]
    pub secret_key: String,

    /// USDT-margined futures REST base URL.
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    /// Route every call to the futures testnet instead of `rest_url`.
    #[serde(default)]
    pub use_testnet: bool,

    /// `recvWindow` for signed requests (milliseconds, 0 = exchange default).
    #[serde(default = "default_recv_window")]
    pub recv_window: u64,

    /// Highest leverage the bot will ever request.
    #[serde(default = "default_max_leverage")]
    pub max_leverage: u32,
}

impl ExchangeConfig {
    /// REST base URL after applying the testnet switch.
    pub fn effective_rest_url(&self) -> &str {
        if self.use_testnet { TESTNET_REST_URL } else { &self.rest_url }
    }

    /// Fill empty credentials from `BINANCE_API_KEY` / `BINANCE_API_SECRET`.
    pub fn resolve_credentials(&mut self) {
        if self.api_key.is_empty() {
            self.api_key = std::env::var("BINANCE_API_KEY").unwrap_or_default();
            debug!("api_key taken from BINANCE_API_KEY (set={})", !self.api_key.is_empty());
        }
        if self.secret_key.is_empty() {
            self.secret_key = std::env::var("BINANCE_API_SECRET").unwrap_or_default();
            debug!("secret_key taken from BINANCE_API_SECRET (set={})", !self.secret_key.is_empty());
        }
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            rest_url: default_rest_url(),
            use_testnet: false,
            recv_window: default_recv_window(),
            max_leverage: default_max_leverage(),
        }
    }
}

/// Where the trained parameters live and how records identify them.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// Identifier written into every signal record. Defaults to the path.
    pub id: Option<String>,
    pub path: PathBuf,
}

impl ModelConfig {
    pub fn model_id(&self) -> String {
        self.id.clone().unwrap_or_else(|| self.path.display().to_string())
    }
}

/// What is traded and how orders are sized.
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    #[serde(default)]
    pub symbol: Symbol,

    #[serde(default = "default_interval")]
    pub interval: Interval,

    /// Number of candles fetched per cycle.
    #[serde(default = "default_candle_limit")]
    pub candle_limit: u32,

    /// Upper bound on the quote notional of a single opening order.
    #[serde(default = "default_max_trade_notional")]
    pub max_trade_notional: f64,

    /// Share of the tradable notional actually committed.
    #[serde(default = "default_margin_ratio")]
    pub margin_ratio: f64,

    /// Decimal places accepted by the order API for quantities.
    #[serde(default = "default_quantity_precision")]
    pub quantity_precision: u32,

    /// `false` computes and records signals without placing orders.
    #[serde(default = "default_true")]
    pub execute_trades: bool,

    /// Terminate the loop when a trading action fails instead of skipping the cycle.
    #[serde(default)]
    pub halt_on_trade_failure: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: Symbol::default(),
            interval: default_interval(),
            candle_limit: default_candle_limit(),
            max_trade_notional: default_max_trade_notional(),
            margin_ratio: default_margin_ratio(),
            quantity_precision: default_quantity_precision(),
            execute_trades: true,
            halt_on_trade_failure: false,
        }
    }
}

/// Bounded fixed-delay retry of trading calls.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub delay_secs: u64,
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: default_max_retries(), delay_secs: default_retry_delay_secs() }
    }
}

/// Polling cadence and keep-alive.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Granularity of the wait between polls.
    #[serde(default = "default_sleep_interval_secs")]
    pub sleep_interval_secs: u64,

    /// Extra wait after a candle closes so the exchange has published it.
    #[serde(default = "default_close_skew_secs")]
    pub close_skew_secs: u64,

    /// Optional URL pinged while waiting, to keep the host awake.
    pub keepalive_url: Option<String>,

    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sleep_interval_secs: default_sleep_interval_secs(),
            close_skew_secs: default_close_skew_secs(),
            keepalive_url: None,
            keepalive_interval_secs: default_keepalive_interval_secs(),
        }
    }
}

/// External signal log sink.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignalLogConfig {
    /// JSON-lines file; `None` writes records to the log only.
    pub path: Option<PathBuf>,
}

impl AppConfig {
    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), BotError> {
        let t = &self.trading;
        if !(t.max_trade_notional.is_finite() && t.max_trade_notional > 0.0) {
            return Err(BotError::Config(format!("max_trade_notional must be positive, got {}", t.max_trade_notional)));
        }
        if !(t.margin_ratio > 0.0 && t.margin_ratio <= 1.0) {
            return Err(BotError::Config(format!("margin_ratio must be in (0, 1], got {}", t.margin_ratio)));
        }
        if t.quantity_precision > 8 {
            return Err(BotError::Config(format!("quantity_precision must be <= 8, got {}", t.quantity_precision)));
        }
        if t.candle_limit < 2 {
            return Err(BotError::Config(format!("candle_limit must be at least 2, got {}", t.candle_limit)));
        }
        if self.schedule.sleep_interval_secs == 0 {
            return Err(BotError::Config("sleep_interval_secs must be non-zero".into()));
        }
        if self.exchange.max_leverage == 0 {
            return Err(BotError::Config("max_leverage must be non-zero".into()));
        }
        Ok(())
    }

    /// Log the effective settings once the subscriber is installed. Credentials are never printed.
    pub fn log_summary(&self) {
        info!(
            "config: symbol={}, interval={}, model={}, rest_url={}, execute_trades={}",
            self.trading.symbol,
            self.trading.interval,
            self.model.model_id(),
            self.exchange.effective_rest_url(),
            self.trading.execute_trades
        );
        debug!(
            "config: max_trade_notional={}, margin_ratio={}, max_leverage={}, retries={}x{}s, sleep={}s",
            self.trading.max_trade_notional,
            self.trading.margin_ratio,
            self.exchange.max_leverage,
            self.retry.max_retries,
            self.retry.delay_secs,
            self.schedule.sleep_interval_secs
        );
    }
}

/// Load, parse, and validate a JSON config file.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    debug!("loaded config from {}", path.display());
    Ok(config)
}

/// Parse and validate config JSON.
pub fn parse_config(content: &str) -> Result<AppConfig, BotError> {
    let mut config: AppConfig = serde_json::from_str(content).map_err(|e| BotError::Config(e.to_string()))?;
    config.exchange.resolve_credentials();
    config.validate()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Default helpers (used by serde)
// ---------------------------------------------------------------------------

const TESTNET_REST_URL: &str = "https://testnet.binancefuture.com";

fn default_module_name() -> String {
    "dr-runner".into()
}

fn default_log_level() -> String {
    "info".into()
}

fn default_rest_url() -> String {
    "https://fapi.binance.com".into()
}

fn default_recv_window() -> u64 {
    5000
}

fn default_max_leverage() -> u32 {
    5
}

fn default_interval() -> Interval {
    Interval::D1
}

fn default_candle_limit() -> u32 {
    500
}

fn default_max_trade_notional() -> f64 {
    15_000.0
}

fn default_margin_ratio() -> f64 {
    0.98
}

fn default_quantity_precision() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_sleep_interval_secs() -> u64 {
    20
}

fn default_close_skew_secs() -> u64 {
    10
}

fn default_keepalive_interval_secs() -> u64 {
    300 // host idles out after 30 min without traffic
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{ "model": { "path": "models/reggie.json" } }"#;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = parse_config(MINIMAL).unwrap();
        assert_eq!(cfg.trading.interval, Interval::D1);
        assert_eq!(cfg.trading.symbol.pair(), "BTCUSDT");
        assert_eq!(cfg.trading.quantity_precision, 3);
        assert_eq!(cfg.retry.max_retries, 2);
        assert_eq!(cfg.retry.delay(), Duration::from_secs(5));
        assert_eq!(cfg.schedule.sleep_interval_secs, 20);
        assert_eq!(cfg.exchange.max_leverage, 5);
        assert_eq!(cfg.exchange.effective_rest_url(), "https://fapi.binance.com");
        assert_eq!(cfg.model.model_id(), "models/reggie.json");
        assert!(cfg.trading.execute_trades);
        assert!(!cfg.trading.halt_on_trade_failure);
    }

    #[test]
    fn testnet_switch_overrides_url() {
        let cfg = parse_config(
            r#"{ "model": { "path": "m.json", "id": "reggie" }, "exchange": { "use_testnet": true } }"#,
        )
        .unwrap();
        assert_eq!(cfg.exchange.effective_rest_url(), "https://testnet.binancefuture.com");
        assert_eq!(cfg.model.model_id(), "reggie");
    }

    #[test]
    fn invalid_interval_is_config_error() {
        let err = parse_config(r#"{ "model": { "path": "m.json" }, "trading": { "interval": "2d" } }"#).unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }

    #[test]
    fn margin_ratio_out_of_range_rejected() {
        let err =
            parse_config(r#"{ "model": { "path": "m.json" }, "trading": { "margin_ratio": 1.5 } }"#).unwrap_err();
        assert!(err.to_string().contains("margin_ratio"));
    }

    #[test]
    fn missing_model_section_rejected() {
        assert!(parse_config("{}").is_err());
    }

    #[test]
    fn example_config_is_valid() {
        let cfg = parse_config(include_str!("../../../config.example.json")).unwrap();
        assert_eq!(cfg.trading.symbol.pair(), "BTCUSDT");
        assert_eq!(cfg.trading.interval.seconds(), 86_400);
        assert_eq!(cfg.retry.max_retries, 2);
        assert!(cfg.signal_log.path.is_some());
    }

    #[test]
    fn load_config_reads_file_and_summarises() {
        let path = std::env::temp_dir().join(format!("dr-core-config-{}.json", std::process::id()));
        std::fs::write(&path, MINIMAL).unwrap();
        let cfg = load_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(cfg.model.model_id(), "models/reggie.json");
        cfg.log_summary();
    }

    #[test]
    fn load_config_missing_file_is_error() {
        let path = std::env::temp_dir().join("dr-core-config-does-not-exist.json");
        assert!(load_config(&path).is_err());
    }
}
