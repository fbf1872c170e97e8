//! Futures client configuration.
//!
//! Resolved once from the application config; the client never reads the
//! config file itself.

use dr_core::config::AppConfig;

use crate::sizing::OrderSizing;

/// Everything [`FuturesClient`](super::FuturesClient) needs to talk to the exchange.
#[derive(Debug, Clone)]
pub struct FuturesClientConfig {
    /// Binance API key.
    pub api_key: String,

    /// Binance API secret (HMAC-SHA256 signing).
    pub secret_key: String,

    /// REST base URL, testnet already applied.
    pub base_url: String,

    /// `recvWindow` for signed requests (milliseconds, 0 = Binance default).
    pub recv_window: u64,

    /// Highest leverage `change_leverage` will request.
    pub max_leverage: u32,

    pub sizing: OrderSizing,
}

impl FuturesClientConfig {
    pub fn from_app(cfg: &AppConfig) -> Self {
        Self {
            api_key: cfg.exchange.api_key.clone(),
            secret_key: cfg.exchange.secret_key.clone(),
            base_url: cfg.exchange.effective_rest_url().to_string(),
            recv_window: cfg.exchange.recv_window,
            max_leverage: cfg.exchange.max_leverage,
            sizing: OrderSizing::from_config(&cfg.trading),
        }
    }
}
