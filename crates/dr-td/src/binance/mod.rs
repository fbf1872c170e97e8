//! Binance USDT-margined futures.
//!
//! ```text
//! FuturesClient
//! ├── RequestSigner      (HMAC-SHA256 query signing, monotonic timestamps)
//! ├── OrderSizing        (opening-order quantity)
//! └── reqwest::Client    (REST transport)
//! ```

pub mod auth;
pub mod config;
pub mod futures;

use anyhow::Result;
use async_trait::async_trait;
use dr_core::{Candle, PositionSide, Side, Symbol};

pub use config::FuturesClientConfig;
pub use futures::FuturesClient;

use crate::FuturesApi;
use crate::response::ExchangeResponse;

#[async_trait]
impl FuturesApi for FuturesClient {
    async fn get_candles(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        FuturesClient::get_candles(self, symbol, interval, limit, None, None).await
    }

    async fn get_current_position(&self, symbol: &str) -> Result<Option<PositionSide>> {
        FuturesClient::get_current_position(self, symbol).await
    }

    async fn close_position(&self, symbol: &str) -> Result<Option<ExchangeResponse>> {
        FuturesClient::close_position(self, symbol).await
    }

    async fn open_position(&self, symbol: &Symbol, side: Side) -> Result<ExchangeResponse> {
        FuturesClient::open_position(self, symbol, side).await
    }
}
