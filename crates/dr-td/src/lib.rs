//! # dr-td
//!
//! Trade execution against the Binance USDT-margined futures REST API.
//!
//! The engine talks to the exchange through the [`FuturesApi`] trait, which
//! covers the four calls one trading cycle needs. [`binance::FuturesClient`]
//! implements it and exposes the rest of the REST surface directly.
//!
//! | Module     | Purpose                                              |
//! |------------|------------------------------------------------------|
//! | `binance`  | Signed REST client, request signing, client config   |
//! | `response` | Raw responses and success/auth classification        |
//! | `retry`    | Bounded fixed-delay retry of trading calls           |
//! | `sizing`   | Opening-order quantity from margin and mark price    |

pub mod binance;
pub mod response;
pub mod retry;
pub mod sizing;

use anyhow::Result;
use async_trait::async_trait;
use dr_core::{Candle, PositionSide, Side, Symbol};

pub use response::ExchangeResponse;
pub use retry::RetryExecutor;

/// The exchange operations a trading cycle depends on.
///
/// All methods take `&self`; implementations hold no per-call state.
#[async_trait]
pub trait FuturesApi: Send + Sync {
    /// Most recent `limit` candles for `symbol`, oldest first.
    async fn get_candles(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>>;

    /// Side of the open position in `symbol`, `None` when flat.
    async fn get_current_position(&self, symbol: &str) -> Result<Option<PositionSide>>;

    /// Flatten `symbol`. `None` means there was nothing to close.
    async fn close_position(&self, symbol: &str) -> Result<Option<ExchangeResponse>>;

    /// Open a market position on `side`, sized by the implementation.
    async fn open_position(&self, symbol: &Symbol, side: Side) -> Result<ExchangeResponse>;
}
