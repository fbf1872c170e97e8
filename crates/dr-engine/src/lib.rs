//! # dr-engine
//!
//! The live trading loop.
//!
//! ```text
//! TradingEngine::run
//! └── run_cycle
//!     ├── FuturesApi::get_candles        (dr-td)
//!     ├── SignalModel::get_signal        (dr-model)
//!     ├── FuturesApi::get_current_position
//!     ├── position::plan                 (close / open actions)
//!     ├── RetryExecutor::execute         (each action)
//!     └── sink::emit                     (SignalRecord, best effort)
//! ```
//!
//! Between cycles the engine sleeps until the next candle has closed, pinging
//! the keep-alive URL if one is configured.

pub mod engine;
pub mod keepalive;
pub mod position;
pub mod sink;

pub use engine::{CycleOutcome, EngineSettings, TradingEngine};
pub use keepalive::KeepAlive;
pub use position::{TradeAction, plan};
pub use sink::{JsonlSink, LogSink, SignalSink};
