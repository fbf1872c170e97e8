//! # dr-core
//!
//! Core crate for the directional futures bot, providing:
//!
//! - **Types** (`types`) — enums, symbols, candles, positions, orders, signal records
//! - **Configuration** (`config`) — JSON config deserialization and validation
//! - **Error types** (`error`) — domain-specific `BotError` via thiserror
//! - **Time utilities** (`time_util`) — wall-clock and strictly monotonic ms timestamps
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use error::BotError;
pub use types::*;
