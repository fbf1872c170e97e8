//! Typed error definitions for the trading bot.
//!
//! Provides [`BotError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result` and can
//! be recovered with `downcast_ref::<BotError>()` where a caller needs to
//! branch on the failure class.

use thiserror::Error;

/// Domain-specific errors for the trading bot.
#[derive(Debug, Error)]
pub enum BotError {
    /// Configuration parsing or validation error (bad interval, bad sizing values, ...).
    #[error("config error: {0}")]
    Config(String),

    /// A component was used before its state was loaded.
    #[error("not initialized: {0}")]
    NotInitialized(String),

    /// Not enough history was supplied for the configured window.
    #[error("insufficient data: need more than {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// A safety rule rejected the request before it reached the exchange.
    #[error("business rule violation: {0}")]
    BusinessRule(String),

    /// The exchange rejected the signature, timestamp, or API key.
    #[error("authentication failure: {0}")]
    Authentication(String),

    /// Non-success HTTP status not attributable to authentication.
    #[error("transient exchange error: HTTP {status}: {body}")]
    Transient { status: u16, body: String },

    /// The retry bound was reached without a successful response.
    #[error("retry exhausted: {action} failed after {attempts} attempt(s)")]
    RetryExhausted { action: String, attempts: u32 },

    /// Writing a signal record to the external sink failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Exchange response or model file parsing error.
    #[error("parse error: {0}")]
    Parse(String),
}

impl BotError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}
