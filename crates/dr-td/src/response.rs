//! Raw exchange responses and their success classification.
//!
//! Trading calls hand the raw response back to the caller, which decides
//! whether to retry based on the HTTP status class and the exchange error code.

use dr_core::BotError;

/// Binance error codes that mean the request was not authenticated.
///
/// -1021 timestamp outside recvWindow, -1022 invalid signature,
/// -2014 malformed API key, -2015 invalid key / IP / permissions.
const AUTH_ERROR_CODES: &[i64] = &[-1021, -1022, -2014, -2015];

/// HTTP status plus decoded body of one exchange call.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeResponse {
    pub status: u16,
    /// JSON body, or the raw text as a JSON string when it was not JSON.
    pub body: serde_json::Value,
}

impl ExchangeResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Binance `code` field of an error body, if present.
    pub fn error_code(&self) -> Option<i64> {
        self.body.get("code").and_then(|c| c.as_i64())
    }

    /// The exchange rejected the signature, timestamp, or key.
    pub fn is_auth_rejection(&self) -> bool {
        !self.is_success() && (self.status == 401 || self.error_code().is_some_and(|c| AUTH_ERROR_CODES.contains(&c)))
    }

    /// Classify into the body on success or a typed error otherwise.
    pub fn into_result(self) -> Result<serde_json::Value, BotError> {
        if self.is_success() {
            Ok(self.body)
        } else if self.is_auth_rejection() {
            Err(BotError::Authentication(format!("HTTP {}: {}", self.status, self.body)))
        } else {
            Err(BotError::Transient { status: self.status, body: self.body.to_string() })
        }
    }
}
