//! Position state machine.
//!
//! The current position is read from the exchange every cycle; nothing here
//! remembers it between calls.
//!
//! | current | BUY                  | SELL                  |
//! |---------|----------------------|-----------------------|
//! | flat    | open long            | open short            |
//! | long    | hold                 | close, open short     |
//! | short   | close, open long     | hold                  |

use std::fmt;

use dr_core::{PositionSide, Side};

/// One exchange action required to follow the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    /// Flatten the current position.
    Close,
    /// Open a new position on this side.
    Open(Side),
}

impl TradeAction {
    /// Label used in trade logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::Close => "CLOSE POSITION",
            Self::Open(Side::Buy) => "OPEN LONG",
            Self::Open(Side::Sell) => "OPEN SHORT",
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Actions that move `current` to the position implied by `signal`, in order.
pub fn plan(current: PositionSide, signal: Side) -> Vec<TradeAction> {
    let target = match signal {
        Side::Buy => PositionSide::Long,
        Side::Sell => PositionSide::Short,
    };
    match current {
        c if c == target => Vec::new(),
        PositionSide::Flat => vec![TradeAction::Open(signal)],
        _ => vec![TradeAction::Close, TradeAction::Open(signal)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use PositionSide::*;
        use TradeAction::*;

        let cases = [
            (Flat, Side::Buy, vec![Open(Side::Buy)]),
            (Flat, Side::Sell, vec![Open(Side::Sell)]),
            (Long, Side::Buy, vec![]),
            (Long, Side::Sell, vec![Close, Open(Side::Sell)]),
            (Short, Side::Buy, vec![Close, Open(Side::Buy)]),
            (Short, Side::Sell, vec![]),
        ];
        for (current, signal, expected) in cases {
            assert_eq!(plan(current, signal), expected, "{current} + {signal}");
        }
    }

    #[test]
    fn labels() {
        assert_eq!(TradeAction::Close.label(), "CLOSE POSITION");
        assert_eq!(TradeAction::Open(Side::Buy).to_string(), "OPEN LONG");
        assert_eq!(TradeAction::Open(Side::Sell).to_string(), "OPEN SHORT");
    }
}
