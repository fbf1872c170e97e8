//! # dr-model
//!
//! Direct-reinforcement autoregressive signal model.
//!
//! - **State** (`state`) — the persisted parameter file, validated on load
//! - **Signal** (`signal`) — recursive `Ft` computation and the BUY/SELL decision
//! - **Trainer** (`trainer`) — offline gradient ascent on the Sharpe ratio
//! - **Simulation** (`simulation`) — long/short backtest against buy-and-hold

pub mod signal;
pub mod simulation;
pub mod state;
pub mod trainer;

pub use signal::{SignalModel, compute_ft, normalise_diffs, signal_side, strategy_returns};
pub use simulation::{LedgerRow, SimulationReport, simulate};
pub use state::ModelState;
pub use trainer::{TrainParams, Trainer};
