//! Core data types: enums, symbols, market data, and trading structs.

pub mod enums;
pub mod market_data;
pub mod symbol;
pub mod trading;

pub use enums::*;
pub use market_data::*;
pub use symbol::*;
pub use trading::*;
