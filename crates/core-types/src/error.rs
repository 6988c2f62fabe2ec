// In crates/core-types/src/error.rs

use thiserror::Error;

use crate::types::{BarTime, SymbolId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The bar precedes the last bar processed for its symbol, or repeats its
    /// timestamp with different values.
    #[error("Out-of-order bar for symbol {symbol}: {bar_time} is not after {last_time}")]
    OutOfOrderBar {
        symbol: SymbolId,
        bar_time: BarTime,
        last_time: BarTime,
    },

    #[error("Corrupt pipeline state for symbol {symbol}: {reason}")]
    CorruptState { symbol: SymbolId, reason: String },

    #[error("Decimal overflow while updating running sums for symbol {symbol}")]
    ArithmeticOverflow { symbol: SymbolId },

    #[error("Pipeline for symbol {symbol} is halted and refuses further bars")]
    Halted { symbol: SymbolId },

    #[error("Invalid indicator parameters: {0}")]
    InvalidParameters(String),
}

pub type Result<T> = std::result::Result<T, Error>;
