// In crates/indicators/src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Window period must be at least 1")]
    ZeroPeriod,

    #[error("Invalid indicator settings: {0}")]
    InvalidSettings(String),

    #[error("Decimal overflow in running sum")]
    Overflow,

    #[error("Inconsistent window state: {0}")]
    Inconsistent(String),
}

pub type Result<T> = std::result::Result<T, Error>;
