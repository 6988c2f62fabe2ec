// In crates/analytics/src/error.rs

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Profit/loss of exit {exit} against entry {entry} is out of range")]
    Overflow { entry: Decimal, exit: Decimal },
}

pub type Result<T> = std::result::Result<T, Error>;
