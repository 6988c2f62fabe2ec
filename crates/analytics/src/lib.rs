// In crates/analytics/src/lib.rs

pub mod engine;
pub mod error;
pub mod ledger;
pub mod types;

pub use engine::summarize;
pub use error::{Error, Result};
pub use ledger::TradeLedger;
pub use types::{Trade, TradeSummary};
