// In crates/indicators/src/lib.rs

//! Incremental technical indicators over decimal closing prices.
//!
//! Every indicator here is updated one close at a time in O(1) and keeps only the
//! bounded state it needs, so the per-symbol state can be checkpointed and restored.

pub mod error;
pub mod moving_average;
pub mod rsi;
pub mod types;
pub mod window;

pub use error::{Error, Result};
pub use moving_average::MovingAverages;
pub use rsi::RelativeStrength;
pub use types::IndicatorSettings;
pub use window::RollingWindow;
