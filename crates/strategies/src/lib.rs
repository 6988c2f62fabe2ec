// In crates/strategies/src/lib.rs

use core_types::{IndicatorSnapshot, SignalKind};
pub mod error;
pub mod ma_crossover;
pub mod types;

pub use error::{Error, Result};
pub use ma_crossover::{CrossoverOrder, MACrossover};
pub use types::MACrossoverSettings;

/// The universal interface for a trading rule.
///
/// A strategy consumes one indicator snapshot per bar and decides whether a
/// signal fires on that bar. It is stateful: whatever it needs to remember
/// between bars lives inside the implementation.
pub trait Strategy {
    /// The name of the strategy.
    fn name(&self) -> &'static str;

    fn assess(&mut self, snapshot: &IndicatorSnapshot) -> Option<SignalKind>;
}
