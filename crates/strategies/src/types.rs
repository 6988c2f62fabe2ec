// In crates/strategies/src/types.rs

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct MACrossoverSettings {
    // An upward crossing only buys while RSI is strictly below this level.
    #[serde(default = "default_oversold")]
    pub oversold: f64,
    // A downward crossing only sells while RSI is strictly above this level.
    #[serde(default = "default_overbought")]
    pub overbought: f64,
}

impl Default for MACrossoverSettings {
    fn default() -> Self {
        Self {
            oversold: default_oversold(),
            overbought: default_overbought(),
        }
    }
}

fn default_oversold() -> f64 { 30.0 }
fn default_overbought() -> f64 { 70.0 }
