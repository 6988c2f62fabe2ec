// In crates/indicators/src/types.rs

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Window lengths for the per-symbol indicators.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorSettings {
    #[serde(default = "default_short_period")]
    pub short_period: usize,
    #[serde(default = "default_long_period")]
    pub long_period: usize,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            short_period: default_short_period(),
            long_period: default_long_period(),
            rsi_period: default_rsi_period(),
        }
    }
}

impl IndicatorSettings {
    pub fn validate(&self) -> Result<()> {
        if self.short_period == 0 || self.long_period == 0 || self.rsi_period == 0 {
            return Err(Error::ZeroPeriod);
        }
        if self.short_period >= self.long_period {
            return Err(Error::InvalidSettings(format!(
                "short_period ({}) must be smaller than long_period ({})",
                self.short_period, self.long_period
            )));
        }
        Ok(())
    }
}

fn default_short_period() -> usize { 50 }
fn default_long_period() -> usize { 200 }
fn default_rsi_period() -> usize { 14 }
