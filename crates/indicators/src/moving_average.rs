// In crates/indicators/src/moving_average.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::window::RollingWindow;

/// Per-symbol state for the short and long simple moving averages of closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovingAverages {
    short: RollingWindow,
    long: RollingWindow,
}

impl MovingAverages {
    pub fn new(short_period: usize, long_period: usize) -> Result<Self> {
        if short_period >= long_period {
            return Err(Error::InvalidSettings(format!(
                "short_period ({short_period}) must be smaller than long_period ({long_period})"
            )));
        }
        Ok(Self {
            short: RollingWindow::new(short_period)?,
            long: RollingWindow::new(long_period)?,
        })
    }

    /// Feeds one close into both windows and returns `(ma_short, ma_long)`.
    ///
    /// Each average is `None` until its window has seen a full period of closes;
    /// partial averages over fewer bars are never reported.
    pub fn update(&mut self, close: Decimal) -> Result<(Option<Decimal>, Option<Decimal>)> {
        let ma_short = self.short.push(close)?;
        let ma_long = self.long.push(close)?;
        Ok((ma_short, ma_long))
    }

    pub fn short_period(&self) -> usize {
        self.short.capacity()
    }

    pub fn long_period(&self) -> usize {
        self.long.capacity()
    }

    pub fn validate(&self) -> Result<()> {
        self.short.validate()?;
        self.long.validate()?;
        if self.short.capacity() >= self.long.capacity() {
            return Err(Error::Inconsistent(
                "short window is not shorter than the long window".to_string(),
            ));
        }
        Ok(())
    }
}
