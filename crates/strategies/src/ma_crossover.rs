// In crates/strategies/src/ma_crossover.rs

use crate::error::{Error, Result};
use crate::types::MACrossoverSettings;
use crate::Strategy;
use core_types::{IndicatorSnapshot, SignalKind};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Last observed position of the short average relative to the long average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CrossoverOrder {
    #[default]
    Unknown,
    Above,
    Below,
}

/// Crossing-based MA rule gated by RSI.
///
/// Fires on the bar where the short average crosses the long average, never on
/// the bars that follow while the same order persists. A crossing whose RSI gate
/// is not met is consumed without a signal.
#[derive(Debug, Clone, PartialEq)]
pub struct MACrossover {
    oversold: Decimal,
    overbought: Decimal,
    order: CrossoverOrder,
}

impl MACrossover {
    pub fn new(settings: MACrossoverSettings) -> Result<Self> {
        Self::with_order(settings, CrossoverOrder::Unknown)
    }

    /// Rebuilds an evaluator that already established `order`, e.g. from a checkpoint.
    pub fn with_order(settings: MACrossoverSettings, order: CrossoverOrder) -> Result<Self> {
        let oversold = Decimal::from_f64(settings.oversold).ok_or_else(|| {
            Error::InvalidParameters(format!("oversold {} is not a finite number", settings.oversold))
        })?;
        let overbought = Decimal::from_f64(settings.overbought).ok_or_else(|| {
            Error::InvalidParameters(format!("overbought {} is not a finite number", settings.overbought))
        })?;
        if oversold >= overbought {
            return Err(Error::InvalidParameters(format!(
                "oversold ({oversold}) must be below overbought ({overbought})"
            )));
        }
        Ok(Self { oversold, overbought, order })
    }

    pub fn order(&self) -> CrossoverOrder {
        self.order
    }
}

impl Strategy for MACrossover {
    fn name(&self) -> &'static str {
        "MACrossoverRsiGate"
    }

    fn assess(&mut self, snapshot: &IndicatorSnapshot) -> Option<SignalKind> {
        // Without both averages there is nothing to compare; keep waiting.
        let (Some(ma_short), Some(ma_long)) = (snapshot.ma_short, snapshot.ma_long) else {
            return None;
        };

        let observed = match ma_short.cmp(&ma_long) {
            Ordering::Greater => CrossoverOrder::Above,
            Ordering::Less => CrossoverOrder::Below,
            // Touching is not a crossing.
            Ordering::Equal => self.order,
        };

        let previous = self.order;
        self.order = observed;

        match (previous, observed) {
            (CrossoverOrder::Below, CrossoverOrder::Above) => match snapshot.rsi {
                Some(rsi) if rsi < self.oversold => Some(SignalKind::Buy),
                _ => None,
            },
            (CrossoverOrder::Above, CrossoverOrder::Below) => match snapshot.rsi {
                Some(rsi) if rsi > self.overbought => Some(SignalKind::Sell),
                _ => None,
            },
            // First observation only sets the baseline.
            _ => None,
        }
    }
}
