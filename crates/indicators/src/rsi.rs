// In crates/indicators/src/rsi.rs

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::window::RollingWindow;

/// Decimal places kept on reported RSI values.
const RSI_SCALE: u32 = 8;

/// Per-symbol relative strength state.
///
/// Gains and losses are tracked as two independent series of the last `period`
/// close-to-close changes, each averaged with the same [`RollingWindow`] used for
/// the price averages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativeStrength {
    previous_close: Option<Decimal>,
    gains: RollingWindow,
    losses: RollingWindow,
}

impl RelativeStrength {
    pub fn new(period: usize) -> Result<Self> {
        Ok(Self {
            previous_close: None,
            gains: RollingWindow::new(period)?,
            losses: RollingWindow::new(period)?,
        })
    }

    /// Feeds one close and returns the RSI once `period` changes have been seen.
    pub fn update(&mut self, close: Decimal) -> Result<Option<Decimal>> {
        let Some(previous) = self.previous_close else {
            self.previous_close = Some(close);
            return Ok(None);
        };

        let delta = close.checked_sub(previous).ok_or(Error::Overflow)?;
        let (gain, loss) = if delta > Decimal::ZERO {
            (delta, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -delta)
        };

        self.gains.push(gain)?;
        self.losses.push(loss)?;
        self.previous_close = Some(close);

        Ok(self.current())
    }

    /// The RSI for the current window, or `None` with fewer than `period` changes.
    pub fn current(&self) -> Option<Decimal> {
        if !self.gains.is_full() {
            return None;
        }
        // Both averages share the same denominator, so the ratio of the sums is
        // the ratio of the averages without a second rounding step.
        let gain_sum = self.gains.sum();
        let loss_sum = self.losses.sum();

        if loss_sum.is_zero() {
            return Some(if gain_sum.is_zero() { dec!(50) } else { dec!(100) });
        }

        // A ratio too large to represent means losses are negligible: RSI saturates.
        let rsi = match gain_sum
            .checked_div(loss_sum)
            .and_then(|rs| rs.checked_add(Decimal::ONE))
        {
            Some(denominator) => dec!(100) - dec!(100) / denominator,
            None => dec!(100),
        };
        Some(rsi.round_dp(RSI_SCALE).clamp(Decimal::ZERO, dec!(100)))
    }

    pub fn period(&self) -> usize {
        self.gains.capacity()
    }

    pub fn previous_close(&self) -> Option<Decimal> {
        self.previous_close
    }

    pub fn validate(&self) -> Result<()> {
        self.gains.validate()?;
        self.losses.validate()?;
        if self.gains.capacity() != self.losses.capacity() || self.gains.len() != self.losses.len() {
            return Err(Error::Inconsistent(
                "gain and loss series are out of step".to_string(),
            ));
        }
        if self.previous_close.is_none() && !self.gains.is_empty() {
            return Err(Error::Inconsistent(
                "changes recorded without a previous close".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(tracker: &mut RelativeStrength, closes: &[Decimal]) -> Vec<Option<Decimal>> {
        closes.iter().map(|c| tracker.update(*c).unwrap()).collect()
    }

    #[test]
    fn none_until_fourteen_changes() {
        let mut rsi = RelativeStrength::new(14).unwrap();
        let closes: Vec<Decimal> = (1..=15).map(Decimal::from).collect();
        let values = feed(&mut rsi, &closes);
        assert!(values[..14].iter().all(Option::is_none));
        assert_eq!(values[14], Some(dec!(100)));
    }

    #[test]
    fn all_gains_is_one_hundred() {
        let mut rsi = RelativeStrength::new(14).unwrap();
        let closes: Vec<Decimal> = (0..40).map(|i| dec!(10) + Decimal::from(i) * dec!(0.25)).collect();
        let values = feed(&mut rsi, &closes);
        assert_eq!(values.last().copied().flatten(), Some(dec!(100)));
    }

    #[test]
    fn all_losses_is_zero() {
        let mut rsi = RelativeStrength::new(14).unwrap();
        let closes: Vec<Decimal> = (0..20).map(|i| dec!(100) - Decimal::from(i)).collect();
        let values = feed(&mut rsi, &closes);
        assert_eq!(values.last().copied().flatten(), Some(Decimal::ZERO));
    }

    #[test]
    fn flat_market_is_neutral() {
        let mut rsi = RelativeStrength::new(14).unwrap();
        let values = feed(&mut rsi, &[dec!(42.00); 15]);
        assert_eq!(values[14], Some(dec!(50)));
    }

    #[test]
    fn balanced_gains_and_losses_is_fifty() {
        let mut rsi = RelativeStrength::new(14).unwrap();
        let closes: Vec<Decimal> = (0..15)
            .map(|i| if i % 2 == 0 { dec!(10) } else { dec!(11) })
            .collect();
        let values = feed(&mut rsi, &closes);
        assert_eq!(values[14], Some(dec!(50)));
    }

    #[test]
    fn standard_formula_on_mixed_changes() {
        // 10 gains of 1 and 4 losses of 1: RS = 10 / 4, RSI = 100 - 100 / 3.5.
        let mut rsi = RelativeStrength::new(14).unwrap();
        let mut closes = vec![dec!(100)];
        let mut price = dec!(100);
        for i in 0..14 {
            price += if i < 10 { dec!(1) } else { dec!(-1) };
            closes.push(price);
        }
        let values = feed(&mut rsi, &closes);
        let expected = (dec!(100) - dec!(100) / dec!(3.5)).round_dp(RSI_SCALE);
        assert_eq!(values[14], Some(expected));
    }

    #[test]
    fn stays_within_bounds() {
        let mut rsi = RelativeStrength::new(14).unwrap();
        let mut price = dec!(50);
        for i in 0..500u32 {
            let step = Decimal::from((i * 7919) % 13) - dec!(6);
            price = (price + step / dec!(4)).max(dec!(0.01));
            if let Some(value) = rsi.update(price).unwrap() {
                assert!(value >= Decimal::ZERO && value <= dec!(100), "rsi {value} out of range");
            }
        }
    }

    #[test]
    fn window_forgets_old_changes() {
        let mut rsi = RelativeStrength::new(14).unwrap();
        let mut closes: Vec<Decimal> = (0..15).map(|i| dec!(100) - Decimal::from(i)).collect();
        closes.extend((1..=14).map(|i| dec!(86) + Decimal::from(i)));
        let values = feed(&mut rsi, &closes);
        assert_eq!(values[14], Some(Decimal::ZERO));
        assert_eq!(values.last().copied().flatten(), Some(dec!(100)));
    }

    #[test]
    fn saturates_at_one_hundred_when_the_ratio_overflows() {
        let mut gains = RollingWindow::new(1).unwrap();
        gains.push(Decimal::MAX).unwrap();
        let mut losses = RollingWindow::new(1).unwrap();
        losses.push(dec!(0.0000000000000000000000000001)).unwrap();
        let rsi = RelativeStrength {
            previous_close: Some(dec!(1)),
            gains,
            losses,
        };
        assert_eq!(rsi.current(), Some(dec!(100)));
    }
}
