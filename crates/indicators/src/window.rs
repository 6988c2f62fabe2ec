// In crates/indicators/src/window.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::{Error, Result};

/// A bounded FIFO of the most recent values together with their running sum.
///
/// This is the minimal sufficient statistic for a simple moving average: pushing a
/// value is O(1) and never rescans the queue. The queue never holds more than
/// `capacity` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingWindow {
    capacity: usize,
    values: VecDeque<Decimal>,
    sum: Decimal,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ZeroPeriod);
        }
        Ok(Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
            sum: Decimal::ZERO,
        })
    }

    /// Pushes `value`, evicting the oldest value once the window is full, and
    /// returns the mean if the window holds exactly `capacity` values.
    ///
    /// On overflow the window is left exactly as it was before the call.
    pub fn push(&mut self, value: Decimal) -> Result<Option<Decimal>> {
        let evicted = if self.values.len() == self.capacity {
            self.values.front().copied()
        } else {
            None
        };

        // Evict first: only the sum of the values actually held must stay in range.
        let mut sum = self.sum;
        if let Some(oldest) = evicted {
            sum = sum.checked_sub(oldest).ok_or(Error::Overflow)?;
        }
        let sum = sum.checked_add(value).ok_or(Error::Overflow)?;
        if evicted.is_some() {
            self.values.pop_front();
        }

        self.values.push_back(value);
        self.sum = sum;
        Ok(self.mean())
    }

    /// The arithmetic mean of the window, or `None` while it is not yet full.
    pub fn mean(&self) -> Option<Decimal> {
        if self.is_full() {
            Some(self.sum / Decimal::from(self.capacity))
        } else {
            None
        }
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sum(&self) -> Decimal {
        self.sum
    }

    /// Checks the invariants a restored window must satisfy: a non-zero capacity,
    /// no more values than the capacity, and a running sum that matches the values.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(Error::ZeroPeriod);
        }
        if self.values.len() > self.capacity {
            return Err(Error::Inconsistent(format!(
                "window holds {} values but its capacity is {}",
                self.values.len(),
                self.capacity
            )));
        }
        let recomputed = self
            .values
            .iter()
            .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
            .ok_or(Error::Overflow)?;
        if recomputed != self.sum {
            return Err(Error::Inconsistent(format!(
                "running sum {} does not match the sum of the window values {}",
                self.sum, recomputed
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(RollingWindow::new(0), Err(Error::ZeroPeriod));
    }

    #[test]
    fn mean_is_none_until_full() {
        let mut window = RollingWindow::new(3).unwrap();
        assert_eq!(window.push(dec!(1)).unwrap(), None);
        assert_eq!(window.push(dec!(2)).unwrap(), None);
        assert_eq!(window.push(dec!(6)).unwrap(), Some(dec!(3)));
        assert!(window.is_full());
    }

    #[test]
    fn evicts_oldest_value_and_keeps_sum_exact() {
        let mut window = RollingWindow::new(3).unwrap();
        for v in [dec!(0.10), dec!(0.20), dec!(0.30), dec!(0.40)] {
            window.push(v).unwrap();
        }
        assert_eq!(window.len(), 3);
        assert_eq!(window.sum(), dec!(0.90));
        assert_eq!(window.mean(), Some(dec!(0.30)));
        assert!(window.validate().is_ok());
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut window = RollingWindow::new(5).unwrap();
        for i in 0..1_000 {
            window.push(Decimal::from(i)).unwrap();
            assert!(window.len() <= 5);
        }
        assert_eq!(window.mean(), Some(dec!(997)));
    }

    #[test]
    fn overflow_leaves_window_untouched() {
        let mut window = RollingWindow::new(2).unwrap();
        window.push(Decimal::MAX).unwrap();
        let before = window.clone();
        assert_eq!(window.push(Decimal::MAX), Err(Error::Overflow));
        assert_eq!(window, before);
    }

    #[test]
    fn evicted_value_is_subtracted_before_the_new_one_is_added() {
        let mut window = RollingWindow::new(2).unwrap();
        window.push(Decimal::MAX).unwrap();
        window.push(Decimal::ZERO).unwrap();
        assert_eq!(window.push(dec!(1)), Ok(Some(dec!(0.5))));
        assert_eq!(window.sum(), dec!(1));
        assert!(window.validate().is_ok());
    }

    #[test]
    fn validate_detects_tampered_sum() {
        let mut window = RollingWindow::new(2).unwrap();
        window.push(dec!(5)).unwrap();
        let mut json: serde_json::Value = serde_json::to_value(&window).unwrap();
        json["sum"] = serde_json::Value::String("6".into());
        let tampered: RollingWindow = serde_json::from_value(json).unwrap();
        assert!(matches!(tampered.validate(), Err(Error::Inconsistent(_))));
    }
}
