// In crates/analytics/src/ledger.rs

use core_types::{SignalEvent, SignalKind, SymbolId};
use rust_decimal::Decimal;
use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::types::Trade;

/// Turns one symbol's signal events into trade records and attributes profit/loss.
///
/// Every trade is one unit. A SELL closes the oldest BUY still open; a SELL with
/// nothing open is recorded without a result.
#[derive(Debug, Clone)]
pub struct TradeLedger {
    symbol: SymbolId,
    open_entries: VecDeque<Decimal>,
}

impl TradeLedger {
    pub fn new(symbol: SymbolId) -> Self {
        Self {
            symbol,
            open_entries: VecDeque::new(),
        }
    }

    /// Rebuilds the open entries from previously recorded trades, oldest first.
    pub fn from_trades(symbol: SymbolId, trades: &[Trade]) -> Result<Self> {
        let mut ledger = Self::new(symbol);
        for trade in trades.iter().filter(|t| t.symbol == symbol) {
            ledger.apply(trade.kind, trade.price)?;
        }
        Ok(ledger)
    }

    /// Turns a signal into a trade. On error the open entries are unchanged.
    pub fn record(&mut self, event: &SignalEvent) -> Result<Trade> {
        debug_assert_eq!(event.symbol, self.symbol);
        let profit_loss = self.apply(event.kind, event.price)?;
        Ok(Trade {
            symbol: event.symbol,
            kind: event.kind,
            at: event.at,
            price: event.price,
            profit_loss,
        })
    }

    pub fn open_entries(&self) -> usize {
        self.open_entries.len()
    }

    fn apply(&mut self, kind: SignalKind, price: Decimal) -> Result<Option<Decimal>> {
        match kind {
            SignalKind::Buy => {
                self.open_entries.push_back(price);
                Ok(None)
            }
            SignalKind::Sell => {
                let Some(entry) = self.open_entries.front().copied() else {
                    return Ok(None);
                };
                let profit_loss = price
                    .checked_sub(entry)
                    .ok_or(Error::Overflow { entry, exit: price })?;
                self.open_entries.pop_front();
                Ok(Some(profit_loss))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use core_types::{BarTime, IndicatorSnapshot};
    use rust_decimal_macros::dec;

    fn event(kind: SignalKind, day: u32, price: Decimal) -> SignalEvent {
        let at = BarTime::new(
            NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            NaiveTime::from_hms_opt(16, 0, 0).unwrap(),
        );
        SignalEvent {
            symbol: SymbolId(3),
            kind,
            at,
            price,
            snapshot: IndicatorSnapshot {
                symbol: SymbolId(3),
                as_of: at,
                ma_short: None,
                ma_long: None,
                rsi: None,
            },
        }
    }

    #[test]
    fn sell_closes_open_buy() {
        let mut ledger = TradeLedger::new(SymbolId(3));
        let buy = ledger.record(&event(SignalKind::Buy, 1, dec!(101.50))).unwrap();
        assert_eq!(buy.profit_loss, None);
        let sell = ledger.record(&event(SignalKind::Sell, 9, dec!(98.25))).unwrap();
        assert_eq!(sell.profit_loss, Some(dec!(-3.25)));
        assert_eq!(ledger.open_entries(), 0);
    }

    #[test]
    fn sell_without_entry_has_no_result() {
        let mut ledger = TradeLedger::new(SymbolId(3));
        let sell = ledger.record(&event(SignalKind::Sell, 2, dec!(50))).unwrap();
        assert_eq!(sell.profit_loss, None);
    }

    #[test]
    fn sells_close_entries_in_order() {
        let mut ledger = TradeLedger::new(SymbolId(3));
        ledger.record(&event(SignalKind::Buy, 1, dec!(10))).unwrap();
        ledger.record(&event(SignalKind::Buy, 2, dec!(20))).unwrap();
        assert_eq!(ledger.record(&event(SignalKind::Sell, 3, dec!(25))).unwrap().profit_loss, Some(dec!(15)));
        assert_eq!(ledger.record(&event(SignalKind::Sell, 4, dec!(25))).unwrap().profit_loss, Some(dec!(5)));
    }

    #[test]
    fn rebuilds_from_history() {
        let mut original = TradeLedger::new(SymbolId(3));
        let trades = vec![
            original.record(&event(SignalKind::Buy, 1, dec!(10))).unwrap(),
            original.record(&event(SignalKind::Sell, 2, dec!(12))).unwrap(),
            original.record(&event(SignalKind::Buy, 3, dec!(11))).unwrap(),
        ];
        let mut rebuilt = TradeLedger::from_trades(SymbolId(3), &trades).unwrap();
        assert_eq!(rebuilt.open_entries(), 1);
        assert_eq!(rebuilt.record(&event(SignalKind::Sell, 4, dec!(14))).unwrap().profit_loss, Some(dec!(3)));
    }

    #[test]
    fn out_of_range_result_keeps_the_entry_open() {
        let mut ledger = TradeLedger::new(SymbolId(3));
        ledger.record(&event(SignalKind::Buy, 1, Decimal::MIN)).unwrap();
        let err = ledger.record(&event(SignalKind::Sell, 2, Decimal::MAX)).unwrap_err();
        assert!(matches!(err, Error::Overflow { .. }));
        assert_eq!(ledger.open_entries(), 1);
    }
}
