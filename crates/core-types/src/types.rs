// In crates/core-types/src/types.rs

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a tradable symbol as assigned by the bar store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolId(pub i64);

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The (date, time) position of a bar within its symbol's stream.
///
/// Field order matters: the derived `Ord` compares `date` first and `time` second,
/// which is the chronological order bars are processed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BarTime {
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl BarTime {
    pub fn new(date: NaiveDate, time: NaiveTime) -> Self {
        Self { date, time }
    }
}

impl From<NaiveDateTime> for BarTime {
    fn from(value: NaiveDateTime) -> Self {
        Self {
            date: value.date(),
            time: value.time(),
        }
    }
}

impl fmt::Display for BarTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.date, self.time)
    }
}

/// One OHLCV record for a symbol. Immutable once ingested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: SymbolId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Bar {
    pub fn bar_time(&self) -> BarTime {
        BarTime::new(self.date, self.time)
    }
}

/// Indicator values computed from one ingested bar.
///
/// A `None` field means the indicator does not have enough history yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: SymbolId,
    pub as_of: BarTime,
    pub ma_short: Option<Decimal>,
    pub ma_long: Option<Decimal>,
    pub rsi: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    Buy,
    Sell,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Buy => "BUY",
            SignalKind::Sell => "SELL",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trading signal emitted at most once per crossing of the moving averages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub symbol: SymbolId,
    pub kind: SignalKind,
    pub at: BarTime,
    /// Close of the triggering bar, used by the trade recorder as the fill price.
    pub price: Decimal,
    pub snapshot: IndicatorSnapshot,
}
