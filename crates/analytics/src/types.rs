// In crates/analytics/src/types.rs

use core_types::{BarTime, SignalKind, SymbolId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A recorded trade: one emitted signal filled at the close of its bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: SymbolId,
    pub kind: SignalKind,
    pub at: BarTime,
    pub price: Decimal,
    /// Set on a SELL that closes an earlier BUY: exit price minus entry price.
    pub profit_loss: Option<Decimal>,
}

/// Per-trade profit/loss totals for one symbol.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TradeSummary {
    pub total_trades: u32,
    pub closed_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub net_profit_loss: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,
    /// Percentage of closed trades with a positive result.
    pub win_rate: Decimal,
}
