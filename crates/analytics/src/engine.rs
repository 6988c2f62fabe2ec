use crate::types::{Trade, TradeSummary};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Aggregates per-trade profit/loss into a summary.
///
/// Only trades with an attributed result count as closed; open entries only
/// contribute to `total_trades`.
pub fn summarize(trades: &[Trade]) -> TradeSummary {
    let mut summary = TradeSummary {
        total_trades: trades.len() as u32,
        ..TradeSummary::default()
    };

    for pnl in trades.iter().filter_map(|t| t.profit_loss) {
        summary.closed_trades += 1;
        summary.net_profit_loss += pnl;
        if pnl > dec!(0) {
            summary.winning_trades += 1;
            summary.gross_profit += pnl;
        } else if pnl < dec!(0) {
            summary.losing_trades += 1;
            summary.gross_loss += pnl.abs();
        }
    }

    if summary.closed_trades > 0 {
        summary.win_rate = (Decimal::from(summary.winning_trades) * dec!(100)
            / Decimal::from(summary.closed_trades))
        .round_dp(2);
    }

    summary
}
