// In crates/engine/src/writer.rs

use analytics::TradeLedger;
use core_types::{IndicatorSnapshot, SignalEvent, SymbolId};
use database::StoredCheckpoint;
use events::EngineEvent;
use std::collections::{HashMap, HashSet};
use tokio::sync::{broadcast, mpsc};

use crate::Stores;

/// Work handed from the symbol pipelines to the persistence writer.
#[derive(Debug)]
pub enum PersistCommand {
    Snapshot(IndicatorSnapshot),
    Signal(SignalEvent),
    Checkpoint(StoredCheckpoint),
}

/// Counters of what the writer stored and what it failed to store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriterReport {
    pub snapshots_saved: u64,
    pub trades_recorded: u64,
    pub checkpoints_saved: u64,
    pub failures: u64,
    /// Signals of symbols with a failed write, left for the replay of the next run.
    pub trades_deferred: u64,
    /// Checkpoints refused because they would cover a failed write.
    pub checkpoints_skipped: u64,
}

/// Drains `rx` until every sender is dropped.
///
/// Commands from one symbol are applied in the order they were sent, so a
/// checkpoint is only stored after the snapshots and trades that precede it.
/// After the first failed snapshot or trade write of a symbol, none of its later
/// checkpoints or trades are stored: the next run resumes from the last good
/// checkpoint and writes the missing rows again.
pub async fn run_writer(
    mut rx: mpsc::UnboundedReceiver<PersistCommand>,
    stores: Stores,
    events: broadcast::Sender<EngineEvent>,
) -> WriterReport {
    let mut report = WriterReport::default();
    let mut ledgers: HashMap<SymbolId, TradeLedger> = HashMap::new();
    let mut failed: HashSet<SymbolId> = HashSet::new();

    while let Some(command) = rx.recv().await {
        match command {
            PersistCommand::Snapshot(snapshot) => {
                match stores.indicators.save_snapshot(&snapshot).await {
                    Ok(()) => report.snapshots_saved += 1,
                    Err(e) => {
                        report.failures += 1;
                        failed.insert(snapshot.symbol);
                        tracing::error!(symbol = %snapshot.symbol, as_of = %snapshot.as_of, error = %e, "Failed to save indicator snapshot.");
                    }
                }
            }
            PersistCommand::Signal(signal) => {
                if failed.contains(&signal.symbol) {
                    report.trades_deferred += 1;
                    tracing::warn!(symbol = %signal.symbol, at = %signal.at, "Trade deferred to the next run after an earlier write failure.");
                    continue;
                }
                match record_trade(&stores, &mut ledgers, &signal).await {
                    Ok(Some(trade)) => {
                        report.trades_recorded += 1;
                        tracing::info!(symbol = %trade.symbol, kind = %trade.kind, price = %trade.price, profit_loss = ?trade.profit_loss, "Trade recorded.");
                        let _ = events.send(EngineEvent::TradeRecorded(trade));
                    }
                    Ok(None) => {
                        tracing::debug!(symbol = %signal.symbol, at = %signal.at, "Signal already recorded as a trade.");
                    }
                    Err(e) => {
                        report.failures += 1;
                        // The ledger may hold an entry that never reached the store.
                        ledgers.remove(&signal.symbol);
                        failed.insert(signal.symbol);
                        tracing::error!(symbol = %signal.symbol, at = %signal.at, error = %e, "Failed to record trade.");
                    }
                }
            }
            PersistCommand::Checkpoint(checkpoint) => {
                if failed.contains(&checkpoint.symbol) {
                    report.checkpoints_skipped += 1;
                    tracing::warn!(symbol = %checkpoint.symbol, as_of = %checkpoint.as_of, "Checkpoint skipped after an earlier write failure.");
                    continue;
                }
                match stores.checkpoints.save_state(&checkpoint).await {
                    Ok(()) => {
                        report.checkpoints_saved += 1;
                        tracing::debug!(symbol = %checkpoint.symbol, as_of = %checkpoint.as_of, "Checkpoint saved.");
                    }
                    Err(e) => {
                        report.failures += 1;
                        tracing::error!(symbol = %checkpoint.symbol, error = %e, "Failed to save checkpoint.");
                    }
                }
            }
        }
    }

    report
}

async fn record_trade(
    stores: &Stores,
    ledgers: &mut HashMap<SymbolId, TradeLedger>,
    signal: &SignalEvent,
) -> anyhow::Result<Option<analytics::Trade>> {
    if !ledgers.contains_key(&signal.symbol) {
        let history = stores.trades.trades(signal.symbol).await?;
        ledgers.insert(signal.symbol, TradeLedger::from_trades(signal.symbol, &history)?);
    }
    let Some(ledger) = ledgers.get_mut(&signal.symbol) else {
        return Ok(None);
    };

    let trade = ledger.record(signal)?;
    if stores.trades.insert_trade(&trade).await? {
        return Ok(Some(trade));
    }

    // A replay re-delivered a signal that is already stored; the ledger must follow
    // the stored history rather than count the entry twice.
    let history = stores.trades.trades(signal.symbol).await?;
    *ledger = TradeLedger::from_trades(signal.symbol, &history)?;
    Ok(None)
}
