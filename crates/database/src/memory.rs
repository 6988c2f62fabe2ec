// In crates/database/src/memory.rs

use analytics::Trade;
use async_trait::async_trait;
use core_types::{Bar, BarTime, IndicatorSnapshot, SymbolId};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{BarStore, CheckpointStore, IndicatorStore, Result, StoredCheckpoint, TradeStore};

#[derive(Debug, Default)]
struct Inner {
    bars: BTreeMap<SymbolId, BTreeMap<BarTime, (i64, Bar)>>,
    last_sequence: i64,
    snapshots: BTreeMap<(SymbolId, BarTime), IndicatorSnapshot>,
    trades: Vec<Trade>,
    checkpoints: HashMap<SymbolId, StoredCheckpoint>,
}

/// An in-process store implementing every storage interface.
///
/// Cloning is cheap and all clones share the same data, so one instance can be
/// handed to the engine as bar source, snapshot sink, trade store and
/// checkpoint store at once.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends bars in iteration order, ignoring any whose (symbol, date, time)
    /// already exists. Each new bar gets the next ingestion sequence.
    pub fn insert_bars(&self, bars: impl IntoIterator<Item = Bar>) {
        let mut inner = self.lock();
        for bar in bars {
            let sequence = inner.last_sequence + 1;
            let series = inner.bars.entry(bar.symbol).or_default();
            if series.contains_key(&bar.bar_time()) {
                continue;
            }
            series.insert(bar.bar_time(), (sequence, bar));
            inner.last_sequence = sequence;
        }
    }

    pub fn snapshot_count(&self, symbol: SymbolId) -> usize {
        self.lock().snapshots.keys().filter(|(s, _)| *s == symbol).count()
    }

    pub fn snapshots(&self, symbol: SymbolId) -> Vec<IndicatorSnapshot> {
        self.lock()
            .snapshots
            .iter()
            .filter(|((s, _), _)| *s == symbol)
            .map(|(_, snapshot)| snapshot.clone())
            .collect()
    }
}

#[async_trait]
impl BarStore for MemoryStore {
    async fn symbols(&self) -> Result<Vec<SymbolId>> {
        Ok(self.lock().bars.keys().copied().collect())
    }

    async fn ingestion_mark(&self, symbol: SymbolId) -> Result<i64> {
        let inner = self.lock();
        let mark = inner
            .bars
            .get(&symbol)
            .and_then(|series| series.values().map(|(sequence, _)| *sequence).max())
            .unwrap_or(0);
        Ok(mark)
    }

    async fn bars_after(
        &self,
        symbol: SymbolId,
        after: Option<BarTime>,
        through: i64,
        limit: usize,
    ) -> Result<Vec<Bar>> {
        let inner = self.lock();
        let Some(series) = inner.bars.get(&symbol) else {
            return Ok(Vec::new());
        };
        let bars = series
            .iter()
            .filter(|(time, (sequence, _))| after.is_none_or(|a| **time > a) && *sequence <= through)
            .take(limit)
            .map(|(_, (_, bar))| bar.clone())
            .collect();
        Ok(bars)
    }

    async fn backfilled(
        &self,
        symbol: SymbolId,
        ingested_after: i64,
        through: i64,
        at_or_before: BarTime,
    ) -> Result<Vec<Bar>> {
        let inner = self.lock();
        let Some(series) = inner.bars.get(&symbol) else {
            return Ok(Vec::new());
        };
        let mut late: Vec<(i64, Bar)> = series
            .range(..=at_or_before)
            .filter(|(_, (sequence, _))| *sequence > ingested_after && *sequence <= through)
            .map(|(_, entry)| entry.clone())
            .collect();
        late.sort_by_key(|(sequence, _)| *sequence);
        Ok(late.into_iter().map(|(_, bar)| bar).collect())
    }
}

#[async_trait]
impl IndicatorStore for MemoryStore {
    async fn save_snapshot(&self, snapshot: &IndicatorSnapshot) -> Result<()> {
        self.lock()
            .snapshots
            .insert((snapshot.symbol, snapshot.as_of), snapshot.clone());
        Ok(())
    }

    async fn snapshot(&self, symbol: SymbolId, as_of: BarTime) -> Result<Option<IndicatorSnapshot>> {
        Ok(self.lock().snapshots.get(&(symbol, as_of)).cloned())
    }
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn insert_trade(&self, trade: &Trade) -> Result<bool> {
        let mut inner = self.lock();
        let exists = inner
            .trades
            .iter()
            .any(|t| t.symbol == trade.symbol && t.at == trade.at && t.kind == trade.kind);
        if exists {
            return Ok(false);
        }
        inner.trades.push(trade.clone());
        Ok(true)
    }

    async fn trades(&self, symbol: SymbolId) -> Result<Vec<Trade>> {
        let mut trades: Vec<Trade> = self
            .lock()
            .trades
            .iter()
            .filter(|t| t.symbol == symbol)
            .cloned()
            .collect();
        trades.sort_by_key(|t| t.at);
        Ok(trades)
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load_state(&self, symbol: SymbolId) -> Result<Option<StoredCheckpoint>> {
        Ok(self.lock().checkpoints.get(&symbol).cloned())
    }

    async fn save_state(&self, checkpoint: &StoredCheckpoint) -> Result<()> {
        self.lock()
            .checkpoints
            .insert(checkpoint.symbol, checkpoint.clone());
        Ok(())
    }

    async fn delete_state(&self, symbol: SymbolId) -> Result<()> {
        self.lock().checkpoints.remove(&symbol);
        Ok(())
    }
}
