// In crates/database/src/lib.rs

use analytics::Trade;
use async_trait::async_trait;
use core_types::{Bar, BarTime, IndicatorSnapshot, SymbolId};

pub mod error;
pub mod memory;
pub mod postgres;
pub mod types;

// Re-export the most important types for easy access.
pub use error::{Error, Result};
pub use memory::MemoryStore;
pub use postgres::{connect, Db};
pub use types::StoredCheckpoint;

/// Read access to the durable, append-only bar history.
///
/// Every stored bar carries an ingestion sequence number that grows with each
/// insert. Readers pin a run to the highest sequence seen at its start, so bars
/// appended later are left for the next run, and bars that were backfilled
/// behind an already processed time can be found by sequence.
#[async_trait]
pub trait BarStore: Send + Sync {
    /// All symbols that have at least one bar.
    async fn symbols(&self) -> Result<Vec<SymbolId>>;

    /// The highest ingestion sequence of `symbol`'s bars, or 0 when it has none.
    async fn ingestion_mark(&self, symbol: SymbolId) -> Result<i64>;

    /// Up to `limit` bars of `symbol` strictly after `after` (or from the first bar
    /// when `after` is `None`) and ingested at or before `through`, ordered by
    /// (date, time) ascending.
    async fn bars_after(
        &self,
        symbol: SymbolId,
        after: Option<BarTime>,
        through: i64,
        limit: usize,
    ) -> Result<Vec<Bar>>;

    /// Bars of `symbol` ingested in `(ingested_after, through]` whose time is at or
    /// before `at_or_before`, in ingestion order.
    async fn backfilled(
        &self,
        symbol: SymbolId,
        ingested_after: i64,
        through: i64,
        at_or_before: BarTime,
    ) -> Result<Vec<Bar>>;
}

/// Storage for the indicator snapshot computed from each processed bar.
#[async_trait]
pub trait IndicatorStore: Send + Sync {
    /// Saves a snapshot, replacing any earlier one for the same bar.
    async fn save_snapshot(&self, snapshot: &IndicatorSnapshot) -> Result<()>;

    async fn snapshot(&self, symbol: SymbolId, as_of: BarTime) -> Result<Option<IndicatorSnapshot>>;
}

/// Storage for trade records produced from signal events.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Inserts a trade. Returns `false` when the same signal was already recorded.
    async fn insert_trade(&self, trade: &Trade) -> Result<bool>;

    /// All trades of a symbol, oldest first.
    async fn trades(&self, symbol: SymbolId) -> Result<Vec<Trade>>;
}

/// Durable per-symbol pipeline checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load_state(&self, symbol: SymbolId) -> Result<Option<StoredCheckpoint>>;

    /// Saves a checkpoint, replacing the previous one for the symbol.
    async fn save_state(&self, checkpoint: &StoredCheckpoint) -> Result<()>;

    async fn delete_state(&self, symbol: SymbolId) -> Result<()>;
}
