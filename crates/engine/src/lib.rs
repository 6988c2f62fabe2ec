// In crates/engine/src/lib.rs

pub mod checkpoint;
pub mod cursor;
pub mod pipeline;
pub mod task;
pub mod writer;

use crate::task::{SymbolReport, SymbolTask};
use crate::writer::{run_writer, WriterReport};
use analytics::{summarize, Trade, TradeSummary};
use anyhow::{Context, Result};
use app_config::types::PipelineSettings;
use app_config::Settings;
use core_types::{BarTime, IndicatorSnapshot, SymbolId};
use database::{BarStore, CheckpointStore, IndicatorStore, TradeStore};
use events::EngineEvent;
use futures::future;
use indicators::IndicatorSettings;
use std::sync::Arc;
use strategies::{MACrossover, MACrossoverSettings};
use tokio::sync::{broadcast, mpsc};

pub use pipeline::{Outcome, SymbolPipeline};

/// Capacity of the event broadcast channel; slow subscribers miss older events.
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Everything a symbol task needs to know about indicator windows, gates and pacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub indicators: IndicatorSettings,
    pub strategy: MACrossoverSettings,
    pub pipeline: PipelineSettings,
}

impl From<&Settings> for EngineSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            indicators: settings.indicators,
            strategy: settings.strategy,
            pipeline: settings.pipeline,
        }
    }
}

/// The storage interfaces the engine reads from and writes to.
#[derive(Clone)]
pub struct Stores {
    pub bars: Arc<dyn BarStore>,
    pub indicators: Arc<dyn IndicatorStore>,
    pub trades: Arc<dyn TradeStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
}

impl Stores {
    /// Uses one backend for every interface.
    pub fn shared<S>(store: S) -> Self
    where
        S: BarStore + IndicatorStore + TradeStore + CheckpointStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            bars: store.clone(),
            indicators: store.clone(),
            trades: store.clone(),
            checkpoints: store,
        }
    }
}

/// Outcome of one [`Engine::run`].
#[derive(Debug, Clone)]
pub struct RunReport {
    pub symbols: Vec<SymbolReport>,
    /// Symbols whose task ended with an error, with the error message.
    pub failed: Vec<(SymbolId, String)>,
    pub writer: WriterReport,
}

/// Orchestrates one independent pipeline task per symbol and a single persistence writer.
pub struct Engine {
    settings: EngineSettings,
    stores: Stores,
    events: broadcast::Sender<EngineEvent>,
}

impl Engine {
    pub fn new(settings: EngineSettings, stores: Stores) -> Result<Self> {
        settings
            .indicators
            .validate()
            .context("invalid indicator settings")?;
        MACrossover::new(settings.strategy).context("invalid strategy settings")?;
        if settings.pipeline.checkpoint_every == 0 || settings.pipeline.fetch_batch_size == 0 {
            anyhow::bail!("checkpoint_every and fetch_batch_size must be positive");
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            settings,
            stores,
            events,
        })
    }

    /// Receives every snapshot, signal, trade, rejected bar and halt from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Processes every bar not yet covered by a checkpoint, for the given symbols
    /// or for every symbol in the bar store.
    ///
    /// A failing symbol does not stop the others; it is listed in [`RunReport::failed`].
    pub async fn run(&self, symbols: Option<Vec<SymbolId>>) -> Result<RunReport> {
        let mut symbols = match symbols {
            Some(symbols) => symbols,
            None => self
                .stores
                .bars
                .symbols()
                .await
                .context("failed to list symbols")?,
        };
        symbols.sort();
        symbols.dedup();

        tracing::info!(count = symbols.len(), "Starting indicator engine.");

        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(run_writer(persist_rx, self.stores.clone(), self.events.clone()));

        let mut task_handles = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            let task = SymbolTask::new(
                *symbol,
                self.settings,
                self.stores.clone(),
                persist_tx.clone(),
                self.events.clone(),
            );
            task_handles.push(tokio::spawn(task.run()));
        }
        drop(persist_tx);

        let results = future::join_all(task_handles).await;

        let mut reports = Vec::with_capacity(symbols.len());
        let mut failed = Vec::new();
        for (symbol, result) in symbols.into_iter().zip(results) {
            match result {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(e)) => {
                    tracing::error!(symbol = %symbol, error = ?e, "Symbol task failed.");
                    failed.push((symbol, format!("{e:#}")));
                }
                Err(e) => {
                    tracing::error!(symbol = %symbol, error = %e, "Symbol task panicked or was cancelled.");
                    failed.push((symbol, e.to_string()));
                }
            }
        }

        // Every sender is gone once the tasks are done, so the writer drains and exits.
        let writer = writer.await.context("persistence writer terminated abnormally")?;

        tracing::info!(
            symbols = reports.len(),
            failed = failed.len(),
            snapshots = writer.snapshots_saved,
            trades = writer.trades_recorded,
            write_failures = writer.failures,
            "Indicator engine finished."
        );

        Ok(RunReport {
            symbols: reports,
            failed,
            writer,
        })
    }

    /// The snapshot computed from the bar of `symbol` at `as_of`, if that bar was processed.
    pub async fn snapshot(&self, symbol: SymbolId, as_of: BarTime) -> Result<Option<IndicatorSnapshot>> {
        self.stores
            .indicators
            .snapshot(symbol, as_of)
            .await
            .with_context(|| format!("failed to read snapshot of symbol {symbol} at {as_of}"))
    }

    pub async fn trades(&self, symbol: SymbolId) -> Result<(Vec<Trade>, TradeSummary)> {
        let trades = self
            .stores
            .trades
            .trades(symbol)
            .await
            .with_context(|| format!("failed to read trades of symbol {symbol}"))?;
        let summary = summarize(&trades);
        Ok((trades, summary))
    }

    /// Drops the checkpoint of `symbol`, so the next run replays it from its first bar.
    pub async fn reset(&self, symbol: SymbolId) -> Result<()> {
        self.stores
            .checkpoints
            .delete_state(symbol)
            .await
            .with_context(|| format!("failed to delete checkpoint of symbol {symbol}"))?;
        tracing::info!(symbol = %symbol, "Checkpoint reset.");
        Ok(())
    }
}
