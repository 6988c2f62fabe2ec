// In crates/engine/src/task.rs

use anyhow::Context;
use core_types::{Bar, BarTime, Error, SignalEvent, SymbolId};
use events::{EngineEvent, PipelineHalted, RejectedBar};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};

use crate::checkpoint;
use crate::cursor::BarCursor;
use crate::pipeline::{Outcome, SymbolPipeline};
use crate::writer::PersistCommand;
use crate::{EngineSettings, Stores};

/// What one symbol's task did during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolReport {
    pub symbol: SymbolId,
    /// Bars processed during this run, duplicates and rejected bars excluded.
    pub bars_processed: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub signals: Vec<SignalEvent>,
    pub halted: Option<String>,
    /// The bar the loaded checkpoint ended at, when the run resumed from one.
    pub resumed_from: Option<BarTime>,
    /// Set when the stored checkpoint was unusable and the run started from the first bar.
    pub replayed_after_corrupt_state: bool,
}

impl SymbolReport {
    fn new(symbol: SymbolId) -> Self {
        Self {
            symbol,
            bars_processed: 0,
            duplicates: 0,
            rejected: 0,
            signals: Vec::new(),
            halted: None,
            resumed_from: None,
            replayed_after_corrupt_state: false,
        }
    }
}

/// A self-contained task that owns all indicator and signal state of one symbol.
pub struct SymbolTask {
    symbol: SymbolId,
    settings: EngineSettings,
    stores: Stores,
    persist: mpsc::UnboundedSender<PersistCommand>,
    events: broadcast::Sender<EngineEvent>,
}

impl SymbolTask {
    pub fn new(
        symbol: SymbolId,
        settings: EngineSettings,
        stores: Stores,
        persist: mpsc::UnboundedSender<PersistCommand>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            symbol,
            settings,
            stores,
            persist,
            events,
        }
    }

    /// Feeds every bar ingested since the last checkpoint through the pipeline,
    /// then checkpoints the final state.
    ///
    /// The run is pinned to the bar store's ingestion mark at start. Bars that were
    /// backfilled behind the checkpointed time are fed first, so they are rejected
    /// and reported instead of skipped; everything else is read in time order.
    pub async fn run(self) -> anyhow::Result<SymbolReport> {
        let mut report = SymbolReport::new(self.symbol);
        let mut pipeline = self.load_pipeline(&mut report).await?;

        let mark = self
            .stores
            .bars
            .ingestion_mark(self.symbol)
            .await
            .with_context(|| format!("failed to read the ingestion mark of symbol {}", self.symbol))?;

        tracing::info!(
            symbol = %self.symbol,
            resumed_from = ?report.resumed_from,
            ingestion_mark = mark,
            "Starting symbol task."
        );

        let mut since_checkpoint = 0usize;

        if let Some(last_time) = pipeline.last_time() {
            if mark > pipeline.ingested_through() {
                let late = self
                    .stores
                    .bars
                    .backfilled(self.symbol, pipeline.ingested_through(), mark, last_time)
                    .await
                    .with_context(|| format!("failed to read backfilled bars of symbol {}", self.symbol))?;
                for bar in &late {
                    self.feed(&mut pipeline, &mut report, bar, &mut since_checkpoint)?;
                }
            }
        }
        let advanced = mark != pipeline.ingested_through();
        pipeline.set_ingested_through(mark);

        let mut cursor = BarCursor::new(
            self.stores.bars.clone(),
            self.symbol,
            pipeline.last_time(),
            mark,
            self.settings.pipeline.fetch_batch_size,
        );

        while !pipeline.is_halted() {
            let bar = match cursor.next_bar().await {
                Ok(Some(bar)) => bar,
                Ok(None) => break,
                Err(e) => {
                    // Keep what was already computed before giving up on this symbol.
                    if since_checkpoint > 0 {
                        self.send_checkpoint(&pipeline)?;
                    }
                    return Err(e).with_context(|| format!("failed to read bars of symbol {}", self.symbol));
                }
            };
            self.feed(&mut pipeline, &mut report, &bar, &mut since_checkpoint)?;
        }

        if !pipeline.is_halted() && (since_checkpoint > 0 || advanced) {
            self.send_checkpoint(&pipeline)?;
        }

        tracing::info!(
            symbol = %self.symbol,
            bars_processed = report.bars_processed,
            total_bars = pipeline.bars_processed(),
            signals = report.signals.len(),
            duplicates = report.duplicates,
            rejected = report.rejected,
            halted = report.halted.is_some(),
            "Symbol task finished."
        );
        Ok(report)
    }

    /// Runs one bar through the pipeline and hands its results to the writer and
    /// the event subscribers.
    fn feed(
        &self,
        pipeline: &mut SymbolPipeline,
        report: &mut SymbolReport,
        bar: &Bar,
        since_checkpoint: &mut usize,
    ) -> anyhow::Result<()> {
        match pipeline.process(bar) {
            Ok(Outcome::Processed { snapshot, signal }) => {
                report.bars_processed += 1;
                *since_checkpoint += 1;

                self.persist(PersistCommand::Snapshot(snapshot.clone()))?;
                let _ = self.events.send(EngineEvent::Snapshot(snapshot));

                if let Some(signal) = signal {
                    tracing::info!(
                        symbol = %signal.symbol,
                        kind = %signal.kind,
                        at = %signal.at,
                        price = %signal.price,
                        rsi = ?signal.snapshot.rsi,
                        "Crossover signal emitted."
                    );
                    self.persist(PersistCommand::Signal(signal.clone()))?;
                    let _ = self.events.send(EngineEvent::Signal(signal.clone()));
                    report.signals.push(signal);
                }

                if *since_checkpoint >= self.settings.pipeline.checkpoint_every {
                    self.send_checkpoint(pipeline)?;
                    *since_checkpoint = 0;
                }
            }
            Ok(Outcome::Duplicate) => {
                report.duplicates += 1;
                tracing::debug!(symbol = %self.symbol, at = %bar.bar_time(), "Ignoring re-delivered bar.");
            }
            Err(e @ (Error::OutOfOrderBar { .. } | Error::InvalidParameters(_))) => {
                report.rejected += 1;
                tracing::warn!(symbol = %self.symbol, at = %bar.bar_time(), error = %e, "Bar rejected.");
                let _ = self.events.send(EngineEvent::BarRejected(RejectedBar {
                    symbol: self.symbol,
                    bar_time: bar.bar_time(),
                    reason: e.to_string(),
                }));
            }
            Err(e) => {
                tracing::error!(symbol = %self.symbol, at = %bar.bar_time(), error = %e, "Pipeline halted.");
                let reason = e.to_string();
                let _ = self.events.send(EngineEvent::Halted(PipelineHalted {
                    symbol: self.symbol,
                    reason: reason.clone(),
                }));
                report.halted = Some(reason);
            }
        }
        Ok(())
    }

    async fn load_pipeline(&self, report: &mut SymbolReport) -> anyhow::Result<SymbolPipeline> {
        let EngineSettings { indicators, strategy, pipeline } = &self.settings;
        let fresh = || {
            SymbolPipeline::new(self.symbol, indicators, strategy, pipeline.duplicate_lookback)
        };

        let stored = self
            .stores
            .checkpoints
            .load_state(self.symbol)
            .await
            .with_context(|| format!("failed to load checkpoint of symbol {}", self.symbol))?;
        let Some(stored) = stored else {
            return Ok(fresh()?);
        };

        let restored = checkpoint::decode(&stored).and_then(|state| {
            SymbolPipeline::restore(self.symbol, state, indicators, strategy, pipeline.duplicate_lookback)
        });
        match restored {
            Ok(restored) => {
                report.resumed_from = restored.last_time();
                Ok(restored)
            }
            Err(e @ Error::CorruptState { .. }) => {
                tracing::error!(
                    symbol = %self.symbol,
                    error = %e,
                    "Checkpoint unusable, replaying the symbol from its first bar."
                );
                report.replayed_after_corrupt_state = true;
                Ok(fresh()?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn send_checkpoint(&self, pipeline: &SymbolPipeline) -> anyhow::Result<()> {
        let state = pipeline.checkpoint()?;
        if let Some(stored) = checkpoint::encode(&state)? {
            self.persist(PersistCommand::Checkpoint(stored))?;
        }
        Ok(())
    }

    fn persist(&self, command: PersistCommand) -> anyhow::Result<()> {
        self.persist
            .send(command)
            .map_err(|_| anyhow::anyhow!("persistence writer stopped before symbol {} finished", self.symbol))
    }
}
