// --- Engine Event Structures ---

use analytics::Trade;
use core_types::{BarTime, IndicatorSnapshot, SignalEvent, SymbolId};
use serde::Serialize;

/// A bar that was refused by its symbol's pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedBar {
    pub symbol: SymbolId,
    pub bar_time: BarTime,
    pub reason: String,
}

/// A pipeline that stopped accepting bars.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineHalted {
    pub symbol: SymbolId,
    pub reason: String,
}

/// The top-level event enum published by the engine.
/// `tag` and `content` are used by serde for clean JSON representation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    Snapshot(IndicatorSnapshot),
    Signal(SignalEvent),
    TradeRecorded(Trade),
    BarRejected(RejectedBar),
    Halted(PipelineHalted),
}
