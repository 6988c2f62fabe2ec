// In crates/engine/src/checkpoint.rs

//! Serialization of per-symbol pipeline state.
//!
//! A checkpoint is the JSON encoding of [`PipelineState`] plus the SHA-256 of that
//! JSON. Decoding verifies the checksum before parsing; any failure is reported as
//! `CorruptState` and the caller recovers by replaying the bar store.

use core_types::{Bar, BarTime, Error, Result, SymbolId};
use database::StoredCheckpoint;
use indicators::{MovingAverages, RelativeStrength};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strategies::CrossoverOrder;

pub const STATE_VERSION: u32 = 1;

/// Window, oscillator and evaluator state of one symbol after its last bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    pub version: u32,
    pub symbol: SymbolId,
    pub last_time: Option<BarTime>,
    pub bars_processed: u64,
    /// Highest bar-store ingestion sequence already read by this pipeline.
    #[serde(default)]
    pub ingested_through: i64,
    pub averages: MovingAverages,
    pub oscillator: RelativeStrength,
    pub order: CrossoverOrder,
    /// Most recent bars, oldest first, for recognising re-delivered duplicates.
    pub recent: Vec<Bar>,
}

fn sha256_hex(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// Encodes `state` for a [`database::CheckpointStore`].
///
/// Returns `None` for a pipeline that has not processed any bar yet.
pub fn encode(state: &PipelineState) -> Result<Option<StoredCheckpoint>> {
    let Some(as_of) = state.last_time else {
        return Ok(None);
    };
    let payload = serde_json::to_string(state).map_err(|e| Error::CorruptState {
        symbol: state.symbol,
        reason: format!("failed to serialize state: {e}"),
    })?;
    let checksum = sha256_hex(&payload);
    Ok(Some(StoredCheckpoint {
        symbol: state.symbol,
        as_of,
        payload,
        checksum,
    }))
}

pub fn decode(stored: &StoredCheckpoint) -> Result<PipelineState> {
    let corrupt = |reason: String| Error::CorruptState {
        symbol: stored.symbol,
        reason,
    };

    let actual = sha256_hex(&stored.payload);
    if actual != stored.checksum {
        return Err(corrupt(format!(
            "checksum mismatch: expected {}, got {}",
            stored.checksum, actual
        )));
    }

    let state: PipelineState = serde_json::from_str(&stored.payload)
        .map_err(|e| corrupt(format!("failed to deserialize state: {e}")))?;

    if state.last_time != Some(stored.as_of) {
        return Err(corrupt(format!(
            "stored as of {} but the state ends at {:?}",
            stored.as_of, state.last_time
        )));
    }
    Ok(state)
}
