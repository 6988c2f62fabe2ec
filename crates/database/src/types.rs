// In crates/database/src/types.rs

use core_types::{BarTime, SymbolId};

/// A serialized per-symbol pipeline checkpoint as kept by a [`crate::CheckpointStore`].
///
/// The store treats `payload` as opaque; `checksum` is computed and verified by
/// the engine that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCheckpoint {
    pub symbol: SymbolId,
    /// Time of the last bar folded into the state.
    pub as_of: BarTime,
    pub payload: String,
    pub checksum: String,
}
