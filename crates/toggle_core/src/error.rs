use thiserror::Error;

use crate::core::{BlockId, ToggleId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("Block index {index} is out of range for {len} blocks")]
    OutOfRange { index: usize, len: usize },
    #[error("Unknown block id: {0}")]
    UnknownBlock(BlockId),
}

/// Failures of a toggle operation. Every variant means the operation was aborted
/// before it mutated the sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToggleError {
    #[error("Foreign key {0} does not name a live toggle root")]
    OrphanReference(ToggleId),
    #[error("Toggle id {0} is shared by more than one root")]
    DuplicateRootId(ToggleId),
    #[error("Foreign key chain starting at {0} loops back on itself")]
    CycleReference(ToggleId),
    #[error("Index {index} is out of range for {len} blocks")]
    OutOfRange { index: usize, len: usize },
    #[error("Block at index {0} is not a toggle root")]
    NotAToggle(usize),
    #[error("Editor is read-only")]
    ReadOnly,
    #[error(transparent)]
    Host(#[from] HostError),
}
