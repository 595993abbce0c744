use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::core::{BlockId, ToggleId};

/// A sequence mutation performed by the host, as recorded in its journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostOp {
    Move {
        to: usize,
        from: usize,
    },
    Delete {
        index: usize,
        block_id: BlockId,
    },
    Insert {
        index: usize,
        block_id: BlockId,
    },
}

/// Work that must only run once the host has settled the previous mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleTask {
    /// Strip membership from a block, optionally re-tagging it into `reattach_to`.
    Detach {
        block_id: BlockId,
        reattach_to: Option<ToggleId>,
    },
    Delete {
        index: usize,
    },
    FinalizeNest {
        root_id: ToggleId,
    },
    ApplyVisibility {
        root_id: ToggleId,
    },
    RefreshPlaceholder {
        root_id: ToggleId,
    },
}

#[derive(Debug, Clone, Default)]
pub struct SettleQueue {
    tasks: VecDeque<SettleTask>,
}

impl SettleQueue {
    pub fn push(&mut self, task: SettleTask) {
        self.tasks.push_back(task);
    }

    pub fn pop(&mut self) -> Option<SettleTask> {
        self.tasks.pop_front()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SettleTask> {
        self.tasks.iter()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
