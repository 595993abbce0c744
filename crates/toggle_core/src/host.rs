use crate::core::{Block, BlockId};
use crate::error::HostError;
use crate::ops::HostOp;

/// The flat block sequence owned by the host editor.
///
/// Indices are only valid until the next mutation. Callers re-derive positions through
/// [`BlockHost::index_of`] instead of holding on to them.
pub trait BlockHost {
    fn current_block_index(&self) -> Option<usize>;
    fn blocks_count(&self) -> usize;
    fn block(&self, index: usize) -> Option<&Block>;
    fn block_mut(&mut self, index: usize) -> Option<&mut Block>;
    fn index_of(&self, id: &BlockId) -> Option<usize>;

    /// Removes the block at `from` and re-inserts it at `to` in the shortened sequence.
    fn move_block(&mut self, to: usize, from: usize) -> Result<(), HostError>;
    fn delete(&mut self, index: usize) -> Result<Block, HostError>;
    fn insert(&mut self, index: usize, block: Block, focus: bool) -> Result<BlockId, HostError>;

    fn set_caret_to_block(&mut self, index: usize);
    fn close_toolbar(&mut self);

    fn block_by_id(&self, id: &BlockId) -> Option<&Block> {
        self.index_of(id).and_then(|ix| self.block(ix))
    }
}

/// In-memory host used by tests and the story binary.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    blocks: Vec<Block>,
    caret: Option<usize>,
    toolbar_open: bool,
    journal: Vec<HostOp>,
}

impl MemoryHost {
    pub fn new(blocks: Vec<Block>) -> Self {
        let caret = if blocks.is_empty() { None } else { Some(0) };
        Self {
            blocks,
            caret,
            toolbar_open: false,
            journal: Vec::new(),
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn texts(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.text.as_str()).collect()
    }

    pub fn journal(&self) -> &[HostOp] {
        &self.journal
    }

    pub fn clear_journal(&mut self) {
        self.journal.clear();
    }

    pub fn caret(&self) -> Option<usize> {
        self.caret
    }

    pub fn set_current_block(&mut self, index: usize) {
        self.caret = Some(index.min(self.blocks.len().saturating_sub(1)));
    }

    pub fn open_toolbar(&mut self) {
        self.toolbar_open = true;
    }

    pub fn is_toolbar_open(&self) -> bool {
        self.toolbar_open
    }

    /// Replaces a block wholesale, bypassing the journal. Simulates the host restoring
    /// stale markup on undo.
    pub fn replace(&mut self, index: usize, block: Block) -> Result<Block, HostError> {
        let len = self.blocks.len();
        let slot = self
            .blocks
            .get_mut(index)
            .ok_or(HostError::OutOfRange { index, len })?;
        Ok(std::mem::replace(slot, block))
    }

    fn check(&self, index: usize) -> Result<(), HostError> {
        if index < self.blocks.len() {
            Ok(())
        } else {
            Err(HostError::OutOfRange {
                index,
                len: self.blocks.len(),
            })
        }
    }
}

impl BlockHost for MemoryHost {
    fn current_block_index(&self) -> Option<usize> {
        self.caret.filter(|&ix| ix < self.blocks.len())
    }

    fn blocks_count(&self) -> usize {
        self.blocks.len()
    }

    fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }

    fn index_of(&self, id: &BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| &b.id == id)
    }

    fn move_block(&mut self, to: usize, from: usize) -> Result<(), HostError> {
        self.check(from)?;
        self.check(to)?;
        let block = self.blocks.remove(from);
        self.blocks.insert(to, block);
        self.journal.push(HostOp::Move { to, from });
        Ok(())
    }

    fn delete(&mut self, index: usize) -> Result<Block, HostError> {
        self.check(index)?;
        let removed = self.blocks.remove(index);
        self.journal.push(HostOp::Delete {
            index,
            block_id: removed.id.clone(),
        });
        if let Some(caret) = self.caret {
            if caret >= self.blocks.len() {
                self.caret = self.blocks.len().checked_sub(1);
            }
        }
        Ok(removed)
    }

    fn insert(&mut self, index: usize, block: Block, focus: bool) -> Result<BlockId, HostError> {
        if index > self.blocks.len() {
            return Err(HostError::OutOfRange {
                index,
                len: self.blocks.len(),
            });
        }
        let id = block.id.clone();
        self.blocks.insert(index, block);
        self.journal.push(HostOp::Insert {
            index,
            block_id: id.clone(),
        });
        if focus {
            self.caret = Some(index);
        }
        Ok(id)
    }

    fn set_caret_to_block(&mut self, index: usize) {
        if index < self.blocks.len() {
            self.caret = Some(index);
        }
    }

    fn close_toolbar(&mut self) {
        self.toolbar_open = false;
    }
}
