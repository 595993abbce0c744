//! Read-only derivations over the flat block sequence.
//!
//! The host only knows an ordered list of blocks. Parent/child relationships exist
//! solely as foreign keys on items pointing at a root id, so every structural question
//! is answered here by scanning the sequence. Traversals are bounded by the block count
//! so a corrupted foreign-key cycle cannot recurse forever.

use crate::core::{Block, RootState, ToggleId};
use crate::error::ToggleError;
use crate::host::BlockHost;

pub fn is_item(block: &Block) -> bool {
    block.tags.marked
}

pub fn is_root(block: &Block) -> bool {
    block.root.is_some()
}

pub struct TreeQuery<'a, H: BlockHost + ?Sized> {
    host: &'a H,
}

impl<'a, H: BlockHost + ?Sized> TreeQuery<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    fn limit(&self) -> usize {
        self.host.blocks_count() + 1
    }

    fn len(&self) -> usize {
        self.host.blocks_count()
    }

    pub fn block(&self, index: usize) -> Option<&'a Block> {
        self.host.block(index)
    }

    pub fn roots(&self) -> impl Iterator<Item = (usize, &'a RootState)> + 'a {
        let host = self.host;
        (0..host.blocks_count())
            .filter_map(move |ix| host.block(ix).and_then(|b| b.root.as_ref()).map(|r| (ix, r)))
    }

    pub fn root_index(&self, id: &ToggleId) -> Option<usize> {
        self.roots()
            .find(|(_, root)| &root.id == id)
            .map(|(ix, _)| ix)
    }

    pub fn root_exists(&self, id: &ToggleId) -> bool {
        self.root_index(id).is_some()
    }

    pub fn root_count(&self, id: &ToggleId) -> usize {
        self.roots().filter(|(_, root)| &root.id == id).count()
    }

    /// The block's foreign key, if it names a live root. Orphaned keys read as top-level.
    pub fn parent_of(&self, index: usize) -> Option<&'a ToggleId> {
        let fk = self.block(index)?.foreign_key()?;
        self.root_exists(fk).then_some(fk)
    }

    /// Catch-all membership test used by the nest and repair guards.
    pub fn is_part_of_toggle(&self, index: usize) -> bool {
        let Some(block) = self.block(index) else {
            return false;
        };
        is_root(block) || (is_item(block) && self.parent_of(index).is_some())
    }

    /// Indices of the blocks whose foreign key is `root_id`, in sequence order.
    pub fn children(&self, root_id: &ToggleId) -> Vec<usize> {
        (0..self.len())
            .filter(|&ix| {
                self.block(ix)
                    .and_then(Block::foreign_key)
                    .is_some_and(|fk| fk == root_id)
            })
            .collect()
    }

    pub fn try_descendant_count(&self, root_id: &ToggleId) -> Result<usize, ToggleError> {
        self.count_descendants(root_id, root_id, 0)
    }

    fn count_descendants(
        &self,
        origin: &ToggleId,
        root_id: &ToggleId,
        depth: usize,
    ) -> Result<usize, ToggleError> {
        if depth > self.limit() {
            return Err(ToggleError::CycleReference(origin.clone()));
        }
        let mut counter = 0;
        for ix in self.children(root_id) {
            counter += 1;
            if let Some(child_root) = self.block(ix).and_then(Block::root_id) {
                counter += self.count_descendants(origin, child_root, depth + 1)?;
            }
        }
        Ok(counter)
    }

    /// Total subtree size below `root_id`, excluding the root.
    ///
    /// A foreign-key cycle is a debug assertion. Release builds fall back to the direct
    /// child count.
    pub fn descendant_count(&self, root_id: &ToggleId) -> usize {
        match self.try_descendant_count(root_id) {
            Ok(count) => count,
            Err(err) => {
                log::error!("descendant count aborted: {err}");
                debug_assert!(false, "cycle in toggle foreign keys: {err}");
                self.children(root_id).len()
            }
        }
    }

    /// Indices of every block below `root_id`, depth first.
    pub fn descendants(&self, root_id: &ToggleId) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_descendants(root_id, 0, &mut out);
        out
    }

    fn collect_descendants(&self, root_id: &ToggleId, depth: usize, out: &mut Vec<usize>) {
        if depth > self.limit() {
            log::error!("cycle while collecting descendants of {root_id}");
            return;
        }
        for ix in self.children(root_id) {
            out.push(ix);
            if let Some(child_root) = self.block(ix).and_then(Block::root_id) {
                self.collect_descendants(child_root, depth + 1, out);
            }
        }
    }

    /// Last index of the subtree rooted at `root_index`.
    pub fn subtree_end(&self, root_index: usize) -> Result<usize, ToggleError> {
        let block = self.block(root_index).ok_or(ToggleError::OutOfRange {
            index: root_index,
            len: self.len(),
        })?;
        let root_id = block.root_id().ok_or(ToggleError::NotAToggle(root_index))?;
        Ok(root_index + self.try_descendant_count(root_id)?)
    }

    /// Scans downward from `from` for the root whose id is `root_id`.
    pub fn find_toggle_root_index(&self, from: usize, root_id: &ToggleId) -> Option<usize> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        (0..=from.min(len - 1))
            .rev()
            .find(|&ix| self.block(ix).and_then(Block::root_id) == Some(root_id))
    }

    /// Walks up from the subtree that ends just above `from` until it reaches a root whose
    /// own parent is `child_fk`, i.e. the sibling of the toggle starting at `from`.
    pub fn find_ancestor_toggle_index(
        &self,
        child_fk: Option<&ToggleId>,
        above_fk: &ToggleId,
        from: usize,
    ) -> Result<usize, ToggleError> {
        let mut target = above_fk;
        let mut start = from;
        for _ in 0..self.limit() {
            let scan_from = start.checked_sub(1).ok_or(ToggleError::OutOfRange {
                index: 0,
                len: self.len(),
            })?;
            let root_ix = self
                .find_toggle_root_index(scan_from, target)
                .ok_or_else(|| ToggleError::OrphanReference(target.clone()))?;
            match self.parent_of(root_ix) {
                Some(fk) if Some(fk) != child_fk => {
                    target = fk;
                    start = root_ix;
                }
                _ => return Ok(root_ix),
            }
        }
        Err(ToggleError::CycleReference(above_fk.clone()))
    }

    /// True when `candidate_fk` is `root_id` or the id of any toggle nested below it.
    pub fn is_descendant_of(&self, root_id: &ToggleId, candidate_fk: Option<&ToggleId>) -> bool {
        let Some(candidate) = candidate_fk else {
            return false;
        };
        self.contains_root(root_id, candidate, 0)
    }

    fn contains_root(&self, root_id: &ToggleId, candidate: &ToggleId, depth: usize) -> bool {
        if depth > self.limit() {
            log::error!("cycle while searching below {root_id}");
            return false;
        }
        if root_id == candidate {
            return true;
        }
        self.children(root_id).into_iter().any(|ix| {
            self.block(ix)
                .and_then(Block::root_id)
                .is_some_and(|child| self.contains_root(child, candidate, depth + 1))
        })
    }

    /// Foreign keys from the block's parent up to its outermost toggle.
    pub fn ancestor_chain(&self, index: usize) -> Vec<&'a ToggleId> {
        let mut chain = Vec::new();
        let mut current = index;
        while let Some(fk) = self.parent_of(current) {
            if chain.contains(&fk) || chain.len() > self.limit() {
                log::error!("cycle in ancestor chain of block {index}");
                break;
            }
            chain.push(fk);
            match self.find_toggle_root_index(current, fk).or_else(|| self.root_index(fk)) {
                Some(root_ix) => current = root_ix,
                None => break,
            }
        }
        chain
    }
}
