use crate::core::{BlockId, BlockKind, ToggleId};
use crate::engine::{InputOutcome, ToggleEngine};
use crate::error::{HostError, ToggleError};
use crate::host::BlockHost;
use crate::query::TreeQuery;
use crate::visibility::{refresh_placeholder, refresh_visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Up,
}

/// What was picked up when a drag started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragSession {
    pub start_index: usize,
    pub kind: BlockKind,
    pub block_id: BlockId,
}

impl DragSession {
    /// Captures the block under the caret.
    pub fn begin<H: BlockHost + ?Sized>(host: &H) -> Option<Self> {
        let start_index = host.current_block_index()?;
        let block = host.block(start_index)?;
        Some(Self {
            start_index,
            kind: block.kind.clone(),
            block_id: block.id.clone(),
        })
    }
}

impl ToggleEngine {
    /// Moves the toggle whose root sat at `initial` as a whole subtree.
    ///
    /// The host has already moved the root block one slot on its own. That move is undone
    /// first, then the subtree is swapped with its neighbour in `direction`.
    pub fn move_toggle<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        initial: usize,
        direction: Direction,
    ) -> Result<(), ToggleError> {
        self.ensure_writable()?;
        host.close_toolbar();

        let current = host.current_block_index().unwrap_or(initial);
        if current != initial {
            host.move_block(initial, current)?;
        }

        let len = host.blocks_count();
        let query = TreeQuery::new(&*host);
        let root_id = query
            .block(initial)
            .and_then(|b| b.root_id())
            .ok_or(ToggleError::NotAToggle(initial))?;
        let end = initial + query.try_descendant_count(root_id)?;
        // A nested toggle never leaves its parent's range.
        let limit = match query
            .parent_of(initial)
            .and_then(|fk| query.find_toggle_root_index(initial, fk))
        {
            Some(parent_ix) => query.subtree_end(parent_ix)? + 1,
            None => len,
        };

        match direction {
            Direction::Down if end + 1 < limit => self.move_down(host, initial, end),
            Direction::Up if initial >= 1 => self.move_up(host, initial, end),
            Direction::Down => Err(ToggleError::OutOfRange { index: end + 1, len }),
            Direction::Up => Err(ToggleError::OutOfRange { index: 0, len }),
        }
    }

    /// Swaps the subtree `root..=end` with the single block after it, carrying that block's
    /// own subtree along when it is a toggle.
    pub fn move_down<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        root: usize,
        end: usize,
    ) -> Result<(), ToggleError> {
        let after = end + 1;
        let following = TreeQuery::new(&*host)
            .block(after)
            .and_then(|b| b.root_id())
            .cloned();

        host.move_block(root, after)?;
        log::debug!("moved block {after} above toggle at {root}");

        if let Some(id) = following {
            let count = TreeQuery::new(&*host).try_descendant_count(&id)?;
            self.move_descendants(host, count, root + 1, after + 1, Direction::Down)?;
        }
        Ok(())
    }

    /// Moves the subtree `root..=end` one step up.
    ///
    /// A toggle header directly above is left alone. When the block above belongs to a
    /// different parent, the whole foreign subtree it sits in is moved below instead.
    pub fn move_up<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        root: usize,
        end: usize,
    ) -> Result<(), ToggleError> {
        let before = root.checked_sub(1).ok_or(ToggleError::OutOfRange {
            index: 0,
            len: host.blocks_count(),
        })?;
        let query = TreeQuery::new(&*host);
        let Some(above) = query.block(before) else {
            return Ok(());
        };
        if above.root.is_some() {
            return Ok(());
        }

        let own_fk = query.parent_of(root);
        if let Some(above_fk) = query.parent_of(before) {
            if Some(above_fk) != own_fk {
                let parent_ix = query.find_ancestor_toggle_index(own_fk, above_fk, root)?;
                let parent_id = query
                    .block(parent_ix)
                    .and_then(|b| b.root_id())
                    .ok_or(ToggleError::NotAToggle(parent_ix))?;
                let count = query.try_descendant_count(parent_id)?;
                host.move_block(end, parent_ix)?;
                log::debug!("moved toggle at {parent_ix} below subtree ending at {end}");
                return self.move_descendants(host, count, end, parent_ix, Direction::Up);
            }
        }

        host.move_block(end, before)?;
        log::debug!("moved block {before} below subtree ending at {end}");
        Ok(())
    }

    /// Performs `count` single-slot moves from `from` to `to`. Moving down advances both
    /// cursors, moving up keeps them fixed since each move shifts the rest into place.
    pub fn move_descendants<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        count: usize,
        to: usize,
        from: usize,
        direction: Direction,
    ) -> Result<(), ToggleError> {
        let (mut to, mut from) = (to, from);
        for _ in 0..count {
            host.move_block(to, from)?;
            if direction == Direction::Down {
                to += 1;
                from += 1;
            }
        }
        Ok(())
    }

    /// Completes a drag once the host has placed the dragged block. `target_index` is the
    /// position of the block it was dropped on.
    pub fn handle_drop<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        session: &DragSession,
        target_index: usize,
    ) -> InputOutcome {
        if self.options.read_only {
            return InputOutcome::Ignored;
        }
        match self.drop_inner(host, session, target_index) {
            Ok(outcome) => outcome,
            Err(err) => {
                log::warn!("drop of {} on {target_index} ignored: {err}", session.block_id);
                InputOutcome::Ignored
            }
        }
    }

    fn drop_inner<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        session: &DragSession,
        target_index: usize,
    ) -> Result<InputOutcome, ToggleError> {
        let len = host.blocks_count();
        let current = host
            .index_of(&session.block_id)
            .ok_or_else(|| HostError::UnknownBlock(session.block_id.clone()))?;
        let query = TreeQuery::new(&*host);
        let target = query.block(target_index).ok_or(ToggleError::OutOfRange {
            index: target_index,
            len,
        })?;
        if target.id == session.block_id {
            return Ok(InputOutcome::Ignored);
        }
        let target_fk = target
            .root_id()
            .or_else(|| query.parent_of(target_index))
            .cloned();
        let dragged_root = query.block(current).and_then(|b| b.root_id()).cloned();

        let Some(dragged_root) = dragged_root else {
            self.assign_drop_target(host, current, target_fk.as_ref())?;
            return Ok(InputOutcome::Handled);
        };

        if query.is_descendant_of(&dragged_root, target_fk.as_ref()) {
            // Dropped into its own subtree: put the root back where the drag started.
            if current != session.start_index && session.start_index < len {
                host.move_block(session.start_index, current)?;
            }
            log::debug!("rejected drop of toggle {dragged_root} into its own subtree");
            return Ok(InputOutcome::Handled);
        }

        let direction = if current > session.start_index {
            Direction::Down
        } else {
            Direction::Up
        };
        self.assign_drop_target(host, current, target_fk.as_ref())?;
        let root_ix = host
            .index_of(&session.block_id)
            .ok_or_else(|| HostError::UnknownBlock(session.block_id.clone()))?;
        let end = match direction {
            Direction::Down => root_ix,
            Direction::Up => root_ix + 1,
        };
        self.move_children_after_drop(host, end, &dragged_root, direction)?;
        if let Some(ix) = TreeQuery::new(&*host).root_index(&dragged_root) {
            refresh_visibility(host, ix);
        }
        Ok(InputOutcome::Handled)
    }

    /// Makes the dropped block an item of `target_fk`, or a plain block when the target is
    /// outside any toggle.
    pub fn assign_drop_target<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        index: usize,
        target_fk: Option<&ToggleId>,
    ) -> Result<(), ToggleError> {
        match target_fk {
            Some(fk) => {
                let previous = host.block(index).and_then(|b| b.foreign_key()).cloned();
                self.attach(host, index, fk, None)?;
                if let Some(root_ix) = TreeQuery::new(&*host).root_index(fk) {
                    refresh_visibility(host, root_ix);
                }
                refresh_placeholder(host, fk);
                if let Some(previous) = previous.filter(|p| p != fk) {
                    refresh_placeholder(host, &previous);
                }
            }
            None => {
                if let Some(previous) = self.detach(host, index)? {
                    refresh_placeholder(host, &previous);
                }
            }
        }
        Ok(())
    }

    /// Pulls every child of `root_id` in behind its root after the root was dropped
    /// elsewhere. Nested toggles bring their own children along.
    ///
    /// Moving down, the children sit above the root and are each moved to `end`, the root's
    /// index. Moving up, they sit below and are moved in reverse to `end`, the slot right
    /// after the root.
    pub fn move_children_after_drop<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        end: usize,
        root_id: &ToggleId,
        direction: Direction,
    ) -> Result<(), ToggleError> {
        self.move_children_at_depth(host, end, root_id, direction, 0)
    }

    fn move_children_at_depth<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        end: usize,
        root_id: &ToggleId,
        direction: Direction,
        depth: usize,
    ) -> Result<(), ToggleError> {
        if depth > host.blocks_count() {
            return Err(ToggleError::CycleReference(root_id.clone()));
        }
        let query = TreeQuery::new(&*host);
        let mut children: Vec<(BlockId, Option<ToggleId>)> = query
            .children(root_id)
            .into_iter()
            .filter_map(|ix| query.block(ix))
            .map(|b| (b.id.clone(), b.root_id().cloned()))
            .collect();
        if direction == Direction::Up {
            children.reverse();
        }

        for (child_id, nested) in children {
            let from = host
                .index_of(&child_id)
                .ok_or_else(|| HostError::UnknownBlock(child_id.clone()))?;
            host.move_block(end, from)?;
            let Some(nested) = nested else {
                continue;
            };
            let nested_end = match direction {
                Direction::Down => end,
                Direction::Up => {
                    host.index_of(&child_id)
                        .ok_or_else(|| HostError::UnknownBlock(child_id.clone()))?
                        + 1
                }
            };
            self.move_children_at_depth(host, nested_end, &nested, direction, depth + 1)?;
        }
        Ok(())
    }
}
