use std::collections::HashMap;

use uuid::Uuid;

use crate::config::{EngineOptions, ToggleConfig, Toolbox};
use crate::core::{Block, BlockId, Status, ToggleId};
use crate::error::{HostError, ToggleError};
use crate::host::BlockHost;
use crate::ops::{SettleQueue, SettleTask};
use crate::query::{TreeQuery, is_item};
use crate::tracked::ItemSet;
use crate::visibility::{refresh_placeholder, refresh_visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Tab,
    Backspace,
    Space,
    Other,
}

/// A key press, reduced to what the toggle semantics need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub shift: bool,
    pub caret_offset: usize,
}

impl KeyPress {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            shift: false,
            caret_offset: 0,
        }
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn at(mut self, caret_offset: usize) -> Self {
        self.caret_offset = caret_offset;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Handled,
    Ignored,
}

/// Keeps the toggle tags of a flat block sequence consistent.
///
/// The engine never owns the blocks. Every operation takes the host, reads positions from
/// it, and rewrites tags in place. Work that has to wait for the host to settle is queued
/// and runs on [`ToggleEngine::settle`].
pub struct ToggleEngine {
    pub(crate) config: ToggleConfig,
    pub(crate) options: EngineOptions,
    pub(crate) tracked: HashMap<ToggleId, ItemSet>,
    pub(crate) queue: SettleQueue,
}

impl Default for ToggleEngine {
    fn default() -> Self {
        Self::new(ToggleConfig::default(), EngineOptions::default())
    }
}

impl ToggleEngine {
    pub fn new(config: ToggleConfig, options: EngineOptions) -> Self {
        Self {
            config,
            options: options.with_defaults(),
            tracked: HashMap::new(),
            queue: SettleQueue::default(),
        }
    }

    pub fn read_only(config: ToggleConfig) -> Self {
        Self::new(
            config,
            EngineOptions {
                read_only: true,
                ..EngineOptions::default()
            },
        )
    }

    pub fn config(&self) -> &ToggleConfig {
        &self.config
    }

    pub fn toolbox(&self) -> Toolbox {
        Toolbox::default()
    }

    pub fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    pub fn tracked(&self, root_id: &ToggleId) -> Option<&ItemSet> {
        self.tracked.get(root_id)
    }

    pub fn pending(&self) -> &SettleQueue {
        &self.queue
    }

    pub(crate) fn ensure_writable(&self) -> Result<(), ToggleError> {
        if self.options.read_only {
            Err(ToggleError::ReadOnly)
        } else {
            Ok(())
        }
    }

    pub(crate) fn track_root(&mut self, root_id: &ToggleId) {
        self.tracked.entry(root_id.clone()).or_default();
    }

    /// Tags the block at `index` (or `block_ref`, when given) as an item of `root_id`.
    ///
    /// Re-attaching an already tracked block leaves the tracked set alone but re-applies
    /// the tags. Returns the index the block was found at.
    pub fn attach<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        index: usize,
        root_id: &ToggleId,
        block_ref: Option<&BlockId>,
    ) -> Result<usize, ToggleError> {
        let index = match block_ref {
            Some(id) => host
                .index_of(id)
                .ok_or_else(|| HostError::UnknownBlock(id.clone()))?,
            None => index,
        };
        let len = host.blocks_count();
        let query = TreeQuery::new(&*host);
        if !query.root_exists(root_id) {
            return Err(ToggleError::OrphanReference(root_id.clone()));
        }
        let block = query
            .block(index)
            .ok_or(ToggleError::OutOfRange { index, len })?;
        if let Some(own_id) = block.root_id() {
            if query.is_descendant_of(own_id, Some(root_id)) {
                return Err(ToggleError::CycleReference(root_id.clone()));
            }
        }
        let position = query
            .children(root_id)
            .into_iter()
            .filter(|&child| child < index)
            .count();

        let read_only = self.options.read_only;
        let block = host
            .block_mut(index)
            .ok_or(ToggleError::OutOfRange { index, len })?;
        let block_id = block.id.clone();
        block.tags.foreign_key = Some(root_id.clone());
        block.tags.item_id = Some(Uuid::new_v4().to_string());
        block.tags.marked = true;
        block.tags.pending_nest = None;
        block.tags.handlers = !read_only;

        for (other, set) in self.tracked.iter_mut() {
            if other != root_id {
                set.remove(&block_id);
            }
        }
        self.tracked
            .entry(root_id.clone())
            .or_default()
            .insert_at(position, block_id.clone());

        if !read_only {
            host.set_caret_to_block(index);
        }
        log::debug!("attached block {block_id} at {index} to {root_id}");
        Ok(index)
    }

    /// Strips membership from the block at `index`. Returns the foreign key it carried.
    pub fn detach<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        index: usize,
    ) -> Result<Option<ToggleId>, ToggleError> {
        let len = host.blocks_count();
        let block = host
            .block_mut(index)
            .ok_or(ToggleError::OutOfRange { index, len })?;
        let block_id = block.id.clone();
        let previous = block.tags.foreign_key.clone();
        block.tags.clear();
        block.hidden = false;

        if let Some(fk) = previous.as_ref() {
            if let Some(set) = self.tracked.get_mut(fk) {
                set.remove(&block_id);
            }
        }
        log::debug!("detached block {block_id} at {index} from {previous:?}");
        Ok(previous)
    }

    /// Drops `ids` from every tracked set.
    pub(crate) fn untrack<'a>(&mut self, ids: impl IntoIterator<Item = &'a BlockId>) {
        for id in ids {
            for set in self.tracked.values_mut() {
                set.remove(id);
            }
        }
    }

    /// Flips the status of the root at `root_index` and re-applies visibility.
    pub fn toggle_status<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        root_index: usize,
    ) -> Result<Status, ToggleError> {
        let root = host
            .block_mut(root_index)
            .and_then(|b| b.root.as_mut())
            .ok_or(ToggleError::NotAToggle(root_index))?;
        root.status = root.status.flipped();
        let status = root.status;
        log::debug!("toggle {} is now {status:?}", root.id);
        refresh_visibility(host, root_index);
        Ok(status)
    }

    /// Icon click. Allowed in read-only mode since it only changes visibility.
    pub fn handle_icon_click<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        root_index: usize,
    ) -> InputOutcome {
        match self.toggle_status(host, root_index) {
            Ok(_) => InputOutcome::Handled,
            Err(err) => {
                log::warn!("icon click at {root_index} ignored: {err}");
                InputOutcome::Ignored
            }
        }
    }

    /// Enter in a root header: opens a closed toggle, moves the text after the caret into
    /// a new first item. Returns the new item's index.
    pub fn create_item_from_root<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        root_index: usize,
        caret_offset: usize,
    ) -> Result<usize, ToggleError> {
        self.ensure_writable()?;
        let (root_id, status) = root_at(&*host, root_index)?;
        if status.is_closed() {
            self.toggle_status(host, root_index)?;
        }

        let len = host.blocks_count();
        let block = host.block_mut(root_index).ok_or(ToggleError::OutOfRange {
            index: root_index,
            len,
        })?;
        let split = clamp_to_char_boundary(&block.text, caret_offset);
        let tail = block.text.split_off(split);

        let new_index = root_index + 1;
        host.insert(new_index, Block::paragraph(tail), true)?;
        self.attach(host, new_index, &root_id, None)?;
        refresh_placeholder(host, &root_id);
        Ok(new_index)
    }

    /// Enter on an item: a new empty item directly after it, in the same toggle.
    pub fn create_item_after<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        index: usize,
    ) -> Result<usize, ToggleError> {
        self.ensure_writable()?;
        let root_id = TreeQuery::new(&*host)
            .parent_of(index)
            .cloned()
            .ok_or(ToggleError::OutOfRange {
                index,
                len: host.blocks_count(),
            })?;
        let new_index = index + 1;
        host.insert(new_index, Block::paragraph(""), true)?;
        self.attach(host, new_index, &root_id, None)?;
        Ok(new_index)
    }

    /// Click on the empty-state placeholder.
    pub fn click_placeholder<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        root_index: usize,
    ) -> Result<usize, ToggleError> {
        self.ensure_writable()?;
        let (root_id, _) = root_at(&*host, root_index)?;
        let new_index = root_index + 1;
        host.insert(new_index, Block::paragraph(""), true)?;
        self.attach(host, new_index, &root_id, None)?;
        refresh_placeholder(host, &root_id);
        Ok(new_index)
    }

    /// Backspace at offset 0 on an item: drop it from its toggle's tracked set.
    pub fn item_backspace<H: BlockHost + ?Sized>(
        &mut self,
        host: &H,
        index: usize,
        caret_offset: usize,
    ) -> bool {
        if caret_offset != 0 {
            return false;
        }
        let Some(block) = host.block(index) else {
            return false;
        };
        let Some(set) = block.foreign_key().and_then(|fk| self.tracked.get_mut(fk)) else {
            return false;
        };
        set.remove(&block.id)
    }

    /// `"> "` followed by Space on a plain block turns it into a toggle.
    pub fn create_toggle_with_shortcut<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        index: usize,
    ) -> Result<Option<ToggleId>, ToggleError> {
        self.ensure_writable()?;
        let query = TreeQuery::new(&*host);
        let block = query.block(index).ok_or(ToggleError::OutOfRange {
            index,
            len: host.blocks_count(),
        })?;
        if query.is_part_of_toggle(index) {
            return Ok(None);
        }
        let Some(rest) = block.text.strip_prefix('>') else {
            return Ok(None);
        };
        let header = rest.strip_prefix(' ').unwrap_or(rest).to_string();

        let root_id = ToggleId::generate();
        host.insert(
            index,
            Block::toggle(header, root_id.clone(), Status::Open),
            true,
        )?;
        host.delete(index + 1)?;
        host.set_caret_to_block(index);
        self.track_root(&root_id);
        log::debug!("created toggle {root_id} from shortcut at {index}");
        Ok(Some(root_id))
    }

    /// Tab on a plain block that follows a toggle or one of its items.
    ///
    /// The block is only marked here. Membership is finalized once the owning root's
    /// header regains focus, see [`ToggleEngine::finalize_nest`].
    pub fn nest<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        index: usize,
    ) -> Result<bool, ToggleError> {
        self.ensure_writable()?;
        let Some(prev) = index.checked_sub(1) else {
            return Ok(false);
        };
        let query = TreeQuery::new(&*host);
        if query.is_part_of_toggle(index) || !query.is_part_of_toggle(prev) {
            return Ok(false);
        }
        let Some(prev_block) = query.block(prev) else {
            return Ok(false);
        };
        let Some(root_id) = query
            .parent_of(prev)
            .or_else(|| prev_block.root_id())
            .cloned()
        else {
            return Ok(false);
        };
        let root_index = query
            .find_toggle_root_index(prev, &root_id)
            .ok_or_else(|| ToggleError::OrphanReference(root_id.clone()))?;

        let len = host.blocks_count();
        let block = host
            .block_mut(index)
            .ok_or(ToggleError::OutOfRange { index, len })?;
        block.tags.pending_nest = Some(root_id.clone());
        host.set_caret_to_block(root_index);
        self.queue.push(SettleTask::FinalizeNest { root_id });
        Ok(true)
    }

    /// Focus returned to a root header: adopt every block waiting to be nested into it.
    pub fn finalize_nest<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        root_id: &ToggleId,
    ) -> Result<usize, ToggleError> {
        let pending: Vec<usize> = (0..host.blocks_count())
            .filter(|&ix| {
                host.block(ix)
                    .and_then(|b| b.tags.pending_nest.as_ref())
                    .is_some_and(|fk| fk == root_id)
            })
            .collect();
        for &ix in &pending {
            self.attach(host, ix, root_id, None)?;
        }
        if !pending.is_empty() {
            host.close_toolbar();
            if let Some(root_ix) = TreeQuery::new(&*host).root_index(root_id) {
                refresh_visibility(host, root_ix);
            }
            refresh_placeholder(host, root_id);
        }
        Ok(pending.len())
    }

    pub fn on_root_focus<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        root_index: usize,
    ) -> Result<usize, ToggleError> {
        let (root_id, _) = root_at(&*host, root_index)?;
        self.finalize_nest(host, &root_id)
    }

    /// Shift+Tab on an item: move it (with its own subtree) past the end of its parent's
    /// subtree, then detach it once the host has settled.
    ///
    /// An item of a nested toggle is promoted into the grandparent rather than to the top
    /// level, so the grandparent's subtree stays contiguous.
    pub fn extract<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        index: usize,
    ) -> Result<usize, ToggleError> {
        self.ensure_writable()?;
        let result = self.extract_inner(host, index);
        let caret = *result.as_ref().unwrap_or(&index);
        host.set_caret_to_block(caret);
        host.close_toolbar();
        result
    }

    fn extract_inner<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        index: usize,
    ) -> Result<usize, ToggleError> {
        let len = host.blocks_count();
        let query = TreeQuery::new(&*host);
        let block = query
            .block(index)
            .ok_or(ToggleError::OutOfRange { index, len })?;
        if !is_item(block) {
            return Ok(index);
        }
        let Some(fk) = query.parent_of(index) else {
            return Ok(index);
        };
        let Some(parent_index) = query.find_toggle_root_index(index, fk) else {
            return Ok(index);
        };
        let items = query.try_descendant_count(fk)?;
        let own_size = match block.root_id() {
            Some(own) => 1 + query.try_descendant_count(own)?,
            None => 1,
        };
        let destiny = parent_index + items;
        let grandparent = query.parent_of(parent_index).cloned();
        let block_id = block.id.clone();

        if index + own_size - 1 < destiny {
            for _ in 0..own_size {
                host.move_block(destiny, index)?;
            }
        }
        let final_index = destiny + 1 - own_size;
        log::debug!("extracting block {block_id} from {index} to {final_index}");
        self.queue.push(SettleTask::Detach {
            block_id,
            reattach_to: grandparent,
        });
        Ok(final_index)
    }

    /// Queues deletion of the root at `root_index` together with its whole subtree.
    /// Returns the number of blocks that will be removed.
    pub fn delete_toggle<H: BlockHost + ?Sized>(
        &mut self,
        host: &H,
        root_index: usize,
    ) -> Result<usize, ToggleError> {
        self.ensure_writable()?;
        let (root_id, _) = root_at(host, root_index)?;
        let query = TreeQuery::new(host);
        let count = 1 + query.try_descendant_count(&root_id)?;

        let mut removed = Vec::with_capacity(count);
        for ix in std::iter::once(root_index).chain(query.descendants(&root_id)) {
            let Some(block) = query.block(ix) else {
                continue;
            };
            if let Some(nested) = block.root_id() {
                self.tracked.remove(nested);
            }
            removed.push(block.id.clone());
        }
        self.tracked.remove(&root_id);
        self.untrack(&removed);

        for _ in 0..count {
            self.queue.push(SettleTask::Delete { index: root_index });
        }
        log::debug!("deleting toggle {root_id} with {count} blocks at {root_index}");
        Ok(count)
    }

    /// Backspace at offset 0 in a root header: dissolve the toggle, keeping its content.
    ///
    /// Direct items move up one level: they become top-level blocks, or items of the
    /// enclosing toggle when the unwrapped one was nested. Nested toggles keep their own
    /// items. The header text up to the first line break is re-inserted as a paragraph in
    /// the root's place, at the same level as the items.
    pub fn unwrap_toggle<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        root_index: usize,
    ) -> Result<usize, ToggleError> {
        self.ensure_writable()?;
        let (root_id, _) = root_at(&*host, root_index)?;
        let query = TreeQuery::new(&*host);
        let parent = query
            .parent_of(root_index)
            .filter(|fk| query.root_exists(fk))
            .cloned();
        let old_header = query.block(root_index).map(|b| b.id.clone());
        let children = query.children(&root_id);
        let nested: Vec<BlockId> = children
            .iter()
            .filter_map(|&ix| query.block(ix))
            .filter(|b| b.root.is_some())
            .map(|b| b.id.clone())
            .collect();
        let header = host
            .block(root_index)
            .map(|b| b.text.lines().next().unwrap_or("").to_string())
            .unwrap_or_default();

        for &ix in &children {
            self.detach(host, ix)?;
        }
        host.delete(root_index)?;
        host.insert(root_index, Block::paragraph(header), true)?;
        self.tracked.remove(&root_id);
        self.untrack(old_header.as_ref());

        if let Some(parent) = parent.as_ref() {
            for ix in std::iter::once(root_index).chain(children) {
                self.attach(host, ix, parent, None)?;
            }
        }
        host.set_caret_to_block(root_index);

        for id in nested {
            if let Some(ix) = host.index_of(&id) {
                refresh_visibility(host, ix);
            }
        }
        if let Some(parent) = parent.as_ref() {
            if let Some(parent_ix) = TreeQuery::new(&*host).root_index(parent) {
                refresh_visibility(host, parent_ix);
            }
        }
        log::debug!("unwrapped toggle {root_id} at {root_index} into {parent:?}");
        Ok(root_index)
    }

    /// Marks every block below `root_id` as selected.
    pub fn highlight_items<H: BlockHost + ?Sized>(&self, host: &mut H, root_id: &ToggleId) -> usize {
        let descendants = TreeQuery::new(&*host).descendants(root_id);
        for &ix in &descendants {
            if let Some(block) = host.block_mut(ix) {
                block.selected = true;
            }
        }
        descendants.len()
    }

    /// Dispatches a key press on the block at `index` to the toggle semantics it triggers.
    pub fn handle_key<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        index: usize,
        press: KeyPress,
    ) -> InputOutcome {
        if self.options.read_only {
            return InputOutcome::Ignored;
        }
        match self.dispatch_key(host, index, press) {
            Ok(outcome) => outcome,
            Err(err) => {
                log::warn!("{:?} at block {index} ignored: {err}", press.key);
                InputOutcome::Ignored
            }
        }
    }

    fn dispatch_key<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        index: usize,
        press: KeyPress,
    ) -> Result<InputOutcome, ToggleError> {
        let query = TreeQuery::new(&*host);
        let block = query.block(index).ok_or(ToggleError::OutOfRange {
            index,
            len: host.blocks_count(),
        })?;
        let is_root = block.root.is_some();
        let in_toggle = query.parent_of(index).is_some();

        match press.key {
            Key::Tab if press.shift && in_toggle => {
                self.extract(host, index)?;
            }
            Key::Enter if is_root => {
                self.create_item_from_root(host, index, press.caret_offset)?;
            }
            Key::Backspace if is_root && press.caret_offset == 0 => {
                self.unwrap_toggle(host, index)?;
            }
            Key::Enter if in_toggle => {
                self.create_item_after(host, index)?;
            }
            Key::Backspace if in_toggle => {
                if !self.item_backspace(&*host, index, press.caret_offset) {
                    return Ok(InputOutcome::Ignored);
                }
            }
            Key::Tab if !press.shift && !is_root && !in_toggle => {
                if !self.nest(host, index)? {
                    return Ok(InputOutcome::Ignored);
                }
            }
            Key::Space if !is_root && !in_toggle => {
                if self.create_toggle_with_shortcut(host, index)?.is_none() {
                    return Ok(InputOutcome::Ignored);
                }
            }
            _ => return Ok(InputOutcome::Ignored),
        }
        Ok(InputOutcome::Handled)
    }

    /// Runs queued continuations in FIFO order, including any they enqueue.
    pub fn settle<H: BlockHost + ?Sized>(&mut self, host: &mut H) -> usize {
        let max = self.options.max_settle_iterations;
        let mut ran = 0;
        while let Some(task) = self.queue.pop() {
            if ran >= max {
                log::warn!(
                    "settle queue exceeded {max} tasks, dropping {}",
                    self.queue.len() + 1
                );
                self.queue.clear();
                break;
            }
            ran += 1;
            log::trace!("settle: {task:?}");
            if let Err(err) = self.run_task(host, task) {
                log::warn!("settle task failed: {err}");
            }
        }
        ran
    }

    fn run_task<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        task: SettleTask,
    ) -> Result<(), ToggleError> {
        match task {
            SettleTask::Detach {
                block_id,
                reattach_to,
            } => {
                let ix = host
                    .index_of(&block_id)
                    .ok_or(HostError::UnknownBlock(block_id))?;
                let previous = self.detach(host, ix)?;
                if let Some(parent) = reattach_to {
                    self.attach(host, ix, &parent, None)?;
                    if let Some(root_ix) = TreeQuery::new(&*host).root_index(&parent) {
                        refresh_visibility(host, root_ix);
                    }
                }
                if let Some(previous) = previous {
                    refresh_placeholder(host, &previous);
                }
            }
            SettleTask::Delete { index } => {
                host.delete(index)?;
            }
            SettleTask::FinalizeNest { root_id } => {
                self.finalize_nest(host, &root_id)?;
            }
            SettleTask::ApplyVisibility { root_id } => {
                if let Some(root_ix) = TreeQuery::new(&*host).root_index(&root_id) {
                    refresh_visibility(host, root_ix);
                }
            }
            SettleTask::RefreshPlaceholder { root_id } => {
                refresh_placeholder(host, &root_id);
            }
        }
        Ok(())
    }
}

pub(crate) fn root_at<H: BlockHost + ?Sized>(
    host: &H,
    index: usize,
) -> Result<(ToggleId, Status), ToggleError> {
    let block = host.block(index).ok_or(ToggleError::OutOfRange {
        index,
        len: host.blocks_count(),
    })?;
    let root = block.root.as_ref().ok_or(ToggleError::NotAToggle(index))?;
    Ok((root.id.clone(), root.status))
}

fn clamp_to_char_boundary(s: &str, mut ix: usize) -> usize {
    ix = ix.min(s.len());
    while ix > 0 && !s.is_char_boundary(ix) {
        ix -= 1;
    }
    ix
}
