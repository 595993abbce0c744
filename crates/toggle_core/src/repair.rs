//! Reconciliation after edits the engine did not make itself.
//!
//! The host reports undo, redo and paste as a [`MutationBatch`]. Repair passes are
//! idempotent: running one twice over the same batch changes nothing the second time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::{BlockId, ToggleId};
use crate::engine::ToggleEngine;
use crate::error::ToggleError;
use crate::host::BlockHost;
use crate::query::TreeQuery;
use crate::tracked::ItemSet;
use crate::visibility::{refresh_placeholder, refresh_visibility};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddedBlock {
    pub block_id: BlockId,
    /// The block directly before the added one, if any.
    #[serde(default)]
    pub previous: Option<BlockId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationBatch {
    #[serde(default)]
    pub added: Vec<AddedBlock>,
    #[serde(default)]
    pub removed: Vec<BlockId>,
    #[serde(default)]
    pub attribute_changed: Vec<BlockId>,
}

impl MutationBatch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.attribute_changed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub reattached: usize,
    pub regenerated: Option<ToggleId>,
}

impl ToggleEngine {
    /// Runs both repair passes over one batch of external edits.
    pub fn reconcile<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        batch: &MutationBatch,
    ) -> Result<ReconcileReport, ToggleError> {
        if batch.is_empty() {
            return Ok(ReconcileReport::default());
        }
        let reattached = self.restore_after_external_mutation(host, batch)?;
        let regenerated = if batch.added.is_empty() {
            None
        } else {
            self.reset_duplicate_ids(host)?
        };

        if !batch.removed.is_empty() {
            // Pruned after the restore pass, which relies on the surplus to adopt re-inserts.
            let gone: Vec<&BlockId> = batch
                .removed
                .iter()
                .filter(|id| host.index_of(id).is_none())
                .collect();
            self.untrack(gone);
            let live: Vec<ToggleId> = self
                .tracked
                .keys()
                .filter(|id| TreeQuery::new(&*host).root_exists(id))
                .cloned()
                .collect();
            for id in live {
                refresh_placeholder(host, &id);
            }
        }
        Ok(ReconcileReport {
            reattached,
            regenerated,
        })
    }

    /// Re-tags blocks that an undo or redo restored without their membership tags.
    /// Returns how many blocks were re-attached.
    pub fn restore_after_external_mutation<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        batch: &MutationBatch,
    ) -> Result<usize, ToggleError> {
        let mut reattached = 0;

        if let Some(current) = host.current_block_index() {
            let query = TreeQuery::new(&*host);
            let owner = query.block(current).and_then(|block| {
                self.tracked
                    .iter()
                    .find(|(root_id, set)| set.contains(&block.id) && query.root_exists(root_id))
                    .map(|(root_id, _)| root_id.clone())
            });
            if let Some(root_id) = owner {
                if !query.is_part_of_toggle(current) {
                    self.attach(host, current, &root_id, None)?;
                    reattached += 1;
                }
            }
        }

        for added in &batch.added {
            let Some(ix) = host.index_of(&added.block_id) else {
                continue;
            };
            let prev_ix = match added.previous.as_ref() {
                Some(prev) => host.index_of(prev),
                None => ix.checked_sub(1),
            };
            let Some(prev_ix) = prev_ix else {
                continue;
            };
            let query = TreeQuery::new(&*host);
            if !query.is_part_of_toggle(prev_ix) || query.is_part_of_toggle(ix) {
                continue;
            }
            let Some(root_id) = query
                .parent_of(prev_ix)
                .or_else(|| query.block(prev_ix).and_then(|b| b.root_id()))
                .cloned()
            else {
                continue;
            };
            let tracked = self.tracked.get(&root_id).map_or(0, ItemSet::len);
            if tracked > query.children(&root_id).len() {
                self.attach(host, ix, &root_id, None)?;
                if let Some(root_ix) = TreeQuery::new(&*host).root_index(&root_id) {
                    refresh_visibility(host, root_ix);
                }
                reattached += 1;
            }
        }

        for id in &batch.attribute_changed {
            let Some(ix) = host.index_of(id) else {
                continue;
            };
            let query = TreeQuery::new(&*host);
            if let Some(fk) = query.parent_of(ix) {
                let position = query
                    .children(fk)
                    .iter()
                    .position(|&child| child == ix)
                    .unwrap_or(0);
                self.tracked
                    .entry(fk.clone())
                    .or_default()
                    .insert_at(position, id.clone());
            }
        }

        if reattached > 0 {
            log::debug!("restored membership of {reattached} blocks after external edit");
        }
        Ok(reattached)
    }

    /// Gives a pasted toggle a fresh id when its id is shared with another live root.
    ///
    /// The root is found from the current block. Its contiguous subtree is rewritten to the
    /// new id, and nested roots that are duplicated too get their own fresh ids. Block text
    /// is never touched. Returns the new id of the outer toggle.
    pub fn reset_duplicate_ids<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
    ) -> Result<Option<ToggleId>, ToggleError> {
        let Some(current) = host.current_block_index() else {
            return Ok(None);
        };
        let query = TreeQuery::new(&*host);
        let Some(block) = query.block(current) else {
            return Ok(None);
        };
        let Some(old_id) = block.root_id().or_else(|| block.foreign_key()).cloned() else {
            return Ok(None);
        };
        if query.root_count(&old_id) < 2 {
            return Ok(None);
        }
        let Some(mut root_ix) = query.find_toggle_root_index(current, &old_id) else {
            return Ok(None);
        };
        let mut old_id = old_id;
        // A pasted subtree duplicates its enclosing toggles too. Start from the outermost.
        for _ in 0..host.blocks_count() {
            let Some(fk) = query.parent_of(root_ix) else {
                break;
            };
            if query.root_count(fk) < 2 {
                break;
            }
            let Some(parent_ix) = query.find_toggle_root_index(root_ix, fk) else {
                break;
            };
            old_id = fk.clone();
            root_ix = parent_ix;
        }

        let fresh = ToggleId::generate();
        let mut renamed: HashMap<ToggleId, ToggleId> = HashMap::new();
        renamed.insert(old_id.clone(), fresh.clone());
        if let Some(root) = host.block_mut(root_ix).and_then(|b| b.root.as_mut()) {
            root.id = fresh.clone();
        }
        log::debug!("regenerated duplicate toggle id {old_id} as {fresh} at {root_ix}");

        let mut item_sets: HashMap<ToggleId, ItemSet> = HashMap::new();
        let mut ix = root_ix + 1;
        while ix < host.blocks_count() {
            let query = TreeQuery::new(&*host);
            let Some(block) = query.block(ix) else {
                break;
            };
            let Some(new_fk) = block.foreign_key().and_then(|fk| renamed.get(fk)).cloned() else {
                break;
            };
            let nested = block.root_id().cloned().map(|nested| {
                let duplicated = query.root_count(&nested) > 1;
                (nested, duplicated)
            });
            let block_id = block.id.clone();

            if let Some((nested, duplicated)) = nested {
                let replacement = if duplicated {
                    ToggleId::generate()
                } else {
                    nested.clone()
                };
                if duplicated {
                    log::debug!("regenerated nested toggle id {nested} as {replacement}");
                }
                renamed.insert(nested, replacement.clone());
                if let Some(root) = host.block_mut(ix).and_then(|b| b.root.as_mut()) {
                    root.id = replacement;
                }
            }
            if let Some(block) = host.block_mut(ix) {
                block.tags.foreign_key = Some(new_fk.clone());
            }
            let set = item_sets.entry(new_fk).or_default();
            set.insert_at(set.len(), block_id);
            ix += 1;
        }

        for (id, set) in item_sets {
            self.tracked.insert(id, set);
        }
        self.tracked.entry(fresh.clone()).or_default();
        Ok(Some(fresh))
    }
}
