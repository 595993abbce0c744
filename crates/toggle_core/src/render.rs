use serde::{Deserialize, Serialize};

use crate::core::{Block, Status, ToggleId};
use crate::engine::{ToggleEngine, root_at};
use crate::error::ToggleError;
use crate::host::BlockHost;
use crate::query::TreeQuery;
use crate::visibility::{refresh_placeholder, refresh_visibility};

fn generated_fk() -> ToggleId {
    ToggleId::generate()
}

/// Persisted shape of a toggle root.
///
/// `fk` is the root's own id. `items` is the descendant count at save time and only used as
/// a hint when the document is loaded again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleData {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default = "generated_fk")]
    pub fk: ToggleId,
    #[serde(default)]
    pub items: usize,
}

impl From<ToggleData> for Block {
    fn from(data: ToggleData) -> Self {
        Block::toggle(data.text, data.fk, data.status).with_items(data.items)
    }
}

impl ToggleEngine {
    /// Emits the persisted data of the root at `root_index`, with `items` recomputed from
    /// the live subtree.
    pub fn save_toggle<H: BlockHost + ?Sized>(
        &self,
        host: &H,
        root_index: usize,
    ) -> Result<ToggleData, ToggleError> {
        let (fk, status) = root_at(host, root_index)?;
        let items = TreeQuery::new(host).try_descendant_count(&fk)?;
        let text = host
            .block(root_index)
            .map(|b| b.text.clone())
            .unwrap_or_default();
        Ok(ToggleData {
            text,
            status,
            fk,
            items,
        })
    }

    /// Re-attaches the blocks a freshly loaded root claims through its advisory count,
    /// then applies its visibility. Returns the number of blocks adopted.
    pub fn render_toggle<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        root_index: usize,
    ) -> Result<usize, ToggleError> {
        let caret = host.current_block_index();
        let adopted = self.render_items(host, root_index, 0);
        if let Some(caret) = caret {
            host.set_caret_to_block(caret);
        }
        let adopted = adopted?;
        refresh_visibility(host, root_index);
        Ok(adopted)
    }

    /// Renders every top-level root in the sequence. Returns the number of roots rendered.
    pub fn render_all<H: BlockHost + ?Sized>(&mut self, host: &mut H) -> Result<usize, ToggleError> {
        let mut rendered = 0;
        let mut ix = 0;
        while ix < host.blocks_count() {
            let query = TreeQuery::new(&*host);
            let is_top_level_root =
                query.block(ix).is_some_and(|b| b.root.is_some()) && query.parent_of(ix).is_none();
            if is_top_level_root {
                let adopted = self.render_toggle(host, ix)?;
                rendered += 1;
                ix += 1 + adopted;
            } else {
                ix += 1;
            }
        }
        log::debug!("rendered {rendered} toggles");
        Ok(rendered)
    }

    fn render_items<H: BlockHost + ?Sized>(
        &mut self,
        host: &mut H,
        root_index: usize,
        depth: usize,
    ) -> Result<usize, ToggleError> {
        let (root_id, _) = root_at(&*host, root_index)?;
        if depth > host.blocks_count() {
            return Err(ToggleError::CycleReference(root_id));
        }
        self.track_root(&root_id);

        let count = host.blocks_count();
        let advisory = host
            .block(root_index)
            .and_then(|b| b.root.as_ref())
            .map_or(0, |root| root.items);
        let mut remaining = if root_index + advisory >= count {
            0
        } else {
            advisory
        };

        let mut ix = root_index + 1;
        while remaining > 0 && ix < count {
            let query = TreeQuery::new(&*host);
            let claimed = query.parent_of(ix).is_some_and(|fk| fk != &root_id);
            if claimed {
                break;
            }
            let nested = query.block(ix).is_some_and(|b| b.root.is_some());

            self.attach(host, ix, &root_id, None)?;
            let span = if nested {
                1 + self.render_items(host, ix, depth + 1)?
            } else {
                1
            };
            ix += span;
            remaining = remaining.saturating_sub(span);
        }

        let adopted = ix - root_index - 1;
        if let Some(root) = host.block_mut(root_index).and_then(|b| b.root.as_mut()) {
            root.items = adopted;
        }
        refresh_placeholder(host, &root_id);
        log::trace!("rendered toggle {root_id} with {adopted} blocks");
        Ok(adopted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let data: ToggleData = serde_json::from_str(r#"{"text":"Notes"}"#).unwrap();
        assert_eq!(data.text, "Notes");
        assert_eq!(data.status, Status::Open);
        assert_eq!(data.items, 0);
        assert!(data.fk.as_str().starts_with("fk-"));
    }

    #[test]
    fn status_serializes_lowercase() {
        let data = ToggleData {
            text: "T".into(),
            status: Status::Closed,
            fk: "fk-1".into(),
            items: 2,
        };
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"text": "T", "status": "closed", "fk": "fk-1", "items": 2})
        );
    }
}
