use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::core::{Block, BlockId, BlockKind, TOGGLE_KIND};
use crate::engine::ToggleEngine;
use crate::error::ToggleError;
use crate::host::{BlockHost, MemoryHost};
use crate::render::ToggleData;

const DEFAULT_SCHEMA: &str = "toggle-block";
const DEFAULT_VERSION: u32 = 1;

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_version() -> u32 {
    DEFAULT_VERSION
}

#[derive(Debug, Error)]
pub enum ValueError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Toggle(#[from] ToggleError),
}

/// One block as the host editor saves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<BlockId>,
    #[serde(rename = "type")]
    pub kind: BlockKind,
    #[serde(default)]
    pub data: Value,
}

/// A whole saved document. Only toggle roots persist tree information. Items are plain
/// blocks that get re-attached through each root's advisory count on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorValue {
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub blocks: Vec<SavedBlock>,
}

impl EditorValue {
    pub fn from_blocks(blocks: Vec<SavedBlock>) -> Self {
        Self {
            schema: default_schema(),
            version: default_version(),
            blocks,
        }
    }

    /// Saves every block of `host`, recomputing each root's descendant count.
    pub fn from_host<H: BlockHost + ?Sized>(
        engine: &ToggleEngine,
        host: &H,
    ) -> Result<Self, ValueError> {
        let mut blocks = Vec::with_capacity(host.blocks_count());
        for ix in 0..host.blocks_count() {
            let Some(block) = host.block(ix) else {
                continue;
            };
            let data = if block.root.is_some() {
                serde_json::to_value(engine.save_toggle(host, ix)?)?
            } else {
                json!({ "text": block.text })
            };
            blocks.push(SavedBlock {
                id: Some(block.id.clone()),
                kind: block.kind.clone(),
                data,
            });
        }
        Ok(Self::from_blocks(blocks))
    }

    pub fn into_blocks(self) -> Result<Vec<Block>, ValueError> {
        self.blocks
            .into_iter()
            .map(|saved| -> Result<Block, ValueError> {
                let mut block = if saved.kind == TOGGLE_KIND {
                    Block::from(serde_json::from_value::<ToggleData>(saved.data)?)
                } else {
                    let text = saved
                        .data
                        .get("text")
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    let mut block = Block::paragraph(text);
                    block.kind = saved.kind;
                    block
                };
                if let Some(id) = saved.id {
                    block.id = id;
                }
                Ok(block)
            })
            .collect()
    }

    /// Loads the document into a fresh in-memory host and renders every toggle in it.
    pub fn load(self, engine: &mut ToggleEngine) -> Result<MemoryHost, ValueError> {
        let mut host = MemoryHost::new(self.into_blocks()?);
        engine.render_all(&mut host)?;
        host.clear_journal();
        Ok(host)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
