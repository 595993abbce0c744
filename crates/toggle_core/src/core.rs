use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type BlockKind = String;

pub const TOGGLE_KIND: &str = "toggle";
pub const PARAGRAPH_KIND: &str = "paragraph";

/// Host-assigned block identifier. Stable for the block's lifetime, unlike its index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(10);
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of a toggle root. Items point at it through their foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToggleId(String);

impl ToggleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(format!("fk-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ToggleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ToggleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Open,
    Closed,
}

impl Status {
    pub fn flipped(self) -> Self {
        match self {
            Status::Open => Status::Closed,
            Status::Closed => Status::Open,
        }
    }

    pub fn is_closed(self) -> bool {
        self == Status::Closed
    }
}

/// Membership tags carried by a block that belongs to a toggle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTags {
    /// Id of the immediate parent toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ToggleId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    /// Membership marker (the `toggle-block__item` class).
    #[serde(default)]
    pub marked: bool,
    /// Set by a Tab nest until the owning root's header regains focus.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_nest: Option<ToggleId>,
    /// Whether the per-item key handlers are wired.
    #[serde(default)]
    pub handlers: bool,
}

impl ItemTags {
    pub fn clear(&mut self) {
        self.foreign_key = None;
        self.item_id = None;
        self.marked = false;
        self.handlers = false;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootState {
    pub id: ToggleId,
    #[serde(default)]
    pub status: Status,
    /// Advisory descendant count from the last save.
    #[serde(default)]
    pub items: usize,
    #[serde(default)]
    pub placeholder_hidden: bool,
}

impl RootState {
    pub fn new(id: ToggleId, status: Status) -> Self {
        Self {
            id,
            status,
            items: 0,
            placeholder_hidden: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tags: ItemTags,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub selected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<RootState>,
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            id: BlockId::generate(),
            kind: PARAGRAPH_KIND.to_string(),
            text: text.into(),
            tags: ItemTags::default(),
            hidden: false,
            selected: false,
            root: None,
        }
    }

    pub fn toggle(text: impl Into<String>, id: ToggleId, status: Status) -> Self {
        Self {
            id: BlockId::generate(),
            kind: TOGGLE_KIND.to_string(),
            text: text.into(),
            tags: ItemTags::default(),
            hidden: false,
            selected: false,
            root: Some(RootState::new(id, status)),
        }
    }

    pub fn with_id(mut self, id: impl Into<BlockId>) -> Self {
        self.id = id.into();
        self
    }

    /// Tags the block as an item of `foreign_key`, as a loaded document would carry it.
    pub fn in_toggle(mut self, foreign_key: impl Into<ToggleId>) -> Self {
        self.tags.foreign_key = Some(foreign_key.into());
        self.tags.item_id = Some(self.id.to_string());
        self.tags.marked = true;
        self
    }

    pub fn with_items(mut self, items: usize) -> Self {
        if let Some(root) = self.root.as_mut() {
            root.items = items;
        }
        self
    }

    pub fn root_id(&self) -> Option<&ToggleId> {
        self.root.as_ref().map(|root| &root.id)
    }

    pub fn status(&self) -> Option<Status> {
        self.root.as_ref().map(|root| root.status)
    }

    pub fn foreign_key(&self) -> Option<&ToggleId> {
        self.tags.foreign_key.as_ref()
    }

    pub fn is_toggle_kind(&self) -> bool {
        self.kind == TOGGLE_KIND
    }
}
