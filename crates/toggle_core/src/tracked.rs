use crate::core::BlockId;

/// Ordered set of block ids a toggle has adopted as items.
///
/// Attach and detach are both idempotent against it: inserting a present id and removing
/// an absent one are no-ops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSet {
    ids: Vec<BlockId>,
}

impl ItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.ids.contains(id)
    }

    /// Inserts `id` at `position` (clamped to the end). Returns false if it was already tracked.
    pub fn insert_at(&mut self, position: usize, id: BlockId) -> bool {
        if self.contains(&id) {
            return false;
        }
        let position = position.min(self.ids.len());
        self.ids.insert(position, id);
        true
    }

    pub fn remove(&mut self, id: &BlockId) -> bool {
        match self.ids.iter().position(|existing| existing == id) {
            Some(ix) => {
                self.ids.remove(ix);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockId> {
        self.ids.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let mut set = ItemSet::new();
        assert!(set.insert_at(0, "a".into()));
        assert!(!set.insert_at(0, "a".into()));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn insert_position_is_clamped() {
        let mut set = ItemSet::new();
        set.insert_at(5, "a".into());
        set.insert_at(0, "b".into());
        set.insert_at(1, "c".into());
        let ids: Vec<&str> = set.iter().map(BlockId::as_str).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn removing_absent_id_is_a_no_op() {
        let mut set = ItemSet::new();
        set.insert_at(0, "a".into());
        assert!(!set.remove(&"z".into()));
        assert!(set.remove(&"a".into()));
        assert!(!set.remove(&"a".into()));
        assert!(set.is_empty());
    }
}
