use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use crate::core::{BlockId, Status, ToggleId};
use crate::host::BlockHost;
use crate::query::TreeQuery;

/// A block and the items nested below it, when it is a toggle root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineNode {
    pub block_id: BlockId,
    pub text: String,
    pub toggle: Option<(ToggleId, Status)>,
    pub hidden: bool,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn is_toggle(&self) -> bool {
        self.toggle.is_some()
    }

    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }
}

/// A flat representation of an outline node with its depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub block_id: BlockId,
    pub depth: usize,
    pub parent: Option<ToggleId>,
}

/// Explicit tree projected from the foreign keys of a flat block sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    pub nodes: Vec<OutlineNode>,
}

impl Outline {
    /// Builds the tree. Blocks whose foreign key names no live root are top-level, and so
    /// are blocks only reachable through a foreign-key cycle.
    pub fn from_host<H: BlockHost + ?Sized>(host: &H) -> Self {
        let query = TreeQuery::new(host);
        let mut by_parent: HashMap<&ToggleId, Vec<usize>> = HashMap::new();
        let mut top_level = Vec::new();
        for ix in 0..host.blocks_count() {
            match query.parent_of(ix) {
                Some(fk) => by_parent.entry(fk).or_default().push(ix),
                None => top_level.push(ix),
            }
        }

        let mut visited = HashSet::new();
        let mut nodes: Vec<OutlineNode> = top_level
            .into_iter()
            .filter_map(|ix| build_node(host, ix, &by_parent, &mut visited))
            .collect();

        for ix in 0..host.blocks_count() {
            if !visited.contains(&ix) {
                log::error!("block {ix} is unreachable from any top-level block");
                if let Some(node) = build_node(host, ix, &by_parent, &mut visited) {
                    nodes.push(node);
                }
            }
        }
        Self { nodes }
    }

    /// The order the tree implies for the flat sequence, depth first.
    pub fn flatten(&self) -> Vec<OutlineEntry> {
        let mut out = Vec::new();
        for node in &self.nodes {
            flatten_into(node, 0, None, &mut out);
        }
        out
    }

    /// True when every subtree occupies one unbroken index range directly after its root.
    pub fn is_contiguous<H: BlockHost + ?Sized>(&self, host: &H) -> bool {
        let flat = self.flatten();
        flat.len() == host.blocks_count()
            && flat
                .iter()
                .enumerate()
                .all(|(ix, entry)| host.block(ix).is_some_and(|b| b.id == entry.block_id))
    }

    pub fn dump(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            dump_node(node, 0, &mut out);
        }
        out
    }
}

fn build_node<H: BlockHost + ?Sized>(
    host: &H,
    ix: usize,
    by_parent: &HashMap<&ToggleId, Vec<usize>>,
    visited: &mut HashSet<usize>,
) -> Option<OutlineNode> {
    if !visited.insert(ix) {
        return None;
    }
    let block = host.block(ix)?;
    let toggle = block.root.as_ref().map(|root| (root.id.clone(), root.status));
    let children = block
        .root_id()
        .and_then(|id| by_parent.get(id))
        .map(|kids| {
            kids.iter()
                .filter_map(|&kid| build_node(host, kid, by_parent, visited))
                .collect()
        })
        .unwrap_or_default();
    Some(OutlineNode {
        block_id: block.id.clone(),
        text: block.text.clone(),
        toggle,
        hidden: block.hidden,
        children,
    })
}

fn flatten_into(
    node: &OutlineNode,
    depth: usize,
    parent: Option<&ToggleId>,
    out: &mut Vec<OutlineEntry>,
) {
    out.push(OutlineEntry {
        block_id: node.block_id.clone(),
        depth,
        parent: parent.cloned(),
    });
    let own = node.toggle.as_ref().map(|(id, _)| id);
    for child in &node.children {
        flatten_into(child, depth + 1, own, out);
    }
}

fn dump_node(node: &OutlineNode, depth: usize, out: &mut String) {
    let marker = match node.toggle {
        Some((_, Status::Open)) => "▾ ",
        Some((_, Status::Closed)) => "▸ ",
        None => "",
    };
    let hidden = if node.hidden { " (hidden)" } else { "" };
    let _ = writeln!(
        out,
        "{}{marker}{}{hidden}",
        "  ".repeat(depth),
        node.text
    );
    for child in &node.children {
        dump_node(child, depth + 1, out);
    }
}
