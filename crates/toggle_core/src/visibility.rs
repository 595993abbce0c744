use crate::core::{Status, ToggleId};
use crate::host::BlockHost;
use crate::query::TreeQuery;

/// Shows or hides everything below `root_id` according to `status`.
///
/// A closed status hides the whole subtree. An open status shows the direct children and
/// lets each nested toggle's own status decide for its subtree. When the toggle has no
/// children its empty-state placeholder follows the status instead.
pub fn apply_visibility<H: BlockHost + ?Sized>(host: &mut H, root_id: &ToggleId, status: Status) {
    apply_at_depth(host, root_id, status, 0);
}

fn apply_at_depth<H: BlockHost + ?Sized>(
    host: &mut H,
    root_id: &ToggleId,
    status: Status,
    depth: usize,
) {
    if depth > host.blocks_count() + 1 {
        log::error!("visibility pass for {root_id} exceeded nesting bound");
        return;
    }

    let children = TreeQuery::new(&*host).children(root_id);
    log::trace!(
        "visibility {root_id}: {status:?} over {} children",
        children.len()
    );

    if children.is_empty() {
        if depth == 0 {
            set_placeholder(host, root_id, status.is_closed());
        }
        return;
    }

    let hidden = status.is_closed();
    let mut nested: Vec<(ToggleId, Status)> = Vec::new();
    for ix in children {
        let Some(child) = host.block_mut(ix) else {
            continue;
        };
        child.hidden = hidden;
        if let Some(root) = child.root.as_ref() {
            let child_status = if hidden { Status::Closed } else { root.status };
            nested.push((root.id.clone(), child_status));
        }
    }

    for (child_id, child_status) in nested {
        apply_at_depth(host, &child_id, child_status, depth + 1);
    }
}

/// Re-applies visibility for the root at `root_index` using its stored status, forcing it
/// closed when an enclosing toggle is closed.
pub fn refresh_visibility<H: BlockHost + ?Sized>(host: &mut H, root_index: usize) {
    let Some(root) = host.block(root_index).and_then(|b| b.root.as_ref()) else {
        return;
    };
    let root_id = root.id.clone();
    let status = if is_hidden_by_ancestors(&*host, root_index) {
        Status::Closed
    } else {
        root.status
    };
    apply_visibility(host, &root_id, status);
}

/// True when some toggle on the block's parent chain is closed.
pub fn is_hidden_by_ancestors<H: BlockHost + ?Sized>(host: &H, index: usize) -> bool {
    let query = TreeQuery::new(host);
    query.ancestor_chain(index).into_iter().any(|fk| {
        query
            .root_index(fk)
            .and_then(|ix| host.block(ix))
            .and_then(|b| b.status())
            .is_some_and(Status::is_closed)
    })
}

/// Placeholder rule: hidden whenever the toggle has children or is closed.
pub fn refresh_placeholder<H: BlockHost + ?Sized>(host: &mut H, root_id: &ToggleId) {
    let query = TreeQuery::new(&*host);
    let has_children = !query.children(root_id).is_empty();
    let Some(root_ix) = query.root_index(root_id) else {
        return;
    };
    let closed = host
        .block(root_ix)
        .and_then(|b| b.status())
        .is_some_and(Status::is_closed);
    set_placeholder(host, root_id, has_children || closed);
}

fn set_placeholder<H: BlockHost + ?Sized>(host: &mut H, root_id: &ToggleId, hidden: bool) {
    let Some(root_ix) = TreeQuery::new(&*host).root_index(root_id) else {
        return;
    };
    if let Some(root) = host.block_mut(root_ix).and_then(|b| b.root.as_mut()) {
        root.placeholder_hidden = hidden;
    }
}
