// Pointer-addressed editing operations over the control tree. These are the
// operations UI layers call; each one leaves the tree invariants intact
// (single parent, ordered children, pages only at the root).
use crate::tree::{NodeId, NodeKind, Tree};

/// Resolve a slash-separated child-index pointer, e.g. `/2/0`. `/` is the
/// root.
pub fn node_by_pointer(tree: &Tree, pointer: &str) -> Result<NodeId, String> {
    let trimmed = pointer.trim_start_matches('/');
    let mut id = Tree::ROOT;
    if trimmed.is_empty() {
        return Ok(id);
    }
    for tok in trimmed.split('/') {
        let idx: usize = tok
            .parse()
            .map_err(|_| format!("bad pointer segment: {tok}"))?;
        let node = tree.node(id);
        id = *node
            .children
            .get(idx)
            .ok_or_else(|| format!("pointer not found: {pointer}"))?;
    }
    Ok(id)
}

pub fn pointer_of(tree: &Tree, id: NodeId) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut cur = id;
    while let Some(parent) = tree.node(cur).parent {
        let idx = tree
            .node(parent)
            .children
            .iter()
            .position(|c| *c == cur)
            .unwrap_or(0);
        parts.push(idx.to_string());
        cur = parent;
    }
    parts.reverse();
    format!("/{}", parts.join("/"))
}

fn editable(tree: &Tree, id: NodeId) -> Result<(), String> {
    if id == Tree::ROOT {
        return Err("cannot edit the root".to_string());
    }
    if tree.node(id).kind.is_hidden() {
        return Err("hidden inputs cannot be edited".to_string());
    }
    Ok(())
}

fn accepts_children(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::Root | NodeKind::Group { .. })
}

pub fn rename(tree: &mut Tree, id: NodeId, new_name: &str) -> Result<(), String> {
    editable(tree, id)?;
    match &mut tree.node_mut(id).kind {
        NodeKind::Page { name } | NodeKind::Group { name, .. } | NodeKind::Control { name, .. } => {
            *name = new_name.to_string();
            Ok(())
        }
        NodeKind::Separator { .. } => Err("separators have no name".to_string()),
        NodeKind::Root => Err("cannot edit the root".to_string()),
    }
}

/// Remove a node; its children take over its position under its former
/// parent, in order.
pub fn remove(tree: &mut Tree, id: NodeId) -> Result<(), String> {
    editable(tree, id)?;
    let children: Vec<NodeId> = tree.node(id).children.clone();
    let Some((parent, idx)) = tree.detach(id) else {
        return Err("node is not attached".to_string());
    };
    tree.node_mut(id).children.clear();
    for (off, child) in children.into_iter().enumerate() {
        tree.attach(child, parent, idx + off);
    }
    Ok(())
}

pub fn ungroup(tree: &mut Tree, id: NodeId) -> Result<(), String> {
    if !tree.node(id).kind.is_group() {
        return Err("not a group".to_string());
    }
    remove(tree, id)
}

/// Wrap the children `from..=to` of `parent` in a new group. The group's
/// label stays unassigned until the next regeneration.
pub fn group_range(
    tree: &mut Tree,
    parent: NodeId,
    from: usize,
    to: usize,
    name: &str,
) -> Result<NodeId, String> {
    if !accepts_children(&tree.node(parent).kind) {
        return Err("groups can only be created under the root or another group".to_string());
    }
    let len = tree.node(parent).children.len();
    if from > to || to >= len {
        return Err(format!(
            "child range {from}..={to} out of bounds (len {len})"
        ));
    }
    let members: Vec<NodeId> = tree.node(parent).children[from..=to].to_vec();
    for &m in &members {
        let kind = &tree.node(m).kind;
        if kind.is_page() {
            return Err("pages cannot be grouped".to_string());
        }
        if kind.is_hidden() {
            return Err("hidden inputs cannot be grouped".to_string());
        }
    }
    for &m in &members {
        tree.detach(m);
    }
    let gid = tree.insert(
        parent,
        from,
        NodeKind::Group {
            name: name.to_string(),
            internal_key: None,
            properties: Vec::new(),
        },
    );
    for (i, m) in members.iter().enumerate() {
        tree.attach(*m, gid, i);
    }
    Ok(gid)
}

pub fn move_node(
    tree: &mut Tree,
    id: NodeId,
    new_parent: NodeId,
    index: usize,
) -> Result<(), String> {
    editable(tree, id)?;
    if id == new_parent || tree.is_ancestor(id, new_parent) {
        return Err("cannot move a node into its own subtree".to_string());
    }
    if tree.node(id).kind.is_page() {
        if new_parent != Tree::ROOT {
            return Err("pages live directly under the root".to_string());
        }
    } else if !accepts_children(&tree.node(new_parent).kind) {
        return Err("target cannot hold children".to_string());
    }
    let Some((old_parent, old_idx)) = tree.detach(id) else {
        return Err("node is not attached".to_string());
    };
    let mut index = index;
    if old_parent == new_parent && old_idx < index {
        index -= 1;
    }
    tree.attach(id, new_parent, index);
    Ok(())
}

/// Push a node into the group that precedes it among its siblings.
pub fn indent(tree: &mut Tree, id: NodeId) -> Result<(), String> {
    editable(tree, id)?;
    if tree.node(id).kind.is_page() {
        return Err("pages cannot be indented".to_string());
    }
    let parent = tree
        .node(id)
        .parent
        .ok_or_else(|| "node is not attached".to_string())?;
    let idx = tree
        .child_index(id)
        .ok_or_else(|| "node is not attached".to_string())?;
    if idx == 0 {
        return Err("no preceding group to indent into".to_string());
    }
    let prev = tree.node(parent).children[idx - 1];
    if !tree.node(prev).kind.is_group() {
        return Err("preceding sibling is not a group".to_string());
    }
    tree.detach(id);
    let end = tree.node(prev).children.len();
    tree.attach(id, prev, end);
    Ok(())
}

/// Pull a node out of its group, placing it right after the group.
pub fn outdent(tree: &mut Tree, id: NodeId) -> Result<(), String> {
    editable(tree, id)?;
    let parent = tree
        .node(id)
        .parent
        .ok_or_else(|| "node is not attached".to_string())?;
    if !tree.node(parent).kind.is_group() {
        return Err("node is not inside a group".to_string());
    }
    let grand = tree
        .node(parent)
        .parent
        .ok_or_else(|| "group is not attached".to_string())?;
    let pidx = tree
        .child_index(parent)
        .ok_or_else(|| "group is not attached".to_string())?;
    tree.detach(id);
    tree.attach(id, grand, pidx + 1);
    Ok(())
}

/// New separator; its declaration and key are synthesized at regeneration.
pub fn add_separator(tree: &mut Tree, parent: NodeId, index: usize) -> Result<NodeId, String> {
    if !accepts_children(&tree.node(parent).kind) {
        return Err("separators can only be added under the root or a group".to_string());
    }
    Ok(tree.insert(
        parent,
        index,
        NodeKind::Separator {
            key: String::new(),
            properties: Vec::new(),
            original_text: String::new(),
        },
    ))
}

pub fn add_page(tree: &mut Tree, index: usize, name: &str) -> NodeId {
    tree.insert(
        Tree::ROOT,
        index,
        NodeKind::Page {
            name: name.to_string(),
        },
    )
}
