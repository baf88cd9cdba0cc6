// Control-tree model and the builder that recovers it from the flat
// declaration sequence.
use std::collections::{BTreeMap, VecDeque};

use crate::setting::{FlatItem, MetadataEntry, PropValue, Properties, prop};

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Root,
    /// Page markers sit directly under the root; they never hold children.
    Page {
        name: String,
    },
    Group {
        name: String,
        /// Auto-label backing the group's descriptor. Left `None` for groups
        /// created during an edit session until regeneration assigns one.
        internal_key: Option<String>,
        properties: Properties,
    },
    Control {
        key: String,
        name: String,
        properties: Properties,
        original_text: String,
        /// MainInput-style declarations are kept for faithful output but are
        /// not offered for editing.
        hidden: bool,
    },
    Separator {
        key: String,
        properties: Properties,
        original_text: String,
    },
}

impl NodeKind {
    pub fn is_group(&self) -> bool {
        matches!(self, NodeKind::Group { .. })
    }
    pub fn is_page(&self) -> bool {
        matches!(self, NodeKind::Page { .. })
    }
    pub fn is_hidden(&self) -> bool {
        matches!(self, NodeKind::Control { hidden: true, .. })
    }
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Page { .. } => "page",
            NodeKind::Group { .. } => "group",
            NodeKind::Control { .. } => "control",
            NodeKind::Separator { .. } => "separator",
        }
    }
}

/// Arena tree with index-based parent/child links. Detached nodes stay in the
/// arena; reachability from the root is what matters.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    pub const ROOT: NodeId = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                kind: NodeKind::Root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn add(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    pub fn insert(&mut self, parent: NodeId, index: usize, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind,
            parent: Some(parent),
            children: Vec::new(),
        });
        let idx = index.min(self.nodes[parent].children.len());
        self.nodes[parent].children.insert(idx, id);
        id
    }

    pub fn child_index(&self, id: NodeId) -> Option<usize> {
        let parent = self.nodes[id].parent?;
        self.nodes[parent].children.iter().position(|c| *c == id)
    }

    pub(crate) fn detach(&mut self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.nodes[id].parent?;
        let idx = self.nodes[parent].children.iter().position(|c| *c == id)?;
        self.nodes[parent].children.remove(idx);
        self.nodes[id].parent = None;
        Some((parent, idx))
    }

    pub(crate) fn attach(&mut self, id: NodeId, parent: NodeId, index: usize) {
        let idx = index.min(self.nodes[parent].children.len());
        self.nodes[parent].children.insert(idx, id);
        self.nodes[id].parent = Some(parent);
    }

    /// Is `a` an ancestor of `b`?
    pub fn is_ancestor(&self, a: NodeId, b: NodeId) -> bool {
        let mut cur = self.nodes[b].parent;
        while let Some(p) = cur {
            if p == a {
                return true;
            }
            cur = self.nodes[p].parent;
        }
        false
    }

    /// Total descendant count, the value written as a group's subtree size.
    pub fn descendant_count(&self, id: NodeId) -> usize {
        let mut n = 0;
        for &c in &self.nodes[id].children {
            n += 1 + self.descendant_count(c);
        }
        n
    }

    /// Number of ancestor groups, the value written as a group's nest level.
    pub fn group_depth(&self, id: NodeId) -> u32 {
        let mut n = 0;
        let mut cur = self.nodes[id].parent;
        while let Some(p) = cur {
            if self.nodes[p].kind.is_group() {
                n += 1;
            }
            cur = self.nodes[p].parent;
        }
        n
    }

    pub fn display_name(&self, id: NodeId) -> &str {
        match &self.nodes[id].kind {
            NodeKind::Root | NodeKind::Separator { .. } => "",
            NodeKind::Page { name }
            | NodeKind::Group { name, .. }
            | NodeKind::Control { name, .. } => name,
        }
    }

    /// Pre-order traversal of the reachable tree, root included.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.walk_into(Self::ROOT, &mut out);
        out
    }

    fn walk_into(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        for &c in &self.nodes[id].children {
            self.walk_into(c, out);
        }
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

pub fn display_name_from(props: &Properties, key: &str) -> String {
    prop(props, "Name")
        .and_then(PropValue::as_str)
        .or_else(|| prop(props, "Source").and_then(PropValue::as_str))
        .unwrap_or(key)
        .to_string()
}

/// Rebuild the tree from the flat declaration sequence and the helper
/// metadata. A declaration whose `Source` names a known auto-label is a group
/// proxy: the next `size` declarations (depth-first, contiguous) are its
/// subtree. The counts are trusted as written; a file whose counts disagree
/// with its declaration order will misattribute trailing siblings.
pub fn build(items: Vec<FlatItem>, metadata: &BTreeMap<String, MetadataEntry>) -> Tree {
    let mut tree = Tree::new();
    let mut queue: VecDeque<FlatItem> = items.into();
    consume(&mut tree, &mut queue, Tree::ROOT, usize::MAX, metadata);
    tree
}

fn consume(
    tree: &mut Tree,
    queue: &mut VecDeque<FlatItem>,
    parent: NodeId,
    limit: usize,
    metadata: &BTreeMap<String, MetadataEntry>,
) -> usize {
    let mut used = 0usize;
    while used < limit {
        let Some(item) = queue.pop_front() else {
            break;
        };
        match item {
            FlatItem::PageMarker { name } => {
                // pages hang off the root no matter where the marker shows
                // up, and do not count against any group's size
                tree.add(Tree::ROOT, NodeKind::Page { name });
            }
            FlatItem::Separator {
                key,
                properties,
                original_text,
            } => {
                tree.add(
                    parent,
                    NodeKind::Separator {
                        key,
                        properties,
                        original_text,
                    },
                );
                used += 1;
            }
            FlatItem::Control {
                key,
                properties,
                original_text,
                hidden,
            } => {
                used += 1;
                let label = prop(&properties, "Source")
                    .and_then(PropValue::as_str)
                    .map(str::to_string);
                let entry = label.as_deref().and_then(|l| metadata.get(l));
                if let Some(meta) = entry {
                    let size = meta.size;
                    let gid = tree.add(
                        parent,
                        NodeKind::Group {
                            name: meta.name.clone(),
                            internal_key: label,
                            properties,
                        },
                    );
                    used += consume(tree, queue, gid, size, metadata);
                } else {
                    let name = display_name_from(&properties, &key);
                    tree.add(
                        parent,
                        NodeKind::Control {
                            key,
                            name,
                            properties,
                            original_text,
                            hidden,
                        },
                    );
                }
            }
        }
    }
    used
}
