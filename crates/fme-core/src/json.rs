use serde_json::{Map, Value, json};

use crate::setting::MacroDocument;
use crate::tree::{NodeId, NodeKind, Tree};

#[derive(Clone, Copy)]
pub struct JsonOpts {
    pub max_depth: usize,
    pub include_text: bool,
    pub include_hidden: bool,
}

impl Default for JsonOpts {
    fn default() -> Self {
        Self {
            max_depth: 64,
            include_text: false,
            include_hidden: true,
        }
    }
}

pub fn tree_to_value(doc: &MacroDocument, opts: JsonOpts) -> Value {
    let mut root = Map::new();
    root.insert("$operator".to_string(), json!(doc.op_name));
    root.insert("$kind".to_string(), json!(doc.op_kind.as_str()));
    root.insert("$maxAutoLabel".to_string(), json!(doc.max_auto_label));
    root.insert(
        "children".to_string(),
        children_value(&doc.tree, Tree::ROOT, 1, &opts),
    );
    Value::Object(root)
}

pub fn dump_json(doc: &MacroDocument, opts: JsonOpts) -> String {
    let v = tree_to_value(doc, opts);
    serde_json::to_string_pretty(&v).unwrap_or_else(|e| format!("{{\"$error\":\"{e}\"}}"))
}

fn children_value(tree: &Tree, id: NodeId, depth: usize, opts: &JsonOpts) -> Value {
    let mut out = Vec::new();
    for &c in &tree.node(id).children {
        if let Some(v) = node_value(tree, c, depth, opts) {
            out.push(v);
        }
    }
    Value::Array(out)
}

fn node_value(tree: &Tree, id: NodeId, depth: usize, opts: &JsonOpts) -> Option<Value> {
    let node = tree.node(id);
    let mut m = Map::new();
    match &node.kind {
        NodeKind::Root => return None,
        NodeKind::Page { name } => {
            m.insert("$type".to_string(), json!("page"));
            m.insert("name".to_string(), json!(name));
        }
        NodeKind::Group {
            name, internal_key, ..
        } => {
            m.insert("$type".to_string(), json!("group"));
            m.insert("name".to_string(), json!(name));
            if let Some(k) = internal_key {
                m.insert("label".to_string(), json!(k));
            }
        }
        NodeKind::Control {
            key,
            name,
            hidden,
            original_text,
            ..
        } => {
            if *hidden && !opts.include_hidden {
                return None;
            }
            m.insert("$type".to_string(), json!("control"));
            m.insert("key".to_string(), json!(key));
            m.insert("name".to_string(), json!(name));
            if *hidden {
                m.insert("hidden".to_string(), json!(true));
            }
            if opts.include_text {
                m.insert("text".to_string(), json!(original_text));
            }
        }
        NodeKind::Separator { key, .. } => {
            m.insert("$type".to_string(), json!("separator"));
            if !key.is_empty() {
                m.insert("key".to_string(), json!(key));
            }
        }
    }
    if !node.children.is_empty() {
        if depth >= opts.max_depth {
            m.insert("children".to_string(), Value::Null);
        } else {
            m.insert(
                "children".to_string(),
                children_value(tree, id, depth + 1, opts),
            );
        }
    }
    Some(Value::Object(m))
}

/// Structural fingerprint used for isomorphism checks: node types, names,
/// hidden flags, and nesting, without regeneration-assigned labels or
/// separator keys.
pub fn shape_value(doc: &MacroDocument) -> Value {
    fn shape_children(tree: &Tree, id: NodeId) -> Value {
        let mut out = Vec::new();
        for &c in &tree.node(id).children {
            let node = tree.node(c);
            let mut m = Map::new();
            m.insert("$type".to_string(), json!(node.kind.type_name()));
            match &node.kind {
                NodeKind::Page { name } | NodeKind::Group { name, .. } => {
                    m.insert("name".to_string(), json!(name));
                }
                NodeKind::Control {
                    key, name, hidden, ..
                } => {
                    m.insert("key".to_string(), json!(key));
                    m.insert("name".to_string(), json!(name));
                    m.insert("hidden".to_string(), json!(hidden));
                }
                NodeKind::Separator { .. } | NodeKind::Root => {}
            }
            if !node.children.is_empty() {
                m.insert("children".to_string(), shape_children(tree, c));
            }
            out.push(Value::Object(m));
        }
        Value::Array(out)
    }
    let mut root = Map::new();
    root.insert("$operator".to_string(), json!(doc.op_name));
    root.insert("$kind".to_string(), json!(doc.op_kind.as_str()));
    root.insert(
        "children".to_string(),
        shape_children(&doc.tree, Tree::ROOT),
    );
    Value::Object(root)
}
