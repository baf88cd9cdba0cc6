// Regenerates .setting text from the (possibly edited) control tree.
//
// The walk here is the exact inverse of the tree builder: pre-order, with
// every group's descendant block contiguous right after the group's own
// declaration and sized by total descendant count. Verbatim segments are
// copied through untouched; only the inputs body and the helper descriptor
// body are rewritten.
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::setting::{
    self, DEFAULT_PAGE, HelperRegion, InputsRegion, MacroDocument, PropValue, SEPARATOR_SOURCE,
    Segment, extract_properties, label_index, match_brace, prop,
};
use crate::tree::{self, NodeId, NodeKind, Tree};

pub fn regenerate(doc: &mut MacroDocument) -> Result<String, String> {
    assign_labels(doc);
    let mut helper_name = setting::HELPER_NAME.to_string();
    let mut decl_indent = "\t\t\t\t".to_string();
    for seg in &doc.segments {
        match seg {
            Segment::Helper(h) => helper_name = h.tool_name.clone(),
            Segment::Inputs(r) => decl_indent = r.decl_indent.clone(),
            Segment::Verbatim(_) => {}
        }
    }
    let emitted = emit_declarations(&doc.tree, &helper_name, &decl_indent)?;
    let mut out = String::new();
    for seg in &doc.segments {
        match seg {
            Segment::Verbatim(t) => out.push_str(t),
            Segment::Inputs(r) => out.push_str(&render_inputs(r, &emitted.decls)),
            Segment::Helper(h) => out.push_str(&render_helper(h, &emitted.groups)?),
        }
    }
    Ok(out)
}

/// Regenerate and write next to `source`, deriving the `_edited` name unless
/// an explicit destination is given.
pub fn write_edited_file(
    doc: &mut MacroDocument,
    source: &Path,
    out: Option<&Path>,
) -> Result<PathBuf, String> {
    let text = regenerate(doc)?;
    let dest = match out {
        Some(p) => p.to_path_buf(),
        None => setting::edited_file_name(source),
    };
    fs::write(&dest, text).map_err(|e| e.to_string())?;
    Ok(dest)
}

/// Give every unlabelled group a fresh auto-label, strictly above every index
/// seen in the parsed metadata or anywhere in the live tree.
fn assign_labels(doc: &mut MacroDocument) {
    let mut max = doc.max_auto_label;
    for id in doc.tree.walk() {
        if let NodeKind::Group {
            internal_key: Some(k),
            ..
        } = &doc.tree.node(id).kind
            && let Some(n) = label_index(k)
        {
            max = max.max(n);
        }
    }
    for id in doc.tree.walk() {
        if let NodeKind::Group { internal_key, .. } = &mut doc.tree.node_mut(id).kind
            && internal_key.is_none()
        {
            max += 1;
            *internal_key = Some(format!("{}{max}", setting::LABEL_PREFIX));
        }
    }
    doc.max_auto_label = max;
}

struct GroupDescriptor {
    label: String,
    name: String,
    depth: u32,
    size: usize,
}

struct Emitted {
    decls: Vec<String>,
    groups: Vec<GroupDescriptor>,
}

struct EmitState {
    decls: Vec<String>,
    groups: Vec<GroupDescriptor>,
    /// What the flattener's current page will be when the emitted stream is
    /// parsed again.
    sim_page: String,
    used_keys: BTreeSet<String>,
    sep_counter: usize,
    decl_indent: String,
    helper_name: String,
}

fn emit_declarations(tree: &Tree, helper_name: &str, decl_indent: &str) -> Result<Emitted, String> {
    let mut st = EmitState {
        decls: Vec::new(),
        groups: Vec::new(),
        sim_page: DEFAULT_PAGE.to_string(),
        used_keys: collect_keys(tree),
        sep_counter: 0,
        decl_indent: decl_indent.to_string(),
        helper_name: helper_name.to_string(),
    };
    let mut structural = DEFAULT_PAGE.to_string();
    for &child in &tree.node(Tree::ROOT).children {
        match &tree.node(child).kind {
            NodeKind::Page { name } => structural = name.clone(),
            _ => emit_node(tree, child, &structural, &mut st)?,
        }
    }
    Ok(Emitted {
        decls: st.decls,
        groups: st.groups,
    })
}

fn emit_node(tree: &Tree, id: NodeId, page: &str, st: &mut EmitState) -> Result<(), String> {
    match &tree.node(id).kind {
        NodeKind::Root | NodeKind::Page { .. } => Ok(()),
        NodeKind::Control {
            key,
            name,
            properties,
            original_text,
            ..
        } => {
            if original_text.is_empty() {
                return Err(format!("control '{name}' has no source text"));
            }
            let mut text = original_text.clone();
            let recorded = tree::display_name_from(properties, key);
            if *name != recorded {
                // an unescapable name leaves the block as it was
                if let Some(updated) = upsert_property(&text, "Name", name) {
                    text = updated;
                }
            }
            let text = fix_page(text, page, st)?;
            st.decls.push(text);
            Ok(())
        }
        NodeKind::Separator { original_text, .. } => {
            let text = if original_text.is_empty() {
                synth_separator(st)
            } else {
                original_text.clone()
            };
            let text = fix_page(text, page, st)?;
            st.decls.push(text);
            Ok(())
        }
        NodeKind::Group {
            name, internal_key, ..
        } => {
            let label = internal_key
                .clone()
                .ok_or_else(|| "group label was not assigned".to_string())?;
            let text = synth_group(&label, st);
            let text = fix_page(text, page, st)?;
            st.decls.push(text);
            st.groups.push(GroupDescriptor {
                label,
                name: name.clone(),
                depth: tree.group_depth(id),
                size: tree.descendant_count(id),
            });
            for &c in &tree.node(id).children {
                emit_node(tree, c, page, st)?;
            }
            Ok(())
        }
    }
}

/// Make the declaration's textual `Page` agree with the node's structural
/// page under the flattener's inference rules: leave it alone when a re-parse
/// would already land the node on the right page, drop it when the page is
/// the default, write it otherwise.
fn fix_page(text: String, page: &str, st: &mut EmitState) -> Result<String, String> {
    match textual_page(&text) {
        Some(t) if t == page => {
            if st.sim_page != page {
                st.sim_page = page.to_string();
            }
            Ok(text)
        }
        None if st.sim_page == page => Ok(text),
        _ => {
            if page == DEFAULT_PAGE && st.sim_page == DEFAULT_PAGE {
                Ok(remove_property(&text, "Page"))
            } else {
                let updated = upsert_property(&text, "Page", page)
                    .ok_or_else(|| format!("could not write page '{page}' into declaration"))?;
                st.sim_page = page.to_string();
                Ok(updated)
            }
        }
    }
}

fn textual_page(text: &str) -> Option<String> {
    let open = text.find('{')?;
    let close = match_brace(text, open)?;
    let props = extract_properties(&text[open + 1..close]);
    prop(&props, "Page")
        .and_then(PropValue::as_str)
        .map(str::to_string)
}

fn collect_keys(tree: &Tree) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    for id in tree.walk() {
        match &tree.node(id).kind {
            NodeKind::Control { key, .. } | NodeKind::Separator { key, .. } => {
                if !key.is_empty() {
                    out.insert(key.clone());
                }
            }
            NodeKind::Group {
                internal_key: Some(k),
                ..
            } => {
                out.insert(k.clone());
            }
            _ => {}
        }
    }
    out
}

fn synth_group(label: &str, st: &EmitState) -> String {
    let i = &st.decl_indent;
    format!(
        "{i}{label} = InstanceInput {{\n{i}\tSourceOp = \"{op}\",\n{i}\tSource = \"{label}\",\n{i}}},",
        op = st.helper_name,
    )
}

fn synth_separator(st: &mut EmitState) -> String {
    let key = loop {
        st.sep_counter += 1;
        let k = format!("Separator{}", st.sep_counter);
        if !st.used_keys.contains(&k) {
            break k;
        }
    };
    st.used_keys.insert(key.clone());
    let i = &st.decl_indent;
    format!(
        "{i}{key} = InstanceInput {{\n{i}\tSourceOp = \"{op}\",\n{i}\tSource = \"{SEPARATOR_SOURCE}\",\n{i}}},",
        op = st.helper_name,
    )
}

// ---- property surgery -----------------------------------------------------

struct PropSpan {
    key_start: usize,
    value_start: usize,
    value_end: usize,
}

fn property_span(body: &str, key: &str) -> Option<PropSpan> {
    let b = body.as_bytes();
    let mut i = 0usize;
    while i < b.len() {
        while i < b.len() && (b[i].is_ascii_whitespace() || b[i] == b',') {
            i += 1;
        }
        if i >= b.len() {
            break;
        }
        let ks = i;
        while i < b.len() && setting::is_ident_byte(b[i]) {
            i += 1;
        }
        if i == ks {
            while i < b.len() && b[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        let k = &body[ks..i];
        while i < b.len() && (b[i] == b' ' || b[i] == b'\t') {
            i += 1;
        }
        if b.get(i) != Some(&b'=') {
            while i < b.len() && b[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        i += 1;
        while i < b.len() && (b[i] == b' ' || b[i] == b'\t') {
            i += 1;
        }
        let vs = i;
        let ve = match b.get(i) {
            Some(b'"') => setting::skip_quoted(b, i)? + 1,
            Some(b'{') => match_brace(body, i)? + 1,
            _ => {
                let mut j = i;
                while j < b.len() && b[j] != b',' && b[j] != b'\n' && b[j] != b'}' {
                    j += 1;
                }
                j
            }
        };
        if k == key {
            return Some(PropSpan {
                key_start: ks,
                value_start: vs,
                value_end: ve,
            });
        }
        i = ve;
    }
    None
}

/// Replace `key`'s value with a quoted string, or insert the property right
/// after the declaration's opening brace using the indentation of the next
/// line. Returns `None` when the value cannot be escaped or the declaration
/// has no body.
fn upsert_property(text: &str, key: &str, value: &str) -> Option<String> {
    let escaped = escape_str(value)?;
    let open = text.find('{')?;
    let close = match_brace(text, open)?;
    let body = &text[open + 1..close];
    if let Some(span) = property_span(body, key) {
        let a = open + 1 + span.value_start;
        let b = open + 1 + span.value_end;
        let mut out = String::with_capacity(text.len() + escaped.len());
        out.push_str(&text[..a]);
        out.push('"');
        out.push_str(&escaped);
        out.push('"');
        out.push_str(&text[b..]);
        Some(out)
    } else {
        let indent = next_line_indent(body).unwrap_or_else(|| "\t\t\t\t\t".to_string());
        let insert = format!("\n{indent}{key} = \"{escaped}\",");
        let mut out = String::with_capacity(text.len() + insert.len());
        out.push_str(&text[..open + 1]);
        out.push_str(&insert);
        out.push_str(&text[open + 1..]);
        Some(out)
    }
}

/// Drop `key` from the declaration, taking its whole line when it sits alone
/// on one. Declarations without the property come back unchanged.
fn remove_property(text: &str, key: &str) -> String {
    let Some(open) = text.find('{') else {
        return text.to_string();
    };
    let Some(close) = match_brace(text, open) else {
        return text.to_string();
    };
    let Some(span) = property_span(&text[open + 1..close], key) else {
        return text.to_string();
    };
    let b = text.as_bytes();
    let mut start = open + 1 + span.key_start;
    let mut end = open + 1 + span.value_end;
    if b.get(end) == Some(&b',') {
        end += 1;
    }
    let ls = text[..start].rfind('\n').map(|p| p + 1).unwrap_or(0);
    let all_ws_before = text[ls..start].chars().all(|c| c == ' ' || c == '\t');
    let mut line_end = end;
    while matches!(b.get(line_end), Some(&b' ') | Some(&b'\t')) {
        line_end += 1;
    }
    if all_ws_before && b.get(line_end) == Some(&b'\n') {
        start = ls;
        end = line_end + 1;
    }
    format!("{}{}", &text[..start], &text[end..])
}

fn next_line_indent(body: &str) -> Option<String> {
    let rest = body.strip_prefix('\n')?;
    let ws: String = rest
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect();
    if ws.is_empty() { None } else { Some(ws) }
}

fn escape_str(s: &str) -> Option<String> {
    if s.contains('\n') || s.contains('\r') {
        return None;
    }
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    Some(out)
}

// ---- region rendering -----------------------------------------------------

fn render_inputs(r: &InputsRegion, decls: &[String]) -> String {
    let mut body = String::new();
    body.push_str(&r.lead);
    if !decls.is_empty() && r.lead.is_empty() {
        body.push('\n');
    }
    for d in decls {
        body.push_str(d);
        body.push('\n');
    }
    body.push_str(&r.close_ws);
    if r.wrap {
        if decls.is_empty() {
            return String::new();
        }
        format!(
            "{wi}Inputs = ordered() {{{body}{wi}}},\n",
            wi = r.wrap_indent
        )
    } else {
        body
    }
}

fn render_helper(h: &HelperRegion, groups: &[GroupDescriptor]) -> Result<String, String> {
    let ei = &h.entry_indent;
    let mut body = String::from("\n");
    body.push_str(&format!(
        "{ei}Separator = {{\n\
         {ei}\tLINKS_Name = \" \",\n\
         {ei}\tLINKID_DataType = \"Number\",\n\
         {ei}\tINPID_InputControl = \"SeparatorControl\",\n\
         {ei}\tINP_External = false,\n\
         {ei}\tINP_Passive = true,\n\
         {ei}}},\n"
    ));
    for g in groups {
        let name = escape_str(&g.name)
            .ok_or_else(|| format!("group name {:?} cannot be written", g.name))?;
        body.push_str(&format!(
            "{ei}{label} = {{\n\
             {ei}\tLINKS_Name = \"{name}\",\n\
             {ei}\tLINKID_DataType = \"Number\",\n\
             {ei}\tLBLC_DropDownButton = true,\n\
             {ei}\tLBLC_NumInputs = {size},\n\
             {ei}\tLBLC_NestLevel = {depth},\n\
             {ei}\tINPID_InputControl = \"LabelControl\",\n\
             {ei}\tINP_External = false,\n\
             {ei}\tINP_Passive = true,\n\
             {ei}}},\n",
            label = g.label,
            size = g.size,
            depth = g.depth,
        ));
    }
    body.push_str(&h.close_ws);
    Ok(format!("{}{}{}", h.head, body, h.tail))
}
