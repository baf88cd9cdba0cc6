// Reader for Fusion macro .setting text
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::tree::{self, NodeKind, Tree};

pub const DEFAULT_PAGE: &str = "Controls";
pub const SEPARATOR_SOURCE: &str = "Separator";
pub const HELPER_NAME: &str = "MacroControlGroups";
pub const HELPER_KIND: &str = "PipeRouter";
pub const LABEL_PREFIX: &str = "AutoLabel";
pub const EDITED_SUFFIX: &str = "_edited";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Macro,
    Group,
}

impl OperatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperatorKind::Macro => "MacroOperator",
            OperatorKind::Group => "GroupOperator",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    /// Quoted string, stored unescaped.
    Str(String),
    /// Brace-delimited literal kept as opaque text, braces included.
    Block(String),
    /// Bare token up to the next separator.
    Token(String),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Str(s) => Some(s),
            _ => None,
        }
    }
    pub fn as_token(&self) -> Option<&str> {
        match self {
            PropValue::Token(s) => Some(s),
            _ => None,
        }
    }
}

pub type Properties = Vec<(String, PropValue)>;

pub fn prop<'a>(props: &'a [(String, PropValue)], key: &str) -> Option<&'a PropValue> {
    props.iter().find(|(k, _)| k == key).map(|(_, v)| v)
}

/// One descriptor from the helper node's control list. `size` is the total
/// descendant count of the group, not its immediate child count.
#[derive(Debug, Clone)]
pub struct MetadataEntry {
    pub name: String,
    pub depth: u32,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub enum FlatItem {
    PageMarker {
        name: String,
    },
    Separator {
        key: String,
        properties: Properties,
        original_text: String,
    },
    Control {
        key: String,
        properties: Properties,
        original_text: String,
        hidden: bool,
    },
}

// ---- brace scanning -------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct BlockSpan {
    pub header: usize,
    pub open: usize,
    pub body_start: usize,
    pub body_end: usize,
    pub end: usize,
}

/// Find the first balanced-brace block whose `{` follows `header`, starting
/// the search at `from`. Returns `None` when the header is absent or the
/// braces never balance; callers treat that as "feature absent".
pub fn find_block(text: &str, header: &str, from: usize) -> Option<BlockSpan> {
    let mut at = from;
    while let Some(rel) = text[at..].find(header) {
        let hstart = at + rel;
        let after = hstart + header.len();
        let open = skip_ws(text, after);
        if text.as_bytes().get(open) == Some(&b'{') {
            let close = match_brace(text, open)?;
            return Some(BlockSpan {
                header: hstart,
                open,
                body_start: open + 1,
                body_end: close,
                end: close + 1,
            });
        }
        at = after;
    }
    None
}

/// Offset of the `}` matching the `{` at `open`, skipping nested pairs and
/// quoted strings.
pub fn match_brace(text: &str, open: usize) -> Option<usize> {
    let b = text.as_bytes();
    if b.get(open) != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut i = open;
    while i < b.len() {
        match b[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            b'"' => i = skip_quoted(b, i)?,
            _ => {}
        }
        i += 1;
    }
    None
}

/// `open` sits on the opening quote; returns the closing quote offset.
pub(crate) fn skip_quoted(b: &[u8], open: usize) -> Option<usize> {
    let mut i = open + 1;
    while i < b.len() {
        match b[i] {
            b'\\' => i += 1,
            b'"' => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn skip_ws(text: &str, mut i: usize) -> usize {
    let b = text.as_bytes();
    while i < b.len() && b[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

pub(crate) fn is_ident_byte(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

pub(crate) fn leading_ws(s: &str) -> String {
    s.chars().take_while(|c| *c == ' ' || *c == '\t').collect()
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

// ---- property extraction --------------------------------------------------

/// Extract `key = value` pairs at brace depth 0 of a declaration body.
/// Pairs that match no recognized shape are skipped rather than failing the
/// parse; the declaration's original text still carries them.
pub fn extract_properties(body: &str) -> Properties {
    let b = body.as_bytes();
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < b.len() {
        i = skip_ws(body, i);
        while i < b.len() && b[i] == b',' {
            i = skip_ws(body, i + 1);
        }
        if i >= b.len() {
            break;
        }
        let key_start = i;
        while i < b.len() && is_ident_byte(b[i]) {
            i += 1;
        }
        if i == key_start {
            i = skip_past_comma(body, i);
            continue;
        }
        let key = body[key_start..i].to_string();
        i = skip_ws(body, i);
        if b.get(i) != Some(&b'=') {
            i = skip_past_comma(body, i);
            continue;
        }
        i = skip_ws(body, i + 1);
        match b.get(i) {
            Some(b'"') => {
                let Some(close) = skip_quoted(b, i) else { break };
                out.push((key, PropValue::Str(unescape(&body[i + 1..close]))));
                i = close + 1;
            }
            Some(b'{') => {
                let Some(close) = match_brace(body, i) else { break };
                out.push((key, PropValue::Block(body[i..=close].to_string())));
                i = close + 1;
            }
            Some(_) => {
                let start = i;
                while i < b.len() && b[i] != b',' && b[i] != b'\n' && b[i] != b'}' {
                    i += 1;
                }
                let tok = body[start..i].trim();
                if !tok.is_empty() {
                    out.push((key, PropValue::Token(tok.to_string())));
                }
            }
            None => break,
        }
    }
    out
}

fn skip_past_comma(body: &str, mut i: usize) -> usize {
    let b = body.as_bytes();
    while i < b.len() {
        match b[i] {
            b',' => return i + 1,
            b'{' => match match_brace(body, i) {
                Some(c) => i = c,
                None => return b.len(),
            },
            b'"' => match skip_quoted(b, i) {
                Some(c) => i = c,
                None => return b.len(),
            },
            _ => {}
        }
        i += 1;
    }
    i
}

pub fn is_main_input(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    match lower.strip_prefix("maininput") {
        Some(rest) => !rest.is_empty() && rest.bytes().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

pub fn label_index(key: &str) -> Option<u32> {
    let rest = key.strip_prefix(LABEL_PREFIX)?;
    if rest.is_empty() {
        return None;
    }
    rest.parse().ok()
}

// ---- entry scanning -------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct RawEntry {
    pub key: String,
    pub kind: Option<String>,
    pub body_start: usize,
    pub body_end: usize,
    /// Start of the entry's first line (its indentation is part of the span).
    pub line_start: usize,
    /// One past the trailing comma, or past the closing brace if none.
    pub end: usize,
}

/// Scan `<key> = [Kind] { ... },` entries at brace depth 0 of `text[from..to]`.
pub(crate) fn scan_entries(text: &str, from: usize, to: usize) -> Vec<RawEntry> {
    let b = text.as_bytes();
    let mut out = Vec::new();
    let mut i = from;
    while i < to {
        i = skip_ws_to(text, i, to);
        while i < to && b[i] == b',' {
            i = skip_ws_to(text, i + 1, to);
        }
        if i >= to {
            break;
        }
        let key_start = i;
        let Some(key) = read_key(text, &mut i, to) else {
            i = next_line(text, i, to);
            continue;
        };
        i = skip_ws_to(text, i, to);
        if b.get(i) != Some(&b'=') {
            i = next_line(text, i, to);
            continue;
        }
        i = skip_ws_to(text, i + 1, to);
        let kind_start = i;
        while i < to && is_ident_byte(b[i]) {
            i += 1;
        }
        let kind = if i > kind_start {
            Some(text[kind_start..i].to_string())
        } else {
            None
        };
        i = skip_ws_to(text, i, to);
        if b.get(i) != Some(&b'{') {
            i = next_line(text, i, to);
            continue;
        }
        let Some(close) = match_brace(text, i) else {
            break;
        };
        let body_start = i + 1;
        let body_end = close;
        let mut end = close + 1;
        while end < to && (b[end] == b' ' || b[end] == b'\t') {
            end += 1;
        }
        if end < to && b[end] == b',' {
            end += 1;
        } else {
            end = close + 1;
        }
        let line_start = text[..key_start]
            .rfind('\n')
            .map(|p| p + 1)
            .unwrap_or(0)
            .max(from);
        out.push(RawEntry {
            key,
            kind,
            body_start,
            body_end,
            line_start,
            end,
        });
        i = end;
    }
    out
}

fn read_key(text: &str, i: &mut usize, to: usize) -> Option<String> {
    let b = text.as_bytes();
    if b.get(*i) == Some(&b'[') {
        let q = *i + 1;
        if b.get(q) != Some(&b'"') {
            return None;
        }
        let close = skip_quoted(b, q)?;
        if close + 1 >= to || b[close + 1] != b']' {
            return None;
        }
        let key = unescape(&text[q + 1..close]);
        *i = close + 2;
        Some(key)
    } else {
        let start = *i;
        while *i < to && is_ident_byte(b[*i]) {
            *i += 1;
        }
        if *i == start {
            None
        } else {
            Some(text[start..*i].to_string())
        }
    }
}

fn skip_ws_to(text: &str, mut i: usize, to: usize) -> usize {
    let b = text.as_bytes();
    while i < to && b[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn next_line(text: &str, i: usize, to: usize) -> usize {
    match text[i..to].find('\n') {
        Some(p) => i + p + 1,
        None => to,
    }
}

// ---- segments -------------------------------------------------------------

/// Parsed exposed-inputs region. The layout fields reproduce the original
/// spacing when the flat sequence is re-emitted.
#[derive(Debug, Clone)]
pub struct InputsRegion {
    pub items: Vec<FlatItem>,
    pub lead: String,
    pub close_ws: String,
    pub decl_indent: String,
    /// The file had no inputs block; emit the whole `Inputs = ordered()`
    /// wrapper at the recorded insertion point.
    pub wrap: bool,
    pub wrap_indent: String,
}

impl InputsRegion {
    pub(crate) fn parse(text: &str, body_start: usize, body_end: usize) -> InputsRegion {
        let entries = scan_entries(text, body_start, body_end);
        let mut items = Vec::new();
        let mut current = DEFAULT_PAGE.to_string();
        for e in &entries {
            let original = text[e.line_start..e.end].to_string();
            let mut props = extract_properties(&text[e.body_start..e.body_end]);
            if let Some(PropValue::Str(page)) = prop(&props, "Page").cloned()
                && page != current
            {
                items.push(FlatItem::PageMarker { name: page.clone() });
                current = page;
            }
            // page membership lives in the tree, not in the property set
            props.retain(|(k, _)| k != "Page");
            let is_sep = e.kind.as_deref() == Some("InstanceInput")
                && prop(&props, "Source").and_then(PropValue::as_str) == Some(SEPARATOR_SOURCE);
            if is_sep {
                items.push(FlatItem::Separator {
                    key: e.key.clone(),
                    properties: props,
                    original_text: original,
                });
            } else {
                let hidden = is_main_input(&e.key);
                items.push(FlatItem::Control {
                    key: e.key.clone(),
                    properties: props,
                    original_text: original,
                    hidden,
                });
            }
        }
        let (lead, close_ws) = match (entries.first(), entries.last()) {
            (Some(first), Some(last)) => {
                let lead = text[body_start..first.line_start].to_string();
                let rest = &text[last.end..body_end];
                (lead, rest.strip_prefix('\n').unwrap_or(rest).to_string())
            }
            _ => (String::new(), text[body_start..body_end].to_string()),
        };
        let decl_indent = entries
            .first()
            .map(|e| leading_ws(&text[e.line_start..e.end]))
            .unwrap_or_else(|| "\t\t\t\t".to_string());
        InputsRegion {
            items,
            lead,
            close_ws,
            decl_indent,
            wrap: false,
            wrap_indent: String::new(),
        }
    }
}

/// Parsed helper node. `head` runs from the node's first line through the
/// `UserControls = ordered() {` opening brace; `tail` from the matching
/// closing brace through the node's trailing comma. Only the descriptor body
/// between them is ever regenerated.
#[derive(Debug, Clone)]
pub struct HelperRegion {
    pub entries: BTreeMap<String, MetadataEntry>,
    pub max_label: u32,
    pub tool_name: String,
    pub head: String,
    pub tail: String,
    pub entry_indent: String,
    pub close_ws: String,
    pub synthesized: bool,
}

impl HelperRegion {
    fn parse(text: &str, e: &RawEntry) -> HelperRegion {
        let node_start = e.line_start;
        let node_end = e.end;
        let node_indent = leading_ws(&text[node_start..node_end]);
        let uc = find_block(&text[..node_end], "UserControls = ordered()", e.body_start)
            .filter(|s| s.open < e.body_end);
        let Some(uc) = uc else {
            // no descriptor list in the helper; rebuild the node wholesale
            let mut region = HelperRegion::synthesized(&node_indent);
            region.tool_name = e.key.clone();
            region.head = format!(
                "{i}{name} = {kind} {{\n{i}\tCtrlWZoom = false,\n{i}\tUserControls = ordered() {{",
                i = node_indent,
                name = e.key,
                kind = e.kind.as_deref().unwrap_or(HELPER_KIND),
            );
            region.tail = format!("}},\n{i}}},", i = node_indent);
            return region;
        };
        let mut entries = BTreeMap::new();
        let mut max_label = 0u32;
        let descriptors = scan_entries(text, uc.body_start, uc.body_end);
        for d in &descriptors {
            let Some(n) = label_index(&d.key) else {
                continue;
            };
            max_label = max_label.max(n);
            let props = extract_properties(&text[d.body_start..d.body_end]);
            let name = prop(&props, "LINKS_Name")
                .and_then(PropValue::as_str)
                .unwrap_or(&d.key)
                .to_string();
            let depth = prop(&props, "LBLC_NestLevel")
                .and_then(PropValue::as_token)
                .and_then(|t| t.parse().ok())
                .unwrap_or(0);
            let size = prop(&props, "LBLC_NumInputs")
                .and_then(PropValue::as_token)
                .and_then(|t| t.parse().ok())
                .unwrap_or(0);
            entries.insert(d.key.clone(), MetadataEntry { name, depth, size });
        }
        let entry_indent = descriptors
            .first()
            .map(|d| leading_ws(&text[d.line_start..d.end]))
            .unwrap_or_else(|| format!("{node_indent}\t\t"));
        let body = &text[uc.body_start..uc.body_end];
        let close_ws = body
            .rfind('\n')
            .map(|p| &body[p + 1..])
            .unwrap_or("")
            .to_string();
        let close_ws = if close_ws.chars().all(|c| c == ' ' || c == '\t') {
            close_ws
        } else {
            format!("{node_indent}\t")
        };
        HelperRegion {
            entries,
            max_label,
            tool_name: e.key.clone(),
            head: text[node_start..uc.body_start].to_string(),
            tail: text[uc.body_end..node_end].to_string(),
            entry_indent,
            close_ws,
            synthesized: false,
        }
    }

    fn synthesized(node_indent: &str) -> HelperRegion {
        HelperRegion {
            entries: BTreeMap::new(),
            max_label: 0,
            tool_name: HELPER_NAME.to_string(),
            head: format!(
                "{i}{HELPER_NAME} = {HELPER_KIND} {{\n{i}\tCtrlWZoom = false,\n{i}\tUserControls = ordered() {{",
                i = node_indent,
            ),
            tail: format!("}},\n{i}}},\n", i = node_indent),
            entry_indent: format!("{node_indent}\t\t"),
            close_ws: format!("{node_indent}\t"),
            synthesized: true,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Segment {
    Verbatim(String),
    Inputs(InputsRegion),
    Helper(HelperRegion),
}

#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    pub header_snippet: String,
    pub inputs_found: bool,
    pub tools_found: bool,
    pub helper_found: bool,
    pub control_count: usize,
    pub group_count: usize,
    pub page_count: usize,
    pub hidden_count: usize,
}

pub(crate) struct Segmented {
    pub op_name: String,
    pub op_kind: OperatorKind,
    pub segments: Vec<Segment>,
    pub diagnostics: Diagnostics,
}

// ---- segmentation ---------------------------------------------------------

fn find_block_in(text: &str, header: &str, from: usize, to: usize) -> Option<BlockSpan> {
    let mut at = from;
    while let Some(span) = find_block(text, header, at) {
        if span.open >= to {
            return None;
        }
        if span.header == 0 || !is_ident_byte(text.as_bytes()[span.header - 1]) {
            return Some(span);
        }
        at = span.header + 1;
    }
    None
}

fn find_operator(text: &str) -> Option<(String, OperatorKind, BlockSpan)> {
    let mut best: Option<(String, OperatorKind, BlockSpan)> = None;
    for kind in [OperatorKind::Macro, OperatorKind::Group] {
        let token = kind.as_str();
        let b = text.as_bytes();
        let mut at = 0usize;
        while let Some(rel) = text[at..].find(token) {
            let k = at + rel;
            at = k + token.len();
            if k > 0 && is_ident_byte(b[k - 1]) {
                continue;
            }
            if b.get(k + token.len()).copied().is_some_and(is_ident_byte) {
                continue;
            }
            let Some((name, name_start)) = name_before_eq(text, k) else {
                continue;
            };
            let open = skip_ws(text, k + token.len());
            if b.get(open) != Some(&b'{') {
                continue;
            }
            let Some(close) = match_brace(text, open) else {
                continue;
            };
            let span = BlockSpan {
                header: name_start,
                open,
                body_start: open + 1,
                body_end: close,
                end: close + 1,
            };
            if best
                .as_ref()
                .map(|(_, _, s)| span.header < s.header)
                .unwrap_or(true)
            {
                best = Some((name, kind, span));
            }
            break;
        }
    }
    best
}

fn name_before_eq(text: &str, k: usize) -> Option<(String, usize)> {
    let b = text.as_bytes();
    let mut i = k;
    while i > 0 && b[i - 1].is_ascii_whitespace() {
        i -= 1;
    }
    if i == 0 || b[i - 1] != b'=' {
        return None;
    }
    i -= 1;
    while i > 0 && (b[i - 1] == b' ' || b[i - 1] == b'\t') {
        i -= 1;
    }
    if i == 0 {
        return None;
    }
    if b[i - 1] == b']' {
        if i < 3 {
            return None;
        }
        let close_q = i - 2;
        if b[close_q] != b'"' {
            return None;
        }
        let mut j = close_q;
        loop {
            if j == 0 {
                return None;
            }
            j -= 1;
            if b[j] == b'"' && (j == 0 || b[j - 1] != b'\\') {
                break;
            }
        }
        if j == 0 || b[j - 1] != b'[' {
            return None;
        }
        Some((unescape(&text[j + 1..close_q]), j - 1))
    } else {
        let end = i;
        let mut s = i;
        while s > 0 && is_ident_byte(b[s - 1]) {
            s -= 1;
        }
        if s == end {
            return None;
        }
        Some((text[s..end].to_string(), s))
    }
}

fn has_view_info(text: &str, from: usize, to: usize) -> bool {
    let b = text.as_bytes();
    let mut at = from;
    while let Some(rel) = text[at..to].find("ViewInfo") {
        let k = at + rel;
        let after = skip_ws(text, k + "ViewInfo".len());
        if (k == 0 || !is_ident_byte(b[k - 1])) && b.get(after) == Some(&b'=') {
            return true;
        }
        at = k + 1;
    }
    false
}

fn line_end_after(text: &str, at: usize) -> usize {
    match text[at..].find('\n') {
        Some(p) => at + p + 1,
        None => text.len(),
    }
}

fn body_indent(text: &str, open: usize) -> String {
    let start = line_end_after(text, open);
    let line_end = match text[start..].find('\n') {
        Some(p) => start + p,
        None => text.len(),
    };
    let ws = leading_ws(&text[start..line_end]);
    if ws.is_empty() {
        "\t\t\t".to_string()
    } else {
        ws
    }
}

pub(crate) fn segment(text: &str) -> Result<Segmented, String> {
    let (op_name, op_kind, op) = find_operator(text)
        .ok_or_else(|| "no MacroOperator or GroupOperator header found".to_string())?;
    let mut diag = Diagnostics::default();
    let header_line_end = match text[op.header..].find('\n') {
        Some(p) => op.header + p,
        None => text.len(),
    };
    diag.header_snippet = text[op.header..header_line_end].trim_end().to_string();

    if find_block_in(text, "Outputs = ordered()", op.body_start, op.body_end).is_none() {
        return Err(format!("operator '{op_name}' has no exposed-outputs block"));
    }
    if !has_view_info(text, op.body_start, op.body_end) {
        return Err(format!("operator '{op_name}' has no view-info block"));
    }
    let tools = find_block_in(text, "Tools = ordered()", op.body_start, op.body_end)
        .ok_or_else(|| format!("operator '{op_name}' has no tool list"))?;
    diag.tools_found = true;

    let inputs_span = find_block_in(text, "Inputs = ordered()", op.body_start, op.body_end);
    let (inputs_region, inputs_at) = match inputs_span {
        Some(s) => {
            diag.inputs_found = true;
            (
                InputsRegion::parse(text, s.body_start, s.body_end),
                (s.body_start, s.body_end),
            )
        }
        None => {
            // zero exposed controls; remember where a block could go
            let pos = line_end_after(text, op.open);
            let mut r = InputsRegion::parse(text, pos, pos);
            r.wrap = true;
            r.wrap_indent = body_indent(text, op.open);
            r.decl_indent = format!("{}\t", r.wrap_indent);
            (r, (pos, pos))
        }
    };

    let tool_entries = scan_entries(text, tools.body_start, tools.body_end);
    let helper_entry = tool_entries.iter().find(|e| {
        e.key == HELPER_NAME || text[e.body_start..e.body_end].contains("LBLC_DropDownButton")
    });
    let (helper_region, helper_at) = match helper_entry {
        Some(e) => {
            diag.helper_found = true;
            (HelperRegion::parse(text, e), (e.line_start, e.end))
        }
        None => {
            let pos = line_end_after(text, tools.open);
            let indent = body_indent(text, tools.open);
            (HelperRegion::synthesized(&indent), (pos, pos))
        }
    };

    let mut cuts = vec![
        (inputs_at.0, inputs_at.1, Segment::Inputs(inputs_region)),
        (helper_at.0, helper_at.1, Segment::Helper(helper_region)),
    ];
    cuts.sort_by_key(|c| c.0);
    if cuts[0].1 > cuts[1].0 {
        return Err("inputs and helper regions overlap; file not recognized".to_string());
    }
    let mut segments = Vec::new();
    let mut pos = 0usize;
    for (start, end, seg) in cuts {
        if start > pos {
            segments.push(Segment::Verbatim(text[pos..start].to_string()));
        }
        segments.push(seg);
        pos = end;
    }
    if pos < text.len() {
        segments.push(Segment::Verbatim(text[pos..].to_string()));
    }

    Ok(Segmented {
        op_name,
        op_kind,
        segments,
        diagnostics: diag,
    })
}

// ---- documents ------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct MacroDocument {
    pub op_name: String,
    pub op_kind: OperatorKind,
    pub segments: Vec<Segment>,
    pub tree: Tree,
    /// Highest auto-label index seen so far; newly created groups are
    /// assigned strictly larger indices.
    pub max_auto_label: u32,
    pub diagnostics: Diagnostics,
}

pub fn parse_macro(text: &str) -> Result<MacroDocument, String> {
    let seg = segment(text)?;
    let mut items = Vec::new();
    let mut metadata = BTreeMap::new();
    let mut max_label = 0u32;
    for s in &seg.segments {
        match s {
            Segment::Inputs(r) => items = r.items.clone(),
            Segment::Helper(h) => {
                metadata = h.entries.clone();
                max_label = h.max_label;
            }
            Segment::Verbatim(_) => {}
        }
    }
    let built = tree::build(items, &metadata);
    let mut diag = seg.diagnostics;
    for id in built.walk() {
        match &built.node(id).kind {
            NodeKind::Page { .. } => diag.page_count += 1,
            NodeKind::Group { .. } => diag.group_count += 1,
            NodeKind::Control { hidden, .. } => {
                diag.control_count += 1;
                if *hidden {
                    diag.hidden_count += 1;
                }
            }
            NodeKind::Separator { .. } | NodeKind::Root => {}
        }
    }
    Ok(MacroDocument {
        op_name: seg.op_name,
        op_kind: seg.op_kind,
        segments: seg.segments,
        tree: built,
        max_auto_label: max_label,
        diagnostics: diag,
    })
}

pub fn parse_file(path: &Path) -> Result<MacroDocument, String> {
    let text = fs::read_to_string(path).map_err(|e| e.to_string())?;
    parse_macro(&text)
}

/// `Blur.setting` becomes `Blur_edited.setting`.
pub fn edited_file_name(path: &Path) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("macro");
    let name = match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{stem}{EDITED_SUFFIX}.{ext}"),
        None => format!("{stem}{EDITED_SUFFIX}"),
    };
    path.with_file_name(name)
}
