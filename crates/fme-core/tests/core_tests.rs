use fme_core::editor::{FixtureInput, build_macro_text};
use fme_core::setting::{OperatorKind, PropValue, Segment, extract_properties, find_block};
use fme_core::tree::{NodeKind, Tree};

fn ctl(key: &'static str, source: &'static str) -> FixtureInput<'static> {
    FixtureInput::Control {
        key,
        source,
        name: None,
        page: None,
    }
}

#[test]
fn parse_single_control() {
    let text = build_macro_text("Simple", &[ctl("Input1", "BlurSize")]);
    let doc = fme_core::parse_macro(&text).expect("parse");
    assert_eq!(doc.op_name, "Simple");
    assert_eq!(doc.op_kind, OperatorKind::Macro);
    let root = doc.tree.node(Tree::ROOT);
    assert_eq!(root.children.len(), 1);
    match &doc.tree.node(root.children[0]).kind {
        NodeKind::Control { key, name, .. } => {
            assert_eq!(key, "Input1");
            // no Name property, so the display name falls back to Source
            assert_eq!(name, "BlurSize");
        }
        other => panic!("expected control, got {:?}", other),
    }
}

#[test]
fn group_consumes_exact_count() {
    // flat: [A, G(size 2), B, C, D] -> Root{A, G{B, C}, D}
    let text = build_macro_text(
        "Grouped",
        &[
            ctl("Input1", "SrcA"),
            FixtureInput::Group {
                label: "AutoLabel1",
                name: "Grp",
                size: 2,
                depth: 0,
            },
            ctl("Input2", "SrcB"),
            ctl("Input3", "SrcC"),
            ctl("Input4", "SrcD"),
        ],
    );
    let doc = fme_core::parse_macro(&text).expect("parse");
    let root = doc.tree.node(Tree::ROOT);
    assert_eq!(root.children.len(), 3, "D must land on the root");
    let gid = root.children[1];
    match &doc.tree.node(gid).kind {
        NodeKind::Group { name, internal_key, .. } => {
            assert_eq!(name, "Grp");
            assert_eq!(internal_key.as_deref(), Some("AutoLabel1"));
        }
        other => panic!("expected group, got {:?}", other),
    }
    assert_eq!(doc.tree.node(gid).children.len(), 2);
    match &doc.tree.node(root.children[2]).kind {
        NodeKind::Control { key, .. } => assert_eq!(key, "Input4"),
        other => panic!("expected control, got {:?}", other),
    }
}

#[test]
fn nested_group_consumption() {
    // flat: [G1(size 3), c1, G2(size 1), c2, c3] -> Root{G1{c1, G2{c2}}, c3}
    let text = build_macro_text(
        "Nested",
        &[
            FixtureInput::Group {
                label: "AutoLabel1",
                name: "Outer",
                size: 3,
                depth: 0,
            },
            ctl("Input1", "SrcA"),
            FixtureInput::Group {
                label: "AutoLabel2",
                name: "Inner",
                size: 1,
                depth: 1,
            },
            ctl("Input2", "SrcB"),
            ctl("Input3", "SrcC"),
        ],
    );
    let doc = fme_core::parse_macro(&text).expect("parse");
    let root = doc.tree.node(Tree::ROOT);
    assert_eq!(root.children.len(), 2);
    let outer = root.children[0];
    assert_eq!(doc.tree.node(outer).children.len(), 2);
    let inner = doc.tree.node(outer).children[1];
    assert!(doc.tree.node(inner).kind.is_group());
    assert_eq!(doc.tree.node(inner).children.len(), 1);
    assert_eq!(doc.tree.group_depth(inner), 1);
    assert_eq!(doc.tree.descendant_count(outer), 3);
}

#[test]
fn page_markers_inferred_minimally() {
    let page = |key, source, page| FixtureInput::Control {
        key,
        source,
        name: None,
        page: Some(page),
    };
    let text = build_macro_text(
        "Paged",
        &[
            ctl("Input1", "SrcA"),               // default page, no marker
            page("Input2", "SrcB", "Extra"),     // marker
            ctl("Input3", "SrcC"),               // absent page inherits Extra
            page("Input4", "SrcD", "Extra"),     // equal to current, no marker
            page("Input5", "SrcE", "Controls"),  // back to the default page
        ],
    );
    let doc = fme_core::parse_macro(&text).expect("parse");
    assert_eq!(doc.diagnostics.page_count, 2, "exactly two markers");
    let kinds: Vec<&'static str> = doc
        .tree
        .node(Tree::ROOT)
        .children
        .iter()
        .map(|&c| doc.tree.node(c).kind.type_name())
        .collect();
    assert_eq!(
        kinds,
        [
            "control", "page", "control", "control", "control", "page", "control"
        ]
    );
}

#[test]
fn main_input_is_hidden() {
    let text = build_macro_text(
        "Hidden",
        &[ctl("MainInput1", "Input"), ctl("Input1", "SrcA")],
    );
    let mut doc = fme_core::parse_macro(&text).expect("parse");
    assert_eq!(doc.diagnostics.hidden_count, 1);
    let id = doc.tree.node(Tree::ROOT).children[0];
    assert!(doc.tree.node(id).kind.is_hidden());
    assert!(fme_core::rename(&mut doc.tree, id, "X").is_err());
    assert!(fme_core::remove(&mut doc.tree, id).is_err());
}

#[test]
fn separator_declaration_detected() {
    let text = build_macro_text(
        "WithSep",
        &[
            ctl("Input1", "SrcA"),
            FixtureInput::Separator { key: "Sep1" },
            ctl("Input2", "SrcB"),
        ],
    );
    let doc = fme_core::parse_macro(&text).expect("parse");
    let mid = doc.tree.node(Tree::ROOT).children[1];
    match &doc.tree.node(mid).kind {
        NodeKind::Separator { key, .. } => assert_eq!(key, "Sep1"),
        other => panic!("expected separator, got {:?}", other),
    }
}

#[test]
fn extract_properties_shapes() {
    let body = " SourceOp = \"Blur1\",\n Source = \"Size\",\n Default = 0.5,\n Extra = { 1, 2, { 3 } },\n Flag = true,\n";
    let props = extract_properties(body);
    assert_eq!(props.len(), 5);
    assert_eq!(props[0].1, PropValue::Str("Blur1".to_string()));
    assert_eq!(props[2].1, PropValue::Token("0.5".to_string()));
    assert_eq!(props[3].1, PropValue::Block("{ 1, 2, { 3 } }".to_string()));
    assert_eq!(props[4].1, PropValue::Token("true".to_string()));
}

#[test]
fn find_block_nesting_and_strings() {
    let text = "X = ordered() { a = { b = \"}\" }, c = 1 } tail";
    let span = find_block(text, "X = ordered()", 0).expect("block");
    assert_eq!(&text[span.body_start..span.body_end], " a = { b = \"}\" }, c = 1 ");
    // unbalanced input is "not found", never a panic
    assert!(find_block("Y = { {", "Y =", 0).is_none());
    assert!(find_block(text, "Missing =", 0).is_none());
}

#[test]
fn structural_errors_are_descriptive() {
    assert!(
        fme_core::parse_macro("{ nothing here }")
            .unwrap_err()
            .contains("MacroOperator")
    );
    let text = build_macro_text("Broken", &[ctl("Input1", "SrcA")]);
    let no_outputs = text.replace("Outputs = ordered()", "Outs = ordered()");
    assert!(
        fme_core::parse_macro(&no_outputs)
            .unwrap_err()
            .contains("exposed-outputs")
    );
    let no_view = text.replace("ViewInfo", "ViewData");
    assert!(
        fme_core::parse_macro(&no_view)
            .unwrap_err()
            .contains("view-info")
    );
}

#[test]
fn helper_absent_is_not_fatal() {
    // fixtures without groups carry no helper node at all
    let text = build_macro_text("NoHelper", &[ctl("Input1", "SrcA")]);
    let doc = fme_core::parse_macro(&text).expect("parse");
    assert!(!doc.diagnostics.helper_found);
    assert_eq!(doc.max_auto_label, 0);
}

#[test]
fn remove_promotes_children() {
    let text = build_macro_text(
        "Promote",
        &[
            ctl("Input1", "SrcA"),
            FixtureInput::Group {
                label: "AutoLabel1",
                name: "Grp",
                size: 2,
                depth: 0,
            },
            ctl("Input2", "SrcB"),
            ctl("Input3", "SrcC"),
            ctl("Input4", "SrcD"),
        ],
    );
    let mut doc = fme_core::parse_macro(&text).expect("parse");
    let gid = doc.tree.node(Tree::ROOT).children[1];
    fme_core::ungroup(&mut doc.tree, gid).expect("ungroup");
    let keys: Vec<String> = doc
        .tree
        .node(Tree::ROOT)
        .children
        .iter()
        .map(|&c| match &doc.tree.node(c).kind {
            NodeKind::Control { key, .. } => key.clone(),
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(keys, ["Input1", "Input2", "Input3", "Input4"]);
}

#[test]
fn group_range_wraps_children() {
    let text = build_macro_text(
        "Wrap",
        &[ctl("Input1", "SrcA"), ctl("Input2", "SrcB"), ctl("Input3", "SrcC")],
    );
    let mut doc = fme_core::parse_macro(&text).expect("parse");
    let gid = fme_core::group_range(&mut doc.tree, Tree::ROOT, 1, 2, "New").expect("group");
    assert_eq!(doc.tree.node(Tree::ROOT).children.len(), 2);
    assert_eq!(doc.tree.node(gid).children.len(), 2);
    match &doc.tree.node(gid).kind {
        NodeKind::Group { internal_key, .. } => assert!(internal_key.is_none()),
        other => panic!("expected group, got {:?}", other),
    }
    assert!(fme_core::group_range(&mut doc.tree, Tree::ROOT, 1, 5, "Bad").is_err());
}

#[test]
fn indent_and_outdent() {
    let text = build_macro_text(
        "Dent",
        &[
            FixtureInput::Group {
                label: "AutoLabel1",
                name: "Grp",
                size: 1,
                depth: 0,
            },
            ctl("Input1", "SrcA"),
            ctl("Input2", "SrcB"),
        ],
    );
    let mut doc = fme_core::parse_macro(&text).expect("parse");
    let gid = doc.tree.node(Tree::ROOT).children[0];
    let loose = doc.tree.node(Tree::ROOT).children[1];
    fme_core::indent(&mut doc.tree, loose).expect("indent");
    assert_eq!(doc.tree.node(gid).children.len(), 2);
    let inner = doc.tree.node(gid).children[0];
    fme_core::outdent(&mut doc.tree, inner).expect("outdent");
    assert_eq!(doc.tree.node(Tree::ROOT).children.len(), 2);
    assert_eq!(doc.tree.node(Tree::ROOT).children[1], inner);
    assert!(fme_core::outdent(&mut doc.tree, inner).is_err());
}

#[test]
fn move_validations() {
    let text = build_macro_text(
        "Mover",
        &[
            FixtureInput::Group {
                label: "AutoLabel1",
                name: "Grp",
                size: 1,
                depth: 0,
            },
            ctl("Input1", "SrcA"),
            ctl("Input2", "SrcB"),
        ],
    );
    let mut doc = fme_core::parse_macro(&text).expect("parse");
    let gid = doc.tree.node(Tree::ROOT).children[0];
    let member = doc.tree.node(gid).children[0];
    assert!(fme_core::move_node(&mut doc.tree, gid, member, 0).is_err());
    assert!(fme_core::move_node(&mut doc.tree, gid, gid, 0).is_err());
    let loose = doc.tree.node(Tree::ROOT).children[1];
    fme_core::move_node(&mut doc.tree, loose, gid, 0).expect("move");
    assert_eq!(doc.tree.node(gid).children.len(), 2);
    assert_eq!(doc.tree.node(gid).children[0], loose);
}

#[test]
fn pointer_round_trip() {
    let text = build_macro_text(
        "Pointers",
        &[
            FixtureInput::Group {
                label: "AutoLabel1",
                name: "Grp",
                size: 2,
                depth: 0,
            },
            ctl("Input1", "SrcA"),
            ctl("Input2", "SrcB"),
            ctl("Input3", "SrcC"),
        ],
    );
    let doc = fme_core::parse_macro(&text).expect("parse");
    for id in doc.tree.walk() {
        let ptr = fme_core::pointer_of(&doc.tree, id);
        assert_eq!(fme_core::node_by_pointer(&doc.tree, &ptr).expect("resolve"), id);
    }
    assert!(fme_core::node_by_pointer(&doc.tree, "/9").is_err());
    assert!(fme_core::node_by_pointer(&doc.tree, "/x").is_err());
}

#[test]
fn subtree_size_matches_metadata() {
    let text = build_macro_text(
        "Sized",
        &[
            FixtureInput::Group {
                label: "AutoLabel2",
                name: "Grp",
                size: 2,
                depth: 0,
            },
            ctl("Input1", "SrcA"),
            ctl("Input2", "SrcB"),
        ],
    );
    let doc = fme_core::parse_macro(&text).expect("parse");
    let gid = doc.tree.node(Tree::ROOT).children[0];
    let declared = doc
        .segments
        .iter()
        .find_map(|s| match s {
            Segment::Helper(h) => h.entries.get("AutoLabel2").map(|e| e.size),
            _ => None,
        })
        .expect("metadata entry");
    assert_eq!(declared, doc.tree.descendant_count(gid));
    assert_eq!(doc.max_auto_label, 2);
}

#[test]
fn quoted_operator_names() {
    let plain = build_macro_text("Plain", &[ctl("Input1", "SrcA")]);
    let quoted = plain.replace("\t\tPlain = MacroOperator", "\t\t[\"My Macro\"] = MacroOperator");
    let doc = fme_core::parse_macro(&quoted).expect("parse");
    assert_eq!(doc.op_name, "My Macro");
}

#[test]
fn edited_file_name_suffix() {
    use std::path::Path;
    assert_eq!(
        fme_core::edited_file_name(Path::new("/tmp/Blur.setting")),
        Path::new("/tmp/Blur_edited.setting")
    );
    assert_eq!(
        fme_core::edited_file_name(Path::new("Blur")),
        Path::new("Blur_edited")
    );
}

#[test]
fn find_setting_files_and_sniff() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("a.setting");
    std::fs::write(&good, build_macro_text("A", &[ctl("Input1", "SrcA")])).unwrap();
    std::fs::write(dir.path().join("b.setting"), "not a macro").unwrap();
    std::fs::write(dir.path().join("c.txt"), "ignored").unwrap();
    let files = fme_core::macros::find_setting_files(dir.path());
    assert_eq!(files.len(), 2);
    assert!(fme_core::macros::is_macro_file(&good));
    assert!(!fme_core::macros::is_macro_file(&files[1]));
}
