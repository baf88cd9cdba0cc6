use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use fme_core::MacroDocument;
use fme_core::tree::{NodeId, Tree};

#[derive(Parser, Debug)]
#[command(
    name = "fme-cli",
    about = "Inspect and edit the exposed-control tree of Fusion macro .setting files",
    version
)]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Dump a macro's control tree as JSON
    Dump(DumpArgs),
    /// Print an indented control tree
    Tree(FileArgs),
    /// List macro files in a directory
    List(DirArgs),
    /// Rename a control, group, or page, then regenerate
    Rename(RenameArgs),
    /// Wrap a contiguous child range in a new group, then regenerate
    Group(GroupArgs),
    /// Dissolve a group, promoting its children, then regenerate
    Ungroup(PtrArgs),
    /// Remove a node (children are promoted), then regenerate
    Remove(PtrArgs),
    /// Move a node under a new parent, then regenerate
    Move(MoveArgs),
    /// Regenerate a file without edits
    Write(WriteArgs),
    /// Verify parse -> regenerate -> re-parse stability
    Check(FileArgs),
    /// Zip every .setting under a directory before batch edits
    Backup(DirArgs),
}

#[derive(ClapArgs, Debug)]
struct FileArgs {
    /// Macro .setting file
    path: PathBuf,
}

#[derive(ClapArgs, Debug)]
struct DirArgs {
    /// Directory holding .setting files
    dir: PathBuf,
}

#[derive(ClapArgs, Debug)]
struct DumpArgs {
    /// Macro .setting file
    path: PathBuf,
    /// Include each control's original declaration text
    #[arg(long, default_value_t = false)]
    text: bool,
    /// Hide MainInput-style controls from the dump
    #[arg(long, default_value_t = false)]
    no_hidden: bool,
}

#[derive(ClapArgs, Debug)]
struct RenameArgs {
    /// Macro .setting file
    path: PathBuf,
    /// Node pointer, e.g. /2/0
    #[arg(long)]
    ptr: String,
    /// New display name
    #[arg(long)]
    name: String,
    /// Output path; defaults to the derived _edited name
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct GroupArgs {
    /// Macro .setting file
    path: PathBuf,
    /// Parent pointer, e.g. / for the root
    #[arg(long, default_value = "/")]
    parent: String,
    /// First child index of the range
    #[arg(long)]
    from: usize,
    /// Last child index of the range (inclusive)
    #[arg(long)]
    to: usize,
    /// Group display name
    #[arg(long)]
    name: String,
    /// Output path; defaults to the derived _edited name
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct PtrArgs {
    /// Macro .setting file
    path: PathBuf,
    /// Node pointer, e.g. /2/0
    #[arg(long)]
    ptr: String,
    /// Output path; defaults to the derived _edited name
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct MoveArgs {
    /// Macro .setting file
    path: PathBuf,
    /// Node pointer, e.g. /2/0
    #[arg(long)]
    ptr: String,
    /// New parent pointer
    #[arg(long)]
    to_parent: String,
    /// Position among the new parent's children
    #[arg(long)]
    index: usize,
    /// Output path; defaults to the derived _edited name
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct WriteArgs {
    /// Macro .setting file
    path: PathBuf,
    /// Output path; defaults to the derived _edited name
    #[arg(long)]
    out: Option<PathBuf>,
    /// Zip-backup the file's directory first
    #[arg(long, default_value_t = false)]
    backup: bool,
}

fn main() {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Dump(a) => cmd_dump(a),
        Cmd::Tree(a) => cmd_tree(a),
        Cmd::List(a) => cmd_list(a),
        Cmd::Rename(a) => cmd_rename(a),
        Cmd::Group(a) => cmd_group(a),
        Cmd::Ungroup(a) => cmd_ungroup(a),
        Cmd::Remove(a) => cmd_remove(a),
        Cmd::Move(a) => cmd_move(a),
        Cmd::Write(a) => cmd_write(a),
        Cmd::Check(a) => cmd_check(a),
        Cmd::Backup(a) => cmd_backup(a),
    }
}

fn load(path: &Path) -> MacroDocument {
    fme_core::parse_file(path).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        process::exit(2);
    })
}

fn resolve(doc: &MacroDocument, ptr: &str) -> NodeId {
    fme_core::node_by_pointer(&doc.tree, ptr).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        process::exit(3);
    })
}

fn apply(result: Result<(), String>) {
    result.unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        process::exit(4);
    });
}

fn save(doc: &mut MacroDocument, source: &Path, out: Option<PathBuf>) {
    match fme_core::write_edited_file(doc, source, out.as_deref()) {
        Ok(dest) => println!("wrote {}", dest.display()),
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(5);
        }
    }
}

fn cmd_dump(args: DumpArgs) {
    let doc = load(&args.path);
    let opts = fme_core::json::JsonOpts {
        include_text: args.text,
        include_hidden: !args.no_hidden,
        ..Default::default()
    };
    print!("{}", fme_core::json::dump_json(&doc, opts));
}

fn cmd_tree(args: FileArgs) {
    let doc = load(&args.path);
    println!("{} ({})", doc.op_name, doc.op_kind.as_str());
    print_children(&doc.tree, Tree::ROOT, 1);
}

fn print_children(tree: &Tree, id: NodeId, depth: usize) {
    for &c in &tree.node(id).children {
        let node = tree.node(c);
        let name = tree.display_name(c);
        let label = match node.kind.type_name() {
            "separator" => "--------".to_string(),
            kind if name.is_empty() => format!("[{}]", kind),
            kind => format!("{} [{}]", name, kind),
        };
        println!(
            "{}{}  {}",
            "  ".repeat(depth),
            label,
            fme_core::pointer_of(tree, c)
        );
        print_children(tree, c, depth + 1);
    }
}

fn cmd_list(args: DirArgs) {
    for path in fme_core::macros::find_setting_files(&args.dir) {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("<file>");
        match fme_core::parse_file(&path) {
            Ok(doc) => println!(
                "{}\t{} ({})\t{} controls, {} groups",
                name,
                doc.op_name,
                doc.op_kind.as_str(),
                doc.diagnostics.control_count,
                doc.diagnostics.group_count
            ),
            Err(e) => println!("{}\tnot a macro: {}", name, e),
        }
    }
}

fn cmd_rename(args: RenameArgs) {
    let mut doc = load(&args.path);
    let id = resolve(&doc, &args.ptr);
    apply(fme_core::rename(&mut doc.tree, id, &args.name));
    save(&mut doc, &args.path, args.out);
}

fn cmd_group(args: GroupArgs) {
    let mut doc = load(&args.path);
    let parent = resolve(&doc, &args.parent);
    let result =
        fme_core::group_range(&mut doc.tree, parent, args.from, args.to, &args.name).map(|_| ());
    apply(result);
    save(&mut doc, &args.path, args.out);
}

fn cmd_ungroup(args: PtrArgs) {
    let mut doc = load(&args.path);
    let id = resolve(&doc, &args.ptr);
    apply(fme_core::ungroup(&mut doc.tree, id));
    save(&mut doc, &args.path, args.out);
}

fn cmd_remove(args: PtrArgs) {
    let mut doc = load(&args.path);
    let id = resolve(&doc, &args.ptr);
    apply(fme_core::remove(&mut doc.tree, id));
    save(&mut doc, &args.path, args.out);
}

fn cmd_move(args: MoveArgs) {
    let mut doc = load(&args.path);
    let id = resolve(&doc, &args.ptr);
    let parent = resolve(&doc, &args.to_parent);
    apply(fme_core::move_node(&mut doc.tree, id, parent, args.index));
    save(&mut doc, &args.path, args.out);
}

fn cmd_write(args: WriteArgs) {
    let mut doc = load(&args.path);
    if args.backup {
        let dir = args.path.parent().unwrap_or(Path::new("."));
        match fme_core::editor::zip_backup_macros(dir) {
            Ok(zip) => println!("backup {}", zip.display()),
            Err(e) => {
                eprintln!("backup error: {}", e);
                process::exit(6);
            }
        }
    }
    save(&mut doc, &args.path, args.out);
}

fn cmd_check(args: FileArgs) {
    let mut doc = load(&args.path);
    let before = fme_core::json::shape_value(&doc);
    let regen = fme_core::regenerate(&mut doc).unwrap_or_else(|e| {
        eprintln!("regenerate error: {}", e);
        process::exit(5);
    });
    let redoc = fme_core::parse_macro(&regen).unwrap_or_else(|e| {
        eprintln!("re-parse error: {}", e);
        process::exit(5);
    });
    let verbatim_a: Vec<&String> = doc
        .segments
        .iter()
        .filter_map(|s| match s {
            fme_core::Segment::Verbatim(t) => Some(t),
            _ => None,
        })
        .collect();
    let verbatim_b: Vec<&String> = redoc
        .segments
        .iter()
        .filter_map(|s| match s {
            fme_core::Segment::Verbatim(t) => Some(t),
            _ => None,
        })
        .collect();
    let mut ok = true;
    if verbatim_a != verbatim_b {
        eprintln!("verbatim segments differ after regeneration");
        ok = false;
    }
    if before != fme_core::json::shape_value(&redoc) {
        eprintln!("tree shape differs after regeneration");
        ok = false;
    }
    if ok {
        println!("ok: {} round-trips cleanly", doc.op_name);
    } else {
        process::exit(7);
    }
}

fn cmd_backup(args: DirArgs) {
    match fme_core::editor::zip_backup_macros(&args.dir) {
        Ok(zip) => println!("backup {}", zip.display()),
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(2);
        }
    }
}
