use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::FileOptions;

use crate::setting::{HELPER_KIND, HELPER_NAME};

// Zip backup of every .setting under a directory (non-destructive)
pub fn zip_backup_macros(dir: &Path) -> io::Result<PathBuf> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "not a directory",
        ));
    }
    let parent = dir.parent().unwrap_or(Path::new("."));
    let name = dir.file_name().and_then(|s| s.to_str()).unwrap_or("macros");
    let ts = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let zip_name = format!("{}_{}.zip", name, ts);
    let dest = parent.join(zip_name);

    let file = fs::File::create(&dest)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| io::Error::other(e.to_string()))?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("setting") {
            continue;
        }
        let rel = path
            .strip_prefix(dir)
            .map_err(|e| io::Error::other(e.to_string()))?;
        let name = rel.to_string_lossy().replace('\\', "/");
        zip.start_file(name, options)?;
        let data = fs::read(path)?;
        zip.write_all(&data)?;
    }
    zip.finish()?;
    Ok(dest)
}

#[derive(Debug, Clone)]
pub enum FixtureInput<'a> {
    Control {
        key: &'a str,
        source: &'a str,
        name: Option<&'a str>,
        page: Option<&'a str>,
    },
    Group {
        label: &'a str,
        name: &'a str,
        size: usize,
        depth: u32,
    },
    Separator {
        key: &'a str,
    },
}

// Test helper: build a minimal macro .setting payload. The helper node is
// only included when the input list references at least one group label,
// which also exercises the helper-absent path for plain fixtures.
pub fn build_macro_text(name: &str, inputs: &[FixtureInput<'_>]) -> String {
    let mut decls = String::new();
    let mut labels: Vec<(&str, &str, usize, u32)> = Vec::new();
    for inp in inputs {
        match inp {
            FixtureInput::Control {
                key,
                source,
                name,
                page,
            } => {
                decls.push_str(&format!(
                    "\t\t\t\t{key} = InstanceInput {{\n\t\t\t\t\tSourceOp = \"Background1\",\n\t\t\t\t\tSource = \"{source}\",\n"
                ));
                if let Some(n) = name {
                    decls.push_str(&format!("\t\t\t\t\tName = \"{n}\",\n"));
                }
                if let Some(p) = page {
                    decls.push_str(&format!("\t\t\t\t\tPage = \"{p}\",\n"));
                }
                decls.push_str("\t\t\t\t},\n");
            }
            FixtureInput::Group {
                label,
                name,
                size,
                depth,
            } => {
                labels.push((*label, *name, *size, *depth));
                decls.push_str(&format!(
                    "\t\t\t\t{label} = InstanceInput {{\n\t\t\t\t\tSourceOp = \"{HELPER_NAME}\",\n\t\t\t\t\tSource = \"{label}\",\n\t\t\t\t}},\n"
                ));
            }
            FixtureInput::Separator { key } => {
                decls.push_str(&format!(
                    "\t\t\t\t{key} = InstanceInput {{\n\t\t\t\t\tSourceOp = \"{HELPER_NAME}\",\n\t\t\t\t\tSource = \"Separator\",\n\t\t\t\t}},\n"
                ));
            }
        }
    }
    let helper = if labels.is_empty() {
        String::new()
    } else {
        let mut uc = String::new();
        uc.push_str(
            "\t\t\t\t\t\tSeparator = {\n\
             \t\t\t\t\t\t\tLINKS_Name = \" \",\n\
             \t\t\t\t\t\t\tLINKID_DataType = \"Number\",\n\
             \t\t\t\t\t\t\tINPID_InputControl = \"SeparatorControl\",\n\
             \t\t\t\t\t\t\tINP_External = false,\n\
             \t\t\t\t\t\t\tINP_Passive = true,\n\
             \t\t\t\t\t\t},\n",
        );
        for (label, gname, size, depth) in &labels {
            uc.push_str(&format!(
                "\t\t\t\t\t\t{label} = {{\n\
                 \t\t\t\t\t\t\tLINKS_Name = \"{gname}\",\n\
                 \t\t\t\t\t\t\tLINKID_DataType = \"Number\",\n\
                 \t\t\t\t\t\t\tLBLC_DropDownButton = true,\n\
                 \t\t\t\t\t\t\tLBLC_NumInputs = {size},\n\
                 \t\t\t\t\t\t\tLBLC_NestLevel = {depth},\n\
                 \t\t\t\t\t\t\tINPID_InputControl = \"LabelControl\",\n\
                 \t\t\t\t\t\t\tINP_External = false,\n\
                 \t\t\t\t\t\t\tINP_Passive = true,\n\
                 \t\t\t\t\t\t}},\n"
            ));
        }
        format!(
            "\t\t\t\t{HELPER_NAME} = {HELPER_KIND} {{\n\
             \t\t\t\t\tCtrlWZoom = false,\n\
             \t\t\t\t\tUserControls = ordered() {{\n\
             {uc}\t\t\t\t\t}}\n\
             \t\t\t\t}},\n"
        )
    };
    format!(
        "{{\n\
         \tTools = ordered() {{\n\
         \t\t{name} = MacroOperator {{\n\
         \t\t\tInputs = ordered() {{\n\
         {decls}\t\t\t}},\n\
         \t\t\tOutputs = ordered() {{\n\
         \t\t\t\tMainOutput1 = InstanceOutput {{\n\
         \t\t\t\t\tSourceOp = \"Background1\",\n\
         \t\t\t\t\tSource = \"Output\",\n\
         \t\t\t\t}}\n\
         \t\t\t}},\n\
         \t\t\tViewInfo = GroupInfo {{\n\
         \t\t\t\tSize = {{ 200, 150 }}\n\
         \t\t\t}},\n\
         \t\t\tTools = ordered() {{\n\
         {helper}\t\t\t\tBackground1 = Background {{\n\
         \t\t\t\t\tInputs = {{\n\
         \t\t\t\t\t\tWidth = Input {{ Value = 1920, }},\n\
         \t\t\t\t\t\tHeight = Input {{ Value = 1080, }},\n\
         \t\t\t\t\t}},\n\
         \t\t\t\t}},\n\
         \t\t\t}},\n\
         \t\t}}\n\
         \t}}\n\
         }}\n"
    )
}
