use std::fs;
use std::path::{Path, PathBuf};

pub fn find_setting_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Ok(rd) = fs::read_dir(dir) {
        for entry in rd.flatten() {
            let p = entry.path();
            if p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("setting") {
                out.push(p);
            }
        }
    }
    out.sort();
    out
}

/// Cheap sniff for an operator header, without a full parse.
pub fn is_macro_file(path: &Path) -> bool {
    match fs::read_to_string(path) {
        Ok(text) => text.contains("MacroOperator") || text.contains("GroupOperator"),
        Err(_) => false,
    }
}
