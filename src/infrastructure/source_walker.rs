/// Source discovery.
///
/// Expands the command line path arguments into the list of Python files to
/// index, keeping every produced path relative to the base directory so the
/// database stays relocatable. Directory arguments are scanned one level
/// deep; descending into subdirectories is opt-in, matching the cscope `-R`
/// convention.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Whether a path names Python source.
fn is_python(name: &str) -> bool {
    name.ends_with(".py")
}

/// Expand path arguments into relative source paths.
///
/// Explicit file arguments that are not Python source are dropped without
/// comment, mirroring how cscope treats its name arguments. Missing files
/// are kept; the indexing pass warns about them when it fails to read them.
pub fn collect_sources(basepath: &Path, args: &[String], recurse: bool) -> Vec<String> {
    let mut found = Vec::new();
    for name in args {
        if basepath.join(name).is_dir() {
            scan_dir(basepath, name, recurse, &mut found);
        } else if is_python(name) {
            found.push(name.clone());
        }
    }
    found
}

fn scan_dir(basepath: &Path, relpath: &str, recurse: bool, out: &mut Vec<String>) {
    let dirpath = basepath.join(relpath);
    let entries = match fs::read_dir(&dirpath) {
        Ok(entries) => entries,
        Err(err) => {
            // An unreadable directory should not abort the whole run.
            eprintln!("[pyxref] {}: {}", dirpath.display(), err);
            return;
        }
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        let child = Path::new(relpath).join(&name).to_string_lossy().into_owned();
        if entry.path().is_dir() {
            if recurse {
                scan_dir(basepath, &child, recurse, out);
            }
        } else if is_python(&name) {
            out.push(child);
        }
    }
}

/// Read one source file. Decoding is lossy so a stray non-UTF-8 byte in a
/// comment or string cannot knock the file out of the index.
pub fn read_source(path: &Path) -> Result<String> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read a list file (one path per line) named by the `-i` option. Trailing
/// whitespace is stripped and blank lines are skipped.
pub fn read_source_list(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read source list {}", path.display()))?;
    Ok(text
        .lines()
        .map(|line| line.trim_end().to_string())
        .filter(|line| !line.is_empty())
        .collect())
}
