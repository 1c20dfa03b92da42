//! Architecture enforcement tests.
//!
//! The commit engine in `src/batch/` reaches the hosting service only through
//! the `ObjectStore` trait. Concrete transports live in `src/forge/` and must
//! not depend on the engine. These tests scan the sources so that violations
//! are caught in CI.
//!
//! # Test Categories
//!
//! 1. **Transport Isolation** - `batch` must not name a concrete transport
//! 2. **Layer Direction** - `forge` and `core` must not import `batch`, and
//!    `core` must not import `forge`
//! 3. **Panic Freedom** - engine code outside tests must not unwrap

use std::fs;
use std::path::{Path, PathBuf};

/// Patterns the engine must never reference directly.
const TRANSPORT_PATTERNS: &[&str] = &["reqwest", "GitHubObjectStore", "forge::github", "MockObjectStore"];

/// Patterns that panic on error.
const PANIC_PATTERNS: &[&str] = &[".unwrap()", ".expect(", "panic!(", "unreachable!("];

fn src_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src")
}

/// Rust files directly under `dir`, sorted.
fn rust_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", dir.display(), e))
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "rs"))
        .collect();
    files.sort();
    files
}

/// Non-comment source lines before the `#[cfg(test)]` module.
fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e));

    content
        .lines()
        .enumerate()
        .take_while(|(_, line)| line.trim() != "#[cfg(test)]")
        .filter(|(_, line)| !line.trim_start().starts_with("//"))
        .map(|(i, line)| (i + 1, line.to_string()))
        .collect()
}

/// Every `(file:line, text)` in `files` that contains one of `patterns`.
fn violations(files: &[PathBuf], patterns: &[&str]) -> Vec<String> {
    let mut found = Vec::new();
    for file in files {
        for (line_no, line) in production_lines(file) {
            if patterns.iter().any(|p| line.contains(p)) {
                found.push(format!("{}:{}: {}", file.display(), line_no, line.trim()));
            }
        }
    }
    found
}

#[test]
fn batch_does_not_name_transports() {
    let files = rust_files(&src_dir().join("batch"));
    assert!(!files.is_empty(), "src/batch has no sources");

    let found = violations(&files, TRANSPORT_PATTERNS);
    assert!(
        found.is_empty(),
        "batch must go through the ObjectStore trait:\n{}",
        found.join("\n")
    );
}

#[test]
fn lower_layers_do_not_import_batch() {
    let mut files = rust_files(&src_dir().join("forge"));
    files.push(src_dir().join("core").join("paths.rs"));
    files.push(src_dir().join("core").join("types.rs"));

    let found = violations(&files, &["crate::batch", "use super::super::batch"]);
    assert!(
        found.is_empty(),
        "forge/core must not depend on batch:\n{}",
        found.join("\n")
    );
}

#[test]
fn core_does_not_import_forge() {
    let core = src_dir().join("core");
    let mut files = rust_files(&core);
    files.extend(rust_files(&core.join("config")));
    assert!(
        files.iter().any(|f| f.ends_with("config/mod.rs")),
        "src/core/config was not scanned"
    );

    let found = violations(&files, &["crate::forge", "super::super::forge"]);
    assert!(
        found.is_empty(),
        "core must not depend on forge:\n{}",
        found.join("\n")
    );
}

#[test]
fn engine_code_does_not_panic() {
    let mut files = rust_files(&src_dir().join("batch"));
    files.push(src_dir().join("core").join("paths.rs"));

    let found = violations(&files, PANIC_PATTERNS);
    assert!(
        found.is_empty(),
        "propagate errors instead of panicking:\n{}",
        found.join("\n")
    );
}

#[test]
fn production_lines_stop_at_test_module() {
    let lines = production_lines(&src_dir().join("batch").join("resolve.rs"));
    assert!(lines.iter().any(|(_, l)| l.contains("pub async fn resolve_entries")));
    assert!(!lines.iter().any(|(_, l)| l.contains("mod tests")));
}
