//! Shared test utilities for the plain-assets test suite.
//!
//! Fixture writers and directory listings used by the build-stage tests,
//! plus a ready-made [`Layout`] rooted in a temp directory.
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let layout = layout_in(tmp.path());
//! write_file(tmp.path(), "src/fonts/inter.woff2", "font");
//! assert_eq!(files_under(tmp.path(), "src/fonts"), ["inter.woff2"]);
//! ```

use crate::types::{Layout, to_slash};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_file(root: &Path, relative: &str, content: &str) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// The standard `src/` → `docs/assets/` layout under `root`.
pub fn layout_in(root: &Path) -> Layout {
    Layout {
        source_root: root.join("src"),
        publish_root: root.join("docs/assets"),
        site_root: root.join("docs"),
    }
}

// =========================================================================
// Listings
// =========================================================================

/// All files below `root/relative`, as sorted `/`-separated paths relative
/// to that directory. Empty if the directory does not exist.
pub fn files_under(root: &Path, relative: &str) -> Vec<String> {
    let dir = root.join(relative);
    if !dir.is_dir() {
        return Vec::new();
    }
    let mut files: Vec<String> = WalkDir::new(&dir)
        .min_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| to_slash(e.path().strip_prefix(&dir).unwrap()))
        .collect();
    files.sort();
    files
}

/// Read a file under `root` to a string. Panics with the path on failure.
pub fn read(root: &Path, relative: &str) -> String {
    let path = root.join(relative);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}
