//! Static file materialisation.
//!
//! Fonts and images are not bundled; their reconciled (hashed) source files
//! are copied verbatim into the publish directory. The destination of
//! `source_root/x/y.<h>.woff2` is `publish_root/x/y.<h>.woff2`.
//!
//! Existing destinations are skipped: a hashed name identifies its content,
//! so a file that is already there is already correct. Per-file failures
//! are logged and counted; the rest of the batch still runs.

use crate::types::Layout;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied(PathBuf),
    Skipped(PathBuf),
    Failed { source: PathBuf, reason: String },
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MaterializeReport {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Publish paths of every file that is in place after the run.
    pub published: Vec<PathBuf>,
}

/// Copy every file to its publish mirror.
pub fn materialize(files: &[PathBuf], layout: &Layout) -> MaterializeReport {
    let outcomes: Vec<CopyOutcome> = files.par_iter().map(|f| copy_one(f, layout)).collect();

    let mut report = MaterializeReport::default();
    for outcome in outcomes {
        match outcome {
            CopyOutcome::Copied(dest) => {
                report.copied += 1;
                report.published.push(dest);
            }
            CopyOutcome::Skipped(dest) => {
                report.skipped += 1;
                report.published.push(dest);
            }
            CopyOutcome::Failed { .. } => report.failed += 1,
        }
    }
    report.published.sort();
    report
}

fn copy_one(source: &Path, layout: &Layout) -> CopyOutcome {
    let failed = |reason: String| {
        tracing::warn!(source = %source.display(), %reason, "copy failed");
        CopyOutcome::Failed {
            source: source.to_path_buf(),
            reason,
        }
    };

    let Some(dest) = layout.mirror_of(source) else {
        return failed(format!(
            "outside source root {}",
            layout.source_root.display()
        ));
    };
    if dest.exists() {
        tracing::debug!(dest = %dest.display(), "already published");
        return CopyOutcome::Skipped(dest);
    }
    if let Some(parent) = dest.parent()
        && let Err(e) = fs::create_dir_all(parent)
    {
        return failed(format!("cannot create {}: {e}", parent.display()));
    }
    match fs::copy(source, &dest) {
        Ok(_) => {
            tracing::info!(dest = %dest.display(), "published");
            CopyOutcome::Copied(dest)
        }
        Err(e) => failed(e.to_string()),
    }
}

/// Remove files under each publish `dir` that are not among `keep`.
///
/// Returns the number of files removed. Missing directories are ignored.
pub fn clear_stale(dirs: &[PathBuf], keep: &[PathBuf]) -> usize {
    let keep: BTreeSet<&Path> = keep.iter().map(PathBuf::as_path).collect();
    let mut removed = 0;
    for dir in dirs.iter().filter(|d| d.is_dir()) {
        for entry in WalkDir::new(dir).into_iter().filter_map(Result::ok) {
            let path = entry.path();
            if !entry.file_type().is_file() || keep.contains(path) {
                continue;
            }
            match fs::remove_file(path) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "removed stale publish file");
                    removed += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot remove stale file")
                }
            }
        }
    }
    removed
}
