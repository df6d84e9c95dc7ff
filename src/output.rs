//! CLI output formatting.
//!
//! Every command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.
//!
//! ## Build
//!
//! ```text
//! styleSheets (1 file)
//!     stylesheets/home.1a2b3c4d.css: hashed
//! fonts (1 file)
//!     fonts/inter.5e6f7a8b.woff2: unchanged
//!
//! SVG 1 minified, 0 unchanged
//! Published 1 copied, 1 already present, 0 stale removed
//!
//! Bundles
//! site (browser, 2 entries)
//!     assets/stylesheets/home.1a2b3c4d.css
//!     assets/javascripts/index.9c8d7e6f.js
//!
//! Hero 3 images
//! Manifest docs/assets/manifest.json (12 entries)
//! ```
//!
//! Paths are shown relative to the project root where possible.

use crate::cache::{CleanReport, WarmReport};
use crate::pipeline::BuildReport;
use crate::rewrite::Outcome;
use crate::types::{Category, ExpandedPaths, to_slash};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    match (n, word.strip_suffix('y')) {
        (1, _) => format!("{n} {word}"),
        (_, Some(stem)) => format!("{n} {stem}ies"),
        _ => format!("{n} {word}s"),
    }
}

/// `path` relative to `base` with `/` separators, or the full path.
fn display_path(path: &Path, base: &Path) -> String {
    match path.strip_prefix(base) {
        Ok(rel) => to_slash(rel),
        Err(_) => path.display().to_string(),
    }
}

fn outcome_label(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Hashed => "hashed".to_string(),
        Outcome::Unchanged => "unchanged".to_string(),
        Outcome::Rehashed { previous } => format!("rehashed (was {previous})"),
        Outcome::Failed(reason) => format!("FAILED: {reason}"),
    }
}

// ============================================================================
// Check
// ============================================================================

/// Format the resolved inputs per category.
///
/// ```text
/// styleSheets (2 files)
///     src/stylesheets/home.css
///     src/stylesheets/home.1a2b3c4d.css
/// ```
pub fn format_check_output(expanded: &ExpandedPaths, root: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    for category in Category::ALL {
        let files = expanded.get(category);
        lines.push(format!("{category} ({})", plural(files.len(), "file")));
        for file in files {
            lines.push(format!("{}{}", indent(1), display_path(file, root)));
        }
    }
    lines.push(format!("{} resolved", plural(expanded.total(), "file")));
    lines
}

pub fn print_check_output(expanded: &ExpandedPaths, root: &Path) {
    for line in format_check_output(expanded, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_report(report: &BuildReport, root: &Path) -> Vec<String> {
    let mut lines = Vec::new();

    for (category, rewrite) in &report.rewrites {
        if rewrite.assets.is_empty() {
            continue;
        }
        lines.push(format!("{category} ({})", plural(rewrite.assets.len(), "file")));
        for asset in &rewrite.assets {
            lines.push(format!(
                "{}{}: {}",
                indent(1),
                display_path(&asset.path, root),
                outcome_label(&asset.outcome)
            ));
        }
    }

    let m = &report.materialized;
    lines.push(String::new());
    let svgs = &report.svgs;
    if svgs.minified + svgs.unchanged + svgs.failed > 0 {
        lines.push(format!(
            "SVG {} minified, {} unchanged",
            svgs.minified, svgs.unchanged
        ));
        if svgs.failed > 0 {
            lines.push(format!("{}{} not minified", indent(1), plural(svgs.failed, "file")));
        }
    }
    lines.push(format!(
        "Published {} copied, {} already present, {} stale removed",
        m.copied, m.skipped, report.stale_removed
    ));
    if m.failed > 0 {
        lines.push(format!("{}{} failed to copy", indent(1), plural(m.failed, "file")));
    }

    if !report.bundles.is_empty() {
        lines.push(String::new());
        lines.push("Bundles".to_string());
        for bundle in &report.bundles {
            lines.push(format!(
                "{} ({}, {})",
                bundle.project,
                bundle.platform,
                plural(bundle.entries, "entry")
            ));
            for output in &bundle.outputs {
                lines.push(format!("{}{}", indent(1), output));
            }
        }
    }

    lines.push(String::new());
    lines.push(format!("Hero {}", plural(report.hero_images, "image")));
    lines.push(format!(
        "Manifest {} ({})",
        display_path(&report.manifest_path, root),
        plural(report.manifest.entries.len(), "entry")
    ));

    let failures = report.failures();
    if failures > 0 {
        lines.push(format!(
            "{} failed; the next build will retry",
            plural(failures, "operation")
        ));
    }
    lines
}

pub fn print_build_report(report: &BuildReport, root: &Path) {
    for line in format_build_report(report, root) {
        println!("{}", line);
    }
}

// ============================================================================
// Cache
// ============================================================================

pub fn format_warm_report(report: &WarmReport, removed_caches: &[String]) -> Vec<String> {
    let mut lines: Vec<String> = removed_caches
        .iter()
        .map(|name| format!("Removed cache {name}"))
        .collect();
    lines.push(format!(
        "Warmed {} fetched, {} already cached, {} failed",
        report.fetched, report.hits, report.failed
    ));
    lines
}

pub fn print_warm_report(report: &WarmReport, removed_caches: &[String]) {
    for line in format_warm_report(report, removed_caches) {
        println!("{}", line);
    }
}

pub fn format_clean_report(report: &CleanReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .deleted
        .iter()
        .map(|key| format!("{}deleted {key}", indent(1)))
        .collect();
    lines.push(format!(
        "Cleaned {} kept, {} deleted, {} failed",
        report.kept,
        report.deleted.len(),
        report.failed
    ));
    lines
}

pub fn print_clean_report(report: &CleanReport) {
    for line in format_clean_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
