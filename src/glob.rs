//! Glob pattern resolution.
//!
//! Patterns are matched with the [`glob`](::glob) crate, anchored at the
//! options' base directory. `{a,b}` alternation, which `glob` leaves
//! literal, is expanded first and the results of every alternative are
//! merged.
//!
//! Supported syntax:
//!
//! | Syntax | Matches |
//! |--------|---------|
//! | `*` | any run of characters within one path segment |
//! | `?` | one character within a segment |
//! | `**` | zero or more whole segments |
//! | `[abc]`, `[!abc]` | one character from (or not from) the class |
//! | `{a,b}` | either alternative |
//!
//! A pattern that matches nothing is a configuration error: the build
//! stops with [`GlobError::NoMatches`]. The one exception is a
//! canonical/hashed pair in the same category (`a.css` and `a.*.css`):
//! the hashed half is empty before the first build, the canonical half
//! after it.

use crate::hashname::format_hashed;
use crate::types::{AssetPaths, Category, ExpandedPaths};
use ::glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlobError {
    #[error("Glob \"{0}\" did not match any files")]
    NoMatches(String),
    #[error("Invalid glob \"{pattern}\": {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("IO error while resolving \"{pattern}\": {source}")]
    Walk {
        pattern: String,
        #[source]
        source: ::glob::GlobError,
    },
}

/// Wildcards never cross a `/`; dotfiles match like any other name.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Which kinds of entries a pattern may match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchKind {
    #[default]
    Files,
    Directories,
}

/// Options for [`resolve`].
#[derive(Debug, Clone, Default)]
pub struct GlobOptions {
    /// Base for relative patterns. Empty means the process working directory.
    pub cwd: PathBuf,
    pub kind: MatchKind,
}

impl GlobOptions {
    pub fn files_in(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            kind: MatchKind::Files,
        }
    }

    pub fn directories_in(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            kind: MatchKind::Directories,
        }
    }
}

/// Resolve a pattern to the matching paths, sorted.
///
/// Fails with [`GlobError::NoMatches`] if nothing matches.
pub fn resolve(pattern: &str, options: &GlobOptions) -> Result<Vec<PathBuf>, GlobError> {
    let matches = resolve_lenient(pattern, options)?;
    if matches.is_empty() {
        return Err(GlobError::NoMatches(pattern.to_string()));
    }
    Ok(matches)
}

/// Like [`resolve`], but an empty result is not an error.
pub fn resolve_lenient(pattern: &str, options: &GlobOptions) -> Result<Vec<PathBuf>, GlobError> {
    let mut matches = BTreeSet::new();
    for alternative in expand_braces(pattern) {
        let anchored = anchor(&alternative, &options.cwd);
        let paths = ::glob::glob_with(&anchored, MATCH_OPTIONS).map_err(|e| {
            GlobError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.msg.to_string(),
            }
        })?;
        for entry in paths {
            let path = entry.map_err(|source| GlobError::Walk {
                pattern: pattern.to_string(),
                source,
            })?;
            if kind_matches(&path, options.kind) {
                matches.insert(path);
            }
        }
    }
    Ok(matches.into_iter().collect())
}

/// Expand every category of an asset path configuration.
///
/// The first pattern that matches nothing aborts the expansion, unless it
/// pairs with a sibling pattern that did match: `a.css` and `a.*.css` each
/// cover the asset before and after its first build.
pub fn expand(paths: &AssetPaths, root: &Path) -> Result<ExpandedPaths, GlobError> {
    let options = GlobOptions::files_in(root);
    let mut expanded = ExpandedPaths::default();

    for category in Category::ALL {
        let patterns = paths.patterns(category);
        let resolved = patterns
            .iter()
            .map(|p| resolve_lenient(p, &options))
            .collect::<Result<Vec<_>, _>>()?;

        for (i, (pattern, matches)) in patterns.iter().zip(&resolved).enumerate() {
            if matches.is_empty() {
                let partner_matched = patterns.iter().zip(&resolved).enumerate().any(
                    |(j, (other, found))| j != i && is_hashed_pair(pattern, other) && !found.is_empty(),
                );
                if !partner_matched {
                    tracing::error!(%category, pattern, "pattern matched no files");
                    return Err(GlobError::NoMatches(pattern.clone()));
                }
                tracing::debug!(%category, pattern, "matched nothing, covered by its hashed pair");
                continue;
            }
            tracing::debug!(%category, pattern, count = matches.len(), "pattern resolved");
            expanded.get_mut(category).extend(matches.iter().cloned());
        }
    }

    Ok(expanded)
}

/// `a.css` and `a.*.css` name the same asset before and after hashing.
fn is_hashed_pair(a: &str, b: &str) -> bool {
    format_hashed(a, "*") == b || format_hashed(b, "*") == a
}

fn kind_matches(path: &Path, kind: MatchKind) -> bool {
    match kind {
        MatchKind::Files => path.is_file(),
        MatchKind::Directories => path.is_dir(),
    }
}

/// Prefix a relative pattern with the escaped base directory.
fn anchor(pattern: &str, cwd: &Path) -> String {
    if cwd.as_os_str().is_empty() || Path::new(pattern).is_absolute() {
        return pattern.to_string();
    }
    let base = Pattern::escape(&cwd.to_string_lossy());
    format!("{}/{}", base.trim_end_matches('/'), pattern)
}

/// Expand `{a,b}` alternation into one pattern per alternative.
///
/// Groups without a top-level comma, and unbalanced braces, are kept as
/// written.
fn expand_braces(pattern: &str) -> Vec<String> {
    let Some((open, close)) = alternation(pattern) else {
        return vec![pattern.to_string()];
    };
    let (head, body, tail) = (&pattern[..open], &pattern[open + 1..close], &pattern[close + 1..]);
    split_top_level(body)
        .into_iter()
        .flat_map(|alternative| expand_braces(&format!("{head}{alternative}{tail}")))
        .collect()
}

/// Byte offsets of the first balanced `{...}` holding a top-level comma.
fn alternation(pattern: &str) -> Option<(usize, usize)> {
    let mut open = 0;
    let mut depth = 0usize;
    let mut has_comma = false;
    for (i, c) in pattern.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    open = i;
                    has_comma = false;
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 && has_comma {
                    return Some((open, i));
                }
            }
            ',' if depth == 1 => has_comma = true,
            _ => {}
        }
    }
    None
}

fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_file;
    use tempfile::TempDir;

    fn names(paths: &[PathBuf], root: &Path) -> Vec<String> {
        paths
            .iter()
            .map(|p| crate::types::to_slash(p.strip_prefix(root).unwrap()))
            .collect()
    }

    fn fixture() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "src/stylesheets/colors.css", "a");
        write_file(tmp.path(), "src/stylesheets/home.1a2b3c4d.css", "b");
        write_file(tmp.path(), "src/javascripts/index.ts", "c");
        write_file(tmp.path(), "src/fonts/inter.woff", "d");
        write_file(tmp.path(), "src/fonts/inter.woff2", "e");
        write_file(tmp.path(), "src/images/hero/anime/anime_1280.webp", "f");
        write_file(tmp.path(), "src/images/hero/comic/comic_1920.webp", "g");
        write_file(tmp.path(), "src/images/logo.svg", "h");
        tmp
    }

    #[test]
    fn star_matches_within_segment() {
        let tmp = fixture();
        let found = resolve("src/stylesheets/*.css", &GlobOptions::files_in(tmp.path())).unwrap();
        assert_eq!(
            names(&found, tmp.path()),
            ["src/stylesheets/colors.css", "src/stylesheets/home.1a2b3c4d.css"]
        );
    }

    #[test]
    fn globstar_crosses_directories() {
        let tmp = fixture();
        let found = resolve("src/images/hero/**/*.webp", &GlobOptions::files_in(tmp.path())).unwrap();
        assert_eq!(
            names(&found, tmp.path()),
            [
                "src/images/hero/anime/anime_1280.webp",
                "src/images/hero/comic/comic_1920.webp"
            ]
        );
    }

    #[test]
    fn braces_select_alternatives() {
        let tmp = fixture();
        let found = resolve("src/fonts/*.{woff,woff2}", &GlobOptions::files_in(tmp.path())).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn question_mark_and_class() {
        let tmp = fixture();
        let opts = GlobOptions::files_in(tmp.path());
        assert_eq!(resolve("src/fonts/inter.woff?", &opts).unwrap().len(), 1);
        assert_eq!(resolve("src/images/[kl]ogo.svg", &opts).unwrap().len(), 1);
        assert!(resolve_lenient("src/images/[!l]ogo.svg", &opts).unwrap().is_empty());
    }

    #[test]
    fn literal_pattern() {
        let tmp = fixture();
        let found = resolve("src/images/logo.svg", &GlobOptions::files_in(tmp.path())).unwrap();
        assert_eq!(found, [tmp.path().join("src/images/logo.svg")]);
    }

    #[test]
    fn directories_only() {
        let tmp = fixture();
        let found = resolve("src/images/hero/*", &GlobOptions::directories_in(tmp.path())).unwrap();
        assert_eq!(
            names(&found, tmp.path()),
            ["src/images/hero/anime", "src/images/hero/comic"]
        );
    }

    #[test]
    fn no_matches_is_an_error() {
        let tmp = fixture();
        let err = resolve("src/stylesheets/*.scss", &GlobOptions::files_in(tmp.path())).unwrap_err();
        assert!(matches!(err, GlobError::NoMatches(p) if p == "src/stylesheets/*.scss"));
    }

    #[test]
    fn missing_base_directory_is_no_match() {
        let tmp = fixture();
        let err = resolve("nowhere/*.css", &GlobOptions::files_in(tmp.path())).unwrap_err();
        assert!(matches!(err, GlobError::NoMatches(_)));
    }

    #[test]
    fn unterminated_class_is_invalid() {
        let tmp = fixture();
        let err = resolve("src/[abc", &GlobOptions::files_in(tmp.path())).unwrap_err();
        assert!(matches!(err, GlobError::InvalidPattern { .. }));
    }

    #[test]
    fn negated_class_stays_within_a_segment() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "src/a/b.css", "x");
        let found = resolve_lenient("src/**/a[!x]b.css", &GlobOptions::files_in(tmp.path())).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn bracket_can_be_matched_through_a_class() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "src/[a.css", "x");
        let found = resolve("src/[[]a.css", &GlobOptions::files_in(tmp.path())).unwrap();
        assert_eq!(found, [tmp.path().join("src/[a.css")]);
    }

    #[test]
    fn base_directory_is_not_a_pattern() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("site[1]");
        write_file(&base, "a.css", "x");
        let found = resolve("*.css", &GlobOptions::files_in(&base)).unwrap();
        assert_eq!(found, [base.join("a.css")]);
    }

    #[test]
    fn braces_expand_nested_and_keep_lone_groups() {
        assert_eq!(expand_braces("a.{css,{js,ts}}"), ["a.css", "a.js", "a.ts"]);
        assert_eq!(expand_braces("{x}/*.{a,b}"), ["{x}/*.a", "{x}/*.b"]);
        assert_eq!(expand_braces("plain/*.css"), ["plain/*.css"]);
        assert_eq!(expand_braces("open{a,b"), ["open{a,b"]);
    }

    #[test]
    fn expand_tolerates_empty_hashed_variant() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "a.css", "X");
        let paths = AssetPaths {
            style_sheets: vec!["a.css".into(), "a.*.css".into()],
            scripts: vec![],
            fonts: vec![],
            images: vec![],
        };
        let expanded = expand(&paths, tmp.path()).unwrap();
        assert_eq!(expanded.style_sheets.len(), 1);
        assert_eq!(expanded.total(), 1);
    }

    #[test]
    fn expand_tolerates_missing_canonical_after_hashing() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "a.1a2b3c4d.css", "X");
        let paths = AssetPaths {
            style_sheets: vec!["a.css".into(), "a.*.css".into()],
            scripts: vec![],
            fonts: vec![],
            images: vec![],
        };
        let expanded = expand(&paths, tmp.path()).unwrap();
        assert_eq!(
            expanded.style_sheets.into_iter().collect::<Vec<_>>(),
            [tmp.path().join("a.1a2b3c4d.css")]
        );
    }

    #[test]
    fn expand_fails_when_both_halves_of_a_pair_are_empty() {
        let tmp = TempDir::new().unwrap();
        let paths = AssetPaths {
            style_sheets: vec!["a.css".into(), "a.*.css".into()],
            scripts: vec![],
            fonts: vec![],
            images: vec![],
        };
        let err = expand(&paths, tmp.path()).unwrap_err();
        assert!(matches!(err, GlobError::NoMatches(p) if p == "a.css"));
    }

    #[test]
    fn expand_fails_on_unmatched_pattern() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "a.css", "X");
        let paths = AssetPaths {
            style_sheets: vec!["a.css".into()],
            scripts: vec!["src/*.ts".into()],
            fonts: vec![],
            images: vec![],
        };
        let err = expand(&paths, tmp.path()).unwrap_err();
        assert!(matches!(err, GlobError::NoMatches(p) if p == "src/*.ts"));
    }

    #[test]
    fn expand_deduplicates_overlapping_patterns() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "a.css", "X");
        write_file(tmp.path(), "a.1a2b3c4d.css", "X");
        let paths = AssetPaths {
            style_sheets: vec!["*.css".into(), "a.*.css".into()],
            scripts: vec![],
            fonts: vec![],
            images: vec![],
        };
        let expanded = expand(&paths, tmp.path()).unwrap();
        assert_eq!(expanded.style_sheets.len(), 2);
    }
}
