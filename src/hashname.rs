//! The hashed-filename grammar, shared by the build and the runtime cache.
//!
//! Every cache-busted asset carries an 8-character lower-case hex content
//! hash as the second-to-last dot segment of its file name:
//!
//! ```text
//! bundle.js              → canonical (never hashed)
//! bundle.3fa9c2d1.js     → hashed, hash = 3fa9c2d1
//! palette.3fa9c2d1.min.css  → not hashed: the hash must sit right before the extension
//! ```
//!
//! Runtime URLs may alternatively carry the hash in a query parameter
//! (`hero.webp?v=3fa9c2d1` or `?hash=3fa9c2d1`). [`extract_hash_from_url`]
//! understands both forms; the filename form wins when both are present.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Length of the content hash embedded in file names.
pub const HASH_LEN: usize = 8;

/// `name.<hash>.ext` where `name` itself may contain dots.
static HASHED_FILE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<stem>.+)\.(?P<hash>[a-f0-9]{8})\.(?P<ext>[^./]+)$")
        .expect("hashed file name pattern is valid")
});

/// Hash segment immediately before the extension at the end of a URL path.
static URL_PATH_HASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.([a-f0-9]{8})\.[^/.]+$").expect("url hash pattern is valid")
});

/// `v=` or `hash=` query parameter carrying a hash.
static URL_QUERY_HASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|&)(?:v|hash)=([a-f0-9]{8})(?:&|$)").expect("query hash pattern is valid")
});

/// A file name split into its canonical stem, embedded hash and extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedName {
    pub stem: String,
    pub hash: String,
    pub ext: String,
}

impl HashedName {
    /// Parse `name.<hash>.ext`. Returns `None` for names without an
    /// embedded hash.
    pub fn parse(file_name: &str) -> Option<Self> {
        let caps = HASHED_FILE_NAME.captures(file_name)?;
        Some(Self {
            stem: caps["stem"].to_string(),
            hash: caps["hash"].to_string(),
            ext: caps["ext"].to_string(),
        })
    }

    /// The file name with the hash segment removed (`name.ext`).
    pub fn canonical(&self) -> String {
        format!("{}.{}", self.stem, self.ext)
    }
}

impl std::fmt::Display for HashedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.stem, self.hash, self.ext)
    }
}

/// Insert `hash` before the extension of a canonical file name.
///
/// - `"bundle.js"` → `"bundle.<hash>.js"`
/// - `"main.min.css"` → `"main.min.<hash>.css"`
/// - `"LICENSE"` → `"LICENSE.<hash>"` (no extension to preserve)
pub fn format_hashed(file_name: &str, hash: &str) -> String {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}.{}{}", &file_name[..dot], hash, &file_name[dot..]),
        _ => format!("{file_name}.{hash}"),
    }
}

/// Embedded hash of a path's file name, if any.
pub fn hash_of_path(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    HashedName::parse(name).map(|h| h.hash)
}

/// Canonical (unhashed) sibling of a path. Paths without a hash are
/// returned unchanged.
pub fn canonical_path(path: &Path) -> PathBuf {
    let parsed = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(HashedName::parse);
    match parsed {
        Some(name) => path.with_file_name(name.canonical()),
        None => path.to_path_buf(),
    }
}

/// Path of `canonical` renamed to embed `hash`.
pub fn hashed_path(canonical: &Path, hash: &str) -> PathBuf {
    let name = canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    canonical.with_file_name(format_hashed(&name, hash))
}

/// Extract the content hash a URL carries.
///
/// Looks at the path first (`/assets/app.1a2b3c4d.js`), then at the
/// `v` / `hash` query parameters. Fragments are ignored.
pub fn extract_hash_from_url(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let (path, query) = match without_fragment.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (without_fragment, None),
    };
    if let Some(caps) = URL_PATH_HASH.captures(path) {
        return Some(caps[1].to_string());
    }
    let caps = URL_QUERY_HASH.captures(query?)?;
    Some(caps[1].to_string())
}
