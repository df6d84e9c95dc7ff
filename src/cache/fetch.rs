//! Network seam for the asset cache.
//!
//! [`DirFetcher`] serves URLs from a built site directory, which is what
//! the `cache` CLI subcommands fetch against.

use super::CacheError;
use std::path::{Component, Path, PathBuf};

/// A fetched response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// URL the body was served from.
    pub url: String,
    pub body: Vec<u8>,
}

pub trait Fetcher {
    fn fetch(&mut self, url: &str) -> Result<Response, CacheError>;
}

/// Serves URLs from files under a site root.
///
/// Absolute paths (`/assets/x.css`) and `scheme://host/...` URLs resolve
/// against the site root; relative URLs resolve against `base`, a
/// directory inside the site root (the directory of the page).
#[derive(Debug, Clone)]
pub struct DirFetcher {
    site_root: PathBuf,
    base: PathBuf,
}

impl DirFetcher {
    pub fn new(site_root: impl Into<PathBuf>) -> Self {
        Self {
            site_root: site_root.into(),
            base: PathBuf::new(),
        }
    }

    /// Resolve relative URLs against `base` (relative to the site root).
    pub fn with_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = base.into();
        self
    }

    /// File a URL maps to, or `None` if it escapes the site root.
    pub fn resolve(&self, url: &str) -> Option<PathBuf> {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let path = match path.split_once("://") {
            Some((_, rest)) => rest.find('/').map_or("/", |i| &rest[i..]),
            None => path,
        };
        let (start, rest) = match path.strip_prefix('/') {
            Some(rest) => (PathBuf::new(), rest),
            None => (self.base.clone(), path),
        };

        let mut resolved = start;
        for component in Path::new(rest).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::ParentDir => {
                    if !resolved.pop() {
                        return None;
                    }
                }
                Component::CurDir => {}
                Component::RootDir | Component::Prefix(_) => return None,
            }
        }
        Some(self.site_root.join(resolved))
    }
}

impl Fetcher for DirFetcher {
    fn fetch(&mut self, url: &str) -> Result<Response, CacheError> {
        let fetch_err = |reason: String| CacheError::Fetch {
            url: url.to_string(),
            reason,
        };
        let path = self
            .resolve(url)
            .ok_or_else(|| fetch_err("outside site root".to_string()))?;
        let body = std::fs::read(&path).map_err(|e| fetch_err(format!("{}: {e}", path.display())))?;
        Ok(Response {
            url: url.to_string(),
            body,
        })
    }
}
