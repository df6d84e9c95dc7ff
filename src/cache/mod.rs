//! Content-addressed asset cache.
//!
//! The runtime counterpart of the build: asset URLs embed the content hash
//! (`app.1a2b3c4d.js` or `logo.svg?v=1a2b3c4d`), so a stored response is
//! valid exactly as long as its hash is the one being asked for.
//!
//! # Lookup states
//!
//! | State | Condition | Action |
//! |-------|-----------|--------|
//! | `Miss` | no entry for the URL | fetch, store |
//! | `HitValid` | entry's URL hash == requested hash | serve stored body |
//! | `HitStale` | entry's URL hash != requested hash | delete, fetch, store |
//!
//! # Cleaning
//!
//! [`AssetCache::clean_cache`] bounds growth across deployments: it lists
//! every key first, then deletes each entry whose hash is not referenced by
//! the current page ([`document::referenced_hashes`]). Entries without an
//! extractable hash are deleted too. Failures are logged and counted,
//! never returned. [`CleanupSchedule`] runs the pass once per page load,
//! after a delay.
//!
//! Hero images are kept in their own store, [`image_store_name`], which
//! [`warm_page`] fills from a page's `<img>` references.
//!
//! Storage and network are injected through [`CacheStore`] and
//! [`Fetcher`]; nothing here touches a global.

pub mod document;
pub mod fetch;
pub mod store;

pub use fetch::{DirFetcher, Fetcher, Response};
pub use store::{CacheRegistry, CacheStore, DiskRegistry, DiskStore, MemoryStore, StoredResponse};

use crate::hashname::extract_hash_from_url;
use crate::hero::RuntimeSettings;
use document::{Reference, ReferenceKind};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use thiserror::Error;

/// Current generation of the static asset cache.
pub const STATIC_CACHE_NAME: &str = "static-assets-cache-v1";
/// Delay between page load and the cleaning pass.
pub const DEFAULT_CLEAN_DELAY_MS: u64 = 5_000;
/// Database and object store of the hero image cache.
pub const IMAGE_DB_NAME: &str = "ImageCacheDB";
pub const IMAGE_STORE_NAME: &str = "images";

/// Registry name of the hero image store (`ImageCacheDB/images`).
///
/// It lives outside the `static-assets-cache-v<N>` generations, so
/// [`delete_old_caches`] never drops it.
pub fn image_store_name() -> String {
    format!("{IMAGE_DB_NAME}/{IMAGE_STORE_NAME}")
}

static CACHE_GENERATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^static-assets-cache-v\d+$").expect("cache generation pattern is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("Cache {op} failed for {key}: {reason}")]
    Store {
        op: &'static str,
        key: String,
        reason: String,
    },
}

/// How a request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Miss,
    HitValid,
    HitStale,
}

/// Store key for a URL: the URL without its fragment.
pub fn cache_key(url: &str) -> &str {
    url.split('#').next().unwrap_or(url)
}

/// A cache store paired with the fetcher that fills it.
#[derive(Debug)]
pub struct AssetCache<S, F> {
    store: S,
    fetcher: F,
}

impl<S: CacheStore, F: Fetcher> AssetCache<S, F> {
    pub fn new(store: S, fetcher: F) -> Self {
        Self { store, fetcher }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn into_parts(self) -> (S, F) {
        (self.store, self.fetcher)
    }

    /// Serve `url` from the cache, fetching on a miss or a stale hit.
    pub fn get_asset(&mut self, url: &str) -> Result<Response, CacheError> {
        self.lookup(url).map(|(response, _)| response)
    }

    /// [`get_asset`](Self::get_asset), also reporting the lookup state.
    pub fn lookup(&mut self, url: &str) -> Result<(Response, Lookup), CacheError> {
        let key = cache_key(url);
        let result = match self.store.get(key)? {
            None => self.fetch_and_store(url).map(|r| (r, Lookup::Miss)),
            Some(stored) if extract_hash_from_url(&stored.url) == extract_hash_from_url(url) => {
                tracing::debug!(url, "cache hit");
                Ok((
                    Response {
                        url: stored.url,
                        body: stored.body,
                    },
                    Lookup::HitValid,
                ))
            }
            Some(stored) => {
                self.store.delete(key)?;
                let fetched = self.fetch_and_store(url)?;
                tracing::info!(url, previous = %stored.url, "asset updated");
                Ok((fetched, Lookup::HitStale))
            }
        };
        if let Err(e) = &result {
            tracing::error!(url, error = %e, "get_asset failed");
        }
        result
    }

    fn fetch_and_store(&mut self, url: &str) -> Result<Response, CacheError> {
        let response = self.fetcher.fetch(url)?;
        self.store.put(
            cache_key(url),
            StoredResponse {
                url: response.url.clone(),
                body: response.body.clone(),
            },
        )?;
        tracing::info!(url, bytes = response.body.len(), "asset cached");
        Ok(response)
    }

    /// Delete every entry whose hash is not in `referenced`.
    pub fn clean_cache(&mut self, referenced: &HashSet<String>) -> CleanReport {
        let mut report = CleanReport::default();
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!(error = %e, "cannot enumerate cache");
                report.failed += 1;
                return report;
            }
        };

        for key in keys {
            let hash = extract_hash_from_url(&key);
            if hash.as_ref().is_some_and(|h| referenced.contains(h)) {
                report.kept += 1;
                continue;
            }
            match self.store.delete(&key) {
                Ok(true) => {
                    tracing::info!(key, hash = hash.as_deref().unwrap_or("-"), "evicted");
                    report.deleted.push(key);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(key, error = %e, "eviction failed");
                    report.failed += 1;
                }
            }
        }
        report
    }
}

/// Outcome of a cleaning pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub kept: usize,
    pub deleted: Vec<String>,
    pub failed: usize,
}

/// Runs the cleaning pass once per page load, `delay_ms` after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupSchedule {
    delay_ms: u64,
    due_at: Option<u64>,
    done: bool,
}

impl CleanupSchedule {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            due_at: None,
            done: false,
        }
    }

    /// Schedule with the delay the build wrote to `hero.json`.
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        Self::new(settings.clean_delay_ms)
    }

    /// The page finished loading at `now`.
    pub fn on_load(&mut self, now: u64) {
        if self.due_at.is_none() {
            self.due_at = Some(now + self.delay_ms);
        }
    }

    /// Whether the pass should run at `now`. True at most once.
    pub fn poll(&mut self, now: u64) -> bool {
        match self.due_at {
            Some(due) if !self.done && now >= due => {
                self.done = true;
                true
            }
            _ => false,
        }
    }
}

/// Remove every `static-assets-cache-v<N>` store except `current`.
pub fn delete_old_caches<R: CacheRegistry>(
    registry: &mut R,
    current: &str,
) -> Result<Vec<String>, CacheError> {
    let mut deleted = Vec::new();
    for name in registry.names()? {
        if name == current || !CACHE_GENERATION.is_match(&name) {
            continue;
        }
        if registry.delete_store(&name)? {
            tracing::info!(name, "deleted old cache");
            deleted.push(name);
        }
    }
    Ok(deleted)
}

/// Result of warming the cache for a page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WarmReport {
    pub fetched: usize,
    pub hits: usize,
    pub failed: usize,
}

/// Request every URL through the cache.
pub fn warm<S: CacheStore, F: Fetcher>(cache: &mut AssetCache<S, F>, urls: &[String]) -> WarmReport {
    let mut report = WarmReport::default();
    for url in urls {
        match cache.lookup(url) {
            Ok((_, Lookup::HitValid)) => report.hits += 1,
            Ok(_) => report.fetched += 1,
            Err(_) => report.failed += 1,
        }
    }
    report
}

/// Warm the caches for a page's references: images into the hero image
/// store, scripts and stylesheets into the asset cache.
pub fn warm_page<A, F, I, G>(
    assets: &mut AssetCache<A, F>,
    images: &mut AssetCache<I, G>,
    references: &[Reference],
) -> WarmReport
where
    A: CacheStore,
    F: Fetcher,
    I: CacheStore,
    G: Fetcher,
{
    let (image_urls, asset_urls): (Vec<&Reference>, Vec<&Reference>) = references
        .iter()
        .partition(|r| r.kind == ReferenceKind::Image);
    let urls = |refs: Vec<&Reference>| refs.into_iter().map(|r| r.url.clone()).collect::<Vec<_>>();

    let from_assets = warm(assets, &urls(asset_urls));
    let from_images = warm(images, &urls(image_urls));
    WarmReport {
        fetched: from_assets.fetched + from_images.fetched,
        hits: from_assets.hits + from_images.hits,
        failed: from_assets.failed + from_images.failed,
    }
}
