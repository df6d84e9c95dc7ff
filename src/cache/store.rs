//! Cache storage backends.
//!
//! A [`CacheStore`] is one named store of URL-keyed responses (the
//! browser's `static-assets-cache-v1`, or `ImageCacheDB/images`). A
//! [`CacheRegistry`] holds the named stores of an origin, so old
//! generations can be listed and dropped.
//!
//! | Backend | Used by |
//! |---------|---------|
//! | [`MemoryStore`] | page sessions and tests |
//! | [`DiskStore`] | the `cache` CLI subcommands (`<store_dir>/<name>/`) |

use super::CacheError;
use crate::manifest::write_json_atomic;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A stored response: the URL it was fetched from plus its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    pub url: String,
    pub body: Vec<u8>,
}

/// One named, URL-keyed response store. At most one entry per key.
pub trait CacheStore {
    fn get(&self, key: &str) -> Result<Option<StoredResponse>, CacheError>;
    fn put(&mut self, key: &str, response: StoredResponse) -> Result<(), CacheError>;
    /// Returns whether an entry was removed.
    fn delete(&mut self, key: &str) -> Result<bool, CacheError>;
    fn keys(&self) -> Result<Vec<String>, CacheError>;
}

/// The named stores of one origin.
pub trait CacheRegistry {
    fn names(&self) -> Result<Vec<String>, CacheError>;
    /// Returns whether a store was removed.
    fn delete_store(&mut self, name: &str) -> Result<bool, CacheError>;
}

fn store_err(op: &'static str, key: &str, reason: impl ToString) -> CacheError {
    CacheError::Store {
        op,
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<String, StoredResponse>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<StoredResponse>, CacheError> {
        Ok(self.entries.get(key).cloned())
    }

    fn put(&mut self, key: &str, response: StoredResponse) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), response);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.entries.keys().cloned().collect())
    }
}

impl<S> CacheRegistry for BTreeMap<String, S> {
    fn names(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.keys().cloned().collect())
    }

    fn delete_store(&mut self, name: &str) -> Result<bool, CacheError> {
        Ok(self.remove(name).is_some())
    }
}

// ============================================================================
// On disk
// ============================================================================

const INDEX_FILENAME: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct IndexEntry {
    url: String,
    file: String,
}

/// A store persisted in a directory: `index.json` maps keys to body files.
#[derive(Debug)]
pub struct DiskStore {
    dir: PathBuf,
    index: BTreeMap<String, IndexEntry>,
}

impl DiskStore {
    /// Open (or create) the store in `dir`.
    pub fn open(dir: &Path) -> Result<Self, CacheError> {
        let dir_str = dir.display().to_string();
        fs::create_dir_all(dir).map_err(|e| store_err("open", &dir_str, e))?;
        let index_path = dir.join(INDEX_FILENAME);
        let index = match fs::read_to_string(&index_path) {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| store_err("open", &dir_str, e))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(store_err("open", &dir_str, e)),
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            index,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn body_file(key: &str) -> String {
        format!("{:x}", Sha256::digest(key.as_bytes()))
    }

    fn save_index(&self, key: &str) -> Result<(), CacheError> {
        write_json_atomic(&self.dir.join(INDEX_FILENAME), &self.index)
            .map_err(|e| store_err("save index", key, e))
    }
}

impl CacheStore for DiskStore {
    fn get(&self, key: &str) -> Result<Option<StoredResponse>, CacheError> {
        let Some(entry) = self.index.get(key) else {
            return Ok(None);
        };
        let body = fs::read(self.dir.join(&entry.file)).map_err(|e| store_err("read", key, e))?;
        Ok(Some(StoredResponse {
            url: entry.url.clone(),
            body,
        }))
    }

    fn put(&mut self, key: &str, response: StoredResponse) -> Result<(), CacheError> {
        let file = Self::body_file(key);
        fs::write(self.dir.join(&file), &response.body).map_err(|e| store_err("write", key, e))?;
        self.index.insert(
            key.to_string(),
            IndexEntry {
                url: response.url,
                file,
            },
        );
        self.save_index(key)
    }

    fn delete(&mut self, key: &str) -> Result<bool, CacheError> {
        let Some(entry) = self.index.remove(key) else {
            return Ok(false);
        };
        match fs::remove_file(self.dir.join(&entry.file)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                self.index.insert(key.to_string(), entry);
                return Err(store_err("delete", key, e));
            }
        }
        self.save_index(key)?;
        Ok(true)
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.index.keys().cloned().collect())
    }
}

/// Named [`DiskStore`]s, one subdirectory each.
#[derive(Debug, Clone)]
pub struct DiskRegistry {
    root: PathBuf,
}

impl DiskRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn open(&self, name: &str) -> Result<DiskStore, CacheError> {
        DiskStore::open(&self.root.join(name))
    }
}

impl CacheRegistry for DiskRegistry {
    fn names(&self) -> Result<Vec<String>, CacheError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(store_err("list", &self.root.display().to_string(), e)),
        };
        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }

    fn delete_store(&mut self, name: &str) -> Result<bool, CacheError> {
        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).map_err(|e| store_err("delete store", name, e))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn response(url: &str, body: &str) -> StoredResponse {
        StoredResponse {
            url: url.to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn memory_store_keeps_one_entry_per_key() {
        let mut store = MemoryStore::new();
        store.put("a.1a2b3c4d.js", response("a.1a2b3c4d.js", "one")).unwrap();
        store.put("a.1a2b3c4d.js", response("a.1a2b3c4d.js", "two")).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("a.1a2b3c4d.js").unwrap().unwrap().body, b"two");
        assert!(store.delete("a.1a2b3c4d.js").unwrap());
        assert!(!store.delete("a.1a2b3c4d.js").unwrap());
    }

    #[test]
    fn disk_store_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("static-assets-cache-v1");
        {
            let mut store = DiskStore::open(&dir).unwrap();
            store
                .put("assets/app.1a2b3c4d.css", response("assets/app.1a2b3c4d.css", "body{}"))
                .unwrap();
        }

        let store = DiskStore::open(&dir).unwrap();
        assert_eq!(store.keys().unwrap(), ["assets/app.1a2b3c4d.css"]);
        assert_eq!(
            store.get("assets/app.1a2b3c4d.css").unwrap(),
            Some(response("assets/app.1a2b3c4d.css", "body{}"))
        );
    }

    #[test]
    fn disk_store_delete_removes_body() {
        let tmp = TempDir::new().unwrap();
        let mut store = DiskStore::open(tmp.path()).unwrap();
        store.put("k", response("k", "v")).unwrap();

        assert!(store.delete("k").unwrap());
        assert_eq!(store.get("k").unwrap(), None);
        // Only the index is left.
        let files: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn disk_store_corrupt_index_is_a_store_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(INDEX_FILENAME), "{nope").unwrap();
        assert!(matches!(
            DiskStore::open(tmp.path()),
            Err(CacheError::Store { op: "open", .. })
        ));
    }

    #[test]
    fn disk_registry_lists_and_deletes_stores() {
        let tmp = TempDir::new().unwrap();
        let mut registry = DiskRegistry::new(tmp.path());
        registry.open("static-assets-cache-v1").unwrap();
        registry.open("ImageCacheDB").unwrap();

        assert_eq!(
            registry.names().unwrap(),
            ["ImageCacheDB", "static-assets-cache-v1"]
        );
        assert!(registry.delete_store("ImageCacheDB").unwrap());
        assert!(!registry.delete_store("ImageCacheDB").unwrap());
        assert_eq!(registry.names().unwrap(), ["static-assets-cache-v1"]);
    }

    #[test]
    fn disk_registry_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let registry = DiskRegistry::new(tmp.path().join("none"));
        assert!(registry.names().unwrap().is_empty());
    }
}
