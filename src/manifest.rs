//! Build manifest.
//!
//! The manifest maps logical asset keys to the hashed paths the site should
//! reference, and carries the bundler's per-output metadata:
//!
//! ```json
//! {
//!   "CSSBUNDLE": "assets/stylesheets/home.3f9a0c12.css",
//!   "SCRIPTBUNDLE": "assets/javascripts/index.be41d7e0.js",
//!   "assets/fonts/inter.woff2": "assets/fonts/inter.1a2b3c4d.woff2",
//!   "metaOutput": {
//!     "assets/javascripts/index.be41d7e0.js": {
//!       "bytes": 1204,
//!       "inputs": ["src/javascripts/index.ts"],
//!       "exports": [],
//!       "entryPoint": "src/javascripts/index.ts"
//!     }
//!   }
//! }
//! ```
//!
//! Paths are relative to the site root. Readers either see the previous
//! manifest or the new one: [`write_json_atomic`] writes a sibling temp
//! file and renames it over the target.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SCRIPT_BUNDLE_KEY: &str = "SCRIPTBUNDLE";
pub const CSS_BUNDLE_KEY: &str = "CSSBUNDLE";
pub const HASH_TABLE_FILENAME: &str = "hashTable.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Bundler metadata for one output, as recorded in the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMeta {
    pub bytes: u64,
    pub inputs: Vec<String>,
    pub exports: Vec<String>,
    #[serde(rename = "entryPoint", default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Logical key → hashed path.
    #[serde(flatten)]
    pub entries: BTreeMap<String, String>,
    #[serde(rename = "metaOutput", default)]
    pub meta_output: BTreeMap<String, OutputMeta>,
}

impl BuildManifest {
    pub fn insert(&mut self, key: impl Into<String>, hashed: impl Into<String>) {
        self.entries.insert(key.into(), hashed.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Load a manifest. Missing or unparseable files yield an empty one.
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Canonical base name → hash, for every hashed entry.
    ///
    /// `assets/fonts/inter.woff2 → assets/fonts/inter.1a2b3c4d.woff2`
    /// yields `inter.woff2 → 1a2b3c4d`.
    pub fn hash_table(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter(|(key, _)| key.as_str() != CSS_BUNDLE_KEY && key.as_str() != SCRIPT_BUNDLE_KEY)
            .filter_map(|(key, hashed)| {
                let hash = crate::hashname::hash_of_path(Path::new(hashed))?;
                let base = key.rsplit('/').next().unwrap_or(key);
                Some((base.to_string(), hash))
            })
            .collect()
    }
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), ManifestError> {
    let io_err = |source| ManifestError::Io {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_string_pretty(value)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    std::fs::write(&tmp, json).map_err(io_err)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    Ok(())
}

/// Write the manifest and, next to it, the hash table.
pub fn write_manifest(path: &Path, manifest: &BuildManifest) -> Result<(), ManifestError> {
    write_json_atomic(path, manifest)?;
    let table = path.with_file_name(HASH_TABLE_FILENAME);
    write_json_atomic(&table, &manifest.hash_table())?;
    tracing::info!(
        path = %path.display(),
        entries = manifest.entries.len(),
        outputs = manifest.meta_output.len(),
        "manifest written"
    );
    Ok(())
}
