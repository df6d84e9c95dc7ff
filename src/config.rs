//! Build configuration module.
//!
//! Handles loading, validating, and merging `assets.toml`. Stock defaults
//! are serialized to a TOML table and the user file is merged on top, so
//! the file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! ```text
//! project/
//! ├── assets.toml          # Optional; stock defaults apply without it
//! ├── tsconfig.json
//! ├── src/                 # source_root
//! │   ├── stylesheets/
//! │   ├── javascripts/
//! │   ├── fonts/
//! │   └── images/hero/<name>/<name>_<width>.webp
//! └── docs/                # site_root
//!     └── assets/          # publish_root (manifest.json lives here)
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! source_root = "src"
//! site_root = "docs"
//! publish_root = "docs/assets"
//! manifest_file = "manifest.json"
//!
//! [paths]
//! styleSheets = ["src/stylesheets/*.css", "src/stylesheets/*.*.css"]
//! scripts = ["src/javascripts/*.ts"]
//! fonts = ["src/fonts/*.{woff,woff2}"]
//! images = ["src/images/hero/**/*.{avif,webp}", "src/images/*.{svg,png}"]
//!
//! [[projects]]
//! name = "site"
//! asset_entries = true      # styleSheets + scripts are entry points
//! outdir = "docs/assets"
//! platform = "browser"
//!
//! [bundler]
//! program = "esbuild"
//!
//! [cache]
//! name = "static-assets-cache-v1"
//! clean_delay_ms = 5000
//!
//! [hero]
//! interval_ms = 25000
//! widths = [1280, 1920, 2560, 3840]
//!
//! [processing]
//! minify_svg = true
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::bundler::Platform;
use crate::hero::ImageStyle;
use crate::types::{AssetPaths, Layout};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

pub const CONFIG_FILENAME: &str = "assets.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Build configuration loaded from `assets.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetsConfig {
    /// Directory holding the asset sources.
    pub source_root: String,
    /// Directory served as the site; manifest paths are relative to it.
    pub site_root: String,
    /// Directory the assets are published to (inside `site_root`).
    pub publish_root: String,
    /// Manifest file name, written into `publish_root`.
    pub manifest_file: String,
    /// Glob patterns per asset category.
    pub paths: AssetPaths,
    /// Bundler projects, built in order.
    pub projects: Vec<ProjectConfig>,
    pub bundler: BundlerConfig,
    pub cache: CacheConfig,
    pub hero: HeroConfig,
    pub processing: ProcessingConfig,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            source_root: "src".to_string(),
            site_root: "docs".to_string(),
            publish_root: "docs/assets".to_string(),
            manifest_file: "manifest.json".to_string(),
            paths: AssetPaths::default(),
            projects: vec![ProjectConfig::default()],
            bundler: BundlerConfig::default(),
            cache: CacheConfig::default(),
            hero: HeroConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl AssetsConfig {
    /// Validate paths and values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let publish = Path::new(&self.publish_root);
        if !publish.starts_with(&self.site_root) || publish == Path::new(&self.site_root) {
            return Err(ConfigError::Validation(format!(
                "publish_root ({}) must be a subdirectory of site_root ({})",
                self.publish_root, self.site_root
            )));
        }
        if Path::new(&self.source_root).starts_with(publish) || publish.starts_with(&self.source_root)
        {
            return Err(ConfigError::Validation(
                "source_root and publish_root must not contain each other".into(),
            ));
        }
        if self.manifest_file.is_empty() || self.manifest_file.contains('/') {
            return Err(ConfigError::Validation(
                "manifest_file must be a plain file name".into(),
            ));
        }

        let mut names = BTreeSet::new();
        for project in &self.projects {
            if project.name.is_empty() {
                return Err(ConfigError::Validation("projects.name must not be empty".into()));
            }
            if !names.insert(project.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate project name: {}",
                    project.name
                )));
            }
            if project.entry_points.is_empty() && !project.asset_entries {
                return Err(ConfigError::Validation(format!(
                    "project {} has no entry points",
                    project.name
                )));
            }
        }

        if self.bundler.program.is_empty() {
            return Err(ConfigError::Validation("bundler.program must not be empty".into()));
        }
        if self.cache.name.is_empty() {
            return Err(ConfigError::Validation("cache.name must not be empty".into()));
        }
        if self.hero.interval_ms == 0 {
            return Err(ConfigError::Validation("hero.interval_ms must be positive".into()));
        }
        if self.hero.widths.is_empty() {
            return Err(ConfigError::Validation("hero.widths must not be empty".into()));
        }
        if self.hero.widths.windows(2).any(|w| w[0] >= w[1]) || self.hero.widths[0] == 0 {
            return Err(ConfigError::Validation(
                "hero.widths must be positive and strictly ascending".into(),
            ));
        }
        Ok(())
    }

    /// Source/publish/site directories resolved against `root`.
    pub fn layout(&self, root: &Path) -> Layout {
        Layout {
            source_root: root.join(&self.source_root),
            publish_root: root.join(&self.publish_root),
            site_root: root.join(&self.site_root),
        }
    }

    pub fn manifest_path(&self, root: &Path) -> std::path::PathBuf {
        root.join(&self.publish_root).join(&self.manifest_file)
    }
}

/// One bundler run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub name: String,
    /// Explicit entry points, relative to the project root.
    pub entry_points: Vec<String>,
    /// Add the reconciled `styleSheets` and `scripts` as entry points.
    pub asset_entries: bool,
    pub outdir: String,
    pub tsconfig: String,
    pub platform: Platform,
    /// Output naming for explicit entry points.
    pub entry_names: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "site".to_string(),
            entry_points: Vec::new(),
            asset_entries: true,
            outdir: "docs/assets".to_string(),
            tsconfig: "tsconfig.json".to_string(),
            platform: Platform::Browser,
            entry_names: "[dir]/[name]".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundlerConfig {
    /// Bundler executable, looked up on `PATH`.
    pub program: String,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        Self {
            program: "esbuild".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Name of the current asset cache generation.
    pub name: String,
    /// Delay between page load and the cache cleaning pass.
    pub clean_delay_ms: u64,
    /// Directory backing the on-disk cache used by `cache` subcommands.
    pub store_dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: crate::cache::STATIC_CACHE_NAME.to_string(),
            clean_delay_ms: crate::cache::DEFAULT_CLEAN_DELAY_MS,
            store_dir: ".plain-assets-cache".to_string(),
        }
    }
}

/// Hero catalog and cycling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeroConfig {
    /// Hero image directory, relative to `publish_root`.
    pub root: String,
    pub interval_ms: u64,
    /// Generated widths, ascending.
    pub widths: Vec<u32>,
    /// Style applied to every image in landscape viewports.
    pub landscape: ImageStyle,
    /// Style layered on top of `landscape` in portrait viewports.
    pub portrait: ImageStyle,
    /// Per-image overrides keyed by image name.
    pub images: BTreeMap<String, HeroImageConfig>,
}

impl Default for HeroConfig {
    fn default() -> Self {
        Self {
            root: "images/hero".to_string(),
            interval_ms: crate::hero::DEFAULT_INTERVAL_MS,
            widths: crate::hero::WIDTHS.to_vec(),
            landscape: ImageStyle::default_landscape(),
            portrait: ImageStyle::default_portrait(),
            images: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeroImageConfig {
    pub landscape: ImageStyle,
    pub portrait: ImageStyle,
}

/// Parallel processing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers. When absent, defaults to the
    /// number of CPU cores. Values larger than the core count are clamped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
    /// Minify `.svg` images in place before hashing them.
    pub minify_svg: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_processes: None,
            minify_svg: true,
        }
    }
}

/// Resolve the effective thread count from config.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(AssetsConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key by key; anything else in `overlay` (including arrays
/// such as `[[projects]]`) replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `assets.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<AssetsConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AssetsConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `assets.toml` in `root`, on top of the stock defaults.
pub fn load_config(root: &Path) -> Result<AssetsConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(root)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `assets.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# plain-assets configuration
# ==========================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Directory holding stylesheets, scripts, fonts and images.
source_root = "src"

# Directory served as the site. Manifest paths are relative to it.
site_root = "docs"

# Where assets are published. Must be inside site_root.
publish_root = "docs/assets"

# Manifest file name, written into publish_root (hashTable.json and
# hero.json are written next to it).
manifest_file = "manifest.json"

# ---------------------------------------------------------------------------
# Asset globs
# ---------------------------------------------------------------------------
# Supported syntax: *, **, ?, [abc], [!abc], {a,b}.
# A pattern that matches nothing aborts the build, unless it pairs with a
# sibling that matched: a.css and a.*.css cover an asset before and after
# its first build.
[paths]
styleSheets = ["src/stylesheets/*.css", "src/stylesheets/*.*.css"]
scripts = ["src/javascripts/*.ts"]
fonts = ["src/fonts/*.{woff,woff2}"]
images = ["src/images/hero/**/*.{avif,webp}", "src/images/*.{svg,png}"]

# ---------------------------------------------------------------------------
# Bundler projects
# ---------------------------------------------------------------------------
# Each [[projects]] entry is one bundler run. Declaring any project
# replaces this default list.
[[projects]]
name = "site"
# Use the reconciled styleSheets and scripts as entry points.
asset_entries = true
# Additional explicit entry points.
entry_points = []
outdir = "docs/assets"
tsconfig = "tsconfig.json"
# "browser": minified, source maps, code splitting, es2018.
# "node": unminified ESM for node18.
platform = "browser"
entry_names = "[dir]/[name]"

# [[projects]]
# name = "scripts"
# asset_entries = false
# entry_points = ["scripts/release.ts"]
# outdir = ".github/scripts"
# platform = "node"

[bundler]
program = "esbuild"

# ---------------------------------------------------------------------------
# Browser asset cache
# ---------------------------------------------------------------------------
[cache]
# Current cache generation. Older static-assets-cache-v<N> stores are
# deleted.
name = "static-assets-cache-v1"
# Delay between page load and the cleaning pass.
clean_delay_ms = 5000
# Backing directory for `plain-assets cache warm|clean`.
store_dir = ".plain-assets-cache"

# ---------------------------------------------------------------------------
# Hero images
# ---------------------------------------------------------------------------
[hero]
# Relative to publish_root; images live in <root>/<name>/<name>_<width>.<ext>.
root = "images/hero"
# Time each image stays on screen.
interval_ms = 25000
widths = [1280, 1920, 2560, 3840]

[hero.landscape]
h1_color = "emerald"
p_color = "emerald"
scale = "1.1"
object_fit = "scale-down"
perspective = "50em"
perspective_origin = "center bottom"

[hero.portrait]
scale = "1.4"
object_fit = "cover"
object_position = "center bottom"

# Per-image overrides:
# [hero.images.lake.landscape]
# h1_color = "sky"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers for hashing and copying.
# Omit to auto-detect (= number of CPU cores).
# max_processes = 4
# Minify .svg images in place before hashing (comments, metadata, editor
# data and whitespace are removed).
minify_svg = true
"##
}
