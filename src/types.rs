//! Shared types used across the build stages.
//!
//! [`AssetPaths`] is read from `assets.toml`, expanded into
//! [`ExpandedPaths`] by the glob resolver, and the [`Layout`] tells the
//! rewriter and the materializer where each source file is published.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Logical asset category of a glob pattern list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "styleSheets")]
    StyleSheets,
    #[serde(rename = "scripts")]
    Scripts,
    #[serde(rename = "fonts")]
    Fonts,
    #[serde(rename = "images")]
    Images,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::StyleSheets,
        Category::Scripts,
        Category::Fonts,
        Category::Images,
    ];

    /// Key used in `assets.toml` and in log output.
    pub fn key(self) -> &'static str {
        match self {
            Category::StyleSheets => "styleSheets",
            Category::Scripts => "scripts",
            Category::Fonts => "fonts",
            Category::Images => "images",
        }
    }

    /// Static categories are copied to the publish directory as-is;
    /// the others are bundler entry points.
    pub fn is_static(self) -> bool {
        matches!(self, Category::Fonts | Category::Images)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Ordered glob patterns per category (build input).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetPaths {
    #[serde(rename = "styleSheets")]
    pub style_sheets: Vec<String>,
    pub scripts: Vec<String>,
    pub fonts: Vec<String>,
    pub images: Vec<String>,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            style_sheets: vec![
                "src/stylesheets/*.css".to_string(),
                "src/stylesheets/*.*.css".to_string(),
            ],
            scripts: vec!["src/javascripts/*.ts".to_string()],
            fonts: vec!["src/fonts/*.{woff,woff2}".to_string()],
            images: vec![
                "src/images/hero/**/*.{avif,webp}".to_string(),
                "src/images/*.{svg,png}".to_string(),
            ],
        }
    }
}

impl AssetPaths {
    pub fn patterns(&self, category: Category) -> &[String] {
        match category {
            Category::StyleSheets => &self.style_sheets,
            Category::Scripts => &self.scripts,
            Category::Fonts => &self.fonts,
            Category::Images => &self.images,
        }
    }
}

/// Resolved files per category. Sets, because overlapping patterns
/// (`a.css`, `a.*.css`) may match the same file twice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpandedPaths {
    pub style_sheets: BTreeSet<PathBuf>,
    pub scripts: BTreeSet<PathBuf>,
    pub fonts: BTreeSet<PathBuf>,
    pub images: BTreeSet<PathBuf>,
}

impl ExpandedPaths {
    pub fn get(&self, category: Category) -> &BTreeSet<PathBuf> {
        match category {
            Category::StyleSheets => &self.style_sheets,
            Category::Scripts => &self.scripts,
            Category::Fonts => &self.fonts,
            Category::Images => &self.images,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut BTreeSet<PathBuf> {
        match category {
            Category::StyleSheets => &mut self.style_sheets,
            Category::Scripts => &mut self.scripts,
            Category::Fonts => &mut self.fonts,
            Category::Images => &mut self.images,
        }
    }

    pub fn total(&self) -> usize {
        Category::ALL.iter().map(|c| self.get(*c).len()).sum()
    }
}

/// Where sources live and where they are published.
///
/// A source file `source_root/x/y.css` is mirrored at
/// `publish_root/x/y.css`. URLs in the manifest are relative to
/// `site_root`, which contains `publish_root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub source_root: PathBuf,
    pub publish_root: PathBuf,
    pub site_root: PathBuf,
}

impl Layout {
    /// The publish-directory counterpart of a source file, or `None` for
    /// files outside `source_root`.
    pub fn mirror_of(&self, source: &Path) -> Option<PathBuf> {
        let relative = source.strip_prefix(&self.source_root).ok()?;
        Some(self.publish_root.join(relative))
    }

    /// URL path of a published file relative to the site root, with `/`
    /// separators (`assets/images/logo.1a2b3c4d.svg`).
    pub fn site_relative(&self, published: &Path) -> Option<String> {
        let relative = published.strip_prefix(&self.site_root).ok()?;
        Some(to_slash(relative))
    }
}

/// Render a relative path with forward slashes.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
