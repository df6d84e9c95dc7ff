//! Hero image descriptors and the catalog the build writes for them.
//!
//! Hero images are published as one directory per image, one file per
//! width:
//!
//! ```text
//! <publish_root>/images/hero/
//! └── lake/
//!     ├── lake_1280.0f1e2d3c.webp
//!     ├── lake_1920.9a8b7c6d.webp
//!     └── ...
//! ```
//!
//! [`build_catalog`] turns that tree into [`ImageDescriptor`]s with their
//! per-width URLs, `srcset`, and orientation styles, and the build writes
//! them to `hero.json`.

use crate::cache::DEFAULT_CLEAN_DELAY_MS;
use crate::config::{AssetsConfig, HeroConfig};
use crate::glob::{self, GlobOptions};
use crate::hashname::canonical_path;
use crate::types::{Layout, to_slash};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

pub const HERO_CATALOG_FILENAME: &str = "hero.json";

/// `sizes` attribute matching the width breakpoints.
pub const SIZES_ATTR: &str =
    "(max-width: 1280px) 1280px, (max-width: 1920px) 1920px, (max-width: 2560px) 2560px, 3840px";

/// `<name>_<width>` file stem.
static VARIANT_STEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?P<name>.+)_(?P<width>\d+)$").expect("variant pattern is valid"));

/// Per-orientation display settings. Unset fields inherit from the layer
/// below (defaults, then per-image overrides).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub h1_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_fit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perspective: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perspective_origin: Option<String>,
}

fn some(s: &str) -> Option<String> {
    Some(s.to_string())
}

impl ImageStyle {
    pub fn default_landscape() -> Self {
        Self {
            h1_color: some("emerald"),
            p_color: some("emerald"),
            scale: some("1.1"),
            object_fit: some("scale-down"),
            object_position: None,
            perspective: some("50em"),
            perspective_origin: some("center bottom"),
        }
    }

    pub fn default_portrait() -> Self {
        Self {
            scale: some("1.4"),
            object_fit: some("cover"),
            object_position: some("center bottom"),
            ..Self::default()
        }
    }

    /// `over` on top of `self`: fields set in `over` win.
    pub fn layered(&self, over: &ImageStyle) -> ImageStyle {
        let pick = |top: &Option<String>, base: &Option<String>| top.clone().or_else(|| base.clone());
        ImageStyle {
            h1_color: pick(&over.h1_color, &self.h1_color),
            p_color: pick(&over.p_color, &self.p_color),
            scale: pick(&over.scale, &self.scale),
            object_fit: pick(&over.object_fit, &self.object_fit),
            object_position: pick(&over.object_position, &self.object_position),
            perspective: pick(&over.perspective, &self.perspective),
            perspective_origin: pick(&over.perspective_origin, &self.perspective_origin),
        }
    }

    /// CSS properties for the image element. Colors apply to the call to
    /// action text, not the image, and are left out.
    pub fn css_properties(&self) -> Vec<(&'static str, String)> {
        [
            ("scale", &self.scale),
            ("object-fit", &self.object_fit),
            ("object-position", &self.object_position),
            ("perspective", &self.perspective),
            ("perspective-origin", &self.perspective_origin),
        ]
        .into_iter()
        .filter_map(|(prop, value)| value.clone().map(|v| (prop, v)))
        .collect()
    }

    pub fn colors(&self) -> CtaColors {
        CtaColors {
            h1: self.h1_color.clone(),
            p: self.p_color.clone(),
        }
    }
}

/// Colors of the header and paragraph laid over the hero image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CtaColors {
    pub h1: Option<String>,
    pub p: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn orientation(&self) -> Orientation {
        if self.height > self.width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }
}

/// Smallest available width that covers `viewport_width`, else the largest.
///
/// With the stock widths: ≤1280 → 1280, ≤1920 → 1920, ≤2560 → 2560,
/// otherwise 3840.
pub fn optimal_width(viewport_width: u32, widths: &[u32]) -> Option<u32> {
    widths
        .iter()
        .copied()
        .find(|w| viewport_width <= *w)
        .or_else(|| widths.last().copied())
}

/// One hero image with all its published variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageDescriptor {
    pub name: String,
    /// `assets/images/hero/<name>/<name>`; variants append `_<width>`.
    pub base_url: String,
    pub srcset: String,
    /// Available widths, ascending.
    pub widths: Vec<u32>,
    /// Site-relative URL of each width variant.
    pub urls: BTreeMap<u32, String>,
    pub landscape: ImageStyle,
    pub portrait: ImageStyle,
}

impl ImageDescriptor {
    pub fn style(&self, orientation: Orientation) -> &ImageStyle {
        match orientation {
            Orientation::Landscape => &self.landscape,
            Orientation::Portrait => &self.portrait,
        }
    }

    /// URL of the variant to load for a viewport width.
    pub fn optimal_url(&self, viewport_width: u32) -> Option<(u32, &str)> {
        let width = optimal_width(viewport_width, &self.widths)?;
        self.urls.get(&width).map(|url| (width, url.as_str()))
    }
}

/// Timings the page runtime reads from `hero.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeSettings {
    /// Time each hero image stays on screen.
    pub interval_ms: u64,
    /// Delay between page load and the cache cleaning pass.
    pub clean_delay_ms: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            interval_ms: super::DEFAULT_INTERVAL_MS,
            clean_delay_ms: DEFAULT_CLEAN_DELAY_MS,
        }
    }
}

impl RuntimeSettings {
    pub fn from_config(config: &AssetsConfig) -> Self {
        Self {
            interval_ms: config.hero.interval_ms,
            clean_delay_ms: config.cache.clean_delay_ms,
        }
    }
}

/// Published hero images, sorted by name, and the runtime timings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeroCatalog {
    pub images: Vec<ImageDescriptor>,
    #[serde(default)]
    pub settings: RuntimeSettings,
}

impl HeroCatalog {
    pub fn with_settings(self, settings: RuntimeSettings) -> Self {
        Self { settings, ..self }
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(std::io::Error::other)
    }
}

/// Landscape and portrait styles for one image.
fn styles_for(name: &str, config: &HeroConfig) -> (ImageStyle, ImageStyle) {
    let overrides = config.images.get(name).cloned().unwrap_or_default();
    let landscape = config.landscape.layered(&overrides.landscape);
    let portrait = config
        .landscape
        .layered(&config.portrait)
        .layered(&overrides.portrait);
    (landscape, portrait)
}

/// Preference when several formats exist for one width.
fn format_rank(ext: &str) -> u8 {
    match ext {
        "webp" => 0,
        "avif" => 1,
        _ => 2,
    }
}

/// Scan the published hero directory into a catalog.
///
/// Widths not listed in `config.widths` are ignored, as are directories
/// with no usable variant.
pub fn build_catalog(layout: &Layout, config: &HeroConfig) -> std::io::Result<HeroCatalog> {
    let hero_dir = layout.publish_root.join(&config.root);
    if !hero_dir.is_dir() {
        return Ok(HeroCatalog::default());
    }

    let dirs = glob::resolve_lenient("*", &GlobOptions::directories_in(&hero_dir))
        .map_err(std::io::Error::other)?;

    let mut images = Vec::new();
    for dir in dirs {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut chosen: BTreeMap<u32, (u8, String)> = BTreeMap::new();

        for entry in std::fs::read_dir(&dir)?.filter_map(Result::ok) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let canonical = canonical_path(&path);
            let (Some(stem), Some(ext)) = (
                canonical.file_stem().map(|s| s.to_string_lossy().into_owned()),
                canonical.extension().map(|s| s.to_string_lossy().into_owned()),
            ) else {
                continue;
            };
            let Some(caps) = VARIANT_STEM.captures(&stem) else {
                continue;
            };
            let Ok(width) = caps["width"].parse::<u32>() else {
                continue;
            };
            if caps["name"] != *name || !config.widths.contains(&width) {
                continue;
            }
            let Some(url) = layout.site_relative(&path) else {
                continue;
            };
            let rank = format_rank(&ext);
            if chosen.get(&width).is_none_or(|(r, _)| rank < *r) {
                chosen.insert(width, (rank, url));
            }
        }

        if chosen.is_empty() {
            tracing::warn!(image = %name, "hero directory has no usable variants");
            continue;
        }

        let urls: BTreeMap<u32, String> = chosen.into_iter().map(|(w, (_, url))| (w, url)).collect();
        let srcset = urls
            .iter()
            .map(|(w, url)| format!("{url} {w}w"))
            .collect::<Vec<_>>()
            .join(", ");
        let base_url = layout
            .site_relative(&dir.join(&name))
            .unwrap_or_else(|| to_slash(&Path::new(&config.root).join(&name).join(&name)));
        let (landscape, portrait) = styles_for(&name, config);

        images.push(ImageDescriptor {
            widths: urls.keys().copied().collect(),
            name,
            base_url,
            srcset,
            urls,
            landscape,
            portrait,
        });
    }

    tracing::info!(images = images.len(), "hero catalog built");
    Ok(HeroCatalog {
        images,
        settings: RuntimeSettings {
            interval_ms: config.interval_ms,
            ..RuntimeSettings::default()
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HeroImageConfig;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    #[test]
    fn optimal_width_breakpoints() {
        let widths = [1280, 1920, 2560, 3840];
        assert_eq!(optimal_width(375, &widths), Some(1280));
        assert_eq!(optimal_width(1280, &widths), Some(1280));
        assert_eq!(optimal_width(1281, &widths), Some(1920));
        assert_eq!(optimal_width(2560, &widths), Some(2560));
        assert_eq!(optimal_width(5120, &widths), Some(3840));
        assert_eq!(optimal_width(800, &[]), None);
    }

    #[test]
    fn portrait_layers_defaults_then_overrides() {
        let mut config = HeroConfig::default();
        config.images.insert(
            "lake".to_string(),
            HeroImageConfig {
                landscape: ImageStyle {
                    h1_color: some("sky"),
                    ..ImageStyle::default()
                },
                portrait: ImageStyle {
                    object_position: some("left top"),
                    ..ImageStyle::default()
                },
            },
        );

        let (landscape, portrait) = styles_for("lake", &config);

        assert_eq!(landscape.h1_color.as_deref(), Some("sky"));
        assert_eq!(landscape.scale.as_deref(), Some("1.1"));
        // Portrait starts from the default landscape style, not this image's.
        assert_eq!(portrait.h1_color.as_deref(), Some("emerald"));
        assert_eq!(portrait.scale.as_deref(), Some("1.4"));
        assert_eq!(portrait.object_fit.as_deref(), Some("cover"));
        assert_eq!(portrait.object_position.as_deref(), Some("left top"));
    }

    #[test]
    fn css_properties_skip_colors_and_unset_fields() {
        let props = ImageStyle::default_portrait().css_properties();
        assert_eq!(
            props,
            [
                ("scale", "1.4".to_string()),
                ("object-fit", "cover".to_string()),
                ("object-position", "center bottom".to_string()),
            ]
        );
    }

    #[test]
    fn viewport_orientation() {
        assert_eq!(Viewport::new(1920, 1080).orientation(), Orientation::Landscape);
        assert_eq!(Viewport::new(390, 844).orientation(), Orientation::Portrait);
    }

    #[test]
    fn catalog_from_published_variants() {
        let tmp = TempDir::new().unwrap();
        let layout = layout_in(tmp.path());
        let hero = "docs/assets/images/hero";
        write_file(tmp.path(), &format!("{hero}/lake/lake_1280.1a2b3c4d.webp"), "a");
        write_file(tmp.path(), &format!("{hero}/lake/lake_1280.5e6f7a8b.avif"), "b");
        write_file(tmp.path(), &format!("{hero}/lake/lake_1920.0c0c0c0c.webp"), "c");
        write_file(tmp.path(), &format!("{hero}/lake/lake_640.0d0d0d0d.webp"), "ignored");
        write_file(tmp.path(), &format!("{hero}/lake/other_1280.0e0e0e0e.webp"), "ignored");
        write_file(tmp.path(), &format!("{hero}/dune/dune_3840.0f0f0f0f.avif"), "d");
        write_file(tmp.path(), &format!("{hero}/empty/readme.txt"), "");

        let catalog = build_catalog(&layout, &HeroConfig::default()).unwrap();

        let names: Vec<&str> = catalog.images.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["dune", "lake"]);

        let lake = &catalog.images[1];
        assert_eq!(lake.base_url, "assets/images/hero/lake/lake");
        assert_eq!(lake.widths, [1280, 1920]);
        assert_eq!(
            lake.srcset,
            "assets/images/hero/lake/lake_1280.1a2b3c4d.webp 1280w, \
             assets/images/hero/lake/lake_1920.0c0c0c0c.webp 1920w"
        );
        assert_eq!(
            lake.optimal_url(1600),
            Some((1920, "assets/images/hero/lake/lake_1920.0c0c0c0c.webp"))
        );
        // Wider than anything published: largest available.
        assert_eq!(lake.optimal_url(4000).map(|(w, _)| w), Some(1920));
    }

    #[test]
    fn catalog_without_hero_directory_is_empty() {
        let tmp = TempDir::new().unwrap();
        let catalog = build_catalog(&layout_in(tmp.path()), &HeroConfig::default()).unwrap();
        assert!(catalog.images.is_empty());
    }

    #[test]
    fn catalog_serializes_camel_case() {
        let descriptor = ImageDescriptor {
            name: "lake".into(),
            base_url: "assets/images/hero/lake/lake".into(),
            srcset: String::new(),
            widths: vec![1280],
            urls: BTreeMap::from([(1280, "u".to_string())]),
            landscape: ImageStyle::default(),
            portrait: ImageStyle::default(),
        };
        let json = serde_json::to_value(&descriptor).unwrap();
        assert_eq!(json["baseUrl"], "assets/images/hero/lake/lake");
        assert_eq!(json["urls"]["1280"], "u");
    }
}
