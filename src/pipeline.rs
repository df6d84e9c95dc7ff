//! The full build.
//!
//! ```text
//! assets.toml ─▶ expand globs ─▶ minify svgs ─▶ reconcile hashes ─┬─▶ publish fonts/images ─┐
//!                  (fatal)                        (per category)  └─▶ bundle + hash outputs ├─▶ manifest.json
//!                                                                        (fatal)            │   hashTable.json
//!                                                                 hero catalog ◀────────────┘   hero.json
//! ```
//!
//! Stages run in order; the manifest is written only after every
//! reconcile, copy and bundle has finished. Glob and bundler failures
//! abort the build. Per-file filesystem failures are logged, counted in
//! the [`BuildReport`], and left for the next build to converge.

use crate::bundler::{BundleError, BundleProject, Bundler, EntryPoint, Metafile, Platform};
use crate::config::{AssetsConfig, ConfigError, ProjectConfig};
use crate::glob::{self, GlobError};
use crate::hashname::canonical_path;
use crate::hero::{self, HERO_CATALOG_FILENAME, RuntimeSettings};
use crate::manifest::{
    BuildManifest, CSS_BUNDLE_KEY, ManifestError, OutputMeta, SCRIPT_BUNDLE_KEY, write_json_atomic,
    write_manifest,
};
use crate::materialize::{self, MaterializeReport};
use crate::rewrite::{self, RewriteReport};
use crate::svg::{self, MinifyReport};
use crate::types::{Category, ExpandedPaths, Layout, to_slash};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Glob(#[from] GlobError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// What one bundler project produced.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleSummary {
    pub project: String,
    pub platform: Platform,
    pub entries: usize,
    /// Output paths after hashing, relative to the site root (browser) or
    /// the project root (node).
    pub outputs: Vec<String>,
}

#[derive(Debug)]
pub struct BuildReport {
    pub expanded: ExpandedPaths,
    pub svgs: MinifyReport,
    pub rewrites: BTreeMap<Category, RewriteReport>,
    pub stale_removed: usize,
    pub materialized: MaterializeReport,
    pub bundles: Vec<BundleSummary>,
    /// Bundle outputs whose hashing failed.
    pub bundle_failures: usize,
    pub hero_images: usize,
    pub manifest: BuildManifest,
    pub manifest_path: PathBuf,
}

impl BuildReport {
    /// Per-file failures across all stages.
    pub fn failures(&self) -> usize {
        self.rewrites.values().map(RewriteReport::failures).sum::<usize>()
            + self.svgs.failed
            + self.materialized.failed
            + self.bundle_failures
    }
}

/// Resolve globs only. Nothing is written.
pub fn check(config: &AssetsConfig, root: &Path) -> Result<ExpandedPaths, BuildError> {
    Ok(glob::expand(&config.paths, root)?)
}

/// Run the whole pipeline in `root`.
pub fn build<B: Bundler>(
    config: &AssetsConfig,
    root: &Path,
    bundler: &B,
) -> Result<BuildReport, BuildError> {
    let layout = config.layout(root);

    let expanded = glob::expand(&config.paths, root)?;
    tracing::info!(files = expanded.total(), "globs resolved");

    let svgs = if config.processing.minify_svg {
        svg::minify_all(expanded.get(Category::Images))
    } else {
        MinifyReport::default()
    };
    if svgs.minified > 0 || svgs.failed > 0 {
        tracing::info!(minified = svgs.minified, failed = svgs.failed, "svgs minified");
    }

    let mut rewrites = BTreeMap::new();
    for category in Category::ALL {
        let report = rewrite::reconcile_all(expanded.get(category), &layout);
        tracing::info!(
            %category,
            assets = report.assets.len(),
            failed = report.failures(),
            "hashes reconciled"
        );
        rewrites.insert(category, report);
    }

    let static_files: Vec<PathBuf> = Category::ALL
        .iter()
        .filter(|c| c.is_static())
        .flat_map(|c| rewrites[c].paths())
        .collect();
    let targets: Vec<PathBuf> = static_files
        .iter()
        .filter_map(|f| layout.mirror_of(f))
        .collect();
    let stale_removed = materialize::clear_stale(&publish_dirs(&targets, &layout), &targets);
    let materialized = materialize::materialize(&static_files, &layout);

    let mut manifest = BuildManifest::default();
    record_static(&mut manifest, &static_files, &layout);

    let asset_entries: Vec<PathBuf> = [Category::StyleSheets, Category::Scripts]
        .iter()
        .flat_map(|c| rewrites[c].paths())
        .collect();

    let mut bundles = Vec::new();
    let mut bundle_failures = 0;
    for project_config in &config.projects {
        let project = bundle_project(project_config, &asset_entries, root, &layout);
        if project.entry_points.is_empty() {
            tracing::warn!(project = %project.name, "no entry points, skipping bundle");
            continue;
        }
        let output = bundler.build(&project)?;
        let (summary, failed) = record_bundle(&mut manifest, &project, &output.metafile, root, &layout);
        bundle_failures += failed;
        bundles.push(summary);
    }

    let catalog_path = root.join(&config.publish_root).join(HERO_CATALOG_FILENAME);
    let hero_images = match hero::build_catalog(&layout, &config.hero) {
        Ok(catalog) => {
            let catalog = catalog.with_settings(RuntimeSettings::from_config(config));
            write_json_atomic(&catalog_path, &catalog)?;
            catalog.images.len()
        }
        Err(e) => {
            tracing::warn!(error = %e, "cannot read hero images, catalog not written");
            0
        }
    };

    let manifest_path = config.manifest_path(root);
    write_manifest(&manifest_path, &manifest)?;

    Ok(BuildReport {
        expanded,
        svgs,
        rewrites,
        stale_removed,
        materialized,
        bundles,
        bundle_failures,
        hero_images,
        manifest,
        manifest_path,
    })
}

/// Top-level publish directories holding the targets (`fonts/`, `images/`).
fn publish_dirs(targets: &[PathBuf], layout: &Layout) -> Vec<PathBuf> {
    let dirs: BTreeSet<PathBuf> = targets
        .iter()
        .filter_map(|t| t.strip_prefix(&layout.publish_root).ok())
        .filter(|rel| rel.components().count() > 1)
        .filter_map(|rel| rel.components().next())
        .map(|first| layout.publish_root.join(first))
        .collect();
    dirs.into_iter().collect()
}

/// `canonical published path → hashed published path` for static assets.
fn record_static(manifest: &mut BuildManifest, files: &[PathBuf], layout: &Layout) {
    for file in files {
        let (Some(hashed), Some(canonical)) = (
            layout.mirror_of(file).and_then(|p| layout.site_relative(&p)),
            layout
                .mirror_of(&canonical_path(file))
                .and_then(|p| layout.site_relative(&p)),
        ) else {
            continue;
        };
        manifest.insert(canonical, hashed);
    }
}

/// Path relative to `base`, or `path` unchanged.
fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}

/// Output name for an asset entry: its canonical path under the source
/// root without extension (`src/stylesheets/home.1a2b3c4d.css` →
/// `stylesheets/home`).
fn entry_out_name(path: &Path, root: &Path, layout: &Layout) -> String {
    let canonical = canonical_path(path);
    let relative = canonical
        .strip_prefix(&layout.source_root)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| relative_to(&canonical, root));
    to_slash(&relative.with_extension(""))
}

fn bundle_project(
    config: &ProjectConfig,
    asset_entries: &[PathBuf],
    root: &Path,
    layout: &Layout,
) -> BundleProject {
    let mut entry_points: Vec<EntryPoint> = config.entry_points.iter().map(EntryPoint::new).collect();
    if config.asset_entries {
        entry_points.extend(asset_entries.iter().map(|path| {
            EntryPoint::named(entry_out_name(path, root, layout), relative_to(path, root))
        }));
    }
    BundleProject {
        name: config.name.clone(),
        entry_points,
        outdir: PathBuf::from(&config.outdir),
        tsconfig: PathBuf::from(&config.tsconfig),
        platform: config.platform,
        entry_names: config.entry_names.clone(),
    }
}

/// Hash browser entry outputs and record every output in the manifest.
///
/// Returns the summary and the number of outputs that could not be hashed.
fn record_bundle(
    manifest: &mut BuildManifest,
    project: &BundleProject,
    metafile: &Metafile,
    root: &Path,
    layout: &Layout,
) -> (BundleSummary, usize) {
    let mut outputs = Vec::new();
    let mut failed = 0;
    let mut first_css = None;
    let mut first_js = None;

    for (key, meta) in &metafile.outputs {
        // Metafile keys are relative to the bundler's working directory.
        let path = root.join(key);
        let is_entry = meta.entry_point.is_some();
        let is_map = path.extension().is_some_and(|e| e == "map");

        let final_path = if project.platform == Platform::Browser && is_entry && !is_map {
            let reconciled = rewrite::reconcile(&path, layout);
            if reconciled.is_failed() {
                failed += 1;
                continue;
            }
            reconciled.path
        } else {
            path.clone()
        };

        let display = layout
            .site_relative(&final_path)
            .unwrap_or_else(|| to_slash(&relative_to(&final_path, root)));

        if is_entry && !is_map {
            if let Some(canonical) = layout.site_relative(&canonical_path(&final_path)) {
                manifest.insert(canonical, display.clone());
            }
            match final_path.extension().and_then(|e| e.to_str()) {
                Some("css") if first_css.is_none() => first_css = Some(display.clone()),
                Some("js") if first_js.is_none() => first_js = Some(display.clone()),
                _ => {}
            }
        }

        manifest.meta_output.insert(
            display.clone(),
            OutputMeta {
                bytes: meta.bytes,
                inputs: meta.inputs.keys().cloned().collect(),
                exports: meta.exports.clone(),
                entry_point: meta.entry_point.clone(),
            },
        );
        outputs.push(display);
    }

    if project.platform == Platform::Browser {
        if let Some(css) = first_css {
            manifest.entries.entry(CSS_BUNDLE_KEY.to_string()).or_insert(css);
        }
        if let Some(js) = first_js {
            manifest.entries.entry(SCRIPT_BUNDLE_KEY.to_string()).or_insert(js);
        }
    }

    tracing::info!(project = %project.name, outputs = outputs.len(), failed, "bundle recorded");
    (
        BundleSummary {
            project: project.name.clone(),
            platform: project.platform,
            entries: project.entry_points.len(),
            outputs,
        },
        failed,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::tests::FakeBundler;
    use crate::hasher::hash_bytes;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    fn config() -> AssetsConfig {
        let mut config = AssetsConfig::default();
        config.paths.style_sheets = vec!["src/stylesheets/*.css".into()];
        config.paths.scripts = vec!["src/javascripts/*.ts".into()];
        config.paths.fonts = vec!["src/fonts/*.woff2".into()];
        config.paths.images = vec!["src/images/**/*.{webp,svg}".into()];
        config
    }

    fn fixture(root: &Path) {
        write_file(root, "src/stylesheets/home.css", "body{}");
        write_file(root, "src/javascripts/index.ts", "export {}");
        write_file(root, "src/fonts/inter.woff2", "font");
        write_file(root, "src/images/logo.svg", "<svg/>");
        write_file(root, "src/images/hero/lake/lake_1280.webp", "lake-1280");
        write_file(root, "src/images/hero/lake/lake_1920.webp", "lake-1920");
    }

    #[test]
    fn build_publishes_hashes_and_writes_manifest() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path());
        let bundler = FakeBundler::in_dir(tmp.path());

        let report = build(&config(), tmp.path(), &bundler).unwrap();

        let font = hash_bytes(b"font");
        let css = hash_bytes(b"body{}");
        let js = hash_bytes(b"export {}");
        assert_eq!(report.failures(), 0);
        assert_eq!(report.materialized.copied, 4);

        let m = &report.manifest;
        assert_eq!(
            m.get("assets/fonts/inter.woff2"),
            Some(format!("assets/fonts/inter.{font}.woff2").as_str())
        );
        assert_eq!(
            m.get(CSS_BUNDLE_KEY),
            Some(format!("assets/stylesheets/home.{css}.css").as_str())
        );
        assert_eq!(
            m.get(SCRIPT_BUNDLE_KEY),
            Some(format!("assets/javascripts/index.{js}.js").as_str())
        );
        assert!(m.meta_output.contains_key(&format!("assets/javascripts/index.{js}.js")));

        let on_disk = BuildManifest::load(&report.manifest_path);
        assert_eq!(&on_disk, m);
        assert!(tmp.path().join("docs/assets/hashTable.json").is_file());
        assert_eq!(report.hero_images, 1);
        let catalog = crate::hero::HeroCatalog::load(&tmp.path().join("docs/assets/hero.json")).unwrap();
        assert_eq!(catalog.images[0].widths, [1280, 1920]);
    }

    #[test]
    fn asset_entries_are_named_after_canonical_paths() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path());
        let bundler = FakeBundler::in_dir(tmp.path());

        build(&config(), tmp.path(), &bundler).unwrap();

        let projects = bundler.projects.lock().unwrap();
        let outs: Vec<Option<String>> = projects[0].entry_points.iter().map(|e| e.out.clone()).collect();
        assert_eq!(
            outs,
            [
                Some("stylesheets/home".to_string()),
                Some("javascripts/index".to_string())
            ]
        );
        assert!(projects[0].entry_points[0].input.starts_with("src/stylesheets"));
        assert!(projects[0].entry_points[0].input.is_relative());
    }

    #[test]
    fn second_build_is_stable() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path());
        let bundler = FakeBundler::in_dir(tmp.path());

        let first = build(&config(), tmp.path(), &bundler).unwrap();
        let published = files_under(tmp.path(), "docs/assets");
        let second = build(&config(), tmp.path(), &bundler).unwrap();

        assert_eq!(second.manifest, first.manifest);
        assert_eq!(files_under(tmp.path(), "docs/assets"), published);
        assert_eq!(second.materialized.copied, 0);
    }

    #[test]
    fn stale_published_assets_are_cleared() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path());
        write_file(tmp.path(), "docs/assets/fonts/old.00000000.woff2", "old");
        let bundler = FakeBundler::in_dir(tmp.path());

        let report = build(&config(), tmp.path(), &bundler).unwrap();

        assert_eq!(report.stale_removed, 1);
        assert!(!tmp.path().join("docs/assets/fonts/old.00000000.woff2").exists());
    }

    #[test]
    fn unmatched_glob_aborts_before_writing() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path());
        let mut config = config();
        config.paths.fonts = vec!["src/fonts/*.ttf".into()];
        let bundler = FakeBundler::in_dir(tmp.path());

        let err = build(&config, tmp.path(), &bundler).unwrap_err();

        assert!(matches!(err, BuildError::Glob(GlobError::NoMatches(_))));
        assert!(files_under(tmp.path(), "docs").is_empty());
        assert_eq!(files_under(tmp.path(), "src/fonts"), ["inter.woff2"]);
    }

    #[test]
    fn bundler_failure_is_fatal_and_no_manifest_is_written() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path());
        let bundler = FakeBundler::failing(tmp.path());

        let err = build(&config(), tmp.path(), &bundler).unwrap_err();

        assert!(matches!(err, BuildError::Bundle(BundleError::Failed { .. })));
        assert!(!tmp.path().join("docs/assets/manifest.json").exists());
    }

    #[test]
    fn node_outputs_are_recorded_unhashed() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path());
        write_file(tmp.path(), "scripts/release.ts", "export const x = 1");
        let mut config = config();
        config.projects.push(ProjectConfig {
            name: "scripts".into(),
            entry_points: vec!["scripts/release.ts".into()],
            asset_entries: false,
            outdir: ".github/scripts".into(),
            platform: Platform::Node,
            ..ProjectConfig::default()
        });
        let bundler = FakeBundler::in_dir(tmp.path());

        let report = build(&config, tmp.path(), &bundler).unwrap();

        assert_eq!(report.bundles[1].outputs, [".github/scripts/release.js"]);
        assert!(tmp.path().join(".github/scripts/release.js").is_file());
        assert!(report.manifest.meta_output.contains_key(".github/scripts/release.js"));
    }

    #[test]
    fn check_resolves_without_writing() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path());

        let expanded = check(&config(), tmp.path()).unwrap();

        assert_eq!(expanded.total(), 6);
        assert_eq!(files_under(tmp.path(), "src/fonts"), ["inter.woff2"]);
        assert!(!tmp.path().join("docs").exists());
    }

    #[test]
    fn svgs_are_minified_before_hashing() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path());
        let drawing = "<!-- exported -->\n<svg viewBox=\"0 0 8 8\" width=\"8\">\n  <title>x</title>\n  <rect/>\n</svg>\n";
        write_file(tmp.path(), "src/images/logo.svg", drawing);
        let bundler = FakeBundler::in_dir(tmp.path());

        let first = build(&config(), tmp.path(), &bundler).unwrap();

        let minified = r#"<svg viewBox="0 0 8 8"><rect/></svg>"#;
        let hash = hash_bytes(minified.as_bytes());
        assert_eq!(first.svgs.minified, 1);
        assert_eq!(read(tmp.path(), &format!("src/images/logo.{hash}.svg")), minified);
        assert_eq!(read(tmp.path(), &format!("docs/assets/images/logo.{hash}.svg")), minified);
        assert!(minified.len() < drawing.len());

        let second = build(&config(), tmp.path(), &bundler).unwrap();
        assert_eq!(second.svgs.minified, 0);
        assert_eq!(second.svgs.unchanged, 1);
        assert_eq!(second.manifest, first.manifest);
        assert!(second.rewrites[&Category::Images]
            .assets
            .iter()
            .all(|a| a.outcome == rewrite::Outcome::Unchanged));
    }

    #[test]
    fn svg_minification_can_be_disabled() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path());
        write_file(tmp.path(), "src/images/logo.svg", "<svg>\n  <rect/>\n</svg>\n");
        let mut config = config();
        config.processing.minify_svg = false;
        let bundler = FakeBundler::in_dir(tmp.path());

        let report = build(&config, tmp.path(), &bundler).unwrap();

        let hash = hash_bytes(b"<svg>\n  <rect/>\n</svg>\n");
        assert_eq!(report.svgs, MinifyReport::default());
        assert!(tmp.path().join(format!("src/images/logo.{hash}.svg")).is_file());
    }

    #[test]
    fn hero_catalog_carries_configured_timings() {
        let tmp = TempDir::new().unwrap();
        fixture(tmp.path());
        let mut config = config();
        config.hero.interval_ms = 8_000;
        config.cache.clean_delay_ms = 1_500;
        let bundler = FakeBundler::in_dir(tmp.path());

        build(&config, tmp.path(), &bundler).unwrap();

        let catalog = crate::hero::HeroCatalog::load(&tmp.path().join("docs/assets/hero.json")).unwrap();
        assert_eq!(
            catalog.settings,
            RuntimeSettings {
                interval_ms: 8_000,
                clean_delay_ms: 1_500,
            }
        );
    }

    #[test]
    fn publish_dirs_are_top_level_directories() {
        let layout = layout_in(Path::new("/p"));
        let dirs = publish_dirs(
            &[
                PathBuf::from("/p/docs/assets/fonts/a.woff"),
                PathBuf::from("/p/docs/assets/images/hero/x/x_1280.webp"),
                PathBuf::from("/p/docs/assets/top.svg"),
            ],
            &layout,
        );
        assert_eq!(
            dirs,
            [
                PathBuf::from("/p/docs/assets/fonts"),
                PathBuf::from("/p/docs/assets/images")
            ]
        );
    }
}
