//! # Plain Assets
//!
//! Content-addressed static assets for a plain static site. Every published
//! stylesheet, script, font and image carries a hash of its bytes in its
//! name, so the site can be cached forever and a new build is picked up the
//! moment a page references a new name.
//!
//! # Architecture: Build Pipeline
//!
//! ```text
//! 1. Expand     assets.toml globs    →  files per category
//! 2. Minify     images/*.svg          →  same file, minified    (in place)
//! 3. Reconcile  name.ext             →  name.<hash>.ext        (in place)
//! 4. Publish    src/fonts, src/images →  docs/assets/...       (copy if absent)
//! 5. Bundle     styleSheets, scripts  →  esbuild outputs, post-hashed
//! 6. Record     everything above      →  manifest.json, hashTable.json, hero.json
//! ```
//!
//! The runtime half lives in [`cache`] and [`hero`]: a cache keyed by URL
//! that treats a hashed name as proof of freshness, and the home-page hero
//! cycler that loads images through it.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | The build: stage ordering, failure policy, manifest assembly |
//! | [`config`] | `assets.toml` loading, merging over stock defaults, validation |
//! | [`glob`] | Pattern expansion with braces and `**`; unmatched patterns are errors |
//! | [`hasher`] | SHA-256 content fingerprint, truncated to [`hashname::HASH_LEN`] hex digits |
//! | [`hashname`] | `name.<hash>.ext` parsing and formatting, hash extraction from URLs |
//! | [`rewrite`] | Bring files to their hashed names, repairing stale and drifted hashes |
//! | [`materialize`] | Copy hashed fonts and images to the publish directory |
//! | [`svg`] | In-place SVG minification ahead of hashing |
//! | [`bundler`] | esbuild invocation and metafile parsing |
//! | [`manifest`] | `manifest.json` / `hashTable.json` model and atomic writes |
//! | [`cache`] | Hash-validated asset cache, cleaning, old-generation removal |
//! | [`hero`] | Hero catalog, randomized sequence, image layer and cycling state machine |
//! | [`types`] | Categories, pattern lists, source/publish layout |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Hash in the Name, Not the Query
//!
//! `home.1a2b3c4d.css` rather than `home.css?v=1a2b3c4d`. A file's name is
//! then enough to tell whether a cached copy is current: the cache hashes
//! the name of the stored response and compares it to the requested one,
//! without a network round trip and without a separate version table.
//!
//! ## Reconcile In Place
//!
//! Sources are renamed where they live instead of being copied to a build
//! directory. A second build over unchanged files performs no writes, and
//! the glob list (`a.css`, `a.*.css`) finds the asset in either form.

pub mod bundler;
pub mod cache;
pub mod config;
pub mod glob;
pub mod hasher;
pub mod hashname;
pub mod hero;
pub mod manifest;
pub mod materialize;
pub mod output;
pub mod pipeline;
pub mod rewrite;
pub mod svg;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
