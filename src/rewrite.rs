//! Hashed-file reconciliation.
//!
//! Brings every asset to the form `name.<hash>.ext`, where `<hash>` is the
//! [content fingerprint](crate::hasher) of its bytes.
//!
//! # Cases
//!
//! For an asset group (a canonical `name.ext` plus any hashed siblings
//! `name.<h>.ext` in the same directory):
//!
//! | Canonical present | Hashed sibling | Action |
//! |-------------------|----------------|--------|
//! | yes | none | hash, rename canonical → hashed |
//! | yes | same hash | drop the canonical duplicate |
//! | yes | other hash | delete stale sibling + its publish copy, rename canonical |
//! | no | hash matches content | nothing |
//! | no | hash drifted | rename sibling to its real hash, drop publish copy |
//!
//! The last two rows make a second run over unchanged inputs read-only.
//!
//! # Failure policy
//!
//! Filesystem errors are logged per operation and recorded as
//! [`Outcome::Failed`]; the remaining assets are still processed. A failed
//! rename is not retried; the next build converges.

use crate::hasher::hash_file;
use crate::hashname::{HashedName, canonical_path, hash_of_path, hashed_path};
use crate::types::Layout;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// What reconciliation did to an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// First-time hash: the canonical file was renamed.
    Hashed,
    /// Already up to date.
    Unchanged,
    /// Content changed since the last build; the previous hash was replaced.
    Rehashed { previous: String },
    /// A filesystem operation failed; the asset may be stale.
    Failed(String),
}

/// Result of reconciling one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Canonical (unhashed) path of the asset.
    pub canonical: PathBuf,
    /// Final hashed path (or the best known path on failure).
    pub path: PathBuf,
    pub outcome: Outcome,
}

impl Reconciled {
    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed(_))
    }

    /// Embedded hash of the final path.
    pub fn hash(&self) -> Option<String> {
        hash_of_path(&self.path)
    }
}

/// Reconciliation results for a set of inputs, sorted by final path.
#[derive(Debug, Default)]
pub struct RewriteReport {
    pub assets: Vec<Reconciled>,
}

impl RewriteReport {
    /// Final paths of every asset that did not fail.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.assets
            .iter()
            .filter(|a| !a.is_failed())
            .map(|a| a.path.clone())
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.assets.iter().filter(|a| pred(&a.outcome)).count()
    }

    pub fn failures(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }
}

/// Reconcile the asset a path belongs to.
///
/// `path` may be the canonical file or any hashed sibling of it.
pub fn reconcile(path: &Path, layout: &Layout) -> Reconciled {
    let canonical = canonical_path(path);
    if canonical.is_file() {
        reconcile_group(&canonical, layout)
    } else if hash_of_path(path).is_some() {
        verify_hashed(path, &canonical, layout)
    } else {
        tracing::warn!(path = %path.display(), "source file missing");
        Reconciled {
            canonical,
            path: path.to_path_buf(),
            outcome: Outcome::Failed("source file missing".to_string()),
        }
    }
}

/// Reconcile many inputs. Inputs that belong to the same asset
/// (`a.css`, `a.<h>.css`) are reconciled once; groups run in parallel.
pub fn reconcile_all<'a, I>(paths: I, layout: &Layout) -> RewriteReport
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let mut groups: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for path in paths {
        groups
            .entry(canonical_path(path))
            .or_default()
            .push(path.clone());
    }

    let mut assets: Vec<Reconciled> = groups
        .into_par_iter()
        .flat_map_iter(|(canonical, members)| {
            if canonical.is_file() {
                vec![reconcile_group(&canonical, layout)]
            } else {
                members
                    .iter()
                    .map(|m| reconcile(m, layout))
                    .collect::<Vec<_>>()
            }
        })
        .collect();

    assets.sort_by(|a, b| a.path.cmp(&b.path));
    RewriteReport { assets }
}

/// Hashed siblings of a canonical file: `name.<h>.ext` in the same directory.
fn hashed_siblings(canonical: &Path) -> Vec<PathBuf> {
    let (Some(dir), Some(name)) = (canonical.parent(), canonical.file_name()) else {
        return Vec::new();
    };
    let name = name.to_string_lossy();
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut siblings: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|e| {
            e.file_name()
                .to_str()
                .and_then(HashedName::parse)
                .is_some_and(|h| h.canonical() == name)
        })
        .map(|e| e.path())
        .collect();
    siblings.sort();
    siblings
}

fn reconcile_group(canonical: &Path, layout: &Layout) -> Reconciled {
    let failed = |reason: String| Reconciled {
        canonical: canonical.to_path_buf(),
        path: canonical.to_path_buf(),
        outcome: Outcome::Failed(reason),
    };

    let hash = match hash_file(canonical) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!(path = %canonical.display(), error = %e, "hashing failed");
            return failed(format!("hashing failed: {e}"));
        }
    };
    let target = hashed_path(canonical, &hash);

    let mut previous = None;
    let mut mirror_dropped = false;
    for sibling in hashed_siblings(canonical) {
        if sibling == target {
            continue;
        }
        previous = hash_of_path(&sibling);
        remove_logged(&sibling, "stale hashed file");
        if let Some(mirror) = layout.mirror_of(&sibling)
            && mirror.exists()
        {
            mirror_dropped |= remove_logged(&mirror, "stale published copy");
        }
    }

    let outcome = if target.exists() {
        // Same content already hashed; the canonical file is a duplicate.
        remove_logged(canonical, "duplicate canonical file");
        match previous {
            Some(previous) => Outcome::Rehashed { previous },
            None => Outcome::Unchanged,
        }
    } else {
        if let Err(e) = fs::rename(canonical, &target) {
            tracing::warn!(
                from = %canonical.display(),
                to = %target.display(),
                error = %e,
                "rename failed"
            );
            return failed(format!("rename failed: {e}"));
        }
        tracing::info!(from = %canonical.display(), to = %target.display(), "hashed");
        match previous {
            Some(previous) => Outcome::Rehashed { previous },
            None => Outcome::Hashed,
        }
    };

    if mirror_dropped {
        propagate_to_mirror(&target, layout);
    }

    Reconciled {
        canonical: canonical.to_path_buf(),
        path: target,
        outcome,
    }
}

/// A hashed file whose canonical source is gone: check the name still
/// matches the content, and repair it if not.
fn verify_hashed(path: &Path, canonical: &Path, layout: &Layout) -> Reconciled {
    let embedded = hash_of_path(path).unwrap_or_default();
    let actual = match hash_file(path) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "hashing failed");
            return Reconciled {
                canonical: canonical.to_path_buf(),
                path: path.to_path_buf(),
                outcome: Outcome::Failed(format!("hashing failed: {e}")),
            };
        }
    };

    if actual == embedded {
        return Reconciled {
            canonical: canonical.to_path_buf(),
            path: path.to_path_buf(),
            outcome: Outcome::Unchanged,
        };
    }

    tracing::info!(path = %path.display(), embedded, actual, "content drifted from name");
    let target = hashed_path(canonical, &actual);
    let mirror_dropped = match layout.mirror_of(path) {
        Some(mirror) if mirror.exists() => remove_logged(&mirror, "stale published copy"),
        _ => false,
    };

    if target.exists() {
        remove_logged(path, "drifted duplicate");
    } else if let Err(e) = fs::rename(path, &target) {
        tracing::warn!(from = %path.display(), to = %target.display(), error = %e, "rename failed");
        return Reconciled {
            canonical: canonical.to_path_buf(),
            path: path.to_path_buf(),
            outcome: Outcome::Failed(format!("rename failed: {e}")),
        };
    }

    if mirror_dropped {
        propagate_to_mirror(&target, layout);
    }

    Reconciled {
        canonical: canonical.to_path_buf(),
        path: target,
        outcome: Outcome::Rehashed { previous: embedded },
    }
}

/// Copy a freshly hashed file to its publish location.
fn propagate_to_mirror(hashed: &Path, layout: &Layout) {
    let Some(mirror) = layout.mirror_of(hashed) else {
        return;
    };
    let result = mirror
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| fs::copy(hashed, &mirror).map(|_| ()));
    match result {
        Ok(()) => tracing::info!(to = %mirror.display(), "published copy updated"),
        Err(e) => tracing::warn!(to = %mirror.display(), error = %e, "publishing copy failed"),
    }
}

/// Remove a file, logging the outcome. Returns whether it was removed.
fn remove_logged(path: &Path, what: &str) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "removed {what}");
            true
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "removing {what} failed");
            false
        }
    }
}
