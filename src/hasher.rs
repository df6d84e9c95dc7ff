//! Content fingerprints for cache-busting file names.
//!
//! The fingerprint is the first [`HASH_LEN`] hex characters of the SHA-256
//! digest of the file's raw bytes. Content-based rather than mtime-based, so
//! a `git checkout` that resets modification times never changes a name.

use crate::hashname::HASH_LEN;
use sha2::{Digest, Sha256};
use std::io;
use std::path::Path;

/// Fingerprint of a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = format!("{:x}", digest);
    hex.truncate(HASH_LEN);
    hex
}

/// Fingerprint of a file's contents.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(hash_bytes(&bytes))
}
