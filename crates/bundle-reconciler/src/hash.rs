//! Hashing utilities for bundle contents.

use crate::types::SourceFile;
use sha2::{Digest, Sha256};

/// Computes SHA-256 hash of data and returns hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Computes SHA-256 hash of a string.
pub fn sha256_str(s: &str) -> String {
    sha256_hex(s.as_bytes())
}

/// Computes a digest over a set of source files.
///
/// Each file contributes its qualified path and content hash, in the order
/// given, so the caller's input order is part of the digest.
pub fn files_digest<'a, I>(files: I) -> String
where
    I: IntoIterator<Item = &'a SourceFile>,
{
    let mut hasher = Sha256::new();
    for file in files {
        let entry = format!("{}:{}\n", file.qualified_path(), sha256_hex(&file.content));
        hasher.update(entry.as_bytes());
    }
    hex::encode(hasher.finalize())
}
