use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Lowercase hex sha256 of a byte slice. Source identity (§3) is the
/// triple (name, mtime, content hash); this supplies the hash leg.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(64);
    for b in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

pub fn hash_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(sha256_hex(&bytes))
}
