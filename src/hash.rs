//! SHA-1 content hashing
//!
//! Hunter names cache archives and verifies remote files by the SHA-1 of
//! their content, so the uploader has to speak the same digest.

use crate::error::{UploadError, UploadResult};
use sha1::{Digest, Sha1};
use std::fs;
use std::path::Path;

/// Hex-encoded SHA-1 of a byte slice
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hex-encoded SHA-1 of a file's content
pub fn sha1_file(path: &Path) -> UploadResult<String> {
    let data = fs::read(path)
        .map_err(|e| UploadError::io(format!("reading {} for hashing", path.display()), e))?;
    Ok(sha1_hex(&data))
}
