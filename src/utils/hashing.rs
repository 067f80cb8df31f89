//! Content fingerprints for source directories and persisted artifacts

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::util::{safe_open_file, validate_directory};
use crate::error::{LciError, Result};

const BLOCK_SIZE: usize = 64 * 1024;

/// SHA-256 of a file, read in 64 KiB blocks
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let mut file = safe_open_file(path, "fingerprinting")?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; BLOCK_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .map_err(|e| LciError::path_with_source(path, "Failed to read file for fingerprinting", e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// SHA-256 of in-memory bytes
#[must_use]
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// All regular files below `dir`, as paths relative to `dir`, sorted.
///
/// Symbolic links are not followed, so linked files and directories are
/// left out of the listing.
pub fn list_files_recursive(dir: &Path) -> Result<Vec<PathBuf>> {
    validate_directory(dir, "fingerprinting")?;
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            LciError::path_with_source(path, "Failed to list directory", io::Error::from(e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(dir) {
            files.push(relative.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Combine per-file fingerprints into one directory fingerprint.
///
/// Entries must be sorted by path; both the paths and the contents enter the
/// digest, so renaming a file changes the fingerprint.
#[must_use]
pub fn combine_fingerprints(entries: &[(PathBuf, String)]) -> String {
    let mut hasher = Sha256::new();
    for (path, digest) in entries {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update([0_u8]);
        hasher.update(digest.as_bytes());
        hasher.update([b'\n']);
    }
    format!("{:x}", hasher.finalize())
}

/// Fingerprint of a directory's contents
pub fn fingerprint_directory(dir: &Path) -> Result<String> {
    let entries = list_files_recursive(dir)?
        .into_iter()
        .map(|relative| {
            let digest = fingerprint_file(&dir.join(&relative))?;
            Ok((relative, digest))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(combine_fingerprints(&entries))
}
