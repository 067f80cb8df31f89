//! Utility functions for error handling
//!
//! Filesystem helpers that attach the offending path and the purpose of the
//! access to the error.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{LciError, Result};

/// Safely open a file with rich error information
///
/// # Arguments
/// * `path` - The path to the file to open
/// * `purpose` - Why the file is being opened (for error context)
pub fn safe_open_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if !path.exists() {
        return Err(LciError::path(path, format!("File not found, needed for {purpose}")));
    }
    if !path.is_file() {
        return Err(LciError::path(path, format!("Expected a file for {purpose}")));
    }

    fs::File::open(path).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::PermissionDenied => "Permission denied - check file permissions".to_string(),
            _ => format!("Failed to open file for {purpose}"),
        };
        LciError::path_with_source(path, context, e)
    })
}

/// Create a file for writing, creating parent directories as needed
pub fn safe_create_file(path: &Path, purpose: &str) -> Result<fs::File> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent, purpose)?;
    }
    fs::File::create(path)
        .map_err(|e| LciError::path_with_source(path, format!("Failed to create file for {purpose}"), e))
}

/// Check if a directory exists and is readable
pub fn validate_directory(path: &Path, purpose: &str) -> Result<()> {
    if !path.exists() {
        return Err(LciError::path(path, format!("Directory not found, needed for {purpose}")));
    }
    if !path.is_dir() {
        return Err(LciError::path(path, format!("Expected a directory for {purpose}")));
    }

    match fs::read_dir(path) {
        Ok(_) => Ok(()),
        Err(e) => {
            let context = match e.kind() {
                io::ErrorKind::PermissionDenied => {
                    "Permission denied - check directory permissions".to_string()
                }
                _ => format!("Failed to access directory for {purpose}"),
            };
            Err(LciError::path_with_source(path, context, e))
        }
    }
}

/// Create a directory (and its parents) if it does not exist yet
pub fn ensure_directory(path: &Path, purpose: &str) -> Result<()> {
    if path.as_os_str().is_empty() || path.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(path).map_err(|e| {
        LciError::path_with_source(path, format!("Failed to create directory for {purpose}"), e)
    })
}

/// Safely read a file to string with rich error information
pub fn safe_read_to_string(path: &Path, purpose: &str) -> Result<String> {
    let mut file = safe_open_file(path, purpose)?;
    let mut content = String::new();
    io::Read::read_to_string(&mut file, &mut content).map_err(|e| {
        let context = match e.kind() {
            io::ErrorKind::InvalidData => "File contains invalid UTF-8 data".to_string(),
            _ => format!("Failed to read file content for {purpose}"),
        };
        LciError::path_with_source(path, context, e)
    })?;
    Ok(content)
}
