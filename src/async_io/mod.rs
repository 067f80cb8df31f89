//! Async file operations for source fingerprints and the intermediate cache
//!
//! File digests and cache files are processed concurrently, up to one task
//! per CPU.

use std::path::{Path, PathBuf};
use std::time::Instant;

use arrow::record_batch::RecordBatch;
use futures::stream::{self, StreamExt};
use futures::TryStreamExt;
use parquet::arrow::async_reader::ParquetRecordBatchStreamBuilder;
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use crate::cache::{ENTRY_FILES, IntermediateCache, decode_entry};
use crate::error::{LciError, Result};
use crate::source::SourceData;
use crate::utils::hashing::{combine_fingerprints, list_files_recursive};
use crate::utils::io::DEFAULT_BATCH_SIZE;
use crate::utils::logging::log_stage_complete;

const BLOCK_SIZE: usize = 64 * 1024;

async fn open_async(path: &Path, purpose: &str) -> Result<File> {
    File::open(path)
        .await
        .map_err(|e| LciError::path_with_source(path, format!("Failed to open file for {purpose}"), e))
}

/// SHA-256 of a file, read asynchronously in 64 KiB blocks
pub async fn fingerprint_file_async(path: &Path) -> Result<String> {
    let mut file = open_async(path, "fingerprinting").await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0_u8; BLOCK_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|e| LciError::path_with_source(path, "Failed to read file for fingerprinting", e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Fingerprint of a directory's contents, equal to
/// [`crate::utils::hashing::fingerprint_directory`]
pub async fn fingerprint_directory_async(dir: &Path) -> Result<String> {
    let start = Instant::now();
    let listing_dir = dir.to_path_buf();
    let files = tokio::task::spawn_blocking(move || list_files_recursive(&listing_dir)).await??;

    let mut entries: Vec<(PathBuf, String)> = stream::iter(files)
        .map(|relative| {
            let path = dir.join(&relative);
            async move {
                let digest = fingerprint_file_async(&path).await?;
                Ok::<_, LciError>((relative, digest))
            }
        })
        .buffer_unordered(num_cpus::get())
        .try_collect()
        .await?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    log_stage_complete("Fingerprinted", entries.len(), start.elapsed());
    Ok(combine_fingerprints(&entries))
}

/// Read a Parquet file asynchronously into record batches
pub async fn read_parquet_async(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = open_async(path, "reading parquet").await?;
    let stream = ParquetRecordBatchStreamBuilder::new(file)
        .await?
        .with_batch_size(DEFAULT_BATCH_SIZE)
        .build()?;
    Ok(stream.try_collect::<Vec<_>>().await?)
}

/// Read a cache entry with its files loaded concurrently; `Ok(None)` when
/// the fingerprint is not cached
pub async fn load_cache_async(cache: &IntermediateCache, fingerprint: &str) -> Result<Option<SourceData>> {
    if !cache.contains(fingerprint) {
        return Ok(None);
    }
    let start = Instant::now();
    let dir = cache.entry_dir(fingerprint);

    let mut loaded: Vec<(usize, Vec<RecordBatch>)> = stream::iter(ENTRY_FILES.iter().enumerate())
        .map(|(i, file)| {
            let path = dir.join(file);
            async move { read_parquet_async(&path).await.map(|batches| (i, batches)) }
        })
        .buffer_unordered(num_cpus::get())
        .try_collect()
        .await?;
    loaded.sort_by_key(|(i, _)| *i);

    let mut files = loaded.into_iter().map(|(_, batches)| batches);
    let mut next = || files.next().unwrap_or_default();
    let batches = [next(), next(), next(), next()];
    let data = decode_entry(batches)?;
    log_stage_complete("Loaded cached", data.record_count(), start.elapsed());
    Ok(Some(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ActivityRecord;
    use crate::utils::hashing::fingerprint_directory;

    #[tokio::test]
    async fn test_async_fingerprint_matches_sync() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("activities.json"), "[]").unwrap();
        std::fs::write(dir.path().join("nested").join("x.bin"), vec![7_u8; 200_000]).unwrap();

        let sync = fingerprint_directory(dir.path()).unwrap();
        let async_fp = fingerprint_directory_async(dir.path()).await.unwrap();
        assert_eq!(sync, async_fp);
    }

    #[tokio::test]
    async fn test_async_cache_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IntermediateCache::new(dir.path());
        assert!(load_cache_async(&cache, "missing").await.unwrap().is_none());

        let data = SourceData {
            activities: vec![ActivityRecord::new("mine", "ore").with_output("ore", 2.0, None)],
            ..SourceData::default()
        };
        cache.store("fp", &data).unwrap();
        assert_eq!(load_cache_async(&cache, "fp").await.unwrap(), Some(data));
    }
}
