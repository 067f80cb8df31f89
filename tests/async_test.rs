mod utils;

use futures::future::join_all;
use lci_matrix::async_io::{fingerprint_directory_async, load_cache_async, read_parquet_async};
use lci_matrix::{IntermediateCache, JsonDirectorySource, RecordSource};
use utils::bar_pub_source;

/// Async and blocking fingerprints of a source directory agree
#[tokio::test]
async fn test_async_fingerprint_matches_source() -> lci_matrix::Result<()> {
    let dir = tempfile::tempdir()?;
    let data = bar_pub_source();
    std::fs::write(
        dir.path().join(JsonDirectorySource::ACTIVITIES),
        serde_json::to_string(&data.activities)?,
    )?;
    std::fs::write(
        dir.path().join(JsonDirectorySource::ELEMENTARY),
        serde_json::to_string(&data.elementary)?,
    )?;

    let source = JsonDirectorySource::new(dir.path());
    let start = std::time::Instant::now();
    let async_fp = fingerprint_directory_async(dir.path()).await?;
    println!("Fingerprinted {} in {:?}", dir.path().display(), start.elapsed());
    assert_eq!(async_fp, source.fingerprint()?);

    // a precomputed fingerprint is reused as is
    let known = JsonDirectorySource::new(dir.path()).with_fingerprint(async_fp.clone());
    std::fs::write(dir.path().join("notes.txt"), "changed after hashing")?;
    assert_eq!(known.fingerprint()?, async_fp);
    assert_ne!(source.fingerprint()?, async_fp);
    Ok(())
}

/// Cached entries load concurrently and decode to the stored records
#[tokio::test]
async fn test_concurrent_cache_reads() -> lci_matrix::Result<()> {
    let dir = tempfile::tempdir()?;
    let cache = IntermediateCache::new(dir.path());
    let data = bar_pub_source();
    let entry = cache.store("abc", &data)?;

    let loaded = load_cache_async(&cache, "abc").await?;
    assert_eq!(loaded.as_ref(), Some(&data));
    assert!(load_cache_async(&cache, "missing").await?.is_none());

    let files: Vec<_> = std::fs::read_dir(&entry)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .collect();
    let reads = join_all(files.iter().map(|p| read_parquet_async(p))).await;
    let rows: usize = reads
        .into_iter()
        .map(|r| r.map(|batches| batches.iter().map(|b| b.num_rows()).sum::<usize>()))
        .sum::<lci_matrix::Result<usize>>()?;
    // two datasets, their exchanges, two elementary and two characterisation records
    assert_eq!(rows, 2 + 7 + 2 + 2);
    Ok(())
}
