//! Parquet file operations shared by the cache and the exporter

use std::path::Path;

use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::error::Result;
use crate::error::util::{safe_create_file, safe_open_file};

/// Default batch size for Parquet reading
pub const DEFAULT_BATCH_SIZE: usize = 16384;

/// Read every record batch of a Parquet file
pub fn read_parquet(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = safe_open_file(path, "reading parquet")?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?
        .with_batch_size(DEFAULT_BATCH_SIZE)
        .build()?;
    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(batches)
}

/// Write one record batch as a Snappy-compressed Parquet file
pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = safe_create_file(path, "writing parquet")?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}
