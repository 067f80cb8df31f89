//! IO utilities for file operations

pub mod parquet;

pub use parquet::{DEFAULT_BATCH_SIZE, read_parquet, write_parquet};
