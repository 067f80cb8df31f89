//! Shared utilities: logging, hashing and Parquet IO

pub mod hashing;
pub mod io;
pub mod logging;

pub use hashing::{fingerprint_directory, fingerprint_file};
pub use io::{read_parquet, write_parquet};
pub use logging::{log_artifact, log_stage_complete, log_stage_start, log_warning};
