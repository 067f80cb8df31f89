//! Error handling for the LCI matrix pipeline.
//!
//! Fatal conditions are `LciError` values. Recoverable conditions (dropped
//! duplicates, identity conflicts, ambiguous factors) are collected as
//! [`crate::report::Warning`]s instead and never abort a run.

pub mod util;

use std::io;
use std::path::PathBuf;

use arrow::error::ArrowError;
use parquet::errors::ParquetError;
use thiserror::Error;

use crate::graph::FlowIssue;

/// Violations raised by a [`crate::store::StagingStore`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A row with the same unique key already exists
    #[error("unique constraint violated on {table}: {key}")]
    UniqueViolation { table: &'static str, key: String },
    /// The referenced row does not exist
    #[error("no row in {table} for key {key}")]
    UnknownKey { table: &'static str, key: String },
    /// `begin` was called while a transaction was already open
    #[error("a transaction is already open")]
    TransactionOpen,
    /// `commit` or `rollback` was called without an open transaction
    #[error("no open transaction")]
    NoTransaction,
}

/// Specialized error type for the pipeline
#[derive(Debug, Error)]
pub enum LciError {
    /// Error opening or reading a file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Filesystem error with the offending path attached
    #[error("{context}: {}", .path.display())]
    Path {
        path: PathBuf,
        context: String,
        #[source]
        source: Option<io::Error>,
    },

    /// Error reading or writing Parquet data
    #[error("Parquet error: {0}")]
    Parquet(#[from] ParquetError),

    /// Error building Arrow arrays or IPC files
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Error converting between serde types and Arrow batches
    #[error("serde_arrow error: {0}")]
    SerdeArrow(#[from] serde_arrow::Error),

    /// Error reading or writing JSON documents
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A background task failed to complete
    #[error("task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A single record was rejected; the batch it belongs to continues
    #[error("malformed record {record}: {reason}")]
    MalformedRecord { record: String, reason: String },

    /// Flows that could not be traced, collected over a whole batch
    #[error("{} untraceable flow(s): {}", .0.len(), summarize_issues(.0))]
    UnresolvedFlows(Vec<FlowIssue>),

    /// Staging store constraint violation
    #[error("staging store error: {0}")]
    Store(#[from] StoreError),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Matrix dimensions or labels do not line up
    #[error("matrix error: {0}")]
    Matrix(String),

    /// Intermediate cache could not be used
    #[error("cache error: {0}")]
    Cache(String),

    /// Artifact could not be written or verified
    #[error("export error: {0}")]
    Export(String),
}

impl LciError {
    /// Create a path error without an underlying IO error
    pub fn path(path: impl Into<PathBuf>, context: impl Into<String>) -> Self {
        Self::Path {
            path: path.into(),
            context: context.into(),
            source: None,
        }
    }

    /// Create a path error wrapping an IO error
    pub fn path_with_source(
        path: impl Into<PathBuf>,
        context: impl Into<String>,
        source: io::Error,
    ) -> Self {
        Self::Path {
            path: path.into(),
            context: context.into(),
            source: Some(source),
        }
    }

    /// Returns true if the run was aborted because of untraceable flows
    #[must_use]
    pub const fn is_unresolved_flows(&self) -> bool {
        matches!(self, Self::UnresolvedFlows(_))
    }
}

fn summarize_issues(issues: &[FlowIssue]) -> String {
    const SHOWN: usize = 5;
    let mut text = issues
        .iter()
        .take(SHOWN)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    if issues.len() > SHOWN {
        text.push_str(&format!("; and {} more", issues.len() - SHOWN));
    }
    text
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, LciError>;
