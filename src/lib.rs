//! Reconciles life-cycle inventory unit-process records into labelled
//! Leontief (`A`, `F`, `Z`, `G`) and supply-use (`V`, `U`, `G_act`) matrices,
//! with substance identities resolved across naming schemes.

pub mod async_io;
pub mod cache;
pub mod characterisation;
pub mod config;
pub mod error;
pub mod export;
pub mod graph;
pub mod matrix;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod resolve;
pub mod source;
pub mod store;
pub mod taxonomy;
pub mod utils;

// Core types
pub use config::{DuplicatePolicy, OutputFormat, PipelineConfig, ProcessSortKey, StressorSortKey};
pub use error::{LciError, Result, StoreError};
pub use pipeline::{LeontiefOutput, Pipeline, SutOutput};
pub use report::{RunReport, Warning};

// Stages
pub use characterisation::{Characterisation, FactorTable, characterise};
pub use graph::{FlowGraph, FlowGraphBuilder, FlowIssue, Traceability};
pub use matrix::{LabelledMatrix, LeontiefSystem, SupplyUseSystem, assemble_leontief, assemble_sut};
pub use normalize::{CorrectionTable, LabelNormalizer, NormalizedBatch};
pub use resolve::{ResolutionReport, SchemeRegistry, SubstanceResolver};
pub use taxonomy::{MatchKind, SubcompartmentMatcher};

// Persistence
pub use cache::IntermediateCache;
pub use export::{Exporter, Manifest, read_binary_matrix, read_dense_table, verify_manifest};
pub use source::{InMemorySource, JsonDirectorySource, RecordSource, SourceData};
pub use store::{MemoryStore, StagingStore};
