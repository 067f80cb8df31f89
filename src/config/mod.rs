//! Configuration for the matrix pipeline.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{LciError, Result};
use crate::error::util::safe_read_to_string;

/// Field used to order process rows and columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessSortKey {
    Isic,
    ActivityName,
    ProductName,
    Geography,
    EcospoldCategory,
    TechnologyLevel,
    Id,
}

/// Field used to order stressor rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressorSortKey {
    Compartment,
    Subcompartment,
    Name,
    Unit,
    Tag,
    Cas,
}

/// Serialized form of a persisted matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// Parquet table with one column per matrix column
    DenseTable,
    /// Parquet table of (row, col, value) triplets
    SparseTable,
    /// Arrow IPC file of index triplets with label metadata
    BinaryMatrix,
}

impl OutputFormat {
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::DenseTable => "dense.parquet",
            Self::SparseTable => "sparse.parquet",
            Self::BinaryMatrix => "arrow",
        }
    }
}

/// What to do with two exchanges that share the same key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Drop identical repeats; different amounts for one key abort the run
    #[default]
    Reject,
    /// Add the amounts together and report it
    Sum,
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Prefix of every persisted artifact
    pub project_name: String,
    /// Directory receiving matrices, label tables and the manifest
    pub out_dir: PathBuf,
    /// Directory holding fingerprint-keyed intermediate records
    pub cache_dir: Option<PathBuf>,
    /// Represent waste treatment as positive output
    pub waste_sign_flip: bool,
    /// Replace undefined cells by 0.0 as the last step
    pub nan_to_zero: bool,
    /// Read parsed records from the cache when the fingerprint matches
    pub prefer_cached_intermediate: bool,
    /// Write parsed records to the cache
    pub save_intermediate: bool,
    pub process_order: Vec<ProcessSortKey>,
    pub stressor_order: Vec<StressorSortKey>,
    pub output_formats: BTreeSet<OutputFormat>,
    /// Also produce the unnormalized Z and G matrices
    pub with_absolute_flows: bool,
    pub duplicate_policy: DuplicatePolicy,
    /// Try to find the supplier of inputs that do not name one
    pub repair_unsourced_flows: bool,
    /// Key use-table rows by product only instead of (supplier, product)
    pub untraceable_use: bool,
    /// Scheme name of the inventory's own elementary flow names
    pub inventory_scheme: String,
    /// Show progress bars for batch passes
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            project_name: "lci".to_string(),
            out_dir: PathBuf::from("."),
            cache_dir: None,
            waste_sign_flip: false,
            nan_to_zero: false,
            prefer_cached_intermediate: false,
            save_intermediate: true,
            process_order: vec![ProcessSortKey::Isic, ProcessSortKey::ActivityName],
            stressor_order: vec![
                StressorSortKey::Compartment,
                StressorSortKey::Subcompartment,
                StressorSortKey::Name,
            ],
            output_formats: [
                OutputFormat::DenseTable,
                OutputFormat::SparseTable,
                OutputFormat::BinaryMatrix,
            ]
            .into_iter()
            .collect(),
            with_absolute_flows: false,
            duplicate_policy: DuplicatePolicy::Reject,
            repair_unsourced_flows: true,
            untraceable_use: true,
            inventory_scheme: "ecoinvent".to_string(),
            show_progress: false,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = safe_read_to_string(path, "pipeline configuration")?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check option combinations that cannot produce a run
    pub fn validate(&self) -> Result<()> {
        if self.project_name.trim().is_empty() {
            return Err(LciError::Config("project_name must not be empty".to_string()));
        }
        if self.process_order.iter().duplicates().next().is_some() {
            return Err(LciError::Config("process_order repeats a key".to_string()));
        }
        if self.stressor_order.iter().duplicates().next().is_some() {
            return Err(LciError::Config("stressor_order repeats a key".to_string()));
        }
        if self.prefer_cached_intermediate && self.cache_dir.is_none() {
            log::warn!("prefer_cached_intermediate is set without cache_dir; the cache is ignored");
        }
        Ok(())
    }

    #[must_use]
    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = name.into();
        self
    }

    #[must_use]
    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub const fn with_waste_sign_flip(mut self, enabled: bool) -> Self {
        self.waste_sign_flip = enabled;
        self
    }

    #[must_use]
    pub const fn with_nan_to_zero(mut self, enabled: bool) -> Self {
        self.nan_to_zero = enabled;
        self
    }

    #[must_use]
    pub const fn with_prefer_cached_intermediate(mut self, enabled: bool) -> Self {
        self.prefer_cached_intermediate = enabled;
        self
    }

    #[must_use]
    pub const fn with_absolute_flows(mut self, enabled: bool) -> Self {
        self.with_absolute_flows = enabled;
        self
    }

    #[must_use]
    pub const fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    #[must_use]
    pub const fn with_untraceable_use(mut self, enabled: bool) -> Self {
        self.untraceable_use = enabled;
        self
    }

    #[must_use]
    pub const fn with_repair_unsourced_flows(mut self, enabled: bool) -> Self {
        self.repair_unsourced_flows = enabled;
        self
    }

    #[must_use]
    pub fn with_process_order(mut self, keys: Vec<ProcessSortKey>) -> Self {
        self.process_order = keys;
        self
    }

    #[must_use]
    pub fn with_stressor_order(mut self, keys: Vec<StressorSortKey>) -> Self {
        self.stressor_order = keys;
        self
    }

    #[must_use]
    pub fn with_output_formats(mut self, formats: impl IntoIterator<Item = OutputFormat>) -> Self {
        self.output_formats = formats.into_iter().collect();
        self
    }
}

impl fmt::Display for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline configuration for '{}':", self.project_name)?;
        writeln!(f, "  Output directory: {}", self.out_dir.display())?;
        match &self.cache_dir {
            Some(dir) => writeln!(f, "  Cache directory: {}", dir.display())?,
            None => writeln!(f, "  Cache directory: none")?,
        }
        writeln!(f, "  Waste sign flip: {}", self.waste_sign_flip)?;
        writeln!(f, "  NaN to zero: {}", self.nan_to_zero)?;
        writeln!(f, "  Prefer cached intermediate: {}", self.prefer_cached_intermediate)?;
        writeln!(f, "  Save intermediate: {}", self.save_intermediate)?;
        writeln!(f, "  Process order: {:?}", self.process_order)?;
        writeln!(f, "  Stressor order: {:?}", self.stressor_order)?;
        writeln!(f, "  Output formats: {:?}", self.output_formats)?;
        writeln!(f, "  Absolute flows: {}", self.with_absolute_flows)?;
        writeln!(f, "  Duplicate policy: {:?}", self.duplicate_policy)?;
        writeln!(f, "  Repair unsourced flows: {}", self.repair_unsourced_flows)?;
        write!(f, "  Untraceable use table: {}", self.untraceable_use)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(
            config.process_order,
            vec![ProcessSortKey::Isic, ProcessSortKey::ActivityName]
        );
        assert_eq!(config.output_formats.len(), 3);
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Reject);
        assert!(!config.nan_to_zero);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"waste_sign_flip": true, "output_formats": ["sparse_table"]}"#)
                .unwrap();
        assert!(config.waste_sign_flip);
        assert_eq!(config.output_formats.len(), 1);
        assert!(config.output_formats.contains(&OutputFormat::SparseTable));
        assert_eq!(config.project_name, "lci");
    }

    #[test]
    fn test_repeated_sort_key_is_rejected() {
        let config = PipelineConfig::default()
            .with_process_order(vec![ProcessSortKey::Isic, ProcessSortKey::Isic]);
        assert!(config.validate().is_err());
    }
}
