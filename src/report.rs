//! Recoverable findings and the run summary
//!
//! Stages push [`Warning`]s instead of failing; the pipeline gathers them in
//! a [`RunReport`] for manual review.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// Kind of identity conflict found by the resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityConflict {
    /// One `(name, tag)` observed with several CAS numbers
    CasForName,
    /// Two names of one record resolve to different substances
    MissedSynonym,
    /// Several existing substances match one group of synonymous names
    AmbiguousCandidates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A duplicate exchange or dataset was dropped or summed
    DuplicateRecord { key: String, detail: String },
    ConflictingIdentity {
        conflict: IdentityConflict,
        detail: String,
    },
    /// Two names differ only by a trailing "s" but map to different substances
    PossiblePlural { singular: String, plural: String },
    /// One factor key with different values; the key is excluded
    CharacterizationConflict { key: String, values: Vec<f64> },
    MalformedRecord { record: String, reason: String },
    /// A stressor without any characterisation factor
    Uncharacterised { stressor: String },
}

impl Warning {
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::DuplicateRecord { .. } => "duplicate_record",
            Self::ConflictingIdentity { .. } => "conflicting_identity",
            Self::PossiblePlural { .. } => "possible_plural",
            Self::CharacterizationConflict { .. } => "characterization_conflict",
            Self::MalformedRecord { .. } => "malformed_record",
            Self::Uncharacterised { .. } => "uncharacterised",
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateRecord { key, detail } => write!(f, "duplicate record {key}: {detail}"),
            Self::ConflictingIdentity { conflict, detail } => {
                write!(f, "conflicting identity ({conflict:?}): {detail}")
            }
            Self::PossiblePlural { singular, plural } => {
                write!(f, "'{plural}' may be the plural of '{singular}'")
            }
            Self::CharacterizationConflict { key, values } => {
                write!(f, "conflicting factors for {key}: {values:?}")
            }
            Self::MalformedRecord { record, reason } => write!(f, "malformed record {record}: {reason}"),
            Self::Uncharacterised { stressor } => write!(f, "no factor for stressor {stressor}"),
        }
    }
}

/// Warnings and counters collected over one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub warnings: Vec<Warning>,
    pub counts: BTreeMap<String, usize>,
}

impl RunReport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn extend(&mut self, warnings: impl IntoIterator<Item = Warning>) {
        self.warnings.extend(warnings);
    }

    /// Add `n` to a named counter
    pub fn add_count(&mut self, counter: &str, n: usize) {
        *self.counts.entry(counter.to_string()).or_default() += n;
    }

    #[must_use]
    pub fn count(&self, counter: &str) -> usize {
        self.counts.get(counter).copied().unwrap_or(0)
    }

    /// Number of warnings of one kind, see [`Warning::kind`]
    #[must_use]
    pub fn warnings_of(&self, kind: &str) -> usize {
        self.warnings.iter().filter(|w| w.kind() == kind).count()
    }

    /// Log counters and a per-kind warning summary
    pub fn log_summary(&self) {
        for (counter, n) in &self.counts {
            log::info!("{counter}: {n}");
        }
        let mut per_kind: BTreeMap<&str, usize> = BTreeMap::new();
        for warning in &self.warnings {
            *per_kind.entry(warning.kind()).or_default() += 1;
        }
        for (kind, n) in per_kind {
            log::warn!("{n} warning(s) of kind {kind}");
        }
    }
}
