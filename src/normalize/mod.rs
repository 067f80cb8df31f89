//! Label normalization
//!
//! Cleans the text fields of raw flow records before identity resolution.
//! Steps run in a fixed order:
//!
//! 1. trim everything, lower-case compartments only, harmonise units and
//!    strip boilerplate name suffixes
//! 2. blank values become null; nameless records are rejected
//! 3. manual CAS corrections
//! 4. tag extraction from name suffixes
//! 5. CAS removal for over-generic names
//!
//! Names are never case-folded: case can be the only difference between two
//! distinct chemical names.

pub mod corrections;
pub mod tags;

use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;

use crate::models::{Cas, NormalizedRecord, RawFlowRecord};
use crate::taxonomy::{canonical_compartment, canonical_subcompartment};
use crate::utils::logging::{create_main_progress_bar, finish_and_clear, log_stage_complete, log_stage_start};

pub use corrections::{CasCorrection, CasNullingRule, CorrectionTable, CustomFactor, Synonym, synonyms_of};
pub use tags::{TAG_RULES, TagRule, extract_tag};

const BOILERPLATE_SUFFIXES: &[&str] = &[", unspecified", ", in ground", "/m3"];

/// A record the normalizer refused, with the reason
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    pub record: RawFlowRecord,
    pub reason: String,
}

/// One applied manual correction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedCorrection {
    pub record: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub comment: String,
}

/// Output of [`LabelNormalizer::normalize`]
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub records: Vec<NormalizedRecord>,
    pub rejected: Vec<RejectedRecord>,
    pub corrections_applied: Vec<AppliedCorrection>,
    /// CAS numbers with a valid shape but a wrong check digit
    pub bad_checksums: usize,
    /// CAS numbers removed because the name is too generic
    pub cas_nulled: usize,
}

enum Outcome {
    Accepted {
        record: NormalizedRecord,
        correction: Option<AppliedCorrection>,
        bad_checksum: bool,
        cas_nulled: bool,
    },
    Rejected(RejectedRecord),
}

/// Applies the normalization steps with one correction table
#[derive(Debug, Clone, Default)]
pub struct LabelNormalizer {
    table: CorrectionTable,
    show_progress: bool,
}

impl LabelNormalizer {
    #[must_use]
    pub const fn new(table: CorrectionTable) -> Self {
        Self {
            table,
            show_progress: false,
        }
    }

    #[must_use]
    pub const fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    #[must_use]
    pub const fn table(&self) -> &CorrectionTable {
        &self.table
    }

    /// Normalize a batch. Records are independent, so they are processed in
    /// parallel; output order follows input order.
    #[must_use]
    pub fn normalize(&self, raw: Vec<RawFlowRecord>) -> NormalizedBatch {
        let start = Instant::now();
        log_stage_start("Normalizing labels", raw.len());

        let progress = self
            .show_progress
            .then(|| create_main_progress_bar(raw.len() as u64, Some("normalizing labels")));

        let outcomes: Vec<Outcome> = raw
            .into_par_iter()
            .map(|record| {
                let outcome = self.normalize_record(record);
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
                outcome
            })
            .collect();

        if let Some(pb) = &progress {
            finish_and_clear(pb);
        }

        let mut batch = NormalizedBatch::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Accepted {
                    record,
                    correction,
                    bad_checksum,
                    cas_nulled,
                } => {
                    if let Some(correction) = correction {
                        log::debug!(
                            "Corrected CAS of {} from {:?} to {:?}: {}",
                            correction.record,
                            correction.from,
                            correction.to,
                            correction.comment
                        );
                        batch.corrections_applied.push(correction);
                    }
                    batch.bad_checksums += usize::from(bad_checksum);
                    batch.cas_nulled += usize::from(cas_nulled);
                    batch.records.push(record);
                }
                Outcome::Rejected(rejected) => {
                    log::warn!(
                        "Rejected record {}: {}",
                        rejected.record.describe(),
                        rejected.reason
                    );
                    batch.rejected.push(rejected);
                }
            }
        }

        if batch.bad_checksums > 0 {
            log::warn!(
                "{} CAS numbers have an invalid check digit",
                batch.bad_checksums
            );
        }
        log::info!(
            "Applied {} CAS corrections, removed {} generic CAS numbers, rejected {} records",
            batch.corrections_applied.len(),
            batch.cas_nulled,
            batch.rejected.len()
        );
        log_stage_complete("Normalized", batch.records.len(), start.elapsed());
        batch
    }

    fn normalize_record(&self, raw: RawFlowRecord) -> Outcome {
        // Step 1
        let unit = raw.unit.as_deref().map(harmonise_unit).unwrap_or_default();
        let comp = raw.comp.as_deref().map(canonical_compartment).unwrap_or_default();
        let subcomp = canonical_subcompartment(raw.subcomp.as_deref());
        let clean_name = |name: &Option<String>| {
            name.as_deref()
                .map(strip_boilerplate)
                .filter(|n| !n.is_empty())
        };

        // Step 2
        let name = clean_name(&raw.name);
        let name2 = clean_name(&raw.name2);
        if name.is_none() && name2.is_none() {
            return Outcome::Rejected(RejectedRecord {
                record: raw,
                reason: "all name fields are empty".to_string(),
            });
        }
        let mut cas_text = non_blank(raw.cas.as_deref());

        // Step 3
        let names: Vec<&str> = name.iter().chain(name2.iter()).map(String::as_str).collect();
        let correction = self
            .table
            .find_cas_correction(&names, cas_text.as_deref())
            .map(|fix| {
                let applied = AppliedCorrection {
                    record: raw.describe(),
                    from: cas_text.clone(),
                    to: fix.cas.as_ref().map(ToString::to_string),
                    comment: fix.comment.clone(),
                };
                cas_text = fix.cas.as_ref().map(ToString::to_string);
                applied
            });

        let cas = match cas_text.as_deref().map(Cas::parse).transpose() {
            Ok(cas) => cas,
            Err(e) => {
                return Outcome::Rejected(RejectedRecord {
                    record: raw,
                    reason: e.to_string(),
                });
            }
        };
        let bad_checksum = cas.as_ref().is_some_and(|c| !c.has_valid_checksum());

        let mut record = NormalizedRecord {
            name,
            name2,
            comp,
            subcomp,
            cas,
            tag: non_blank(raw.tag.as_deref()).unwrap_or_default(),
            unit,
            value: raw.value,
            scheme: raw.scheme.trim().to_string(),
            alt_scheme: non_blank(raw.alt_scheme.as_deref()),
            source_id: non_blank(raw.source_id.as_deref()),
            impact: non_blank(raw.impact.as_deref()),
            method: non_blank(raw.method.as_deref()),
            substance: None,
        };

        // Step 4
        extract_tag(&mut record);

        // Step 5
        let cas_nulled = record.cas.is_some() && record.names().any(|n| self.table.nulls_cas(n));
        if cas_nulled {
            record.cas = None;
        }

        Outcome::Accepted {
            record,
            correction,
            bad_checksum,
            cas_nulled,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Harmonise unit spellings
#[must_use]
pub fn harmonise_unit(unit: &str) -> String {
    match unit.trim() {
        "Nm3" => "m3".to_string(),
        "m2*year" => "m2a".to_string(),
        "m3*year" => "m3a".to_string(),
        other => other.to_string(),
    }
}

/// Trim a name and strip boilerplate suffixes such as ", unspecified"
#[must_use]
pub fn strip_boilerplate(name: &str) -> String {
    let mut current = name.trim();
    loop {
        let stripped = BOILERPLATE_SUFFIXES
            .iter()
            .find_map(|suffix| tags::strip_suffix_ignore_case(current, suffix));
        match stripped {
            Some(head) => current = head.trim_end(),
            None => return current.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_boilerplate() {
        assert_eq!(strip_boilerplate("  Zinc, in ground "), "Zinc");
        assert_eq!(
            strip_boilerplate("Water, cooling, unspecified natural origin/m3"),
            "Water, cooling, unspecified natural origin"
        );
        assert_eq!(strip_boilerplate("Sulfur dioxide, unspecified"), "Sulfur dioxide");
    }

    #[test]
    fn test_units() {
        assert_eq!(harmonise_unit(" Nm3"), "m3");
        assert_eq!(harmonise_unit("m2*year"), "m2a");
        assert_eq!(harmonise_unit("kg"), "kg");
    }

    #[test]
    fn test_names_keep_case() {
        let normalizer = LabelNormalizer::default();
        let batch = normalizer.normalize(vec![
            RawFlowRecord::new("a", " NOx ").with_compartment(" Air ", "Low. Pop."),
        ]);
        let record = &batch.records[0];
        assert_eq!(record.name.as_deref(), Some("NOx"));
        assert_eq!(record.comp, "air");
        assert_eq!(record.subcomp, "low population density");
    }
}
