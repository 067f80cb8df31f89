//! Characterisation factors joined to stressors
//!
//! Resolved characterisation records become one factor per
//! (substance, compartment, subcompartment, unit, impact, method) key. A key
//! observed with two different values is ambiguous and left out of the
//! table. Stressors then pick the best characterised subcompartment of their
//! compartment through the [`SubcompartmentMatcher`].

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;

use crate::error::Result;
use crate::matrix::LabelledMatrix;
use crate::models::{Factor, FactorKey, NormalizedRecord, Stressor, SubstanceId};
use crate::normalize::corrections::CustomFactor;
use crate::normalize::harmonise_unit;
use crate::report::Warning;
use crate::store::StagingStore;
use crate::taxonomy::{MatchKind, SubcompartmentMatcher, canonical_compartment, canonical_subcompartment};

/// Unique characterisation factors, with the keys found ambiguous
#[derive(Debug, Clone, Default)]
pub struct FactorTable {
    factors: BTreeMap<FactorKey, f64>,
    ambiguous: BTreeSet<FactorKey>,
}

impl FactorTable {
    /// Collect factors from resolved characterisation records.
    ///
    /// Records without substance, impact, method or value are skipped.
    /// Returns one [`Warning::CharacterizationConflict`] per ambiguous key.
    #[must_use]
    pub fn build(records: &[NormalizedRecord]) -> (Self, Vec<Warning>) {
        let mut values: BTreeMap<FactorKey, Vec<f64>> = BTreeMap::new();
        let mut skipped = 0usize;
        for record in records {
            let (Some(substance), Some(impact), Some(method), Some(value)) = (
                record.substance,
                record.impact.as_ref(),
                record.method.as_ref(),
                record.value,
            ) else {
                skipped += 1;
                continue;
            };
            let key = FactorKey {
                substance,
                comp: record.comp.clone(),
                subcomp: record.subcomp.clone(),
                unit: record.unit.clone(),
                impact: impact.clone(),
                method: method.clone(),
            };
            let seen = values.entry(key).or_default();
            if !seen.contains(&value) {
                seen.push(value);
            }
        }
        if skipped > 0 {
            log::warn!("{skipped} characterisation record(s) without substance or factor skipped");
        }

        let mut table = Self::default();
        let mut warnings = Vec::new();
        for (key, found) in values {
            if let [value] = found.as_slice() {
                table.factors.insert(key, *value);
            } else {
                warnings.push(Warning::CharacterizationConflict {
                    key: key.to_string(),
                    values: found,
                });
                table.ambiguous.insert(key);
            }
        }
        log::info!(
            "{} characterisation factors, {} ambiguous key(s) excluded",
            table.factors.len(),
            table.ambiguous.len()
        );
        (table, warnings)
    }

    /// Apply hand-made factors. Each one replaces any factor or ambiguity
    /// of its key; factors naming an unknown substance are skipped.
    pub fn apply_overrides<S: StagingStore + ?Sized>(&mut self, custom: &[CustomFactor], store: &S) -> usize {
        let mut applied = 0;
        for factor in custom {
            let Some(substance) = store.name_lookup(&factor.name, &factor.tag) else {
                log::warn!("Custom factor for unknown substance '{}' skipped", factor.name);
                continue;
            };
            let key = FactorKey {
                substance,
                comp: canonical_compartment(&factor.comp),
                subcomp: canonical_subcompartment(Some(&factor.subcomp)),
                unit: harmonise_unit(&factor.unit),
                impact: factor.impact.clone(),
                method: factor.method.clone(),
            };
            self.ambiguous.remove(&key);
            if let Some(old) = self.factors.insert(key, factor.value) {
                log::debug!("Custom factor for '{}' replaces {old}", factor.name);
            }
            applied += 1;
        }
        applied
    }

    /// Write every factor to the staging store, updating existing keys
    pub fn persist<S: StagingStore + ?Sized>(&self, store: &mut S) -> Result<usize> {
        for (key, value) in &self.factors {
            if store.factor(key).is_some() {
                store.update_factor(key, *value)?;
            } else {
                store.insert_factor(Factor {
                    key: key.clone(),
                    value: *value,
                })?;
            }
        }
        Ok(self.factors.len())
    }

    #[must_use]
    pub fn get(&self, key: &FactorKey) -> Option<f64> {
        self.factors.get(key).copied()
    }

    #[must_use]
    pub fn is_ambiguous(&self, key: &FactorKey) -> bool {
        self.ambiguous.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FactorKey, f64)> {
        self.factors.iter().map(|(k, v)| (k, *v))
    }

    /// Impact category labels, sorted
    #[must_use]
    pub fn impact_labels(&self) -> Vec<String> {
        self.factors
            .keys()
            .map(FactorKey::impact_label)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Characterisation matrix and how each stressor was matched
#[derive(Debug, Clone)]
pub struct Characterisation {
    /// Impact x stressor
    pub c: LabelledMatrix,
    pub matches: BTreeMap<MatchKind, usize>,
    pub warnings: Vec<Warning>,
}

type SubcompFactors<'t> = BTreeMap<&'t str, Vec<(String, f64)>>;

/// Join stressors to factors by substance, compartment and unit, picking
/// the best characterised subcompartment for each
pub fn characterise(
    stressors: &[Stressor],
    table: &FactorTable,
    matcher: &SubcompartmentMatcher,
) -> Result<Characterisation> {
    let mut by_flow: FxHashMap<(SubstanceId, &str, &str), SubcompFactors<'_>> = FxHashMap::default();
    for (key, value) in table.iter() {
        by_flow
            .entry((key.substance, key.comp.as_str(), key.unit.as_str()))
            .or_default()
            .entry(key.subcomp.as_str())
            .or_default()
            .push((key.impact_label(), value));
    }

    let mut c = LabelledMatrix::new(
        "C",
        table.impact_labels(),
        stressors.iter().map(|s| s.id.clone()).collect(),
    )?;
    let mut matches: BTreeMap<MatchKind, usize> = BTreeMap::new();
    let mut warnings = Vec::new();

    for stressor in stressors {
        let chosen = by_flow
            .get(&(stressor.substance, stressor.comp.as_str(), stressor.unit.as_str()))
            .and_then(|subcomps| {
                matcher
                    .best_match(&stressor.comp, &stressor.subcomp, subcomps.keys().copied())
                    .and_then(|(sub, kind)| subcomps.get(sub).map(|f| (f, kind)))
            });
        let Some((factors, kind)) = chosen else {
            warnings.push(Warning::Uncharacterised {
                stressor: stressor.id.clone(),
            });
            continue;
        };
        *matches.entry(kind).or_default() += 1;
        for (impact, value) in factors {
            c.add(impact, &stressor.id, *value)?;
        }
    }

    log::info!(
        "Characterised {} of {} stressors ({matches:?})",
        stressors.len() - warnings.len(),
        stressors.len()
    );
    Ok(Characterisation { c, matches, warnings })
}
