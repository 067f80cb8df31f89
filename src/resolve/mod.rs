//! Substance identity resolution
//!
//! Assigns every normalized record a canonical substance. Passes run in
//! order and each only sees records left unresolved by the previous ones:
//!
//! 1. exact match on `(cas, tag, unit)`, creating missing substances
//! 2. records without CAS are grouped by a union-find over `(name, tag)`
//!    nodes, where a record carrying two names (and an exact synonym from
//!    the correction table) joins them. Each group is matched per unit
//!    against the name table and the `(name, tag, unit)` key, and a
//!    substance is created only when nothing matches
//! 3. every name of every resolved record is registered, with the scheme
//!    that spelled it
//!
//! A record that already has a substance is never reassigned, and a second
//! run over the same records creates nothing.

pub mod registry;
pub mod union_find;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::Result;
use crate::models::{Cas, NewSubstance, NormalizedRecord, SubstanceId};
use crate::normalize::{CorrectionTable, Synonym, synonyms_of};
use crate::report::{IdentityConflict, Warning};
use crate::store::{StagingStore, in_transaction};
use crate::utils::logging::{log_stage_complete, log_stage_start};

pub use registry::SchemeRegistry;
pub use union_find::UnionFind;

type NameNode = (String, String);

/// Counters and warnings of one resolver run
#[derive(Debug, Clone, Default)]
pub struct ResolutionReport {
    pub substances_created: usize,
    pub names_registered: usize,
    pub resolved_by_cas: usize,
    pub resolved_by_name: usize,
    /// Records that arrived with a substance already set
    pub already_resolved: usize,
    pub warnings: Vec<Warning>,
}

/// Resolves normalized records to canonical substances
#[derive(Debug, Clone, Default)]
pub struct SubstanceResolver {
    synonyms: Vec<Synonym>,
}

impl SubstanceResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the synonym list of a correction table
    #[must_use]
    pub fn from_table(table: &CorrectionTable) -> Self {
        Self {
            synonyms: table.synonyms.clone(),
        }
    }

    /// Resolve `records` against `store`, filling each record's substance.
    ///
    /// Runs in one store transaction; on error the store is left as before.
    pub fn resolve<S>(&self, store: &mut S, records: &mut [NormalizedRecord]) -> Result<ResolutionReport>
    where
        S: StagingStore + ?Sized,
    {
        let start = Instant::now();
        log_stage_start("Resolving substance identities", records.len());

        let report = in_transaction(store, |store| self.resolve_in(store, records))?;

        log::info!(
            "Created {} substances and {} names; {} records matched by CAS, {} by name",
            report.substances_created,
            report.names_registered,
            report.resolved_by_cas,
            report.resolved_by_name
        );
        if !report.warnings.is_empty() {
            log::warn!("{} identity conflicts need manual review", report.warnings.len());
        }
        log_stage_complete("Resolved", records.len(), start.elapsed());
        Ok(report)
    }

    fn resolve_in<S>(&self, store: &mut S, records: &mut [NormalizedRecord]) -> Result<ResolutionReport>
    where
        S: StagingStore + ?Sized,
    {
        let substances_before = store.substances().len();
        let names_before = store.names().len();
        let mut report = ResolutionReport {
            already_resolved: records.iter().filter(|r| r.is_resolved()).count(),
            ..ResolutionReport::default()
        };

        report.warnings.extend(cas_conflicts(records));
        self.resolve_by_cas(store, records, &mut report)?;
        register_names(store, records)?;
        self.resolve_by_name(store, records, &mut report)?;
        register_names(store, records)?;
        report.warnings.extend(missed_synonyms(store, records));
        report.warnings.extend(possible_plurals(store));

        report.substances_created = store.substances().len() - substances_before;
        report.names_registered = store.names().len() - names_before;
        Ok(report)
    }

    fn resolve_by_cas<S>(
        &self,
        store: &mut S,
        records: &mut [NormalizedRecord],
        report: &mut ResolutionReport,
    ) -> Result<()>
    where
        S: StagingStore + ?Sized,
    {
        for record in records.iter_mut().filter(|r| !r.is_resolved()) {
            let Some(cas) = record.cas.clone() else {
                continue;
            };
            let id = match store.substance_by_cas(&cas, &record.tag, &record.unit) {
                Some(id) => id,
                None => store.insert_substance(NewSubstance {
                    formula: None,
                    cas: Some(cas),
                    tag: record.tag.clone(),
                    name: record.primary_name().unwrap_or_default().to_string(),
                    unit: record.unit.clone(),
                })?,
            };
            record.substance = Some(id);
            report.resolved_by_cas += 1;
        }
        Ok(())
    }

    fn resolve_by_name<S>(
        &self,
        store: &mut S,
        records: &mut [NormalizedRecord],
        report: &mut ResolutionReport,
    ) -> Result<()>
    where
        S: StagingStore + ?Sized,
    {
        let mut uf: UnionFind<NameNode> = UnionFind::new();
        let mut pending: Vec<(usize, usize)> = Vec::new();
        for (i, record) in records.iter().enumerate().filter(|(_, r)| !r.is_resolved()) {
            let nodes: SmallVec<[usize; 2]> = record
                .names()
                .map(|n| uf.insert((n.to_string(), record.tag.clone())))
                .collect();
            if let [a, b] = nodes[..] {
                uf.union(a, b);
            }
            if let Some(&first) = nodes.first() {
                pending.push((i, first));
            }
        }
        if pending.is_empty() {
            return Ok(());
        }
        self.join_exact_synonyms(&mut uf);

        let components = uf.components();
        let mut slot_of_node = vec![0; uf.len()];
        for (slot, nodes) in components.iter().enumerate() {
            for &n in nodes {
                slot_of_node[n] = slot;
            }
        }

        let mut groups: BTreeMap<(usize, String), Vec<usize>> = BTreeMap::new();
        for &(i, node) in &pending {
            groups
                .entry((slot_of_node[node], records[i].unit.clone()))
                .or_default()
                .push(i);
        }

        for ((slot, unit), members) in groups {
            let nodes: Vec<&NameNode> = components[slot].iter().map(|&n| uf.key(n)).collect();
            let tag = nodes[0].1.clone();
            let candidates = direct_candidates(store, &nodes, &unit);

            let chosen = match candidates.as_slice() {
                [] => match self.synonym_candidate(store, &nodes, &unit) {
                    Some(id) => id,
                    None => store.insert_substance(NewSubstance {
                        formula: None,
                        cas: None,
                        tag,
                        name: records[members[0]]
                            .primary_name()
                            .unwrap_or_default()
                            .to_string(),
                        unit: unit.clone(),
                    })?,
                },
                [only] => *only,
                [first, ..] => {
                    let names: Vec<&str> = nodes.iter().map(|(n, _)| n.as_str()).collect();
                    report.warnings.push(Warning::ConflictingIdentity {
                        conflict: IdentityConflict::AmbiguousCandidates,
                        detail: format!(
                            "names {names:?} [{tag}] in {unit} match substances {candidates:?}; keeping {first}"
                        ),
                    });
                    *first
                }
            };

            for i in members {
                records[i].substance = Some(chosen);
                report.resolved_by_name += 1;
            }
        }
        Ok(())
    }

    /// Union nodes that an exact (level 0) synonym declares equal
    fn join_exact_synonyms(&self, uf: &mut UnionFind<NameNode>) {
        let mut pairs = Vec::new();
        for synonym in self.synonyms.iter().filter(|s| s.approximation_level == 0) {
            for idx in 0..uf.len() {
                let (name, tag) = uf.key(idx);
                if name == &synonym.a_name {
                    if let Some(other) = uf.index_of(&(synonym.another_name.clone(), tag.clone())) {
                        pairs.push((idx, other));
                    }
                }
            }
        }
        for (a, b) in pairs {
            uf.union(a, b);
        }
    }

    /// Existing substance reachable through the synonym list, most exact
    /// synonym first
    fn synonym_candidate<S>(&self, store: &S, nodes: &[&NameNode], unit: &str) -> Option<SubstanceId>
    where
        S: StagingStore + ?Sized,
    {
        let mut found: Vec<(u8, SubstanceId)> = Vec::new();
        for (name, tag) in nodes {
            for (other, level) in synonyms_of(&self.synonyms, name) {
                let hit = store
                    .name_lookup(other, tag)
                    .filter(|id| store.substance(*id).is_some_and(|s| s.unit == unit))
                    .or_else(|| store.substance_by_name(other, tag, unit));
                if let Some(id) = hit {
                    found.push((level, id));
                }
            }
        }
        found.into_iter().min().map(|(level, id)| {
            log::debug!("Linked {nodes:?} to {id} through a synonym of level {level}");
            id
        })
    }
}

fn direct_candidates<S>(store: &S, nodes: &[&NameNode], unit: &str) -> Vec<SubstanceId>
where
    S: StagingStore + ?Sized,
{
    let mut candidates: Vec<SubstanceId> = Vec::new();
    for (name, tag) in nodes {
        if let Some(id) = store.name_lookup(name, tag) {
            if store.substance(id).is_some_and(|s| s.unit == unit) {
                candidates.push(id);
            }
        }
        if let Some(id) = store.substance_by_name(name, tag, unit) {
            candidates.push(id);
        }
    }
    candidates.sort_unstable();
    candidates.dedup();
    candidates
}

/// Insert `(name, tag)` rows for all resolved records and link each name to
/// the scheme that spelled it. Existing rows are kept.
fn register_names<S>(store: &mut S, records: &[NormalizedRecord]) -> Result<()>
where
    S: StagingStore + ?Sized,
{
    for record in records {
        let Some(substance) = record.substance else {
            continue;
        };
        for (name, scheme) in record.names_with_scheme() {
            let name_id = store.insert_name(name, &record.tag, substance);
            let scheme_id = store.insert_scheme(scheme);
            store.link_name_scheme(name_id, scheme_id)?;
        }
    }
    Ok(())
}

/// One `(name, tag)` carrying several CAS numbers
fn cas_conflicts(records: &[NormalizedRecord]) -> Vec<Warning> {
    let mut seen: BTreeMap<(&str, &str), BTreeSet<&Cas>> = BTreeMap::new();
    for record in records {
        if let Some(cas) = &record.cas {
            for name in record.names() {
                seen.entry((name, record.tag.as_str())).or_default().insert(cas);
            }
        }
    }
    seen.into_iter()
        .filter(|(_, cas)| cas.len() > 1)
        .map(|((name, tag), cas)| Warning::ConflictingIdentity {
            conflict: IdentityConflict::CasForName,
            detail: format!(
                "'{name}' [{tag}] carries CAS {}",
                cas.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
            ),
        })
        .collect()
}

/// Records whose two names point at different substances
fn missed_synonyms<S>(store: &S, records: &[NormalizedRecord]) -> Vec<Warning>
where
    S: StagingStore + ?Sized,
{
    let mut seen = BTreeSet::new();
    for record in records {
        let (Some(a), Some(b)) = (record.name.as_deref(), record.name2.as_deref()) else {
            continue;
        };
        let (sa, sb) = (store.name_lookup(a, &record.tag), store.name_lookup(b, &record.tag));
        if let (Some(sa), Some(sb)) = (sa, sb) {
            if sa != sb {
                seen.insert((a, sa, b, sb, record.tag.as_str()));
            }
        }
    }
    seen.into_iter()
        .map(|(a, sa, b, sb, tag)| Warning::ConflictingIdentity {
            conflict: IdentityConflict::MissedSynonym,
            detail: format!("'{a}' ({sa}) and '{b}' ({sb}) [{tag}] appear in one record"),
        })
        .collect()
}

/// Names differing only by a trailing "s" that map to different substances
fn possible_plurals<S>(store: &S) -> Vec<Warning>
where
    S: StagingStore + ?Sized,
{
    let names = store.names();
    let index: FxHashMap<(&str, &str), SubstanceId> = names
        .iter()
        .map(|n| ((n.name.as_str(), n.tag.as_str()), n.substance))
        .collect();
    let mut warnings = Vec::new();
    for name in &names {
        let plural = format!("{}s", name.name);
        if let Some(&other) = index.get(&(plural.as_str(), name.tag.as_str())) {
            if other != name.substance {
                warnings.push(Warning::PossiblePlural {
                    singular: name.name.clone(),
                    plural,
                });
            }
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn record(name: &str, cas: Option<&str>) -> NormalizedRecord {
        NormalizedRecord {
            name: Some(name.to_string()),
            name2: None,
            comp: "air".into(),
            subcomp: "unspecified".into(),
            cas: cas.map(|c| Cas::parse(c).unwrap()),
            tag: String::new(),
            unit: "kg".into(),
            value: None,
            scheme: "a".into(),
            alt_scheme: None,
            source_id: None,
            impact: None,
            method: None,
            substance: None,
        }
    }

    #[test]
    fn test_same_cas_different_unit_makes_two_substances() {
        let mut store = MemoryStore::new();
        let kg = record("Radon-222", Some("14859-67-7"));
        let mut kbq = record("Radon-222", Some("14859-67-7"));
        kbq.unit = "kBq".into();
        let mut records = vec![kg, kbq];
        let report = SubstanceResolver::new().resolve(&mut store, &mut records).unwrap();
        assert_eq!(report.substances_created, 2);
        assert_ne!(records[0].substance, records[1].substance);
    }

    #[test]
    fn test_name_only_record_links_to_cas_substance() {
        let mut store = MemoryStore::new();
        let mut records = vec![record("Cadmium", Some("7440-43-9")), record("Cadmium", None)];
        SubstanceResolver::new().resolve(&mut store, &mut records).unwrap();
        assert_eq!(records[0].substance, records[1].substance);
        assert_eq!(store.substance_count(), 1);
    }

    #[test]
    fn test_exact_synonym_joins_batch_records() {
        let table = CorrectionTable {
            synonyms: vec![Synonym {
                a_name: "PM10".into(),
                another_name: "Particulates, < 10 um".into(),
                approximation_level: 0,
            }],
            ..CorrectionTable::default()
        };
        let mut store = MemoryStore::new();
        let mut records = vec![record("PM10", None), record("Particulates, < 10 um", None)];
        SubstanceResolver::from_table(&table)
            .resolve(&mut store, &mut records)
            .unwrap();
        assert_eq!(records[0].substance, records[1].substance);
        assert_eq!(store.substance_count(), 1);
    }

    #[test]
    fn test_plural_is_flagged() {
        let mut store = MemoryStore::new();
        let mut records = vec![record("Particulate", None), record("Particulates", None)];
        let report = SubstanceResolver::new().resolve(&mut store, &mut records).unwrap();
        assert!(
            report
                .warnings
                .iter()
                .any(|w| matches!(w, Warning::PossiblePlural { .. }))
        );
    }
}
