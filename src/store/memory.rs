//! In-memory staging store with snapshot transactions

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::StoreError;
use crate::models::{
    Cas, Factor, FactorKey, Name, NameHasScheme, NameId, NewSubstance, Scheme, SchemeId, Substance,
    SubstanceId,
};
use crate::store::StagingStore;

#[derive(Debug, Clone, Default)]
struct Tables {
    substances: Vec<Substance>,
    by_cas: FxHashMap<(Cas, String, String), SubstanceId>,
    by_name: FxHashMap<(String, String, String), SubstanceId>,
    names: Vec<Name>,
    name_index: FxHashMap<(String, String), NameId>,
    names_by_substance: FxHashMap<SubstanceId, Vec<NameId>>,
    schemes: Vec<Scheme>,
    scheme_index: FxHashMap<String, SchemeId>,
    links: FxHashSet<NameHasScheme>,
    schemes_by_name: FxHashMap<NameId, Vec<SchemeId>>,
    factors: BTreeMap<FactorKey, f64>,
}

/// Staging tables held in hash maps.
///
/// `begin` takes a snapshot of all tables; `rollback` restores it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Tables,
    snapshot: Option<Box<Tables>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn substance_count(&self) -> usize {
        self.tables.substances.len()
    }

    #[must_use]
    pub fn name_count(&self) -> usize {
        self.tables.names.len()
    }

    #[must_use]
    pub const fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }
}

impl StagingStore for MemoryStore {
    fn begin(&mut self) -> Result<(), StoreError> {
        if self.snapshot.is_some() {
            return Err(StoreError::TransactionOpen);
        }
        self.snapshot = Some(Box::new(self.tables.clone()));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or(StoreError::NoTransaction)
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        let snapshot = self.snapshot.take().ok_or(StoreError::NoTransaction)?;
        self.tables = *snapshot;
        Ok(())
    }

    fn insert_substance(&mut self, new: NewSubstance) -> Result<SubstanceId, StoreError> {
        let t = &mut self.tables;
        let id = SubstanceId(t.substances.len() as u32);
        match &new.cas {
            Some(cas) => {
                let key = (cas.clone(), new.tag.clone(), new.unit.clone());
                if t.by_cas.contains_key(&key) {
                    return Err(StoreError::UniqueViolation {
                        table: "substances",
                        key: format!("({cas}, {:?}, {})", new.tag, new.unit),
                    });
                }
                t.by_cas.insert(key, id);
            }
            None => {
                let key = (new.name.clone(), new.tag.clone(), new.unit.clone());
                if t.by_name.contains_key(&key) {
                    return Err(StoreError::UniqueViolation {
                        table: "substances",
                        key: format!("({}, {:?}, {})", new.name, new.tag, new.unit),
                    });
                }
                t.by_name.insert(key, id);
            }
        }
        t.substances.push(Substance {
            id,
            formula: new.formula,
            cas: new.cas,
            tag: new.tag,
            name: new.name,
            unit: new.unit,
        });
        Ok(id)
    }

    fn substance(&self, id: SubstanceId) -> Option<Substance> {
        self.tables.substances.get(id.0 as usize).cloned()
    }

    fn substance_by_cas(&self, cas: &Cas, tag: &str, unit: &str) -> Option<SubstanceId> {
        self.tables
            .by_cas
            .get(&(cas.clone(), tag.to_string(), unit.to_string()))
            .copied()
    }

    fn substance_by_name(&self, name: &str, tag: &str, unit: &str) -> Option<SubstanceId> {
        self.tables
            .by_name
            .get(&(name.to_string(), tag.to_string(), unit.to_string()))
            .copied()
    }

    fn substances(&self) -> Vec<Substance> {
        self.tables.substances.clone()
    }

    fn insert_name(&mut self, name: &str, tag: &str, substance: SubstanceId) -> NameId {
        let t = &mut self.tables;
        let key = (name.to_string(), tag.to_string());
        if let Some(existing) = t.name_index.get(&key) {
            return *existing;
        }
        let id = NameId(t.names.len() as u32);
        t.names.push(Name {
            id,
            name: key.0.clone(),
            tag: key.1.clone(),
            substance,
        });
        t.name_index.insert(key, id);
        t.names_by_substance.entry(substance).or_default().push(id);
        id
    }

    fn name_id(&self, name: &str, tag: &str) -> Option<NameId> {
        self.tables
            .name_index
            .get(&(name.to_string(), tag.to_string()))
            .copied()
    }

    fn name(&self, id: NameId) -> Option<Name> {
        self.tables.names.get(id.0 as usize).cloned()
    }

    fn names(&self) -> Vec<Name> {
        self.tables.names.clone()
    }

    fn names_of_substance(&self, substance: SubstanceId) -> Vec<Name> {
        self.tables
            .names_by_substance
            .get(&substance)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.tables.names.get(id.0 as usize).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn insert_scheme(&mut self, scheme: &str) -> SchemeId {
        let t = &mut self.tables;
        if let Some(id) = t.scheme_index.get(scheme) {
            return *id;
        }
        let id = SchemeId(t.schemes.len() as u32);
        t.schemes.push(Scheme {
            id,
            name: scheme.to_string(),
        });
        t.scheme_index.insert(scheme.to_string(), id);
        id
    }

    fn scheme_id(&self, scheme: &str) -> Option<SchemeId> {
        self.tables.scheme_index.get(scheme).copied()
    }

    fn scheme(&self, id: SchemeId) -> Option<Scheme> {
        self.tables.schemes.get(id.0 as usize).cloned()
    }

    fn link_name_scheme(&mut self, name: NameId, scheme: SchemeId) -> Result<(), StoreError> {
        let t = &mut self.tables;
        if name.0 as usize >= t.names.len() {
            return Err(StoreError::UnknownKey {
                table: "names",
                key: name.0.to_string(),
            });
        }
        if scheme.0 as usize >= t.schemes.len() {
            return Err(StoreError::UnknownKey {
                table: "schemes",
                key: scheme.0.to_string(),
            });
        }
        if t.links.insert(NameHasScheme { name, scheme }) {
            t.schemes_by_name.entry(name).or_default().push(scheme);
        }
        Ok(())
    }

    fn schemes_of_name(&self, name: NameId) -> Vec<SchemeId> {
        self.tables
            .schemes_by_name
            .get(&name)
            .cloned()
            .unwrap_or_default()
    }

    fn insert_factor(&mut self, factor: Factor) -> Result<(), StoreError> {
        if self.tables.factors.contains_key(&factor.key) {
            return Err(StoreError::UniqueViolation {
                table: "factors",
                key: factor.key.to_string(),
            });
        }
        self.tables.factors.insert(factor.key, factor.value);
        Ok(())
    }

    fn update_factor(&mut self, key: &FactorKey, value: f64) -> Result<(), StoreError> {
        match self.tables.factors.get_mut(key) {
            Some(existing) => {
                *existing = value;
                Ok(())
            }
            None => Err(StoreError::UnknownKey {
                table: "factors",
                key: key.to_string(),
            }),
        }
    }

    fn factor(&self, key: &FactorKey) -> Option<f64> {
        self.tables.factors.get(key).copied()
    }

    fn factors(&self) -> Vec<Factor> {
        self.tables
            .factors
            .iter()
            .map(|(key, value)| Factor {
                key: key.clone(),
                value: *value,
            })
            .collect()
    }
}
