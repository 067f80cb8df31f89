//! Relational staging store
//!
//! The resolver and the characterisation stage only need inserts, lookups
//! and unique-constraint enforcement, so they work against the
//! [`StagingStore`] trait. [`MemoryStore`] is the in-process implementation.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::models::{
    Cas, Factor, FactorKey, Name, NameId, NewSubstance, Scheme, SchemeId, Substance, SubstanceId,
};

/// Staging tables with their unique constraints:
///
/// * substances: `(cas, tag, unit)` when CAS is present, `(name, tag, unit)`
///   otherwise
/// * names: `(name, tag)`
/// * schemes: `name`
/// * name/scheme links: `(name, scheme)`
/// * factors: `(substance, comp, subcomp, unit, impact, method)`
pub trait StagingStore {
    /// Open a transaction; later changes can be undone with `rollback`
    fn begin(&mut self) -> Result<(), StoreError>;
    fn commit(&mut self) -> Result<(), StoreError>;
    fn rollback(&mut self) -> Result<(), StoreError>;

    fn insert_substance(&mut self, substance: NewSubstance) -> Result<SubstanceId, StoreError>;
    fn substance(&self, id: SubstanceId) -> Option<Substance>;
    fn substance_by_cas(&self, cas: &Cas, tag: &str, unit: &str) -> Option<SubstanceId>;
    /// Alternate key lookup, only among substances without CAS
    fn substance_by_name(&self, name: &str, tag: &str, unit: &str) -> Option<SubstanceId>;
    fn substances(&self) -> Vec<Substance>;

    /// Insert a name, or return the id of the existing `(name, tag)` row
    /// untouched
    fn insert_name(&mut self, name: &str, tag: &str, substance: SubstanceId) -> NameId;
    fn name_id(&self, name: &str, tag: &str) -> Option<NameId>;
    fn name(&self, id: NameId) -> Option<Name>;
    fn names(&self) -> Vec<Name>;
    fn names_of_substance(&self, substance: SubstanceId) -> Vec<Name>;

    /// Insert a scheme, or return the id of the existing one
    fn insert_scheme(&mut self, scheme: &str) -> SchemeId;
    fn scheme_id(&self, scheme: &str) -> Option<SchemeId>;
    fn scheme(&self, id: SchemeId) -> Option<Scheme>;
    /// Record that a scheme uses a name; repeated links are ignored
    fn link_name_scheme(&mut self, name: NameId, scheme: SchemeId) -> Result<(), StoreError>;
    fn schemes_of_name(&self, name: NameId) -> Vec<SchemeId>;

    fn insert_factor(&mut self, factor: Factor) -> Result<(), StoreError>;
    fn update_factor(&mut self, key: &FactorKey, value: f64) -> Result<(), StoreError>;
    fn factor(&self, key: &FactorKey) -> Option<f64>;
    fn factors(&self) -> Vec<Factor>;

    /// Substance a `(name, tag)` pair refers to
    fn name_lookup(&self, name: &str, tag: &str) -> Option<SubstanceId> {
        self.name_id(name, tag)
            .and_then(|id| self.name(id))
            .map(|n| n.substance)
    }
}

/// Run `f` inside a transaction, rolling back when it fails
pub fn in_transaction<S, T, E, F>(store: &mut S, f: F) -> Result<T, E>
where
    S: StagingStore + ?Sized,
    E: From<StoreError>,
    F: FnOnce(&mut S) -> Result<T, E>,
{
    store.begin()?;
    match f(store) {
        Ok(value) => {
            store.commit()?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = store.rollback() {
                log::error!("Rollback failed: {rollback}");
            }
            Err(e)
        }
    }
}
