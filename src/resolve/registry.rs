//! Scheme and name registry
//!
//! Read-side view over the staging store answering which scheme contributed
//! which name, and translating names between schemes through their shared
//! substance.

use std::collections::BTreeSet;

use crate::models::{SchemeId, SubstanceId};
use crate::store::StagingStore;

/// Lookups over the name, scheme and name/scheme tables
pub struct SchemeRegistry<'s, S: StagingStore + ?Sized> {
    store: &'s S,
}

impl<'s, S: StagingStore + ?Sized> SchemeRegistry<'s, S> {
    #[must_use]
    pub const fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Append a scheme to the static reference set
    pub fn register(store: &mut S, scheme: &str) -> SchemeId {
        store.insert_scheme(scheme)
    }

    /// Substance that `scheme` calls `(name, tag)`, if the scheme uses it
    #[must_use]
    pub fn lookup(&self, scheme: &str, name: &str, tag: &str) -> Option<SubstanceId> {
        let scheme_id = self.store.scheme_id(scheme)?;
        let name_id = self.store.name_id(name, tag)?;
        if !self.store.schemes_of_name(name_id).contains(&scheme_id) {
            return None;
        }
        self.store.name(name_id).map(|n| n.substance)
    }

    /// Schemes that use `(name, tag)`
    #[must_use]
    pub fn schemes_of_name(&self, name: &str, tag: &str) -> BTreeSet<String> {
        self.store
            .name_id(name, tag)
            .map(|id| self.scheme_names(&self.store.schemes_of_name(id)))
            .unwrap_or_default()
    }

    /// Schemes that use any name of a substance
    #[must_use]
    pub fn schemes_of_substance(&self, substance: SubstanceId) -> BTreeSet<String> {
        let ids: Vec<SchemeId> = self
            .store
            .names_of_substance(substance)
            .iter()
            .flat_map(|n| self.store.schemes_of_name(n.id))
            .collect();
        self.scheme_names(&ids)
    }

    /// `(name, tag)` pairs referring to a substance, optionally restricted
    /// to one scheme
    #[must_use]
    pub fn names_of(&self, substance: SubstanceId, scheme: Option<&str>) -> Vec<(String, String)> {
        let wanted = match scheme {
            Some(s) => match self.store.scheme_id(s) {
                Some(id) => Some(id),
                None => return Vec::new(),
            },
            None => None,
        };
        self.store
            .names_of_substance(substance)
            .into_iter()
            .filter(|n| wanted.is_none_or(|id| self.store.schemes_of_name(n.id).contains(&id)))
            .map(|n| (n.name, n.tag))
            .collect()
    }

    /// Names used by `to` for the substance that `from` calls `(name, tag)`
    #[must_use]
    pub fn translate(&self, from: &str, name: &str, tag: &str, to: &str) -> Vec<String> {
        self.lookup(from, name, tag)
            .map(|substance| {
                self.names_of(substance, Some(to))
                    .into_iter()
                    .map(|(n, _)| n)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn scheme_names(&self, ids: &[SchemeId]) -> BTreeSet<String> {
        ids.iter()
            .filter_map(|id| self.store.scheme(*id))
            .map(|s| s.name)
            .collect()
    }
}
