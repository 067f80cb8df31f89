//! Compartment and subcompartment vocabulary
//!
//! Canonicalizes the release contexts found in raw records and picks, for an
//! observed subcompartment, the best subcompartment a characterisation
//! method defines.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Subcompartment used when a record does not specify one
pub const UNSPECIFIED: &str = "unspecified";

/// Canonical compartment name
#[must_use]
pub fn canonical_compartment(raw: &str) -> String {
    let comp = raw.trim().to_lowercase();
    match comp.as_str() {
        "raw" | "natural resource" | "natural resources" => "resource".to_string(),
        _ => comp,
    }
}

/// Canonical subcompartment name; absent or empty values become
/// [`UNSPECIFIED`]
#[must_use]
pub fn canonical_subcompartment(raw: Option<&str>) -> String {
    let sub = raw.map(|s| s.trim().to_lowercase()).unwrap_or_default();
    match sub.as_str() {
        "" | "(unspecified)" => UNSPECIFIED.to_string(),
        "low. pop." => "low population density".to_string(),
        "high. pop." => "high population density".to_string(),
        _ => sub,
    }
}

/// Controlled vocabulary of compartments and their subcompartments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxonomy {
    compartments: BTreeMap<String, BTreeSet<String>>,
}

impl Taxonomy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canonical (compartment, subcompartment) pair
    pub fn register(&mut self, comp: &str, subcomp: &str) {
        self.compartments
            .entry(comp.to_string())
            .or_default()
            .insert(subcomp.to_string());
    }

    #[must_use]
    pub fn contains(&self, comp: &str, subcomp: &str) -> bool {
        self.compartments
            .get(comp)
            .is_some_and(|subs| subs.contains(subcomp))
    }

    pub fn compartments(&self) -> impl Iterator<Item = &str> {
        self.compartments.keys().map(String::as_str)
    }

    /// Subcompartments registered under `comp`
    pub fn subcompartments<'a>(&'a self, comp: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.compartments
            .get(comp)
            .into_iter()
            .flat_map(|subs| subs.iter().map(String::as_str))
    }

    /// Parent compartment of a subcompartment, if it belongs to exactly one
    #[must_use]
    pub fn parent_of(&self, subcomp: &str) -> Option<&str> {
        let mut parents = self
            .compartments
            .iter()
            .filter(|(_, subs)| subs.contains(subcomp))
            .map(|(comp, _)| comp.as_str());
        let first = parents.next()?;
        parents.next().is_none().then_some(first)
    }
}

/// One observed-to-characterised subcompartment mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obs2CharSubcomp {
    pub comp: String,
    pub observed: String,
    pub characterised: String,
}

impl Obs2CharSubcomp {
    fn new(comp: &str, observed: &str, characterised: &str) -> Self {
        Self {
            comp: comp.to_string(),
            observed: observed.to_string(),
            characterised: characterised.to_string(),
        }
    }
}

/// How a characterised subcompartment was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchKind {
    Exact,
    Mapped,
    Unspecified,
    Fallback,
}

/// Picks the characterised subcompartment for an observed one.
///
/// Candidates are tried in order: exact, mapped through the
/// observed-to-characterised table, [`UNSPECIFIED`], compartment fallback.
#[derive(Debug, Clone)]
pub struct SubcompartmentMatcher {
    mapped: FxHashMap<(String, String), String>,
    fallback: FxHashMap<String, String>,
}

impl Default for SubcompartmentMatcher {
    fn default() -> Self {
        let entries = vec![
            Obs2CharSubcomp::new("soil", "agricultural", "agricultural"),
            Obs2CharSubcomp::new("soil", "forestry", "forestry"),
            Obs2CharSubcomp::new("soil", "industrial", "industrial"),
            Obs2CharSubcomp::new("air", "high population density", "high population density"),
            Obs2CharSubcomp::new("air", "low population density", "low population density"),
            Obs2CharSubcomp::new(
                "air",
                "lower stratosphere + upper troposphere",
                "low population density",
            ),
            Obs2CharSubcomp::new(
                "air",
                "low population density, long-term",
                "low population density",
            ),
            Obs2CharSubcomp::new("water", "ocean", "ocean"),
            Obs2CharSubcomp::new("water", "river", "river"),
            Obs2CharSubcomp::new("water", "river, long-term", "river"),
        ];
        let fallback = [
            ("water", "river"),
            ("soil", "industrial"),
            ("air", "low population density"),
        ];
        Self::from_entries(entries, fallback)
    }
}

impl SubcompartmentMatcher {
    /// Build a matcher from explicit tables
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = Obs2CharSubcomp>,
        fallback: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self {
            mapped: entries
                .into_iter()
                .map(|e| ((e.comp, e.observed), e.characterised))
                .collect(),
            fallback: fallback
                .into_iter()
                .map(|(comp, sub)| (comp.to_string(), sub.to_string()))
                .collect(),
        }
    }

    /// Choose the best entry of `available` for an observed subcompartment
    #[must_use]
    pub fn best_match<'a, I>(&self, comp: &str, observed: &str, available: I) -> Option<(&'a str, MatchKind)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let available: Vec<&'a str> = available.into_iter().collect();
        let find = |wanted: &str| available.iter().copied().find(|a| *a == wanted);

        if let Some(hit) = find(observed) {
            return Some((hit, MatchKind::Exact));
        }
        if let Some(mapped) = self.mapped.get(&(comp.to_string(), observed.to_string())) {
            if let Some(hit) = find(mapped.as_str()) {
                return Some((hit, MatchKind::Mapped));
            }
        }
        if let Some(hit) = find(UNSPECIFIED) {
            return Some((hit, MatchKind::Unspecified));
        }
        self.fallback
            .get(comp)
            .and_then(|fb| find(fb.as_str()))
            .map(|hit| (hit, MatchKind::Fallback))
    }
}
