//! Canonical substances and the names and schemes that refer to them

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::record::Cas;

/// Internal id of a canonical substance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubstanceId(pub u32);

/// Internal id of a (name, tag) row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameId(pub u32);

/// Internal id of a naming scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemeId(pub u32);

impl fmt::Display for SubstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{}", self.0)
    }
}

/// Canonical chemical or physical entity.
///
/// `(cas, tag, unit)` is unique when `cas` is present; `(name, tag, unit)`
/// is the alternate key of substances without CAS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Substance {
    pub id: SubstanceId,
    pub formula: Option<String>,
    pub cas: Option<Cas>,
    pub tag: String,
    /// Representative name
    pub name: String,
    pub unit: String,
}

/// Fields of a substance that is about to be created
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubstance {
    pub formula: Option<String>,
    pub cas: Option<Cas>,
    pub tag: String,
    pub name: String,
    pub unit: String,
}

/// A (text, tag) pair referring to exactly one substance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    pub id: NameId,
    pub name: String,
    pub tag: String,
    pub substance: SubstanceId,
}

/// A naming convention or data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheme {
    pub id: SchemeId,
    pub name: String,
}

/// Records that a scheme uses a name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameHasScheme {
    pub name: NameId,
    pub scheme: SchemeId,
}

/// An elementary flow row label: a substance released to or taken from one
/// (compartment, subcompartment) in one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stressor {
    pub id: String,
    pub substance: SubstanceId,
    pub name: String,
    pub tag: String,
    pub cas: Option<String>,
    pub comp: String,
    pub subcomp: String,
    pub unit: String,
}

impl Stressor {
    /// Structural id, stable across runs for the same substance set
    #[must_use]
    pub fn key(substance: SubstanceId, comp: &str, subcomp: &str, unit: &str) -> String {
        format!("{substance}|{comp}|{subcomp}|{unit}")
    }
}
