//! Raw and normalized flow observations
//!
//! A [`RawFlowRecord`] is one observation of a substance name as a source
//! scheme spells it. The label normalizer turns it into a
//! [`NormalizedRecord`], which the resolver later back-fills with a
//! [`SubstanceId`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::substance::SubstanceId;

/// A CAS number that does not have the `NNNNNNN-NN-N` shape
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed CAS number '{0}'")]
pub struct CasFormatError(pub String);

/// A CAS registry number in canonical form (no leading zeros)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cas(String);

impl Cas {
    /// Parse a CAS number, trimming whitespace and leading zeros.
    ///
    /// The first group must hold 2 to 7 digits, the second exactly 2 and the
    /// check digit exactly 1.
    pub fn parse(raw: &str) -> Result<Self, CasFormatError> {
        let trimmed = raw.trim().trim_start_matches('0');
        let mut parts = trimmed.split('-');
        let shape_ok = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c), None) => {
                is_digits(a, 2, 7) && is_digits(b, 2, 2) && is_digits(c, 1, 1)
            }
            _ => false,
        };
        if shape_ok {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(CasFormatError(raw.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Verify the check digit.
    ///
    /// Real inventories carry CAS typos with a valid shape; those are fixed
    /// through the correction table, so a bad checksum is not a rejection.
    #[must_use]
    pub fn has_valid_checksum(&self) -> bool {
        let Some((body, check)) = self.0.rsplit_once('-') else {
            return false;
        };
        let Some(check) = check.chars().next().and_then(|c| c.to_digit(10)) else {
            return false;
        };
        let sum: u32 = body
            .chars()
            .filter_map(|c| c.to_digit(10))
            .rev()
            .enumerate()
            .map(|(i, d)| (i as u32 + 1) * d)
            .sum();
        sum % 10 == check
    }
}

fn is_digits(part: &str, min: usize, max: usize) -> bool {
    (min..=max).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit())
}

impl FromStr for Cas {
    type Err = CasFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Cas {
    type Error = CasFormatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Cas> for String {
    fn from(cas: Cas) -> Self {
        cas.0
    }
}

impl fmt::Display for Cas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One observation of a substance or product name in one source scheme.
///
/// Ephemeral: created per import batch and discarded after resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFlowRecord {
    pub name: Option<String>,
    pub name2: Option<String>,
    pub comp: Option<String>,
    pub subcomp: Option<String>,
    pub cas: Option<String>,
    pub tag: Option<String>,
    pub unit: Option<String>,
    pub value: Option<f64>,
    /// Scheme that contributed `name`
    pub scheme: String,
    /// Scheme that contributed `name2`, when it differs from `scheme`
    pub alt_scheme: Option<String>,
    /// Identifier of the flow inside its source dataset
    pub source_id: Option<String>,
    pub impact: Option<String>,
    pub method: Option<String>,
}

impl RawFlowRecord {
    #[must_use]
    pub fn new(scheme: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_name2(mut self, name2: impl Into<String>) -> Self {
        self.name2 = Some(name2.into());
        self
    }

    #[must_use]
    pub fn with_cas(mut self, cas: impl Into<String>) -> Self {
        self.cas = Some(cas.into());
        self
    }

    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn with_compartment(mut self, comp: impl Into<String>, subcomp: impl Into<String>) -> Self {
        self.comp = Some(comp.into());
        self.subcomp = Some(subcomp.into());
        self
    }

    #[must_use]
    pub const fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn with_alt_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.alt_scheme = Some(scheme.into());
        self
    }

    #[must_use]
    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_impact(mut self, impact: impl Into<String>, method: impl Into<String>) -> Self {
        self.impact = Some(impact.into());
        self.method = Some(method.into());
        self
    }

    /// Short human readable identification used in warnings
    #[must_use]
    pub fn describe(&self) -> String {
        let name = self
            .name
            .as_deref()
            .or(self.name2.as_deref())
            .unwrap_or("<unnamed>");
        match &self.source_id {
            Some(id) => format!("'{name}' ({}, {id})", self.scheme),
            None => format!("'{name}' ({})", self.scheme),
        }
    }
}

/// A record after label normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub name: Option<String>,
    pub name2: Option<String>,
    pub comp: String,
    pub subcomp: String,
    pub cas: Option<Cas>,
    /// Disambiguating qualifier, empty when absent
    pub tag: String,
    pub unit: String,
    pub value: Option<f64>,
    pub scheme: String,
    pub alt_scheme: Option<String>,
    pub source_id: Option<String>,
    pub impact: Option<String>,
    pub method: Option<String>,
    /// Back-reference set by the substance resolver
    pub substance: Option<SubstanceId>,
}

impl NormalizedRecord {
    /// The name used as representative when a substance is created
    #[must_use]
    pub fn primary_name(&self) -> Option<&str> {
        self.name.as_deref().or(self.name2.as_deref())
    }

    /// Both names with the scheme that contributed each
    pub fn names_with_scheme(&self) -> impl Iterator<Item = (&str, &str)> {
        let alt = self.alt_scheme.as_deref().unwrap_or(&self.scheme);
        self.name
            .as_deref()
            .map(|n| (n, self.scheme.as_str()))
            .into_iter()
            .chain(self.name2.as_deref().map(|n| (n, alt)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.name.as_deref().into_iter().chain(self.name2.as_deref())
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.substance.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cas_strips_leading_zeros() {
        let cas = Cas::parse(" 007732-18-5 ").unwrap();
        assert_eq!(cas.as_str(), "7732-18-5");
        assert!(cas.has_valid_checksum());
    }

    #[test]
    fn test_cas_rejects_bad_shape() {
        assert!(Cas::parse("7732185").is_err());
        assert!(Cas::parse("7732-1-5").is_err());
        assert!(Cas::parse("12345678-12-3").is_err());
        assert!(Cas::parse("77a2-18-5").is_err());
        assert!(Cas::parse("").is_err());
    }

    #[test]
    fn test_cas_checksum() {
        assert!(Cas::parse("7440-43-9").unwrap().has_valid_checksum());
        assert!(Cas::parse("124-38-9").unwrap().has_valid_checksum());
        assert!(!Cas::parse("124-38-8").unwrap().has_valid_checksum());
    }

    #[test]
    fn test_cas_deserialize_validates() {
        let ok: Cas = serde_json::from_str("\"0050-00-0\"").unwrap();
        assert_eq!(ok.as_str(), "50-00-0");
        assert!(serde_json::from_str::<Cas>("\"not-a-cas\"").is_err());
    }
}
