//! Versioned, externally supplied correction table
//!
//! Holds manual CAS fixes (deprecated codes, ion versus neutral molecule,
//! typos), name synonyms, custom characterisation factors and the patterns
//! of names too generic to carry a CAS number. The table is plain data so it
//! can be audited and extended without touching the resolver.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::error::util::safe_read_to_string;
use crate::models::Cas;

/// A manual CAS substitution.
///
/// Matching mode depends on which criteria are set:
/// * `name` and `bad_cas`: the named record carrying `bad_cas`
/// * only `bad_cas`: every record carrying `bad_cas`
/// * only `name`: every record with that name, whatever its CAS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasCorrection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bad_cas: Option<String>,
    /// Replacement; `None` removes the CAS
    pub cas: Option<Cas>,
    #[serde(default)]
    pub comment: String,
}

impl CasCorrection {
    /// Whether this correction applies to a record.
    ///
    /// `bad_cas` is compared with the raw CAS after trimming leading zeros;
    /// names compare ASCII case-insensitively.
    #[must_use]
    pub fn matches<'a>(&self, mut names: impl Iterator<Item = &'a str>, cas: Option<&str>) -> bool {
        let cas_ok = match (&self.bad_cas, cas) {
            (Some(bad), Some(cas)) => strip_zeros(bad) == strip_zeros(cas),
            (Some(_), None) => false,
            (None, _) => true,
        };
        let name_ok = match &self.name {
            Some(wanted) => names.any(|n| n.eq_ignore_ascii_case(wanted)),
            None => self.bad_cas.is_some(),
        };
        cas_ok && name_ok
    }
}

fn strip_zeros(cas: &str) -> &str {
    cas.trim().trim_start_matches('0')
}

/// Two names known to denote the same substance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Synonym {
    pub a_name: String,
    pub another_name: String,
    /// 0 for exact synonyms; higher values are looser approximations
    #[serde(default)]
    pub approximation_level: u8,
}

impl Synonym {
    /// The other side of the pair, if `name` is one side
    #[must_use]
    pub fn counterpart(&self, name: &str) -> Option<&str> {
        if self.a_name == name {
            Some(&self.another_name)
        } else if self.another_name == name {
            Some(&self.a_name)
        } else {
            None
        }
    }
}

/// A factor supplied by hand, overriding or completing a method
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFactor {
    pub name: String,
    #[serde(default)]
    pub tag: String,
    pub comp: String,
    pub subcomp: String,
    pub unit: String,
    pub impact: String,
    pub method: String,
    pub value: f64,
    #[serde(default)]
    pub comment: String,
}

/// Pattern of names whose CAS number would conflate distinct flows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasNullingRule {
    Contains(String),
    EndsWith(String),
}

impl CasNullingRule {
    #[must_use]
    pub fn matches(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        match self {
            Self::Contains(pattern) => name.contains(&pattern.to_ascii_lowercase()),
            Self::EndsWith(pattern) => name.ends_with(&pattern.to_ascii_lowercase()),
        }
    }
}

fn default_cas_nulling() -> Vec<CasNullingRule> {
    vec![
        CasNullingRule::Contains("water".to_string()),
        CasNullingRule::EndsWith(" salts".to_string()),
    ]
}

/// The full correction table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionTable {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub cas_corrections: Vec<CasCorrection>,
    #[serde(default)]
    pub synonyms: Vec<Synonym>,
    #[serde(default)]
    pub custom_factors: Vec<CustomFactor>,
    #[serde(default = "default_cas_nulling")]
    pub cas_nulling: Vec<CasNullingRule>,
}

impl Default for CorrectionTable {
    fn default() -> Self {
        Self {
            version: String::new(),
            cas_corrections: Vec::new(),
            synonyms: Vec::new(),
            custom_factors: Vec::new(),
            cas_nulling: default_cas_nulling(),
        }
    }
}

impl CorrectionTable {
    /// Load a table from JSON; CAS replacements are validated on load
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = safe_read_to_string(path, "correction table")?;
        let table: Self = serde_json::from_str(&text)?;
        log::info!(
            "Loaded correction table '{}' with {} CAS fixes, {} synonyms and {} custom factors",
            table.version,
            table.cas_corrections.len(),
            table.synonyms.len(),
            table.custom_factors.len()
        );
        Ok(table)
    }

    /// First correction matching a record, in table order
    #[must_use]
    pub fn find_cas_correction<'a, 'n>(
        &'a self,
        names: &[&'n str],
        cas: Option<&str>,
    ) -> Option<&'a CasCorrection> {
        self.cas_corrections
            .iter()
            .find(|c| c.matches(names.iter().copied(), cas))
    }

    #[must_use]
    pub fn nulls_cas(&self, name: &str) -> bool {
        self.cas_nulling.iter().any(|rule| rule.matches(name))
    }
}

/// Synonyms of `name` with their approximation level, most exact first
#[must_use]
pub fn synonyms_of<'s>(synonyms: &'s [Synonym], name: &str) -> Vec<(&'s str, u8)> {
    let mut found: Vec<(&str, u8)> = synonyms
        .iter()
        .filter_map(|s| s.counterpart(name).map(|other| (other, s.approximation_level)))
        .collect();
    found.sort_by_key(|(_, level)| *level);
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn correction(name: Option<&str>, bad: Option<&str>, cas: &str) -> CasCorrection {
        CasCorrection {
            name: name.map(str::to_string),
            bad_cas: bad.map(str::to_string),
            cas: Some(Cas::parse(cas).unwrap()),
            comment: String::new(),
        }
    }

    #[test]
    fn test_match_modes() {
        let both = correction(Some("Ammonium, ion"), Some("7664-41-7"), "14798-03-9");
        assert!(both.matches(["ammonium, ion"].into_iter(), Some("7664-41-7")));
        assert!(!both.matches(["Ammonia"].into_iter(), Some("7664-41-7")));
        assert!(!both.matches(["Ammonium, ion"].into_iter(), None));

        let by_cas = correction(None, Some("0074-82-8"), "74-82-8");
        assert!(by_cas.matches(["Methane"].into_iter(), Some("74-82-8")));

        let by_name = correction(Some("Methane, fossil"), None, "74-82-8");
        assert!(by_name.matches(["Methane, fossil"].into_iter(), None));
        assert!(by_name.matches(["x", "Methane, fossil"].into_iter(), Some("1-11-1")));
    }

    #[test]
    fn test_default_cas_nulling() {
        let table = CorrectionTable::default();
        assert!(table.nulls_cas("Water, cooling, unspecified natural origin"));
        assert!(table.nulls_cas("Heavy metal salts"));
        assert!(!table.nulls_cas("Salt"));
    }

    #[test]
    fn test_synonyms_sorted_by_level() {
        let table = CorrectionTable {
            synonyms: vec![
                Synonym {
                    a_name: "PM10".into(),
                    another_name: "Particulates, < 10 um".into(),
                    approximation_level: 2,
                },
                Synonym {
                    a_name: "Particulates, < 10 um (mobile)".into(),
                    another_name: "PM10".into(),
                    approximation_level: 0,
                },
            ],
            ..CorrectionTable::default()
        };
        let found = synonyms_of(&table.synonyms, "PM10");
        assert_eq!(found[0], ("Particulates, < 10 um (mobile)", 0));
        assert_eq!(found[1], ("Particulates, < 10 um", 2));
    }
}
