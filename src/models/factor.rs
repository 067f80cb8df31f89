//! Characterisation factors

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::substance::SubstanceId;

/// Unique key of a characterisation factor
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactorKey {
    pub substance: SubstanceId,
    pub comp: String,
    pub subcomp: String,
    pub unit: String,
    pub impact: String,
    pub method: String,
}

impl FactorKey {
    /// Label of the impact category row in the characterisation matrix
    #[must_use]
    pub fn impact_label(&self) -> String {
        impact_label(&self.method, &self.impact)
    }
}

#[must_use]
pub fn impact_label(method: &str, impact: &str) -> String {
    format!("{method}/{impact}")
}

impl fmt::Display for FactorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in {}/{} [{}] for {}",
            self.substance,
            self.comp,
            self.subcomp,
            self.unit,
            self.impact_label()
        )
    }
}

/// Weight converting one unit of a substance flow into an impact category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Factor {
    pub key: FactorKey,
    pub value: f64,
}
