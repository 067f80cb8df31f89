//! Tag extraction from name suffixes
//!
//! Rules are tried in a fixed priority order and the first match wins, so a
//! record is never tagged twice. Suffix rules compare ASCII
//! case-insensitively and strip the suffix from every name carrying it.

use crate::models::NormalizedRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagRule {
    /// Name ends with `suffix`
    Suffix {
        suffix: &'static str,
        tag: &'static str,
    },
    /// Name contains `fragment` and the unit equals `unit`; the name is kept
    NameAndUnit {
        fragment: &'static str,
        unit: &'static str,
        tag: &'static str,
    },
}

pub const TAG_RULES: &[TagRule] = &[
    TagRule::Suffix { suffix: ", fossil", tag: "fossil" },
    TagRule::Suffix { suffix: " from soil or biomass stock", tag: "fossil" },
    TagRule::Suffix { suffix: ", biogenic", tag: "non-fossil" },
    TagRule::Suffix { suffix: ", total", tag: "total" },
    TagRule::Suffix { suffix: ", organic bound", tag: "organic bound" },
    TagRule::Suffix { suffix: ", non-fossil", tag: "non-fossil" },
    TagRule::Suffix { suffix: ", as n", tag: "as N" },
    TagRule::Suffix { suffix: ", land transformation", tag: "land transformation" },
    TagRule::Suffix { suffix: " compounds", tag: "mix" },
    TagRule::NameAndUnit { fragment: "alpha", unit: "kbq", tag: "alpha radiation" },
];

/// `name` without `suffix`, compared ASCII case-insensitively
#[must_use]
pub fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let cut = name.len().checked_sub(suffix.len())?;
    if !name.is_char_boundary(cut) {
        return None;
    }
    let (head, tail) = name.split_at(cut);
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

impl TagRule {
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Suffix { tag, .. } | Self::NameAndUnit { tag, .. } => tag,
        }
    }

    fn matches(&self, record: &NormalizedRecord) -> bool {
        match self {
            Self::Suffix { suffix, .. } => record
                .names()
                .any(|n| strip_suffix_ignore_case(n, suffix).is_some()),
            Self::NameAndUnit { fragment, unit, .. } => {
                record.unit.eq_ignore_ascii_case(unit)
                    && record
                        .names()
                        .any(|n| n.to_ascii_lowercase().contains(fragment))
            }
        }
    }

    fn apply(&self, record: &mut NormalizedRecord) {
        if let Self::Suffix { suffix, .. } = self {
            for name in [&mut record.name, &mut record.name2].into_iter().flatten() {
                if let Some(head) = strip_suffix_ignore_case(name, suffix) {
                    let head = head.trim_end().to_string();
                    *name = head;
                }
            }
        }
        record.tag = self.tag().to_string();
    }
}

/// Apply the first matching rule; records that already carry a tag are left
/// alone. Returns the assigned tag.
pub fn extract_tag(record: &mut NormalizedRecord) -> Option<&'static str> {
    if !record.tag.is_empty() {
        return None;
    }
    let rule = TAG_RULES.iter().find(|rule| rule.matches(record))?;
    rule.apply(record);
    Some(rule.tag())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, unit: &str) -> NormalizedRecord {
        NormalizedRecord {
            name: Some(name.to_string()),
            name2: None,
            comp: "air".into(),
            subcomp: "unspecified".into(),
            cas: None,
            tag: String::new(),
            unit: unit.into(),
            value: None,
            scheme: "test".into(),
            alt_scheme: None,
            source_id: None,
            impact: None,
            method: None,
            substance: None,
        }
    }

    #[test]
    fn test_suffix_is_stripped() {
        let mut r = record("Carbon dioxide, fossil", "kg");
        assert_eq!(extract_tag(&mut r), Some("fossil"));
        assert_eq!(r.name.as_deref(), Some("Carbon dioxide"));
        assert_eq!(r.tag, "fossil");
    }

    #[test]
    fn test_non_fossil_is_not_fossil() {
        let mut r = record("Methane, non-fossil", "kg");
        assert_eq!(extract_tag(&mut r), Some("non-fossil"));
        assert_eq!(r.name.as_deref(), Some("Methane"));

        let mut b = record("Methane, biogenic", "kg");
        assert_eq!(extract_tag(&mut b), Some("non-fossil"));
        assert_eq!(b.name.as_deref(), Some("Methane"));
    }

    #[test]
    fn test_case_insensitive_suffix() {
        let mut r = record("Nitrogen, As N", "kg");
        assert_eq!(extract_tag(&mut r), Some("as N"));
        assert_eq!(r.name.as_deref(), Some("Nitrogen"));

        let mut m = record("Chromium Compounds", "kg");
        assert_eq!(extract_tag(&mut m), Some("mix"));
        assert_eq!(m.name.as_deref(), Some("Chromium"));
    }

    #[test]
    fn test_alpha_radiation_keeps_name() {
        let mut r = record("Radioactive species, alpha emitters", "kBq");
        assert_eq!(extract_tag(&mut r), Some("alpha radiation"));
        assert_eq!(r.name.as_deref(), Some("Radioactive species, alpha emitters"));

        let mut kg = record("Radioactive species, alpha emitters", "kg");
        assert_eq!(extract_tag(&mut kg), None);
    }

    #[test]
    fn test_existing_tag_is_kept() {
        let mut r = record("Carbon dioxide, fossil", "kg");
        r.tag = "total".into();
        assert_eq!(extract_tag(&mut r), None);
        assert_eq!(r.name.as_deref(), Some("Carbon dioxide, fossil"));
    }

    #[test]
    fn test_both_names_are_stripped() {
        let mut r = record("Carbon dioxide, fossil", "kg");
        r.name2 = Some("CO2, fossil".into());
        extract_tag(&mut r);
        assert_eq!(r.name2.as_deref(), Some("CO2"));
    }
}
