#![allow(dead_code)]

use std::path::Path;

use lci_matrix::models::{ActivityRecord, CharacterisationRecord, ElementaryExchangeRecord, NormalizedRecord, Stressor};
use lci_matrix::{OutputFormat, PipelineConfig, SourceData};

pub const CO2_CAS: &str = "124-38-9";
pub const CH4_CAS: &str = "74-82-8";

/// A product system with one producer (`BAR`, making `foo`) and one waste
/// treatment (`PUB`, taking `waste`). `PUB` reports its reference output as
/// -1 and both inputs of `waste` name no supplier.
#[must_use]
pub fn bar_pub_activities() -> Vec<ActivityRecord> {
    vec![
        ActivityRecord::new("BAR", "foo")
            .with_geography("GLO")
            .with_output("foo", 1.0, Some(100.0))
            .with_input(Some("BAR"), "foo", 0.3)
            .with_input(None, "waste", -0.1)
            .with_elementary("co2", 10.0),
        ActivityRecord::new("PUB", "waste")
            .with_geography("GLO")
            .with_output("waste", -1.0, Some(0.01))
            .with_input(None, "waste", -0.02)
            .with_elementary("ch4", 0.3),
    ]
}

#[must_use]
pub fn elementary_master() -> Vec<ElementaryExchangeRecord> {
    vec![
        ElementaryExchangeRecord {
            id: "co2".to_string(),
            name: "Carbon dioxide, fossil".to_string(),
            unit: "kg".to_string(),
            cas: Some(CO2_CAS.to_string()),
            comp: "air".to_string(),
            subcomp: None,
        },
        ElementaryExchangeRecord {
            id: "ch4".to_string(),
            name: "Methane, fossil".to_string(),
            unit: "kg".to_string(),
            cas: Some(CH4_CAS.to_string()),
            comp: "Air".to_string(),
            subcomp: Some("(unspecified)".to_string()),
        },
    ]
}

#[must_use]
pub fn gwp_factor(name: &str, cas: &str, value: f64) -> CharacterisationRecord {
    CharacterisationRecord {
        name: Some(name.to_string()),
        name2: None,
        cas: Some(cas.to_string()),
        unit: "kg".to_string(),
        comp: "air".to_string(),
        subcomp: None,
        impact: "climate change".to_string(),
        method: "IPCC 2013".to_string(),
        value,
        scheme: "ipcc".to_string(),
        alt_scheme: None,
    }
}

#[must_use]
pub fn bar_pub_source() -> SourceData {
    SourceData {
        activities: bar_pub_activities(),
        elementary: elementary_master(),
        characterisation: vec![
            gwp_factor("Carbon dioxide, fossil", CO2_CAS, 1.0),
            gwp_factor("Methane, fossil", CH4_CAS, 28.0),
        ],
    }
}

/// Configuration writing every format into `out_dir`
#[must_use]
pub fn test_config(out_dir: &Path) -> PipelineConfig {
    PipelineConfig::default()
        .with_project_name("test")
        .with_out_dir(out_dir)
        .with_output_formats([
            OutputFormat::DenseTable,
            OutputFormat::SparseTable,
            OutputFormat::BinaryMatrix,
        ])
}

/// A normalized record as the normalizer would produce it
#[must_use]
pub fn normalized(name: &str, cas: Option<&str>, scheme: &str) -> NormalizedRecord {
    NormalizedRecord {
        name: Some(name.to_string()),
        name2: None,
        comp: "air".to_string(),
        subcomp: "unspecified".to_string(),
        cas: cas.map(|c| lci_matrix::models::Cas::parse(c).unwrap()),
        tag: String::new(),
        unit: "kg".to_string(),
        value: None,
        scheme: scheme.to_string(),
        alt_scheme: None,
        source_id: None,
        impact: None,
        method: None,
        substance: None,
    }
}

/// Id of the first stressor whose name contains `fragment`
#[must_use]
pub fn stressor_id(stressors: &[Stressor], fragment: &str) -> String {
    stressors
        .iter()
        .find(|s| s.name.to_lowercase().contains(fragment))
        .map(|s| s.id.clone())
        .unwrap_or_else(|| panic!("no stressor named like {fragment}"))
}

pub fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("cell label not found");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
