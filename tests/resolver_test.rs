mod utils;

use std::collections::BTreeMap;

use lci_matrix::models::{NormalizedRecord, RawFlowRecord};
use lci_matrix::normalize::Synonym;
use lci_matrix::store::StagingStore;
use lci_matrix::{CorrectionTable, LabelNormalizer, MemoryStore, SchemeRegistry, SubstanceResolver, Warning};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use utils::normalized;

fn synonym_table() -> CorrectionTable {
    CorrectionTable {
        synonyms: vec![
            Synonym {
                a_name: "PM2.5".to_string(),
                another_name: "Particulates, < 2.5 um".to_string(),
                approximation_level: 0,
            },
            Synonym {
                a_name: "VOC".to_string(),
                another_name: "NMVOC, non-methane volatile organic compounds".to_string(),
                approximation_level: 2,
            },
        ],
        ..CorrectionTable::default()
    }
}

fn mixed_records() -> Vec<NormalizedRecord> {
    let mut two_names = normalized("Nitrogen oxides", None, "recipe");
    two_names.name2 = Some("NOx".to_string());
    two_names.alt_scheme = Some("ecoinvent".to_string());
    vec![
        normalized("Cadmium", Some("7440-43-9"), "ecoinvent"),
        normalized("Cadmium", None, "recipe"),
        normalized("Lead", Some("7439-92-1"), "ecoinvent"),
        normalized("PM2.5", None, "recipe"),
        normalized("Particulates, < 2.5 um", None, "ecoinvent"),
        normalized("NOx", None, "ecoinvent"),
        two_names,
        normalized("Sulfur dioxide", None, "ecoinvent"),
    ]
}

fn name_map<S: StagingStore>(store: &S) -> BTreeMap<(String, String), String> {
    store
        .names()
        .into_iter()
        .map(|n| ((n.name, n.tag), n.substance.to_string()))
        .collect()
}

#[test]
fn test_cadmium_spellings_share_one_substance() {
    let raw = vec![
        RawFlowRecord::new("ecoinvent", "Cadmium").with_cas("7440-43-9").with_unit("kg"),
        RawFlowRecord::new("recipe", "Cadmium, ion").with_cas("7440-43-9").with_unit("kg"),
    ];
    let mut records = LabelNormalizer::default().normalize(raw).records;
    let mut store = MemoryStore::new();
    let report = SubstanceResolver::new().resolve(&mut store, &mut records).unwrap();

    assert_eq!(report.substances_created, 1);
    assert_eq!(report.resolved_by_cas, 2);
    let id = records[0].substance.unwrap();
    assert_eq!(records[1].substance, Some(id));

    let registry = SchemeRegistry::new(&store);
    let schemes: Vec<String> = registry.schemes_of_substance(id).into_iter().collect();
    assert_eq!(schemes, ["ecoinvent", "recipe"]);
    assert_eq!(registry.lookup("recipe", "Cadmium, ion", ""), Some(id));
    assert_eq!(registry.lookup("recipe", "Cadmium", ""), None);
    assert_eq!(registry.translate("recipe", "Cadmium, ion", "", "ecoinvent"), ["Cadmium"]);
}

#[test]
fn test_union_find_groups_names() {
    let mut store = MemoryStore::new();
    let mut records = mixed_records();
    SubstanceResolver::from_table(&synonym_table())
        .resolve(&mut store, &mut records)
        .unwrap();

    // Cadmium without CAS joins the CAS substance through its name
    assert_eq!(records[0].substance, records[1].substance);
    // exact synonyms join
    assert_eq!(records[3].substance, records[4].substance);
    // a record carrying two names joins both
    assert_eq!(records[5].substance, records[6].substance);
    assert_ne!(records[7].substance, records[5].substance);
    // Cadmium, Lead, PM2.5, NOx, Sulfur dioxide
    assert_eq!(store.substance_count(), 5);
}

#[test]
fn test_approximate_synonym_only_links_existing_substances() {
    let mut store = MemoryStore::new();
    let mut first = vec![normalized("VOC", None, "recipe")];
    let resolver = SubstanceResolver::from_table(&synonym_table());
    resolver.resolve(&mut store, &mut first).unwrap();

    let mut second = vec![normalized("NMVOC, non-methane volatile organic compounds", None, "ecoinvent")];
    let report = resolver.resolve(&mut store, &mut second).unwrap();
    assert_eq!(report.substances_created, 0);
    assert_eq!(first[0].substance, second[0].substance);

    // the loose synonym never joins names inside the union-find
    let mut unrelated = vec![normalized("Ozone", None, "recipe")];
    resolver.resolve(&mut store, &mut unrelated).unwrap();
    assert_ne!(unrelated[0].substance, first[0].substance);
}

#[test]
fn test_resolution_is_idempotent_in_any_order() {
    let resolver = SubstanceResolver::from_table(&synonym_table());
    let mut store = MemoryStore::new();
    let mut records = mixed_records();
    resolver.resolve(&mut store, &mut records).unwrap();
    let substances = store.substance_count();
    let names = name_map(&store);

    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..5 {
        let mut again = mixed_records();
        again.shuffle(&mut rng);
        let report = resolver.resolve(&mut store, &mut again).unwrap();
        assert_eq!(report.substances_created, 0);
        assert_eq!(report.names_registered, 0);
        assert_eq!(store.substance_count(), substances);
        assert_eq!(name_map(&store), names);
    }

    // already resolved records are left alone
    let report = resolver.resolve(&mut store, &mut records).unwrap();
    assert_eq!(report.already_resolved, records.len());
    assert_eq!(report.resolved_by_cas + report.resolved_by_name, 0);
}

#[test]
fn test_shuffled_input_yields_the_same_partition() {
    let resolver = SubstanceResolver::from_table(&synonym_table());
    let partition = |records: &[NormalizedRecord]| -> Vec<Vec<String>> {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for r in records {
            groups
                .entry(r.substance.unwrap().to_string())
                .or_default()
                .extend(r.names().map(str::to_string));
        }
        let mut out: Vec<Vec<String>> = groups
            .into_values()
            .map(|mut g| {
                g.sort();
                g.dedup();
                g
            })
            .collect();
        out.sort();
        out
    };

    let mut baseline = mixed_records();
    resolver.resolve(&mut MemoryStore::new(), &mut baseline).unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    let mut shuffled = mixed_records();
    shuffled.shuffle(&mut rng);
    resolver.resolve(&mut MemoryStore::new(), &mut shuffled).unwrap();

    assert_eq!(partition(&baseline), partition(&shuffled));
}

#[test]
fn test_conflicting_cas_for_one_name_is_reported() {
    let mut records = vec![
        normalized("Chromium", Some("7440-47-3"), "ecoinvent"),
        normalized("Chromium", Some("18540-29-9"), "recipe"),
    ];
    let report = SubstanceResolver::new()
        .resolve(&mut MemoryStore::new(), &mut records)
        .unwrap();
    assert!(report.warnings.iter().any(|w| matches!(w, Warning::ConflictingIdentity { .. })));
    assert_ne!(records[0].substance, records[1].substance);
}
