mod utils;

use lci_matrix::models::{ActivityRecord, NormalizedRecord};
use lci_matrix::{
    CorrectionTable, FlowGraph, FlowGraphBuilder, LabelNormalizer, LeontiefSystem, MemoryStore,
    PipelineConfig, SubstanceResolver, SupplyUseSystem, Traceability, assemble_leontief, assemble_sut,
};
use utils::{assert_close, bar_pub_activities, elementary_master, stressor_id};

fn resolved_elementary() -> Vec<NormalizedRecord> {
    let raw = elementary_master().iter().map(|e| e.to_raw("ecoinvent")).collect();
    let mut records = LabelNormalizer::new(CorrectionTable::default()).normalize(raw).records;
    SubstanceResolver::new()
        .resolve(&mut MemoryStore::new(), &mut records)
        .unwrap();
    records
}

fn graph(activities: &[ActivityRecord], config: &PipelineConfig, traceability: Traceability) -> FlowGraph {
    FlowGraphBuilder::new(config)
        .build(activities, &resolved_elementary(), traceability)
        .unwrap()
        .0
}

fn leontief(config: &PipelineConfig) -> LeontiefSystem {
    let g = graph(&bar_pub_activities(), config, Traceability::Process);
    assemble_leontief(&g, config).unwrap()
}

fn sut(config: &PipelineConfig) -> SupplyUseSystem {
    let traceability = if config.untraceable_use {
        Traceability::Product
    } else {
        Traceability::Activity
    };
    let g = graph(&bar_pub_activities(), config, traceability);
    assemble_sut(&g, config).unwrap()
}

#[test]
fn test_technology_coefficients() {
    let system = leontief(&PipelineConfig::default());
    assert_close(system.a.get("PUB_waste", "BAR_foo"), -0.1);
    assert_close(system.a.get("BAR_foo", "BAR_foo"), 0.3);
    assert_close(system.a.get("PUB_waste", "PUB_waste"), 0.02);
    assert_close(system.a.get("BAR_foo", "PUB_waste"), 0.0);

    let co2 = stressor_id(&system.stressors, "carbon dioxide");
    let ch4 = stressor_id(&system.stressors, "methane");
    assert_close(system.f.get(&co2, "BAR_foo"), 10.0);
    assert_close(system.f.get(&ch4, "PUB_waste"), -0.3);
    assert!(!system.waste_flipped);
}

#[test]
fn test_waste_sign_flip() {
    let config = PipelineConfig::default().with_waste_sign_flip(true);
    let system = leontief(&config);
    assert_close(system.a.get("PUB_waste", "BAR_foo"), 0.1);
    assert_close(system.a.get("BAR_foo", "BAR_foo"), 0.3);
    assert_close(system.a.get("PUB_waste", "PUB_waste"), 0.02);

    let ch4 = stressor_id(&system.stressors, "methane");
    assert_close(system.f.get(&ch4, "PUB_waste"), 0.3);
    assert!(system.waste_flipped);
}

#[test]
fn test_absolute_flows() {
    let config = PipelineConfig::default().with_absolute_flows(true);
    let system = leontief(&config);
    let z = system.z.as_ref().unwrap();
    let g = system.g.as_ref().unwrap();
    assert_close(z.get("BAR_foo", "BAR_foo"), 30.0);
    assert_close(z.get("PUB_waste", "BAR_foo"), -10.0);
    assert_close(z.get("PUB_waste", "PUB_waste"), 0.0002);

    let co2 = stressor_id(&system.stressors, "carbon dioxide");
    let ch4 = stressor_id(&system.stressors, "methane");
    assert_close(g.get(&co2, "BAR_foo"), 1000.0);
    assert_close(g.get(&ch4, "PUB_waste"), -0.003);
    assert_eq!(system.matrices().len(), 4);
}

#[test]
fn test_zero_reference_output_is_undefined() {
    let mut activities = bar_pub_activities();
    activities.push(
        ActivityRecord::new("IDLE", "spare")
            .with_output("spare", 0.0, None)
            .with_input(Some("BAR"), "foo", 1.0),
    );
    let config = PipelineConfig::default();
    let g = graph(&activities, &config, Traceability::Process);

    let system = assemble_leontief(&g, &config).unwrap();
    assert!(system.a.get("BAR_foo", "IDLE_spare").unwrap().is_nan());
    assert!(system.a.get("PUB_waste", "IDLE_spare").unwrap().is_nan());
    assert_close(system.a.get("BAR_foo", "BAR_foo"), 0.3);
    let supply = system.normalized_supply();
    assert_eq!(supply.iter().filter(|s| s.is_nan()).count(), 1);

    let zeroed = assemble_leontief(&g, &config.clone().with_nan_to_zero(true)).unwrap();
    assert_close(zeroed.a.get("BAR_foo", "IDLE_spare"), 0.0);
    assert!(!zeroed.a.has_undefined());
    assert!(!zeroed.f.has_undefined());
}

#[test]
fn test_process_order_follows_sort_keys() {
    let config = PipelineConfig::default();
    let system = leontief(&config);
    let ids: Vec<&str> = system.processes.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["BAR_foo", "PUB_waste"]);
    assert_eq!(system.a.row_labels(), system.a.col_labels());
    assert_eq!(system.f.col_labels(), system.a.col_labels());
}

#[test]
fn test_supply_use_tables() {
    let system = sut(&PipelineConfig::default());
    assert!(!system.traceable);
    assert_close(system.v.get("BAR", "foo"), 1.0);
    assert_close(system.v.get("PUB", "waste"), -1.0);
    assert_close(system.v_prod_vol.get("BAR", "foo"), 100.0);
    assert_close(system.v_prod_vol.get("PUB", "waste"), 0.01);

    assert_close(system.u.get("foo", "BAR"), 0.3);
    assert_close(system.u.get("waste", "BAR"), -0.1);
    assert_close(system.u.get("waste", "PUB"), -0.02);

    let co2 = stressor_id(&system.stressors, "carbon dioxide");
    assert_close(system.g_act.get(&co2, "BAR"), 10.0);
}

#[test]
fn test_traceable_use_rows() {
    let config = PipelineConfig::default()
        .with_untraceable_use(false)
        .with_repair_unsourced_flows(false);
    let system = sut(&config);
    assert!(system.traceable);
    assert_eq!(system.u.row_labels(), ["|waste", "BAR|foo"].map(String::from).as_slice());
    assert_close(system.u.get("BAR|foo", "BAR"), 0.3);
    assert_close(system.u.get("|waste", "BAR"), -0.1);
    assert_close(system.u.get("|waste", "PUB"), -0.02);
}

#[test]
fn test_traceable_use_rows_after_repair() {
    let config = PipelineConfig::default().with_untraceable_use(false);
    let system = sut(&config);
    assert_close(system.u.get("PUB|waste", "BAR"), -0.1);
    assert!(system.u.get("|waste", "BAR").is_none());
}
