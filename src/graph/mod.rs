//! Flow graph builder
//!
//! Turns activity datasets into supply, use and elementary relations between
//! processes, products and stressors. Per-dataset problems are gathered over
//! the whole batch; the build fails with every issue at once when the graph
//! is not traceable.

pub mod sources;
pub mod validation;

use std::collections::BTreeMap;
use std::time::Instant;

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::config::{DuplicatePolicy, PipelineConfig};
use crate::error::{LciError, Result};
use crate::models::{ActivityRecord, Exchange, NormalizedRecord, Process, Product, Stressor};
use crate::report::Warning;
use crate::utils::logging::{log_stage_complete, log_stage_start};

pub use sources::{RepairRule, choose_source, repair_sources};
pub use validation::{FlowIssue, Traceability, validate};

/// A process supplying a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplyEdge {
    pub process: String,
    pub product: String,
    pub amount: f64,
    pub production_volume: Option<f64>,
}

/// A process consuming a product, optionally from a named source activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseEdge {
    pub consumer: String,
    pub source: Option<String>,
    pub product: String,
    pub amount: f64,
}

/// A process exchanging a stressor with the environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementaryEdge {
    pub process: String,
    pub stressor: String,
    pub amount: f64,
}

/// Processes, products and stressors with the flows between them
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    pub processes: Vec<Process>,
    pub products: Vec<Product>,
    pub stressors: Vec<Stressor>,
    pub supply: Vec<SupplyEdge>,
    pub uses: Vec<UseEdge>,
    pub elementary: Vec<ElementaryEdge>,
}

impl FlowGraph {
    #[must_use]
    pub fn process(&self, id: &str) -> Option<&Process> {
        self.processes.iter().find(|p| p.id == id)
    }

    /// Amount of its own product a process supplies
    #[must_use]
    pub fn reference_output(&self, process: &Process) -> Option<f64> {
        self.reference_edge(process).map(|e| e.amount)
    }

    /// Production volume recorded with the reference output
    #[must_use]
    pub fn production_volume(&self, process: &Process) -> Option<f64> {
        self.reference_edge(process).and_then(|e| e.production_volume)
    }

    /// Distinct activity ids, in order of first appearance among processes
    #[must_use]
    pub fn activity_ids(&self) -> Vec<String> {
        let mut seen = FxHashSet::default();
        self.processes
            .iter()
            .filter(|p| seen.insert(p.activity_id.as_str()))
            .map(|p| p.activity_id.clone())
            .collect()
    }

    /// Reference output edge of every process that has one, by process id
    #[must_use]
    pub fn reference_edges(&self) -> FxHashMap<&str, &SupplyEdge> {
        let product_of: FxHashMap<&str, &str> = self
            .processes
            .iter()
            .map(|p| (p.id.as_str(), p.product_id.as_str()))
            .collect();
        self.supply
            .iter()
            .filter(|e| product_of.get(e.process.as_str()) == Some(&e.product.as_str()))
            .map(|e| (e.process.as_str(), e))
            .collect()
    }

    fn reference_edge(&self, process: &Process) -> Option<&SupplyEdge> {
        self.supply
            .iter()
            .find(|e| e.process == process.id && e.product == process.product_id)
    }
}

/// Exchange identity within one dataset
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum ExchangeKey {
    Input { source: Option<String>, product: String },
    Output { product: String },
    Elementary { exchange_id: String },
}

impl ExchangeKey {
    fn of(exchange: &Exchange) -> Self {
        match exchange {
            Exchange::IntermediateInput { source_activity, product, .. } => Self::Input {
                source: source_activity.clone(),
                product: product.clone(),
            },
            Exchange::IntermediateOutput { product, .. } => Self::Output {
                product: product.clone(),
            },
            Exchange::Elementary { exchange_id, .. } => Self::Elementary {
                exchange_id: exchange_id.clone(),
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Input { source: Some(s), product } => format!("input {product} from {s}"),
            Self::Input { source: None, product } => format!("input {product}"),
            Self::Output { product } => format!("output {product}"),
            Self::Elementary { exchange_id } => format!("elementary {exchange_id}"),
        }
    }
}

/// Relations contributed by one dataset
#[derive(Default)]
struct DatasetFlows {
    supply: Vec<SupplyEdge>,
    uses: Vec<UseEdge>,
    elementary: Vec<ElementaryEdge>,
    warnings: Vec<Warning>,
    issues: Vec<FlowIssue>,
}

/// Builds a [`FlowGraph`] from activity datasets and resolved elementary
/// flow records
pub struct FlowGraphBuilder<'c> {
    config: &'c PipelineConfig,
    rejected: Option<&'c FxHashMap<String, String>>,
}

impl<'c> FlowGraphBuilder<'c> {
    #[must_use]
    pub const fn new(config: &'c PipelineConfig) -> Self {
        Self { config, rejected: None }
    }

    /// Exchange ids whose master record the normalizer rejected, with the
    /// reason. Exchanges to them are dropped with a warning instead of
    /// failing as unknown flows.
    #[must_use]
    pub const fn with_rejected_elementary(mut self, rejected: &'c FxHashMap<String, String>) -> Self {
        self.rejected = Some(rejected);
        self
    }

    /// Build the graph and check it against `traceability`.
    ///
    /// # Arguments
    /// * `activities` - Activity datasets, one per process
    /// * `elementary` - Normalized elementary flow master data; `source_id`
    ///   is the exchange id and `substance` must be resolved
    /// * `traceability` - How precisely inputs must name their supplier
    ///
    /// Returns the graph with recoverable warnings, or
    /// [`LciError::UnresolvedFlows`] listing every issue in the batch.
    pub fn build(
        &self,
        activities: &[ActivityRecord],
        elementary: &[NormalizedRecord],
        traceability: Traceability,
    ) -> Result<(FlowGraph, Vec<Warning>)> {
        let start = Instant::now();
        log_stage_start("Building flow graph", activities.len());

        let mut warnings = Vec::new();
        let mut issues = Vec::new();
        let (stressor_of, stressors) = stressor_index(elementary, &mut warnings, &mut issues);
        let index = ElementaryIndex {
            stressor_of,
            rejected: self.rejected,
        };

        let mut seen = FxHashSet::default();
        let datasets: Vec<&ActivityRecord> = activities
            .iter()
            .filter(|a| {
                let id = a.process_id();
                if seen.insert(id.clone()) {
                    true
                } else {
                    warnings.push(Warning::DuplicateRecord {
                        key: id,
                        detail: "dataset listed more than once; first kept".to_string(),
                    });
                    false
                }
            })
            .collect();

        let policy = self.config.duplicate_policy;
        let flows: Vec<DatasetFlows> = datasets
            .par_iter()
            .map(|dataset| dataset_flows(dataset, &index, policy))
            .collect();

        let mut graph = FlowGraph {
            processes: datasets.iter().map(|d| Process::from(*d)).collect(),
            stressors,
            ..FlowGraph::default()
        };
        for f in flows {
            graph.supply.extend(f.supply);
            graph.uses.extend(f.uses);
            graph.elementary.extend(f.elementary);
            warnings.extend(f.warnings);
            issues.extend(f.issues);
        }
        graph.products = collect_products(&datasets, &graph.supply);

        if self.config.repair_unsourced_flows && traceability != Traceability::Product {
            let repaired = repair_sources(&mut graph.uses, &graph.processes, &graph.supply);
            for (rule, n) in &repaired {
                log::info!("Repaired {n} unsourced input(s) with rule {rule:?}");
            }
            if !repaired.is_empty() {
                let uses = std::mem::take(&mut graph.uses);
                graph.uses = merge_repaired_uses(uses, policy, &mut warnings, &mut issues);
            }
        }

        issues.extend(validate(&graph, traceability));
        if !issues.is_empty() {
            issues.sort();
            issues.dedup();
            log::warn!("Flow graph has {} unresolved issue(s)", issues.len());
            return Err(LciError::UnresolvedFlows(issues));
        }

        log::info!(
            "Flow graph: {} processes, {} products, {} stressors, {} supply / {} use / {} elementary flows",
            graph.processes.len(),
            graph.products.len(),
            graph.stressors.len(),
            graph.supply.len(),
            graph.uses.len(),
            graph.elementary.len()
        );
        log_stage_complete("Built flow graph from", graph.processes.len(), start.elapsed());
        Ok((graph, warnings))
    }
}

/// Elementary exchange ids known to the build
struct ElementaryIndex<'r> {
    stressor_of: FxHashMap<String, String>,
    rejected: Option<&'r FxHashMap<String, String>>,
}

/// Map exchange ids to stressor ids and collect the distinct stressors.
///
/// The first master record of an exchange id wins. A repeat describing the
/// same stressor is dropped with a warning; one describing another stressor
/// is an issue.
fn stressor_index(
    elementary: &[NormalizedRecord],
    warnings: &mut Vec<Warning>,
    issues: &mut Vec<FlowIssue>,
) -> (FxHashMap<String, String>, Vec<Stressor>) {
    let mut stressor_of: FxHashMap<String, String> = FxHashMap::default();
    let mut stressors: BTreeMap<String, Stressor> = BTreeMap::new();
    for record in elementary {
        let (Some(exchange_id), Some(substance)) = (&record.source_id, record.substance) else {
            continue;
        };
        let key = Stressor::key(substance, &record.comp, &record.subcomp, &record.unit);
        if let Some(first) = stressor_of.get(exchange_id) {
            if *first == key {
                warnings.push(Warning::DuplicateRecord {
                    key: format!("elementary exchange {exchange_id}"),
                    detail: "master record listed more than once; first kept".to_string(),
                });
            } else {
                issues.push(FlowIssue::ConflictingElementaryFlow {
                    exchange_id: exchange_id.clone(),
                    first: first.clone(),
                    second: key,
                });
            }
            continue;
        }
        stressors.entry(key.clone()).or_insert_with(|| Stressor {
            id: key.clone(),
            substance,
            name: record.primary_name().unwrap_or_default().to_string(),
            tag: record.tag.clone(),
            cas: record.cas.as_ref().map(|c| c.as_str().to_string()),
            comp: record.comp.clone(),
            subcomp: record.subcomp.clone(),
            unit: record.unit.clone(),
        });
        stressor_of.insert(exchange_id.clone(), key);
    }
    (stressor_of, stressors.into_values().collect())
}

/// Fold `amount` into `total`, a previous exchange under the same key.
///
/// Under `Sum` repeats always add up; under `Reject` an identical repeat is
/// dropped and a different amount is an issue.
fn merge_repeat(
    policy: DuplicatePolicy,
    process: &str,
    exchange: String,
    total: &mut f64,
    amount: f64,
    warnings: &mut Vec<Warning>,
    issues: &mut Vec<FlowIssue>,
) {
    let record = format!("{process}: {exchange}");
    match policy {
        DuplicatePolicy::Sum => {
            warnings.push(Warning::DuplicateRecord {
                key: record,
                detail: format!("amounts {total} and {amount} summed"),
            });
            *total += amount;
        }
        DuplicatePolicy::Reject if *total == amount => warnings.push(Warning::DuplicateRecord {
            key: record,
            detail: "identical repeat dropped".to_string(),
        }),
        DuplicatePolicy::Reject => issues.push(FlowIssue::ConflictingDuplicate {
            process: process.to_string(),
            exchange,
            amounts: format!("{total} and {amount}"),
        }),
    }
}

/// Merge inputs that share consumer, source and product once repair has
/// filled in their source
fn merge_repaired_uses(
    uses: Vec<UseEdge>,
    policy: DuplicatePolicy,
    warnings: &mut Vec<Warning>,
    issues: &mut Vec<FlowIssue>,
) -> Vec<UseEdge> {
    let mut position: FxHashMap<(String, Option<String>, String), usize> = FxHashMap::default();
    let mut merged: Vec<UseEdge> = Vec::with_capacity(uses.len());
    for edge in uses {
        let key = (edge.consumer.clone(), edge.source.clone(), edge.product.clone());
        match position.get(&key) {
            Some(&i) => {
                let exchange = match &edge.source {
                    Some(source) => format!("input {} from {source} (after source repair)", edge.product),
                    None => format!("input {}", edge.product),
                };
                merge_repeat(
                    policy,
                    &edge.consumer,
                    exchange,
                    &mut merged[i].amount,
                    edge.amount,
                    warnings,
                    issues,
                );
            }
            None => {
                position.insert(key, merged.len());
                merged.push(edge);
            }
        }
    }
    merged
}

fn dataset_flows(dataset: &ActivityRecord, index: &ElementaryIndex<'_>, policy: DuplicatePolicy) -> DatasetFlows {
    let process = dataset.process_id();
    let mut flows = DatasetFlows::default();
    let mut merged: BTreeMap<ExchangeKey, (f64, Option<f64>)> = BTreeMap::new();

    for exchange in &dataset.exchanges {
        let key = ExchangeKey::of(exchange);
        let amount = exchange.amount();
        if !amount.is_finite() {
            flows.issues.push(FlowIssue::NonFiniteAmount {
                process: process.clone(),
                exchange: key.describe(),
            });
            continue;
        }
        // zero outputs stay so that a zero reference output yields an
        // undefined column rather than a missing one
        if amount == 0.0 && !matches!(exchange, Exchange::IntermediateOutput { .. }) {
            continue;
        }
        let volume = match exchange {
            Exchange::IntermediateOutput { production_volume, .. } => *production_volume,
            _ => None,
        };
        match merged.get_mut(&key) {
            Some(entry) => merge_repeat(
                policy,
                &process,
                key.describe(),
                &mut entry.0,
                amount,
                &mut flows.warnings,
                &mut flows.issues,
            ),
            None => {
                merged.insert(key, (amount, volume));
            }
        }
    }

    let mut elementary: BTreeMap<String, f64> = BTreeMap::new();
    for (key, (amount, volume)) in merged {
        match key {
            ExchangeKey::Input { source, product } => flows.uses.push(UseEdge {
                consumer: process.clone(),
                source,
                product,
                amount,
            }),
            ExchangeKey::Output { product } => flows.supply.push(SupplyEdge {
                process: process.clone(),
                product,
                amount,
                production_volume: volume,
            }),
            ExchangeKey::Elementary { exchange_id } => {
                if let Some(stressor) = index.stressor_of.get(&exchange_id) {
                    *elementary.entry(stressor.clone()).or_default() += amount;
                } else if let Some(reason) = index.rejected.and_then(|r| r.get(&exchange_id)) {
                    flows.warnings.push(Warning::MalformedRecord {
                        record: format!("{process}: elementary {exchange_id}"),
                        reason: format!("exchange dropped, its master record was rejected: {reason}"),
                    });
                } else {
                    flows.issues.push(FlowIssue::UnknownElementaryFlow {
                        process: process.clone(),
                        exchange_id,
                    });
                }
            }
        }
    }
    flows.elementary = elementary
        .into_iter()
        .map(|(stressor, amount)| ElementaryEdge {
            process: process.clone(),
            stressor,
            amount,
        })
        .collect();
    flows
}

/// Distinct supplied products, named after the datasets they are the
/// reference product of
fn collect_products(datasets: &[&ActivityRecord], supply: &[SupplyEdge]) -> Vec<Product> {
    let reference: FxHashMap<&str, &ActivityRecord> = datasets
        .iter()
        .map(|d| (d.product_id.as_str(), *d))
        .collect();
    let mut products: BTreeMap<&str, Product> = BTreeMap::new();
    for edge in supply {
        products.entry(edge.product.as_str()).or_insert_with(|| {
            let dataset = reference.get(edge.product.as_str());
            Product {
                id: edge.product.clone(),
                name: dataset.map_or_else(|| edge.product.clone(), |d| d.product_name.clone()),
                unit: dataset.and_then(|d| d.unit.clone()),
            }
        });
    }
    products.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubstanceId;

    fn co2_record() -> NormalizedRecord {
        NormalizedRecord {
            name: Some("carbon dioxide".to_string()),
            name2: None,
            comp: "air".to_string(),
            subcomp: "unspecified".to_string(),
            cas: None,
            tag: String::new(),
            unit: "kg".to_string(),
            value: None,
            scheme: "ecoinvent".to_string(),
            alt_scheme: None,
            source_id: Some("co2-air".to_string()),
            impact: None,
            method: None,
            substance: Some(SubstanceId(1)),
        }
    }

    fn steel_and_ore() -> Vec<ActivityRecord> {
        vec![
            ActivityRecord::new("steelworks", "steel")
                .with_output("steel", 10.0, None)
                .with_input(Some("mine"), "ore", 5.0)
                .with_elementary("co2-air", 2.0),
            ActivityRecord::new("mine", "ore").with_output("ore", 5.0, None),
        ]
    }

    #[test]
    fn test_steel_and_ore_graph() {
        let config = PipelineConfig::default();
        let (graph, warnings) = FlowGraphBuilder::new(&config)
            .build(&steel_and_ore(), &[co2_record()], Traceability::Process)
            .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(graph.processes.len(), 2);
        assert_eq!(graph.products.len(), 2);
        assert_eq!(graph.stressors.len(), 1);
        assert_eq!(graph.uses[0].source.as_deref(), Some("mine"));

        let steel = graph.process("steelworks_steel").unwrap();
        assert_eq!(graph.reference_output(steel), Some(10.0));
        assert_eq!(graph.elementary[0].stressor, graph.stressors[0].id);
    }

    #[test]
    fn test_unsupplied_product_fails_with_every_issue() {
        let mut activities = steel_and_ore();
        activities[0] = activities[0].clone().with_input(Some("smelter"), "coke", 1.0);
        activities.push(ActivityRecord::new("foundry", "cast").with_input(None, "coke", 2.0));

        let config = PipelineConfig::default();
        let err = FlowGraphBuilder::new(&config)
            .build(&activities, &[co2_record()], Traceability::Process)
            .unwrap_err();
        let LciError::UnresolvedFlows(issues) = err else {
            panic!("expected unresolved flows");
        };
        assert!(issues.iter().any(|i| matches!(
            i,
            FlowIssue::UnsuppliedProduct { product, consumers }
                if product == "coke" && consumers.len() == 2
        )));
        assert!(issues.iter().any(|i| matches!(
            i,
            FlowIssue::MissingReferenceOutput { process, .. } if process == "foundry_cast"
        )));
    }

    #[test]
    fn test_unknown_elementary_flow() {
        let activities = vec![
            ActivityRecord::new("mine", "ore")
                .with_output("ore", 1.0, None)
                .with_elementary("dust-air", 0.1),
        ];
        let config = PipelineConfig::default();
        let err = FlowGraphBuilder::new(&config)
            .build(&activities, &[co2_record()], Traceability::Process)
            .unwrap_err();
        assert!(err.is_unresolved_flows());
    }

    #[test]
    fn test_duplicate_exchanges() {
        let activities = vec![
            ActivityRecord::new("mine", "ore")
                .with_output("ore", 1.0, None)
                .with_elementary("co2-air", 0.5)
                .with_elementary("co2-air", 0.5),
        ];
        let config = PipelineConfig::default();
        let (graph, warnings) = FlowGraphBuilder::new(&config)
            .build(&activities, &[co2_record()], Traceability::Process)
            .unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(graph.elementary[0].amount, 0.5);

        let conflicting = vec![
            ActivityRecord::new("mine", "ore")
                .with_output("ore", 1.0, None)
                .with_elementary("co2-air", 0.5)
                .with_elementary("co2-air", 0.25),
        ];
        assert!(
            FlowGraphBuilder::new(&config)
                .build(&conflicting, &[co2_record()], Traceability::Process)
                .is_err()
        );

        let summing = config.with_duplicate_policy(DuplicatePolicy::Sum);
        let (graph, _) = FlowGraphBuilder::new(&summing)
            .build(&conflicting, &[co2_record()], Traceability::Process)
            .unwrap();
        assert_eq!(graph.elementary[0].amount, 0.75);
    }

    #[test]
    fn test_identical_repeats_are_summed_under_sum() {
        let activities = vec![
            ActivityRecord::new("mine", "ore")
                .with_output("ore", 1.0, None)
                .with_elementary("co2-air", 0.5)
                .with_elementary("co2-air", 0.5),
        ];
        let config = PipelineConfig::default().with_duplicate_policy(DuplicatePolicy::Sum);
        let (graph, warnings) = FlowGraphBuilder::new(&config)
            .build(&activities, &[co2_record()], Traceability::Process)
            .unwrap();
        assert_eq!(graph.elementary[0].amount, 1.0);
        assert!(matches!(warnings.as_slice(), [Warning::DuplicateRecord { .. }]));
    }

    #[test]
    fn test_repeated_master_record_keeps_the_first() {
        let activities = vec![
            ActivityRecord::new("mine", "ore")
                .with_output("ore", 1.0, None)
                .with_elementary("co2-air", 2.0),
        ];
        let config = PipelineConfig::default();
        let (graph, warnings) = FlowGraphBuilder::new(&config)
            .build(&activities, &[co2_record(), co2_record()], Traceability::Process)
            .unwrap();
        assert_eq!(graph.stressors.len(), 1);
        assert_eq!(graph.elementary.len(), 1);
        assert!(matches!(
            warnings.as_slice(),
            [Warning::DuplicateRecord { key, .. }] if key == "elementary exchange co2-air"
        ));

        let mut in_water = co2_record();
        in_water.comp = "water".to_string();
        let err = FlowGraphBuilder::new(&config)
            .build(&activities, &[co2_record(), in_water], Traceability::Process)
            .unwrap_err();
        let LciError::UnresolvedFlows(issues) = err else {
            panic!("expected unresolved flows");
        };
        assert!(matches!(
            issues.as_slice(),
            [FlowIssue::ConflictingElementaryFlow { exchange_id, first, second }]
                if exchange_id == "co2-air" && first.contains("|air|") && second.contains("|water|")
        ));
    }

    #[test]
    fn test_repaired_input_meets_the_duplicate_policy() {
        let activities = |unsourced: f64| {
            vec![
                ActivityRecord::new("bridge", "bridge")
                    .with_output("bridge", 1.0, None)
                    .with_input(None, "steel", unsourced)
                    .with_input(Some("steelworks"), "steel", 3.0),
                ActivityRecord::new("steelworks", "steel").with_output("steel", 1.0, None),
            ]
        };
        let config = PipelineConfig::default();
        let err = FlowGraphBuilder::new(&config)
            .build(&activities(2.0), &[], Traceability::Process)
            .unwrap_err();
        let LciError::UnresolvedFlows(issues) = err else {
            panic!("expected unresolved flows");
        };
        assert!(matches!(
            issues.as_slice(),
            [FlowIssue::ConflictingDuplicate { process, .. }] if process == "bridge_bridge"
        ));

        let (graph, warnings) = FlowGraphBuilder::new(&config)
            .build(&activities(3.0), &[], Traceability::Process)
            .unwrap();
        assert_eq!(graph.uses.len(), 1);
        assert_eq!(graph.uses[0].amount, 3.0);
        assert_eq!(warnings.len(), 1);

        let summing = config.with_duplicate_policy(DuplicatePolicy::Sum);
        let (graph, _) = FlowGraphBuilder::new(&summing)
            .build(&activities(2.0), &[], Traceability::Process)
            .unwrap();
        assert_eq!(graph.uses.len(), 1);
        assert_eq!(graph.uses[0].amount, 5.0);
    }

    #[test]
    fn test_exchange_to_rejected_master_record_is_dropped() {
        let activities = vec![
            ActivityRecord::new("mine", "ore")
                .with_output("ore", 1.0, None)
                .with_elementary("co2-air", 2.0)
                .with_elementary("dust-air", 0.1),
        ];
        let rejected: FxHashMap<String, String> =
            [("dust-air".to_string(), "malformed CAS number 1-2-X".to_string())].into_iter().collect();
        let config = PipelineConfig::default();
        let (graph, warnings) = FlowGraphBuilder::new(&config)
            .with_rejected_elementary(&rejected)
            .build(&activities, &[co2_record()], Traceability::Process)
            .unwrap();
        assert_eq!(graph.elementary.len(), 1);
        assert!(matches!(
            warnings.as_slice(),
            [Warning::MalformedRecord { reason, .. }] if reason.contains("1-2-X")
        ));
    }

    #[test]
    fn test_unsourced_input_repaired() {
        let activities = vec![
            ActivityRecord::new("steelworks", "steel")
                .with_output("steel", 1.0, None)
                .with_input(None, "ore", 2.0),
            ActivityRecord::new("mine", "ore").with_output("ore", 1.0, None),
        ];
        let config = PipelineConfig::default();
        let (graph, _) = FlowGraphBuilder::new(&config)
            .build(&activities, &[], Traceability::Process)
            .unwrap();
        assert_eq!(graph.uses[0].source.as_deref(), Some("mine"));

        let strict = PipelineConfig::default().with_repair_unsourced_flows(false);
        let err = FlowGraphBuilder::new(&strict)
            .build(&activities, &[], Traceability::Process)
            .unwrap_err();
        assert!(err.is_unresolved_flows());

        assert!(
            FlowGraphBuilder::new(&strict)
                .build(&activities, &[], Traceability::Product)
                .is_ok()
        );
    }
}
