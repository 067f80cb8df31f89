//! Traceability checks over a built flow graph
//!
//! Every issue in a batch is collected before anything is reported, so one
//! run shows the complete list.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::graph::FlowGraph;
use crate::models::process_id;

/// How precisely an intermediate input must identify its supplier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Traceability {
    /// The input names a source activity and `{source}_{product}` is a
    /// process supplying the product (Leontief matrices)
    Process,
    /// A named source activity must supply the product; inputs without a
    /// source stay unsourced (traceable use tables)
    Activity,
    /// Some activity supplies the product (untraceable use tables)
    Product,
}

/// A graph-level inconsistency; any issue aborts the run
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowIssue {
    /// A product consumed or supplied that no process supplies
    UnsuppliedProduct {
        product: String,
        consumers: Vec<String>,
    },
    /// An input without a source activity that could not be repaired
    UnsourcedInput { consumer: String, product: String },
    /// An input naming a source that does not supply the product
    UnknownSource {
        consumer: String,
        source: String,
        product: String,
    },
    /// A process that does not supply the product it is tied to
    MissingReferenceOutput { process: String, product: String },
    /// An elementary exchange id without master data
    UnknownElementaryFlow { process: String, exchange_id: String },
    /// Master data describing one exchange id as two different stressors
    ConflictingElementaryFlow {
        exchange_id: String,
        first: String,
        second: String,
    },
    /// An exchange amount that is NaN or infinite
    NonFiniteAmount { process: String, exchange: String },
    /// One exchange key listed twice with different amounts
    ConflictingDuplicate {
        process: String,
        exchange: String,
        amounts: String,
    },
}

impl fmt::Display for FlowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsuppliedProduct { product, consumers } => {
                write!(f, "product {product} consumed by {consumers:?} is supplied by no process")
            }
            Self::UnsourcedInput { consumer, product } => {
                write!(f, "input of {product} to {consumer} has no traceable source")
            }
            Self::UnknownSource { consumer, source, product } => {
                write!(f, "{source} does not supply {product} consumed by {consumer}")
            }
            Self::MissingReferenceOutput { process, product } => {
                write!(f, "{process} does not supply its reference product {product}")
            }
            Self::UnknownElementaryFlow { process, exchange_id } => {
                write!(f, "{process} lists unknown elementary exchange {exchange_id}")
            }
            Self::ConflictingElementaryFlow { exchange_id, first, second } => {
                write!(f, "elementary exchange {exchange_id} is described as both {first} and {second}")
            }
            Self::NonFiniteAmount { process, exchange } => {
                write!(f, "{process} has a non-finite amount for {exchange}")
            }
            Self::ConflictingDuplicate { process, exchange, amounts } => {
                write!(f, "{process} lists {exchange} more than once with amounts {amounts}")
            }
        }
    }
}

/// Check intermediate flows against the required traceability
#[must_use]
pub fn validate(graph: &FlowGraph, traceability: Traceability) -> Vec<FlowIssue> {
    let mut issues = BTreeSet::new();

    let supplied: FxHashSet<(&str, &str)> = graph
        .supply
        .iter()
        .map(|e| (e.process.as_str(), e.product.as_str()))
        .collect();
    let activity_of: FxHashMap<&str, &str> = graph
        .processes
        .iter()
        .map(|p| (p.id.as_str(), p.activity_id.as_str()))
        .collect();
    let activity_supplies: FxHashSet<(&str, &str)> = graph
        .supply
        .iter()
        .filter_map(|e| {
            activity_of
                .get(e.process.as_str())
                .map(|a| (*a, e.product.as_str()))
        })
        .collect();
    let products_supplied: FxHashSet<&str> = graph.supply.iter().map(|e| e.product.as_str()).collect();
    let supplying: FxHashSet<&str> = graph.supply.iter().map(|e| e.process.as_str()).collect();

    let mut unsupplied: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for edge in &graph.uses {
        if !products_supplied.contains(edge.product.as_str()) {
            unsupplied
                .entry(edge.product.as_str())
                .or_default()
                .insert(edge.consumer.as_str());
            continue;
        }
        if traceability == Traceability::Product {
            continue;
        }
        let Some(source) = &edge.source else {
            if traceability == Traceability::Process {
                issues.insert(FlowIssue::UnsourcedInput {
                    consumer: edge.consumer.clone(),
                    product: edge.product.clone(),
                });
            }
            continue;
        };
        let traced = match traceability {
            Traceability::Process => {
                let supplier = process_id(source, &edge.product);
                supplied.contains(&(supplier.as_str(), edge.product.as_str()))
            }
            _ => activity_supplies.contains(&(source.as_str(), edge.product.as_str())),
        };
        if !traced {
            issues.insert(FlowIssue::UnknownSource {
                consumer: edge.consumer.clone(),
                source: source.clone(),
                product: edge.product.clone(),
            });
        }
    }
    for (product, consumers) in unsupplied {
        issues.insert(FlowIssue::UnsuppliedProduct {
            product: product.to_string(),
            consumers: consumers.into_iter().map(str::to_string).collect(),
        });
    }

    for process in &graph.processes {
        let ok = match traceability {
            Traceability::Process => {
                supplied.contains(&(process.id.as_str(), process.product_id.as_str()))
            }
            _ => supplying.contains(process.id.as_str()),
        };
        if !ok {
            issues.insert(FlowIssue::MissingReferenceOutput {
                process: process.id.clone(),
                product: process.product_id.clone(),
            });
        }
    }

    issues.into_iter().collect()
}
