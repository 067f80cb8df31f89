//! Supply and use tables for unallocated datasets

use std::collections::BTreeSet;
use std::time::Instant;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::graph::FlowGraph;
use crate::matrix::ordering::{order_processes, order_products, order_stressors};
use crate::matrix::sparse::LabelledMatrix;
use crate::models::{Product, Stressor};
use crate::utils::logging::{log_stage_complete, log_stage_start};

/// Row label of a traceable use-table row
#[must_use]
pub fn use_row_label(source: Option<&str>, product: &str) -> String {
    format!("{}|{product}", source.unwrap_or_default())
}

/// Supply, use and elementary tables keyed by activity
#[derive(Debug, Clone)]
pub struct SupplyUseSystem {
    /// Supply, activity x product
    pub v: LabelledMatrix,
    /// Use, product (or source|product) x activity
    pub u: LabelledMatrix,
    /// Elementary flows, stressor x activity
    pub g_act: LabelledMatrix,
    /// Production volumes, activity x product
    pub v_prod_vol: LabelledMatrix,
    pub activities: Vec<String>,
    pub products: Vec<Product>,
    pub stressors: Vec<Stressor>,
    pub traceable: bool,
}

impl SupplyUseSystem {
    #[must_use]
    pub fn matrices(&self) -> Vec<&LabelledMatrix> {
        vec![&self.v, &self.u, &self.g_act, &self.v_prod_vol]
    }
}

/// Assemble `V`, `U`, `G_act` and `V_prod_vol` from a graph
pub fn assemble_sut(graph: &FlowGraph, config: &PipelineConfig) -> Result<SupplyUseSystem> {
    let start = Instant::now();
    log_stage_start("Assembling supply and use tables", graph.processes.len());
    let traceable = !config.untraceable_use;

    let ordered = order_processes(&graph.processes, &config.process_order);
    let mut seen = FxHashSet::default();
    let activities: Vec<String> = ordered
        .iter()
        .filter(|p| seen.insert(p.activity_id.as_str()))
        .map(|p| p.activity_id.clone())
        .collect();
    let activity_of: FxHashMap<&str, &str> = graph
        .processes
        .iter()
        .map(|p| (p.id.as_str(), p.activity_id.as_str()))
        .collect();

    let products = order_products(&graph.products);
    let stressors = order_stressors(&graph.stressors, &config.stressor_order);
    let product_labels: Vec<String> = products.iter().map(|p| p.id.clone()).collect();

    let use_rows: Vec<String> = if traceable {
        graph
            .uses
            .iter()
            .map(|e| (e.source.clone().unwrap_or_default(), e.product.clone()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|(source, product)| use_row_label(Some(&source), &product))
            .collect()
    } else {
        product_labels.clone()
    };

    let mut v = LabelledMatrix::new("V", activities.clone(), product_labels.clone())?;
    let mut v_prod_vol = LabelledMatrix::new("V_prod_vol", activities.clone(), product_labels)?;
    let mut u = LabelledMatrix::new("U", use_rows, activities.clone())?;
    let mut g_act = LabelledMatrix::new(
        "G_act",
        stressors.iter().map(|s| s.id.clone()).collect(),
        activities.clone(),
    )?;

    for edge in &graph.supply {
        let Some(activity) = activity_of.get(edge.process.as_str()) else {
            continue;
        };
        v.add(activity, &edge.product, edge.amount)?;
        if let Some(volume) = edge.production_volume {
            v_prod_vol.add(activity, &edge.product, volume)?;
        }
    }
    for edge in &graph.uses {
        let Some(activity) = activity_of.get(edge.consumer.as_str()) else {
            continue;
        };
        let row = if traceable {
            use_row_label(edge.source.as_deref(), &edge.product)
        } else {
            edge.product.clone()
        };
        u.add(&row, activity, edge.amount)?;
    }
    for edge in &graph.elementary {
        if let Some(activity) = activity_of.get(edge.process.as_str()) {
            g_act.add(&edge.stressor, activity, edge.amount)?;
        }
    }

    let mut system = SupplyUseSystem {
        v,
        u,
        g_act,
        v_prod_vol,
        activities,
        products,
        stressors,
        traceable,
    };
    if config.nan_to_zero {
        system.v.replace_undefined(0.0);
        system.u.replace_undefined(0.0);
        system.g_act.replace_undefined(0.0);
        system.v_prod_vol.replace_undefined(0.0);
    }
    log::info!(
        "V is {:?}, U is {:?} ({} use rows)",
        system.v.shape(),
        system.u.shape(),
        if traceable { "traceable" } else { "product" }
    );
    log_stage_complete("Assembled supply and use tables for", system.activities.len(), start.elapsed());
    Ok(system)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FlowGraphBuilder, Traceability};
    use crate::models::ActivityRecord;

    fn co_production() -> FlowGraph {
        let activities = vec![
            ActivityRecord::new("refinery", "petrol")
                .with_output("petrol", 2.0, Some(200.0))
                .with_output("diesel", 3.0, None)
                .with_input(None, "crude", 6.0),
            ActivityRecord::new("well", "crude").with_output("crude", 1.0, None),
        ];
        let config = PipelineConfig::default();
        FlowGraphBuilder::new(&config)
            .build(&activities, &[], Traceability::Product)
            .unwrap()
            .0
    }

    #[test]
    fn test_co_production_is_kept_unallocated() {
        let graph = co_production();
        let system = assemble_sut(&graph, &PipelineConfig::default()).unwrap();
        assert_eq!(system.v.get("refinery", "petrol"), Some(2.0));
        assert_eq!(system.v.get("refinery", "diesel"), Some(3.0));
        assert_eq!(system.v_prod_vol.get("refinery", "petrol"), Some(200.0));
        assert_eq!(system.u.get("crude", "refinery"), Some(6.0));
        assert_eq!(system.u.shape(), (3, 2));
    }

    #[test]
    fn test_traceable_rows_keep_missing_source() {
        let graph = co_production();
        let config = PipelineConfig::default().with_untraceable_use(false);
        let system = assemble_sut(&graph, &config).unwrap();
        assert_eq!(system.u.row_labels(), &["|crude".to_string()]);
        assert_eq!(system.u.get("|crude", "refinery"), Some(6.0));
    }
}
