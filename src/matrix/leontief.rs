//! Process-by-process coefficient matrices
//!
//! `A[i,j] = z[i,j] / P_j` and `F[k,j] = g[k,j] / P_j`, where `P_j` is the
//! reference output of process `j`. A column whose `P_j` is zero or missing
//! is undefined.

use std::time::Instant;

use crate::config::PipelineConfig;
use crate::error::{LciError, Result};
use crate::graph::FlowGraph;
use crate::matrix::ordering::{order_processes, order_stressors};
use crate::matrix::sparse::LabelledMatrix;
use crate::models::{Process, Stressor, process_id};
use crate::utils::logging::{log_stage_complete, log_stage_start};

/// Normalized and optional absolute matrices of an allocated system
#[derive(Debug, Clone)]
pub struct LeontiefSystem {
    /// Technology coefficients, process x process
    pub a: LabelledMatrix,
    /// Elementary flow intensities, stressor x process
    pub f: LabelledMatrix,
    /// Absolute intermediate flows
    pub z: Option<LabelledMatrix>,
    /// Absolute elementary flows
    pub g: Option<LabelledMatrix>,
    pub processes: Vec<Process>,
    pub stressors: Vec<Stressor>,
    /// `P_j` per column, in column order
    pub reference_output: Vec<Option<f64>>,
    /// Whether the waste sign convention was applied
    pub waste_flipped: bool,
}

impl LeontiefSystem {
    /// Every matrix present, in persist order
    #[must_use]
    pub fn matrices(&self) -> Vec<&LabelledMatrix> {
        let mut out = vec![&self.a, &self.f];
        out.extend(self.z.as_ref());
        out.extend(self.g.as_ref());
        out
    }

    /// Reference output of each process after normalization: 1.0 for every
    /// defined column, NaN otherwise
    #[must_use]
    pub fn normalized_supply(&self) -> Vec<f64> {
        self.reference_output
            .iter()
            .map(|p| match p {
                Some(p) if *p != 0.0 => p / p,
                _ => f64::NAN,
            })
            .collect()
    }
}

fn signum(value: f64) -> f64 {
    if value < 0.0 { -1.0 } else { 1.0 }
}

/// Multiply `A` by `s_i s_j` and `F` by `s_j`, where `s` is the sign of
/// each process's reference output. Applying it twice restores the input.
pub fn apply_waste_sign_convention(a: &mut LabelledMatrix, f: &mut LabelledMatrix, signs: &[f64]) {
    a.map_values(|i, j, v| v * signs[i] * signs[j]);
    f.map_values(|_, j, v| v * signs[j]);
}

/// Scale every column `j` by `factors[j]`
fn scale_columns(matrix: &LabelledMatrix, name: &str, factors: &[Option<f64>]) -> LabelledMatrix {
    let mut scaled = matrix.renamed(name);
    scaled.map_values(|_, j, v| factors[j].map_or(f64::NAN, |q| v * q));
    for (j, q) in factors.iter().enumerate() {
        if q.is_none() {
            scaled.mark_undefined(j);
        }
    }
    scaled
}

/// Assemble `A` and `F` (and `Z`, `G` when configured) from a graph
/// validated at process traceability
pub fn assemble_leontief(graph: &FlowGraph, config: &PipelineConfig) -> Result<LeontiefSystem> {
    let start = Instant::now();
    log_stage_start("Assembling Leontief matrices", graph.processes.len());

    let processes = order_processes(&graph.processes, &config.process_order);
    let stressors = order_stressors(&graph.stressors, &config.stressor_order);
    let process_labels: Vec<String> = processes.iter().map(|p| p.id.clone()).collect();
    let stressor_labels: Vec<String> = stressors.iter().map(|s| s.id.clone()).collect();

    let mut a = LabelledMatrix::new("A", process_labels.clone(), process_labels)?;
    let mut f = LabelledMatrix::new("F", stressor_labels, a.col_labels().to_vec())?;

    let reference = graph.reference_edges();
    let reference_output: Vec<Option<f64>> = processes
        .iter()
        .map(|p| reference.get(p.id.as_str()).map(|e| e.amount))
        .collect();
    let divisor = |j: usize| reference_output[j].filter(|p| *p != 0.0);

    for edge in &graph.uses {
        let source = edge.source.as_deref().ok_or_else(|| {
            LciError::Matrix(format!("input of {} to {} has no source", edge.product, edge.consumer))
        })?;
        a.add(&process_id(source, &edge.product), &edge.consumer, edge.amount)?;
    }
    for edge in &graph.elementary {
        f.add(&edge.stressor, &edge.process, edge.amount)?;
    }

    let byproducts = graph.supply.len() - reference.len();
    if byproducts > 0 {
        log::warn!("{byproducts} supply flow(s) besides reference outputs are not part of A");
    }

    for j in 0..processes.len() {
        if divisor(j).is_none() {
            a.mark_undefined(j);
            f.mark_undefined(j);
        }
    }
    a.map_values(|_, j, v| divisor(j).map_or(f64::NAN, |p| v / p));
    f.map_values(|_, j, v| divisor(j).map_or(f64::NAN, |p| v / p));

    if config.waste_sign_flip {
        let signs: Vec<f64> = reference_output
            .iter()
            .map(|p| p.map_or(1.0, signum))
            .collect();
        let flipped = signs.iter().filter(|s| **s < 0.0).count();
        log::info!("Waste sign convention flips {flipped} process(es)");
        apply_waste_sign_convention(&mut a, &mut f, &signs);
    }

    let (mut z, mut g) = (None, None);
    if config.with_absolute_flows {
        let volumes: Vec<Option<f64>> = processes
            .iter()
            .zip(&reference_output)
            .map(|(p, out)| {
                reference
                    .get(p.id.as_str())
                    .and_then(|e| e.production_volume)
                    .or(*out)
            })
            .collect();
        z = Some(scale_columns(&a, "Z", &volumes));
        g = Some(scale_columns(&f, "G", &volumes));
    }

    let mut system = LeontiefSystem {
        a,
        f,
        z,
        g,
        processes,
        stressors,
        reference_output,
        waste_flipped: config.waste_sign_flip,
    };
    if config.nan_to_zero {
        system.a.replace_undefined(0.0);
        system.f.replace_undefined(0.0);
        for m in system.z.iter_mut().chain(system.g.iter_mut()) {
            m.replace_undefined(0.0);
        }
    }

    log::info!(
        "A is {:?} with {} entries, F is {:?} with {} entries",
        system.a.shape(),
        system.a.nnz(),
        system.f.shape(),
        system.f.nnz()
    );
    log_stage_complete("Assembled Leontief matrices for", system.processes.len(), start.elapsed());
    Ok(system)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{FlowGraphBuilder, Traceability};
    use crate::models::ActivityRecord;

    fn steel_and_ore() -> FlowGraph {
        let activities = vec![
            ActivityRecord::new("steelworks", "steel")
                .with_output("steel", 10.0, None)
                .with_input(Some("mine"), "ore", 5.0),
            ActivityRecord::new("mine", "ore").with_output("ore", 5.0, Some(50.0)),
        ];
        let config = PipelineConfig::default();
        FlowGraphBuilder::new(&config)
            .build(&activities, &[], Traceability::Process)
            .unwrap()
            .0
    }

    #[test]
    fn test_coefficient_divides_by_consumer_output() {
        let graph = steel_and_ore();
        let system = assemble_leontief(&graph, &PipelineConfig::default()).unwrap();
        assert_eq!(system.a.get("mine_ore", "steelworks_steel"), Some(0.5));
        assert_eq!(system.a.shape(), (2, 2));
        assert!(system.z.is_none());
        assert!(system.normalized_supply().iter().all(|s| *s == 1.0));
    }

    #[test]
    fn test_absolute_flows_use_production_volume() {
        let graph = steel_and_ore();
        let config = PipelineConfig::default().with_absolute_flows(true);
        let system = assemble_leontief(&graph, &config).unwrap();
        let z = system.z.unwrap();
        // steel records no production volume, so Z equals the recorded flow
        assert_eq!(z.get("mine_ore", "steelworks_steel"), Some(5.0));
        assert_eq!(z.name(), "Z");
    }

    #[test]
    fn test_sign_convention_is_an_involution() {
        let graph = steel_and_ore();
        let system = assemble_leontief(&graph, &PipelineConfig::default()).unwrap();
        let (mut a, mut f) = (system.a.clone(), system.f.clone());
        let signs = [-1.0, 1.0];
        apply_waste_sign_convention(&mut a, &mut f, &signs);
        assert_ne!(a, system.a);
        apply_waste_sign_convention(&mut a, &mut f, &signs);
        assert_eq!(a, system.a);
        assert_eq!(f, system.f);
    }
}
