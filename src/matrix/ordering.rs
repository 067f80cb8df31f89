//! Deterministic row and column ordering
//!
//! Items are sorted by the configured key tuple; missing key values sort
//! first and ties are broken by id, so the order never depends on input
//! order.

use itertools::Itertools;

use crate::config::{ProcessSortKey, StressorSortKey};
use crate::models::{Process, Product, Stressor};

fn process_field(process: &Process, key: ProcessSortKey) -> Option<String> {
    match key {
        ProcessSortKey::Isic => process.isic.clone(),
        ProcessSortKey::ActivityName => Some(process.activity_name.clone()),
        ProcessSortKey::ProductName => Some(process.product_name.clone()),
        ProcessSortKey::Geography => process.geography.clone(),
        ProcessSortKey::EcospoldCategory => process.ecospold_category.clone(),
        ProcessSortKey::TechnologyLevel => Some(process.technology_level.clone()),
        ProcessSortKey::Id => Some(process.id.clone()),
    }
}

fn stressor_field(stressor: &Stressor, key: StressorSortKey) -> Option<String> {
    match key {
        StressorSortKey::Compartment => Some(stressor.comp.clone()),
        StressorSortKey::Subcompartment => Some(stressor.subcomp.clone()),
        StressorSortKey::Name => Some(stressor.name.clone()),
        StressorSortKey::Unit => Some(stressor.unit.clone()),
        StressorSortKey::Tag => Some(stressor.tag.clone()),
        StressorSortKey::Cas => stressor.cas.clone(),
    }
}

/// Processes sorted by `keys`, then by id
#[must_use]
pub fn order_processes(processes: &[Process], keys: &[ProcessSortKey]) -> Vec<Process> {
    processes
        .iter()
        .sorted_by_cached_key(|p| {
            let fields: Vec<Option<String>> = keys.iter().map(|k| process_field(p, *k)).collect();
            (fields, p.id.clone())
        })
        .cloned()
        .collect_vec()
}

/// Stressors sorted by `keys`, then by id
#[must_use]
pub fn order_stressors(stressors: &[Stressor], keys: &[StressorSortKey]) -> Vec<Stressor> {
    stressors
        .iter()
        .sorted_by_cached_key(|s| {
            let fields: Vec<Option<String>> = keys.iter().map(|k| stressor_field(s, *k)).collect();
            (fields, s.id.clone())
        })
        .cloned()
        .collect_vec()
}

/// Products sorted by name, then by id
#[must_use]
pub fn order_products(products: &[Product]) -> Vec<Product> {
    products
        .iter()
        .sorted_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)))
        .cloned()
        .collect_vec()
}
