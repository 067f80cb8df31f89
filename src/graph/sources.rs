//! Repair of intermediate inputs that do not name their supplier
//!
//! For an input without a source activity, candidates are all activities
//! supplying the product. Rules, first applicable wins:
//!
//! 1. exactly one supplier: take it, whatever its geography
//! 2. two suppliers, one of them a market: take the market
//! 3. exactly one market in the consumer's geography
//! 4. exactly one non-market supplier in the consumer's geography
//!
//! Otherwise the input stays unsourced and validation reports it.

use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::graph::{SupplyEdge, UseEdge};
use crate::models::Process;

/// Which rule picked a supplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepairRule {
    SingleSupplier,
    MarketOfTwo,
    LocalMarket,
    LocalProducer,
}

/// Pick the supplier of `consumer`'s input among `candidates`
#[must_use]
pub fn choose_source<'a>(consumer: &Process, candidates: &[&'a Process]) -> Option<(&'a Process, RepairRule)> {
    if let [only] = candidates {
        return Some((*only, RepairRule::SingleSupplier));
    }
    if candidates.len() == 2 {
        if let Ok(market) = candidates.iter().filter(|p| p.is_market).exactly_one() {
            return Some((*market, RepairRule::MarketOfTwo));
        }
    }
    let local = |want_market: bool| {
        candidates
            .iter()
            .filter(|p| p.is_market == want_market && p.geography == consumer.geography)
            .exactly_one()
            .ok()
            .copied()
    };
    if let Some(market) = local(true) {
        return Some((market, RepairRule::LocalMarket));
    }
    local(false).map(|producer| (producer, RepairRule::LocalProducer))
}

/// Fill the source of unsourced inputs where a rule applies.
///
/// Returns the number of repaired inputs per rule.
pub fn repair_sources(
    uses: &mut [UseEdge],
    processes: &[Process],
    supply: &[SupplyEdge],
) -> FxHashMap<RepairRule, usize> {
    let by_id: FxHashMap<&str, &Process> = processes.iter().map(|p| (p.id.as_str(), p)).collect();
    let mut suppliers: FxHashMap<&str, Vec<&Process>> = FxHashMap::default();
    for edge in supply {
        if let Some(process) = by_id.get(edge.process.as_str()) {
            let list = suppliers.entry(edge.product.as_str()).or_default();
            if !list.iter().any(|p| p.activity_id == process.activity_id) {
                list.push(*process);
            }
        }
    }

    let mut repaired: FxHashMap<RepairRule, usize> = FxHashMap::default();
    for edge in uses.iter_mut().filter(|e| e.source.is_none()) {
        let (Some(consumer), Some(candidates)) = (
            by_id.get(edge.consumer.as_str()),
            suppliers.get(edge.product.as_str()),
        ) else {
            continue;
        };
        if let Some((chosen, rule)) = choose_source(consumer, candidates) {
            log::debug!(
                "Input of {} to {} sourced from {} ({rule:?})",
                edge.product,
                edge.consumer,
                chosen.activity_id
            );
            edge.source = Some(chosen.activity_id.clone());
            *repaired.entry(rule).or_default() += 1;
        }
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActivityRecord, ActivityType};

    fn process(activity: &str, geo: &str, market: bool) -> Process {
        let record = ActivityRecord::new(activity, "steel")
            .with_geography(geo)
            .with_activity_type(if market {
                ActivityType::Market
            } else {
                ActivityType::Ordinary
            });
        Process::from(&record)
    }

    #[test]
    fn test_single_supplier_wins_across_geographies() {
        let consumer = process("c", "CH", false);
        let only = process("p", "CN", false);
        let (chosen, rule) = choose_source(&consumer, &[&only]).unwrap();
        assert_eq!(chosen.activity_id, "p");
        assert_eq!(rule, RepairRule::SingleSupplier);
    }

    #[test]
    fn test_market_of_two() {
        let consumer = process("c", "CH", false);
        let producer = process("p", "CH", false);
        let market = process("m", "GLO", true);
        let (chosen, rule) = choose_source(&consumer, &[&producer, &market]).unwrap();
        assert_eq!(chosen.activity_id, "m");
        assert_eq!(rule, RepairRule::MarketOfTwo);
    }

    #[test]
    fn test_local_rules() {
        let consumer = process("c", "CH", false);
        let m_ch = process("m1", "CH", true);
        let m_de = process("m2", "DE", true);
        let p_ch = process("p1", "CH", false);
        let p_de = process("p2", "DE", false);

        let (chosen, rule) = choose_source(&consumer, &[&m_de, &p_ch, &m_ch]).unwrap();
        assert_eq!((chosen.activity_id.as_str(), rule), ("m1", RepairRule::LocalMarket));

        let (chosen, rule) = choose_source(&consumer, &[&m_de, &p_ch, &p_de]).unwrap();
        assert_eq!((chosen.activity_id.as_str(), rule), ("p1", RepairRule::LocalProducer));

        assert!(choose_source(&consumer, &[&m_de, &p_de, &process("p3", "FR", false)]).is_none());
    }
}
