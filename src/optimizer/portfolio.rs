use super::strategy::{StrategyKind, StrategyRecord};
use std::collections::HashMap;

/// One default strategy per [`StrategyKind`], used to seed an optimizer that is not given an
/// explicit portfolio at creation time (§4.3 `create_optimizer`).
pub fn default_portfolio() -> Vec<StrategyRecord> {
    StrategyKind::ALL
        .iter()
        .map(|&kind| default_strategy(kind))
        .collect()
}

fn default_strategy(kind: StrategyKind) -> StrategyRecord {
    let id = format!("default::{kind:?}");
    let mut expected_gain = HashMap::new();
    let mut resource_cost = HashMap::new();

    match kind {
        StrategyKind::QueryOpt => {
            expected_gain.insert("quality".to_string(), 0.15);
            resource_cost.insert("cpu".to_string(), 0.1);
            StrategyRecord::new(id, kind, vec![], expected_gain, resource_cost, 1.0)
        }
        StrategyKind::ResourceAlloc => {
            expected_gain.insert("efficiency".to_string(), 0.2);
            resource_cost.insert("cpu".to_string(), 0.05);
            StrategyRecord::new(id, kind, vec![], expected_gain, resource_cost, 0.5)
        }
        StrategyKind::QualityImprove => {
            expected_gain.insert("quality".to_string(), 0.25);
            resource_cost.insert("cpu".to_string(), 0.2);
            resource_cost.insert("memory".to_string(), 0.1);
            StrategyRecord::new(id, kind, vec![], expected_gain, resource_cost, 2.0)
        }
        StrategyKind::EfficiencyBoost => {
            expected_gain.insert("efficiency".to_string(), 0.3);
            resource_cost.insert("cpu".to_string(), 0.05);
            StrategyRecord::new(id, kind, vec![], expected_gain, resource_cost, 0.3)
        }
        StrategyKind::ErrorRecovery => {
            expected_gain.insert("quality".to_string(), 0.1);
            resource_cost.insert("cpu".to_string(), 0.15);
            StrategyRecord::new(id, kind, vec![], expected_gain, resource_cost, 1.5)
        }
        StrategyKind::AdaptiveLearning => {
            expected_gain.insert("efficiency".to_string(), 0.1);
            expected_gain.insert("quality".to_string(), 0.1);
            resource_cost.insert("cpu".to_string(), 0.1);
            StrategyRecord::new(id, kind, vec![], expected_gain, resource_cost, 1.0)
        }
        StrategyKind::ContextAdapt => {
            expected_gain.insert("quality".to_string(), 0.12);
            resource_cost.insert("cpu".to_string(), 0.08);
            StrategyRecord::new(id, kind, vec![], expected_gain, resource_cost, 0.8)
        }
        StrategyKind::UncertaintyReduce => {
            expected_gain.insert("quality".to_string(), 0.2);
            resource_cost.insert("cpu".to_string(), 0.25);
            StrategyRecord::new(id, kind, vec![], expected_gain, resource_cost, 2.5)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_portfolio_has_one_strategy_per_kind() {
        let portfolio = default_portfolio();
        assert_eq!(portfolio.len(), 8);
        let unique_kinds: std::collections::HashSet<_> = portfolio.iter().map(|s| s.kind).collect();
        assert_eq!(unique_kinds.len(), 8);
    }
}
