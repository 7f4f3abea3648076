use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// The situation the optimizer selects strategies against (§3 Data model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionContext {
    pub query_complexity: f64,
    pub available_resources: HashMap<String, f64>,
    pub quality_requirements: HashMap<String, f64>,
    pub time_budget: f64,
    pub uncertainty_tolerance: f64,
    pub tags: HashSet<String>,
}

impl DecisionContext {
    /// Looks up a named scalar field for use by [`super::strategy::StrategyCondition`]
    /// evaluation: the fixed fields by name, then a fallback into `available_resources`.
    pub fn field(&self, name: &str) -> Option<f64> {
        match name {
            "query_complexity" | "complexity" => Some(self.query_complexity),
            "time_budget" => Some(self.time_budget),
            "uncertainty_tolerance" => Some(self.uncertainty_tolerance),
            other => self.available_resources.get(other).copied(),
        }
    }
}

/// A single realized outcome reported back after executing a strategy bundle (§4.3 "Learning").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyOutcome {
    pub quality_achieved: f64,
    pub resources_used: HashMap<String, f64>,
    pub time_taken: f64,
    pub user_feedback: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_falls_back_to_available_resources() {
        let mut resources = HashMap::new();
        resources.insert("cpu".to_string(), 0.5);
        let context = DecisionContext {
            query_complexity: 0.3,
            available_resources: resources,
            quality_requirements: HashMap::new(),
            time_budget: 10.0,
            uncertainty_tolerance: 0.2,
            tags: HashSet::new(),
        };
        assert_eq!(context.field("cpu"), Some(0.5));
        assert_eq!(context.field("query_complexity"), Some(0.3));
        assert_eq!(context.field("missing"), None);
    }
}
