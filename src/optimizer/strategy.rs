use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Bound on a strategy's retained outcome history, used for the 3σ outlier clip on learning
/// updates (§4.3).
const HISTORY_CAPACITY: usize = 64;

/// The eight strategy families a portfolio may hold (§3 Data model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    QueryOpt,
    ResourceAlloc,
    QualityImprove,
    EfficiencyBoost,
    ErrorRecovery,
    AdaptiveLearning,
    ContextAdapt,
    UncertaintyReduce,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 8] = [
        StrategyKind::QueryOpt,
        StrategyKind::ResourceAlloc,
        StrategyKind::QualityImprove,
        StrategyKind::EfficiencyBoost,
        StrategyKind::ErrorRecovery,
        StrategyKind::AdaptiveLearning,
        StrategyKind::ContextAdapt,
        StrategyKind::UncertaintyReduce,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOperator {
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    Equal,
}

impl ComparisonOperator {
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::GreaterThan => lhs > rhs,
            Self::GreaterOrEqual => lhs >= rhs,
            Self::LessThan => lhs < rhs,
            Self::LessOrEqual => lhs <= rhs,
            Self::Equal => (lhs - rhs).abs() < 1e-9,
        }
    }
}

/// One clause of a strategy's applicability predicate: a named context field compared against
/// a threshold. A strategy's full predicate is the conjunction of its conditions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyCondition {
    pub field: String,
    pub op: ComparisonOperator,
    pub threshold: f64,
}

/// A strategy in the optimizer's portfolio (§3 Data model, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyRecord {
    pub id: String,
    pub kind: StrategyKind,
    pub applicability: Vec<StrategyCondition>,
    pub expected_gain: HashMap<String, f64>,
    pub resource_cost: HashMap<String, f64>,
    pub required_time: f64,
    pub success_rate: f64,
    pub invocation_count: u64,
    #[serde(with = "history_serde")]
    pub history: VecDeque<f64>,
}

impl StrategyRecord {
    pub fn new(
        id: impl Into<String>,
        kind: StrategyKind,
        applicability: Vec<StrategyCondition>,
        expected_gain: HashMap<String, f64>,
        resource_cost: HashMap<String, f64>,
        required_time: f64,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            applicability,
            expected_gain,
            resource_cost,
            required_time,
            success_rate: 0.5,
            invocation_count: 0,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    pub fn is_applicable(&self, lookup: impl Fn(&str) -> Option<f64>) -> bool {
        self.applicability
            .iter()
            .all(|cond| lookup(&cond.field).map(|v| cond.op.apply(v, cond.threshold)).unwrap_or(true))
    }

    /// Record a realized outcome, clipping it to within 3σ of recent history before folding it
    /// in, so a single wild reading does not destabilize the EWMA (§4.3 "Learning").
    pub fn record_outcome(&mut self, value: f64) -> f64 {
        let clipped = if self.history.len() >= 4 {
            let mean = self.history.iter().sum::<f64>() / self.history.len() as f64;
            let variance =
                self.history.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.history.len() as f64;
            let sigma = variance.sqrt();
            if sigma > 1e-9 {
                value.clamp(mean - 3.0 * sigma, mean + 3.0 * sigma)
            } else {
                value
            }
        } else {
            value
        };

        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(clipped);
        self.invocation_count += 1;
        clipped
    }
}

mod history_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::VecDeque;

    pub fn serialize<S: Serializer>(value: &VecDeque<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        let vec: Vec<f64> = value.iter().copied().collect();
        vec.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<VecDeque<f64>, D::Error> {
        Ok(VecDeque::from(Vec::<f64>::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applicability_defaults_true_for_unknown_fields() {
        let record = StrategyRecord::new(
            "s1",
            StrategyKind::QueryOpt,
            vec![StrategyCondition { field: "complexity".to_string(), op: ComparisonOperator::GreaterThan, threshold: 0.5 }],
            HashMap::new(),
            HashMap::new(),
            1.0,
        );
        assert!(record.is_applicable(|field| if field == "complexity" { Some(0.9) } else { None }));
        assert!(!record.is_applicable(|field| if field == "complexity" { Some(0.1) } else { None }));
    }

    #[test]
    fn outlier_outcomes_are_clipped() {
        let mut record = StrategyRecord::new("s1", StrategyKind::QueryOpt, vec![], HashMap::new(), HashMap::new(), 1.0);
        for _ in 0..10 {
            record.record_outcome(0.5);
        }
        let clipped = record.record_outcome(1000.0);
        assert!(clipped < 10.0);
    }
}
