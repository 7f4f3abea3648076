use serde::{Deserialize, Serialize};

/// One antecedent clause: `variable IS [NOT] fuzzy_set`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyAntecedent {
    pub variable: String,
    pub fuzzy_set: String,
    pub negated: bool,
}

/// Connective joining a rule's antecedents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connective {
    And,
    Or,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyConsequent {
    pub variable: String,
    pub fuzzy_set: String,
}

/// A fuzzy rule: `IF antecedents (joined by connective) THEN consequent`, scaled by `weight`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyRule {
    pub id: String,
    pub antecedents: Vec<FuzzyAntecedent>,
    pub connective: Connective,
    pub consequent: FuzzyConsequent,
    /// In `(0, 1]`.
    pub weight: f64,
}

impl FuzzyRule {
    /// Combine per-antecedent membership degrees with the rule's T-norm (AND = min) or
    /// S-norm (OR = max), then scale by `weight`.
    pub fn activation(&self, memberships: &[f64]) -> f64 {
        let combined = match self.connective {
            Connective::And => memberships.iter().copied().fold(1.0_f64, f64::min),
            Connective::Or => memberships.iter().copied().fold(0.0_f64, f64::max),
        };
        (combined * self.weight).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(connective: Connective) -> FuzzyRule {
        FuzzyRule {
            id: "r1".to_string(),
            antecedents: vec![],
            connective,
            consequent: FuzzyConsequent { variable: "y".to_string(), fuzzy_set: "high".to_string() },
            weight: 1.0,
        }
    }

    #[test]
    fn and_uses_minimum() {
        let rule = rule(Connective::And);
        assert!((rule.activation(&[0.3, 0.8, 0.5]) - 0.3).abs() < 1e-9);
    }

    #[test]
    fn or_uses_maximum() {
        let rule = rule(Connective::Or);
        assert!((rule.activation(&[0.3, 0.8, 0.5]) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn weight_scales_activation() {
        let mut rule = rule(Connective::And);
        rule.weight = 0.5;
        assert!((rule.activation(&[1.0]) - 0.5).abs() < 1e-9);
    }
}
