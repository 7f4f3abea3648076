use super::membership::{FuzzyEvidence, FuzzySet};
use super::rule::{FuzzyAntecedent, FuzzyRule};
use crate::error::{EdcError, Result};
use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resolution used when sampling an output universe for defuzzification (§4.1).
const DEFUZZIFY_SAMPLES: usize = 200;
/// Default consensus boost δ applied when evidence items agree (§9 Open Question c).
const DEFAULT_CONSENSUS_BOOST: f64 = 0.1;
/// Conflict factor above which Dempster-Shafer combination fails outright.
const HIGH_CONFLICT_THRESHOLD: f64 = 0.999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefuzzifyMethod {
    Centroid,
    Maximum,
    MeanOfMaxima,
    BisectorOfArea,
}

/// The aggregated (clipped, unioned) output membership function for one output variable,
/// produced by [`FuzzyInferenceEngine::inference`] and consumed by `defuzzify`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyOutputSet {
    pub universe: (f64, f64),
    /// `(fuzzy_set_name, activation)` pairs contributed by firing rules; the aggregate
    /// membership at a point is the max, over all terms, of `min(activation, set.membership(x))`.
    pub terms: Vec<(String, f64)>,
}

impl FuzzyOutputSet {
    fn membership_at(&self, sets: &IndexMap<String, FuzzySet>, x: f64) -> f64 {
        self.terms
            .iter()
            .map(|(name, activation)| {
                sets.get(name)
                    .map(|set| activation.min(set.membership(x)))
                    .unwrap_or(0.0)
            })
            .fold(0.0_f64, f64::max)
    }
}

/// Result of Dempster-Shafer evidence combination (§4.1).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CombinedEvidence {
    pub value: f64,
    pub confidence: f64,
    pub conflict: f64,
}

pub struct FuzzyInferenceEngine {
    fuzzy_sets: IndexMap<String, FuzzySet>,
    rules: Vec<FuzzyRule>,
    consensus_boost: f64,
}

impl Default for FuzzyInferenceEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl FuzzyInferenceEngine {
    pub fn new() -> Self {
        Self {
            fuzzy_sets: IndexMap::new(),
            rules: Vec::new(),
            consensus_boost: DEFAULT_CONSENSUS_BOOST,
        }
    }

    pub fn with_consensus_boost(consensus_boost: f64) -> Self {
        Self {
            consensus_boost,
            ..Self::new()
        }
    }

    pub fn add_fuzzy_set(&mut self, fuzzy_set: FuzzySet) -> Result<()> {
        log::debug!("fuzzy: adding set '{}'", fuzzy_set.name);
        self.fuzzy_sets.insert(fuzzy_set.name.clone(), fuzzy_set);
        Ok(())
    }

    pub fn add_rule(&mut self, rule: FuzzyRule) -> Result<()> {
        if self.fuzzy_sets.is_empty() {
            return Err(EdcError::invalid_input("cannot add a rule before any fuzzy set exists"));
        }
        self.rules.push(rule);
        Ok(())
    }

    pub fn fuzzy_set(&self, name: &str) -> Option<&FuzzySet> {
        self.fuzzy_sets.get(name)
    }

    /// Membership degree of `value` in the named set.
    pub fn membership(&self, value: f64, set_name: &str) -> Result<f64> {
        let set = self
            .fuzzy_sets
            .get(set_name)
            .ok_or_else(|| EdcError::invalid_input(format!("unknown fuzzy set '{set_name}'")))?;
        Ok(set.membership(value))
    }

    fn antecedent_membership(&self, antecedent: &FuzzyAntecedent, inputs: &HashMap<String, f64>) -> Result<f64> {
        let value = *inputs
            .get(&antecedent.variable)
            .ok_or_else(|| EdcError::invalid_input(format!("missing input variable '{}'", antecedent.variable)))?;
        let membership = self.membership(value, &antecedent.fuzzy_set)?;
        Ok(if antecedent.negated { 1.0 - membership } else { membership })
    }

    /// Fire every rule against `inputs`, producing one aggregated [`FuzzyOutputSet`] per
    /// output variable. Rules are evaluated in insertion order, so when two rules produce
    /// identical activation for the same output term, the earlier rule's insertion order is
    /// preserved in `terms` (a stable tie-break, §4.1).
    pub fn inference(&self, inputs: &HashMap<String, f64>) -> Result<IndexMap<String, FuzzyOutputSet>> {
        if self.rules.is_empty() {
            return Err(EdcError::invalid_input("rule base is empty"));
        }

        let mut outputs: IndexMap<String, FuzzyOutputSet> = IndexMap::new();

        for rule in &self.rules {
            let memberships: Result<Vec<f64>> = rule
                .antecedents
                .iter()
                .map(|a| self.antecedent_membership(a, inputs))
                .collect();
            let activation = rule.activation(&memberships?);
            if activation <= 0.0 {
                continue;
            }

            let universe = self
                .fuzzy_sets
                .get(&rule.consequent.fuzzy_set)
                .map(|s| (s.universe_min, s.universe_max))
                .ok_or_else(|| {
                    EdcError::invalid_input(format!("unknown consequent set '{}'", rule.consequent.fuzzy_set))
                })?;

            let entry = outputs.entry(rule.consequent.variable.clone()).or_insert_with(|| FuzzyOutputSet {
                universe,
                terms: Vec::new(),
            });
            entry.terms.push((rule.consequent.fuzzy_set.clone(), activation));
        }

        Ok(outputs)
    }

    /// Extract a crisp value from an aggregated output set.
    pub fn defuzzify(&self, output: &FuzzyOutputSet, method: DefuzzifyMethod) -> Result<f64> {
        let (lo, hi) = output.universe;
        if !(lo < hi) {
            return Err(EdcError::invalid_input("defuzzify universe must have lo < hi"));
        }
        let step = (hi - lo) / (DEFUZZIFY_SAMPLES as f64 - 1.0);
        let samples: Vec<(f64, f64)> = (0..DEFUZZIFY_SAMPLES)
            .map(|i| {
                let x = lo + step * i as f64;
                (x, output.membership_at(&self.fuzzy_sets, x))
            })
            .collect();

        match method {
            DefuzzifyMethod::Centroid => {
                let mut numerator = 0.0;
                let mut denominator = 0.0;
                for (x, m) in &samples {
                    numerator += x * m;
                    denominator += m;
                }
                if denominator < 1e-9 {
                    log::warn!("fuzzy: defuzzify(Centroid) total mass below threshold, returning universe midpoint");
                    Ok((lo + hi) / 2.0)
                } else {
                    Ok(numerator / denominator)
                }
            }
            DefuzzifyMethod::Maximum => {
                let max_m = samples.iter().map(|(_, m)| *m).fold(0.0_f64, f64::max);
                if max_m < 1e-9 {
                    return Ok((lo + hi) / 2.0);
                }
                // On ties, smallest x wins: samples are in ascending x order already.
                let x = samples
                    .iter()
                    .find(|(_, m)| (*m - max_m).abs() < 1e-9)
                    .map(|(x, _)| *x)
                    .unwrap_or((lo + hi) / 2.0);
                Ok(x)
            }
            DefuzzifyMethod::MeanOfMaxima => {
                let max_m = samples.iter().map(|(_, m)| *m).fold(0.0_f64, f64::max);
                if max_m < 1e-9 {
                    return Ok((lo + hi) / 2.0);
                }
                let maxima: Vec<f64> = samples
                    .iter()
                    .filter(|(_, m)| (*m - max_m).abs() < 1e-9)
                    .map(|(x, _)| *x)
                    .collect();
                Ok(maxima.iter().sum::<f64>() / maxima.len() as f64)
            }
            DefuzzifyMethod::BisectorOfArea => {
                let total_area: f64 = samples.iter().map(|(_, m)| *m).sum();
                if total_area < 1e-9 {
                    return Ok((lo + hi) / 2.0);
                }
                let half = total_area / 2.0;
                let mut cumulative = 0.0;
                for (x, m) in &samples {
                    cumulative += m;
                    if cumulative >= half {
                        return Ok(*x);
                    }
                }
                Ok(hi)
            }
        }
    }

    /// Dempster-Shafer combination of evidence over a binary frame `{supports, refutes}`.
    /// Returns the conflict factor `K`; fails with [`EdcError::Numeric`] if `K` exceeds
    /// [`HIGH_CONFLICT_THRESHOLD`] (`HighConflict`, §4.1).
    pub fn combine_evidence(&self, evidences: &[FuzzyEvidence]) -> Result<CombinedEvidence> {
        if evidences.is_empty() {
            return Err(EdcError::invalid_input("cannot combine an empty evidence set"));
        }

        let masses: Vec<(f64, f64, f64)> = evidences
            .iter()
            .map(|e| {
                let w = e.effective_weight();
                let supports = w * e.membership_degree;
                let refutes = w * (1.0 - e.membership_degree);
                let uncertain = (1.0 - w).max(0.0);
                (supports, refutes, uncertain)
            })
            .collect();

        let mut acc = masses[0];
        let mut cumulative_conflict = 0.0_f64;

        for &(s2, r2, u2) in &masses[1..] {
            let (s1, r1, u1) = acc;
            let k = s1 * r2 + r1 * s2;
            if k >= 1.0 {
                return Err(EdcError::numeric("Dempster-Shafer combination: total conflict"));
            }
            let norm = 1.0 - k;
            acc = (
                (s1 * s2 + s1 * u2 + u1 * s2) / norm,
                (r1 * r2 + r1 * u2 + u1 * r2) / norm,
                (u1 * u2) / norm,
            );
            cumulative_conflict = 1.0 - (1.0 - cumulative_conflict) * (1.0 - k);
        }

        if cumulative_conflict > HIGH_CONFLICT_THRESHOLD {
            log::warn!("fuzzy: evidence combination hit conflict factor {cumulative_conflict:.4}");
            return Err(EdcError::numeric(format!(
                "HighConflict: conflict factor {cumulative_conflict:.4} exceeds {HIGH_CONFLICT_THRESHOLD}"
            )));
        }

        let (supports, _refutes, _uncertain) = acc;
        let mut confidence = supports;

        if has_consensus(evidences) {
            confidence = (confidence + self.consensus_boost).clamp(0.0, 1.0);
        }

        let total_weight: f64 = evidences.iter().map(FuzzyEvidence::effective_weight).sum();
        let value = if total_weight > 0.0 {
            evidences
                .par_iter()
                .map(|e| e.value * e.effective_weight())
                .sum::<f64>()
                / total_weight
        } else {
            evidences.iter().map(|e| e.value).sum::<f64>() / evidences.len() as f64
        };

        Ok(CombinedEvidence {
            value,
            confidence,
            conflict: cumulative_conflict,
        })
    }
}

/// Two or more evidence items "agree" when their membership degrees are within 0.1 of each
/// other and both above 0.5 (§4.1).
fn has_consensus(evidences: &[FuzzyEvidence]) -> bool {
    for i in 0..evidences.len() {
        for j in (i + 1)..evidences.len() {
            let a = &evidences[i];
            let b = &evidences[j];
            if a.membership_degree > 0.5
                && b.membership_degree > 0.5
                && (a.membership_degree - b.membership_degree).abs() <= 0.1
            {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::super::membership::MembershipFunction;
    use super::super::rule::{Connective, FuzzyConsequent};
    use super::*;

    fn evidence(membership_degree: f64, confidence: f64) -> FuzzyEvidence {
        FuzzyEvidence {
            value: membership_degree,
            membership_degree,
            confidence,
            source_reliability: 1.0,
            temporal_decay: 1.0,
            context_relevance: 1.0,
        }
    }

    #[test]
    fn centroid_of_symmetric_triangle_is_the_center() {
        let mut engine = FuzzyInferenceEngine::new();
        engine
            .add_fuzzy_set(
                FuzzySet::new("medium", 0.0, 1.0, MembershipFunction::Triangular { left: 0.0, center: 0.5, right: 1.0 })
                    .unwrap(),
            )
            .unwrap();
        let output = FuzzyOutputSet {
            universe: (0.0, 1.0),
            terms: vec![("medium".to_string(), 1.0)],
        };
        let centroid = engine.defuzzify(&output, DefuzzifyMethod::Centroid).unwrap();
        assert!((centroid - 0.5).abs() < 1e-3);
    }

    #[test]
    fn rule_firing_produces_expected_output_membership() {
        let mut engine = FuzzyInferenceEngine::new();
        engine
            .add_fuzzy_set(FuzzySet::new("high", 0.0, 1.0, MembershipFunction::Triangular { left: 0.5, center: 0.8, right: 1.1 }).unwrap())
            .unwrap();
        engine
            .add_fuzzy_set(FuzzySet::new("y_high", 0.0, 1.0, MembershipFunction::Triangular { left: 0.5, center: 0.8, right: 1.1 }).unwrap())
            .unwrap();
        engine
            .add_rule(FuzzyRule {
                id: "r1".to_string(),
                antecedents: vec![FuzzyAntecedent { variable: "x".to_string(), fuzzy_set: "high".to_string(), negated: false }],
                connective: Connective::And,
                consequent: FuzzyConsequent { variable: "y".to_string(), fuzzy_set: "y_high".to_string() },
                weight: 1.0,
            })
            .unwrap();

        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), 0.8);
        let outputs = engine.inference(&inputs).unwrap();
        let y = &outputs["y"];
        assert!((y.membership_at(&engine.fuzzy_sets, 0.8) - 1.0).abs() < 1e-9);

        let centroid = engine.defuzzify(y, DefuzzifyMethod::Centroid).unwrap();
        assert!((0.6..=1.0).contains(&centroid));
    }

    #[test]
    fn high_conflict_evidence_is_rejected() {
        let engine = FuzzyInferenceEngine::new();
        let evidences = vec![evidence(0.95, 0.999), evidence(0.02, 0.999)];
        let result = engine.combine_evidence(&evidences);
        assert!(result.is_err());
    }

    #[test]
    fn agreeing_evidence_gets_consensus_boost() {
        let engine = FuzzyInferenceEngine::new();
        let agreeing = vec![evidence(0.8, 0.9), evidence(0.85, 0.9)];
        let single = vec![evidence(0.8, 0.9)];
        let combined_agreeing = engine.combine_evidence(&agreeing).unwrap();
        let combined_single = engine.combine_evidence(&single).unwrap();
        assert!(combined_agreeing.confidence >= combined_single.confidence);
    }
}
