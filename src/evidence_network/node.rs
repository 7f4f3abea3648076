use crate::fuzzy::FuzzyEvidence;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// The role a node plays in the evidence network (§3 Data model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Query,
    Context,
    Domain,
    Strategy,
    Quality,
    Resource,
    Output,
    Meta,
}

/// Bound on how many historical evidence observations a node retains (§3).
const EVIDENCE_HISTORY_CAPACITY: usize = 64;
const BELIEF_EPSILON: f64 = 1e-6;

/// A node in the Bayesian evidence network: a belief in `[0, 1]` plus the bounded history of
/// evidence that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceNode {
    pub name: String,
    pub kind: NodeKind,
    pub belief: f64,
    pub prior: f64,
    #[serde(with = "vecdeque_serde")]
    pub evidence_history: VecDeque<FuzzyEvidence>,
}

impl EvidenceNode {
    pub fn new(name: impl Into<String>, kind: NodeKind, prior: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            belief: prior,
            prior,
            evidence_history: VecDeque::with_capacity(EVIDENCE_HISTORY_CAPACITY),
        }
    }

    /// Incorporates one piece of evidence (§4.2): `logit(p') = logit(prior) + Σ effective_weight
    /// · (2·membership_degree − 1)`, summed over the node's *entire* retained history — not
    /// folded in incrementally against the previous belief. The sum is commutative, so belief
    /// after any sequence of `incorporate` calls depends only on the multiset of evidence
    /// applied, never on the order it arrived in (§8).
    pub fn incorporate(&mut self, evidence: FuzzyEvidence) {
        if self.evidence_history.len() == EVIDENCE_HISTORY_CAPACITY {
            self.evidence_history.pop_front();
        }
        self.evidence_history.push_back(evidence);
        self.recompute_belief();
    }

    fn recompute_belief(&mut self) {
        let clamp = |p: f64| p.clamp(BELIEF_EPSILON, 1.0 - BELIEF_EPSILON);
        let prior = clamp(self.prior);
        let logit_prior = (prior / (1.0 - prior)).ln();

        let evidence_sum: f64 = self
            .evidence_history
            .iter()
            .map(|e| e.effective_weight() * (2.0 * e.membership_degree - 1.0))
            .sum();

        let posterior_odds = (logit_prior + evidence_sum).exp();
        self.belief = clamp(posterior_odds / (1.0 + posterior_odds));
    }

    /// Resets belief to `prior` and discards accumulated evidence, so a subsequent `incorporate`
    /// starts from a clean slate rather than immediately recomputing over stale history.
    pub fn reset_to_prior(&mut self) {
        self.belief = self.prior;
        self.evidence_history.clear();
    }

    /// Directly overrides belief, bypassing evidence incorporation. Used by query simulations
    /// (Conditional/MPE/Sensitivity/WhatIf, §4.2) to pin a node to a hypothetical value on a
    /// private clone; never used on a network a caller still holds a handle to.
    pub(crate) fn pin_belief(&mut self, value: f64) {
        self.belief = value.clamp(0.0, 1.0);
    }
}

mod vecdeque_serde {
    use super::FuzzyEvidence;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::VecDeque;

    pub fn serialize<S: Serializer>(
        value: &VecDeque<FuzzyEvidence>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let vec: Vec<FuzzyEvidence> = value.iter().cloned().collect();
        vec.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<VecDeque<FuzzyEvidence>, D::Error> {
        let vec = Vec::<FuzzyEvidence>::deserialize(deserializer)?;
        Ok(VecDeque::from(vec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evidence(membership_degree: f64) -> FuzzyEvidence {
        FuzzyEvidence {
            value: membership_degree,
            membership_degree,
            confidence: 1.0,
            source_reliability: 1.0,
            temporal_decay: 1.0,
            context_relevance: 1.0,
        }
    }

    #[test]
    fn strong_positive_evidence_raises_belief_above_prior() {
        let mut node = EvidenceNode::new("n", NodeKind::Domain, 0.5);
        node.incorporate(evidence(0.9));
        assert!(node.belief > 0.5);
    }

    #[test]
    fn neutral_evidence_leaves_belief_near_prior() {
        let mut node = EvidenceNode::new("n", NodeKind::Domain, 0.3);
        node.incorporate(evidence(0.5));
        assert!((node.belief - 0.3).abs() < 1e-6);
    }

    #[test]
    fn evidence_history_is_bounded() {
        let mut node = EvidenceNode::new("n", NodeKind::Domain, 0.5);
        for _ in 0..(EVIDENCE_HISTORY_CAPACITY + 10) {
            node.incorporate(evidence(0.6));
        }
        assert_eq!(node.evidence_history.len(), EVIDENCE_HISTORY_CAPACITY);
    }

    #[test]
    fn belief_is_independent_of_evidence_append_order() {
        let mut forward = EvidenceNode::new("n", NodeKind::Domain, 0.5);
        forward.incorporate(evidence(0.9));
        forward.incorporate(evidence(0.1));

        let mut reversed = EvidenceNode::new("n", NodeKind::Domain, 0.5);
        reversed.incorporate(evidence(0.1));
        reversed.incorporate(evidence(0.9));

        assert!((forward.belief - reversed.belief).abs() < 1e-12);
    }

    #[test]
    fn reset_to_prior_clears_history() {
        let mut node = EvidenceNode::new("n", NodeKind::Domain, 0.4);
        node.incorporate(evidence(0.95));
        node.reset_to_prior();
        assert!((node.belief - 0.4).abs() < 1e-12);
        assert!(node.evidence_history.is_empty());
    }
}
