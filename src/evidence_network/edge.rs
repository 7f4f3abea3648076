use serde::{Deserialize, Serialize};

/// The semantic relationship a directed edge carries between two nodes (§3 Data model).
///
/// Per §9's "Graph cycles" design decision, `Causal`, `Supportive`, `Inhibitory` and
/// `Conditional` are *exact* kinds: the subgraph they induce must remain acyclic, because exact
/// belief propagation requires a topological order. `Correlational` and `Temporal` are
/// *approximate*: they may form cycles, which only the iterative algorithms (variational,
/// MCMC, particle filter) are asked to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Causal,
    Correlational,
    Inhibitory,
    Supportive,
    Conditional,
    Temporal,
}

impl EdgeKind {
    /// Whether this kind participates in the acyclic "exact" subgraph.
    pub fn is_exact(self) -> bool {
        matches!(
            self,
            EdgeKind::Causal | EdgeKind::Supportive | EdgeKind::Inhibitory | EdgeKind::Conditional
        )
    }
}

/// A directed edge: `weight` scales the parent's influence on the child, `kind` determines both
/// its sign convention (`Inhibitory` subtracts rather than adds) and which propagation
/// algorithms may traverse it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvidenceEdge {
    pub kind: EdgeKind,
    pub weight: f64,
}

impl EvidenceEdge {
    pub fn new(kind: EdgeKind, weight: f64) -> Self {
        Self { kind, weight }
    }

    /// Signed influence contribution: negative for `Inhibitory`, positive otherwise.
    pub fn signed_weight(&self) -> f64 {
        match self.kind {
            EdgeKind::Inhibitory => -self.weight,
            _ => self.weight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_kinds_match_spec_list() {
        assert!(EdgeKind::Causal.is_exact());
        assert!(EdgeKind::Supportive.is_exact());
        assert!(EdgeKind::Inhibitory.is_exact());
        assert!(EdgeKind::Conditional.is_exact());
        assert!(!EdgeKind::Correlational.is_exact());
        assert!(!EdgeKind::Temporal.is_exact());
    }

    #[test]
    fn inhibitory_weight_is_negative() {
        let edge = EvidenceEdge::new(EdgeKind::Inhibitory, 0.4);
        assert!(edge.signed_weight() < 0.0);
        let edge = EvidenceEdge::new(EdgeKind::Causal, 0.4);
        assert!(edge.signed_weight() > 0.0);
    }
}
