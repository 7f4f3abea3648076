use super::edge::{EdgeKind, EvidenceEdge};
use super::node::{EvidenceNode, NodeKind};
use crate::error::{EdcError, Result};
use crate::fuzzy::FuzzyEvidence;
use indexmap::IndexMap;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::Direction;
use serde::{Deserialize, Serialize};

/// Summary statistics over the network's current state (§6 `net.stats`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkStatistics {
    pub node_count: usize,
    pub edge_count: usize,
    pub exact_edge_count: usize,
    pub approximate_edge_count: usize,
    pub mean_belief: f64,
    pub is_fully_acyclic: bool,
}

/// A typed Bayesian evidence network (§3, §4.2).
///
/// Internally a [`petgraph::graph::DiGraph`]; node/edge lookups by name go through an
/// `IndexMap` so iteration order matches insertion order, which keeps deterministic algorithms
/// (belief propagation's topological pass, MCMC's seeded traversal) reproducible.
#[derive(Clone)]
pub struct EvidenceNetwork {
    pub(crate) graph: DiGraph<EvidenceNode, EvidenceEdge>,
    pub(crate) index_by_name: IndexMap<String, NodeIndex>,
}

impl Default for EvidenceNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceNetwork {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index_by_name: IndexMap::new(),
        }
    }

    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind, prior: f64) -> Result<NodeIndex> {
        let name = name.into();
        if self.index_by_name.contains_key(&name) {
            return Err(EdcError::structural(format!("node '{name}' already exists")));
        }
        if !(0.0..=1.0).contains(&prior) {
            return Err(EdcError::invalid_input("node prior must be in [0, 1]"));
        }
        let node = EvidenceNode::new(name.clone(), kind, prior);
        let index = self.graph.add_node(node);
        self.index_by_name.insert(name, index);
        Ok(index)
    }

    pub fn node_index(&self, name: &str) -> Result<NodeIndex> {
        self.index_by_name
            .get(name)
            .copied()
            .ok_or_else(|| EdcError::unknown_node(name))
    }

    pub fn node(&self, name: &str) -> Result<&EvidenceNode> {
        let index = self.node_index(name)?;
        Ok(&self.graph[index])
    }

    /// Add a directed edge. If `kind` is one of the "exact" kinds, the edge is rejected when it
    /// would close a cycle among the exact subgraph (§9 "Graph cycles"); approximate kinds are
    /// always accepted.
    pub fn add_edge(
        &mut self,
        from: &str,
        to: &str,
        kind: EdgeKind,
        weight: f64,
    ) -> Result<EdgeIndex> {
        if !(-1.0..=1.0).contains(&weight) {
            return Err(EdcError::invalid_input("edge weight must be in [-1, 1]"));
        }
        let from_index = self.node_index(from)?;
        let to_index = self.node_index(to)?;

        let edge_index = self.graph.add_edge(from_index, to_index, EvidenceEdge::new(kind, weight));

        if kind.is_exact() && self.exact_subgraph_is_cyclic() {
            self.graph.remove_edge(edge_index);
            return Err(EdcError::structural(format!(
                "adding {kind:?} edge '{from}' -> '{to}' would introduce a cycle in the exact subgraph"
            )));
        }

        Ok(edge_index)
    }

    fn exact_subgraph_is_cyclic(&self) -> bool {
        let mut exact = DiGraph::<(), ()>::with_capacity(self.graph.node_count(), 0);
        for _ in self.graph.node_indices() {
            exact.add_node(());
        }
        for edge in self.graph.edge_references_with_kind(EdgeKind::is_exact) {
            exact.add_edge(edge.0, edge.1, ());
        }
        is_cyclic_directed(&exact)
    }

    pub fn exact_subgraph_topo_order(&self) -> Result<Vec<NodeIndex>> {
        let mut exact = DiGraph::<NodeIndex, ()>::with_capacity(self.graph.node_count(), 0);
        let mut map = IndexMap::new();
        for index in self.graph.node_indices() {
            let mapped = exact.add_node(index);
            map.insert(index, mapped);
        }
        for (from, to) in self.graph.edge_references_with_kind(EdgeKind::is_exact) {
            exact.add_edge(map[&from], map[&to], ());
        }
        petgraph::algo::toposort(&exact, None)
            .map(|order| order.into_iter().map(|i| exact[i]).collect())
            .map_err(|_| EdcError::structural("exact subgraph contains a cycle"))
    }

    pub fn parents(&self, index: NodeIndex, kind_filter: impl Fn(EdgeKind) -> bool) -> Vec<(NodeIndex, EvidenceEdge)> {
        self.graph
            .edges_directed(index, Direction::Incoming)
            .filter(|e| kind_filter(e.weight().kind))
            .map(|e| (e.source(), *e.weight()))
            .collect()
    }

    /// Apply a piece of evidence to a node, updating its belief via logistic-combination
    /// incorporation over its full evidence history (§4.2). Does not propagate to the rest of
    /// the network; call `propagate` afterwards.
    pub fn update_node_evidence(&mut self, name: &str, evidence: FuzzyEvidence) -> Result<()> {
        for (field, v) in [
            ("membership_degree", evidence.membership_degree),
            ("confidence", evidence.confidence),
            ("source_reliability", evidence.source_reliability),
            ("temporal_decay", evidence.temporal_decay),
            ("context_relevance", evidence.context_relevance),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(EdcError::invalid_input(format!("evidence {field} must be in [0, 1]")));
            }
        }
        let index = self.node_index(name)?;
        self.graph[index].incorporate(evidence);
        Ok(())
    }

    /// Directly overrides a node's belief, bypassing evidence incorporation (§4.2 query
    /// simulations: Conditional's pin, MPE's hill-climb step, Sensitivity's finite difference,
    /// WhatIf's do-operator). Callers apply this only to a private clone, never to a network a
    /// caller still holds a handle to.
    pub(crate) fn pin_node(&mut self, name: &str, value: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(EdcError::invalid_input("pinned value must be in [0, 1]"));
        }
        let index = self.node_index(name)?;
        self.graph[index].pin_belief(value);
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.index_by_name.keys().map(String::as_str)
    }

    pub fn statistics(&self) -> NetworkStatistics {
        let exact_edge_count = self.graph.edge_weights().filter(|e| e.kind.is_exact()).count();
        let edge_count = self.graph.edge_count();
        let mean_belief = if self.graph.node_count() == 0 {
            0.0
        } else {
            self.graph.node_weights().map(|n| n.belief).sum::<f64>() / self.graph.node_count() as f64
        };
        NetworkStatistics {
            node_count: self.graph.node_count(),
            edge_count,
            exact_edge_count,
            approximate_edge_count: edge_count - exact_edge_count,
            mean_belief,
            is_fully_acyclic: !is_cyclic_directed(&self.graph),
        }
    }

    /// Sever all incoming edges of `targets` (the do-operator, §4.2 WhatIf query), returning a
    /// mutated copy; the receiver is left untouched.
    pub fn with_severed_incoming(&self, targets: &[&str]) -> Result<Self> {
        let mut clone = self.clone();
        for &name in targets {
            let index = clone.node_index(name)?;
            let incoming: Vec<EdgeIndex> = clone
                .graph
                .edges_directed(index, Direction::Incoming)
                .map(|e| e.id())
                .collect();
            for edge_index in incoming {
                clone.graph.remove_edge(edge_index);
            }
        }
        Ok(clone)
    }
}

/// Helper trait providing a typed `(source, target)` edge iterator filtered by edge-kind
/// predicate; kept off the inherent impl so it can be reused by cycle detection and topo-order
/// construction without duplicating the filter logic.
trait EdgeReferencesWithKind {
    fn edge_references_with_kind(
        &self,
        filter: impl Fn(EdgeKind) -> bool,
    ) -> Vec<(NodeIndex, NodeIndex)>;
}

impl EdgeReferencesWithKind for DiGraph<EvidenceNode, EvidenceEdge> {
    fn edge_references_with_kind(
        &self,
        filter: impl Fn(EdgeKind) -> bool,
    ) -> Vec<(NodeIndex, NodeIndex)> {
        self.edge_indices()
            .filter(|&e| filter(self[e].kind))
            .filter_map(|e| self.edge_endpoints(e))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_cycle_is_rejected() {
        let mut net = EvidenceNetwork::new();
        net.add_node("a", NodeKind::Domain, 0.5).unwrap();
        net.add_node("b", NodeKind::Domain, 0.5).unwrap();
        net.add_edge("a", "b", EdgeKind::Causal, 1.0).unwrap();
        let result = net.add_edge("b", "a", EdgeKind::Causal, 1.0);
        assert!(result.is_err());
    }

    #[test]
    fn approximate_cycle_is_allowed() {
        let mut net = EvidenceNetwork::new();
        net.add_node("a", NodeKind::Domain, 0.5).unwrap();
        net.add_node("b", NodeKind::Domain, 0.5).unwrap();
        net.add_edge("a", "b", EdgeKind::Correlational, 1.0).unwrap();
        net.add_edge("b", "a", EdgeKind::Correlational, 1.0).unwrap();
        assert_eq!(net.statistics().edge_count, 2);
    }

    #[test]
    fn mixed_cycle_through_approximate_and_exact_is_allowed() {
        let mut net = EvidenceNetwork::new();
        net.add_node("a", NodeKind::Domain, 0.5).unwrap();
        net.add_node("b", NodeKind::Domain, 0.5).unwrap();
        net.add_edge("a", "b", EdgeKind::Causal, 1.0).unwrap();
        net.add_edge("b", "a", EdgeKind::Temporal, 1.0).unwrap();
        assert_eq!(net.statistics().edge_count, 2);
    }

    #[test]
    fn out_of_range_weight_is_rejected() {
        let mut net = EvidenceNetwork::new();
        net.add_node("a", NodeKind::Domain, 0.5).unwrap();
        net.add_node("b", NodeKind::Domain, 0.5).unwrap();
        assert!(net.add_edge("a", "b", EdgeKind::Causal, 5.0).is_err());
        assert_eq!(net.statistics().edge_count, 0);
    }

    #[test]
    fn unknown_node_lookup_fails() {
        let net = EvidenceNetwork::new();
        assert!(net.node("missing").is_err());
    }

    #[test]
    fn severing_incoming_edges_does_not_mutate_original() {
        let mut net = EvidenceNetwork::new();
        net.add_node("a", NodeKind::Domain, 0.5).unwrap();
        net.add_node("b", NodeKind::Domain, 0.5).unwrap();
        net.add_edge("a", "b", EdgeKind::Causal, 1.0).unwrap();
        let severed = net.with_severed_incoming(&["b"]).unwrap();
        assert_eq!(severed.statistics().edge_count, 0);
        assert_eq!(net.statistics().edge_count, 1);
    }
}
