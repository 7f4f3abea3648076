use edc_core::evidence_network::{propagate, EdgeKind, EvidenceNetwork, NodeKind, PropagationAlgorithm};
use edc_core::fuzzy::FuzzyEvidence;
use proptest::prelude::*;
use std::collections::HashMap;

fn three_node_net(prior_a: f64, prior_b: f64, prior_c: f64, weight_ab: f64, weight_bc: f64) -> EvidenceNetwork {
    let mut net = EvidenceNetwork::new();
    net.add_node("a", NodeKind::Context, prior_a).unwrap();
    net.add_node("b", NodeKind::Domain, prior_b).unwrap();
    net.add_node("c", NodeKind::Output, prior_c).unwrap();
    net.add_edge("a", "b", EdgeKind::Causal, weight_ab).unwrap();
    net.add_edge("b", "c", EdgeKind::Supportive, weight_bc).unwrap();
    net
}

proptest! {
    /// Belief propagation never pushes a node's belief outside `[0, 1]`, regardless of priors
    /// or edge weights (§3: beliefs are a probability-like quantity).
    #[test]
    fn belief_propagation_keeps_beliefs_in_unit_interval(
        prior_a in 0.0f64..1.0,
        prior_b in 0.0f64..1.0,
        prior_c in 0.0f64..1.0,
        weight_ab in 0.0f64..1.0,
        weight_bc in 0.0f64..1.0,
    ) {
        let mut net = three_node_net(prior_a, prior_b, prior_c, weight_ab, weight_bc);
        propagate(&mut net, PropagationAlgorithm::BeliefPropagation, None, &HashMap::new()).unwrap();
        for name in net.node_names() {
            let belief = net.node(name).unwrap().belief;
            prop_assert!((0.0..=1.0).contains(&belief), "belief for {name} out of range: {belief}");
        }
    }

    /// Incorporating evidence with any reliability in `[0, 1]` keeps a node's belief inside the
    /// open interval the logistic-odds update is defined on.
    #[test]
    fn evidence_incorporation_keeps_belief_bounded(
        prior in 0.0f64..1.0,
        membership_degree in 0.0f64..1.0,
        reliability in 0.0f64..1.0,
    ) {
        let mut net = EvidenceNetwork::new();
        net.add_node("n", NodeKind::Domain, prior).unwrap();
        let evidence = FuzzyEvidence {
            value: membership_degree,
            membership_degree,
            confidence: reliability,
            source_reliability: reliability,
            temporal_decay: 1.0,
            context_relevance: 1.0,
        };
        net.update_node_evidence("n", evidence).unwrap();
        let belief = net.node("n").unwrap().belief;
        prop_assert!((0.0..=1.0).contains(&belief));
    }
}
