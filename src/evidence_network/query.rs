use super::graph::EvidenceNetwork;
use super::propagation::{self, PropagationAlgorithm};
use crate::deadline::Deadline;
use crate::error::{EdcError, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::HashMap;

const MPE_RESTARTS: usize = 50;
const MPE_STEP: f64 = 0.05;
const SENSITIVITY_DELTA: f64 = 0.05;

/// The five query shapes the network supports (§4.2).
#[derive(Debug, Clone)]
pub enum QuerySpec {
    Marginal { node: String },
    Conditional { node: String, given: Vec<(String, f64)>, confidence_level: f64 },
    /// `scope` restricts which nodes the hill-climb explores; an empty scope means "every node"
    /// (§4.2 `MPE(scope)`).
    Mpe { algorithm: PropagationAlgorithm, seed: u64, scope: Vec<String> },
    /// `wrt` is the list of nodes to vary (§4.2 `Sensitivity(target, wrt: list<node>)`).
    Sensitivity { target: String, wrt: Vec<String>, algorithm: PropagationAlgorithm },
    WhatIf { interventions: Vec<(String, f64)>, algorithm: PropagationAlgorithm },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
    pub level: f64,
}

/// One node's finite-difference sensitivity result (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub with_respect_to: String,
    pub delta_belief: f64,
    pub slope: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueryResult {
    Marginal { belief: f64 },
    Conditional { belief: f64, interval: ConfidenceInterval },
    Mpe { assignment: Vec<(String, f64)>, score: f64 },
    Sensitivity { results: Vec<SensitivityResult> },
    WhatIf { beliefs: Vec<(String, f64)> },
}

pub fn run(network: &EvidenceNetwork, spec: QuerySpec, deadline: Option<Deadline>) -> Result<QueryResult> {
    if let Some(deadline) = deadline {
        deadline.check()?;
    }
    match spec {
        QuerySpec::Marginal { node } => marginal(network, &node),
        QuerySpec::Conditional { node, given, confidence_level } => {
            conditional(network, &node, &given, confidence_level)
        }
        QuerySpec::Mpe { algorithm, seed, scope } => mpe(network, algorithm, seed, &scope, deadline),
        QuerySpec::Sensitivity { target, wrt, algorithm } => sensitivity(network, &target, &wrt, algorithm, deadline),
        QuerySpec::WhatIf { interventions, algorithm } => what_if(network, &interventions, algorithm),
    }
}

fn marginal(network: &EvidenceNetwork, node: &str) -> Result<QueryResult> {
    Ok(QueryResult::Marginal { belief: network.node(node)?.belief })
}

/// Pin `given` nodes to fixed values, re-propagate on a private clone, and read the target
/// node's posterior belief, reporting a normal-approximation confidence interval around it
/// (grounded on the teacher's `calculate_confidence_interval`: `z * sqrt(p(1-p)/n)`, §9).
fn conditional(
    network: &EvidenceNetwork,
    node: &str,
    given: &[(String, f64)],
    confidence_level: f64,
) -> Result<QueryResult> {
    if !(0.0..1.0).contains(&confidence_level) {
        return Err(EdcError::invalid_input("confidence_level must be in [0, 1)"));
    }

    let mut clone = network.clone();
    for (name, value) in given {
        clone.pin_node(name, *value)?;
    }
    propagation::propagate(&mut clone, PropagationAlgorithm::VariationalBayes, None, &HashMap::new())?;

    let belief = clone.node(node)?.belief;
    let sample_size = clone.node(node)?.evidence_history.len().max(1) as f64;

    let alpha = 1.0 - confidence_level;
    let standard_normal = Normal::new(0.0, 1.0).map_err(|e| EdcError::numeric(e.to_string()))?;
    let z = standard_normal.inverse_cdf(1.0 - alpha / 2.0);

    let margin = z * (belief * (1.0 - belief) / sample_size).sqrt();
    let interval = ConfidenceInterval {
        lower: (belief - margin).clamp(0.0, 1.0),
        upper: (belief + margin).clamp(0.0, 1.0),
        level: confidence_level,
    };

    Ok(QueryResult::Conditional { belief, interval })
}

/// Most-probable-explanation: hill-climb from [`MPE_RESTARTS`] random starts, nudging each node
/// in `scope` up/down by [`MPE_STEP`] and keeping moves that raise `scope`'s mean belief after
/// propagation (§4.2 `MPE(scope)`). An empty `scope` searches every node. `deadline` is checked
/// once per restart; on expiry the best assignment found up to that point is returned rather than
/// continuing (§5).
fn mpe(
    network: &EvidenceNetwork,
    algorithm: PropagationAlgorithm,
    seed: u64,
    scope: &[String],
    deadline: Option<Deadline>,
) -> Result<QueryResult> {
    let mut rng = StdRng::seed_from_u64(seed);
    let names: Vec<String> = if scope.is_empty() {
        network.node_names().map(str::to_string).collect()
    } else {
        for name in scope {
            network.node(name)?;
        }
        scope.to_vec()
    };
    if names.is_empty() {
        return Err(EdcError::invalid_input("cannot run MPE on an empty network"));
    }

    let mut best_assignment: Vec<(String, f64)> = Vec::new();
    let mut best_score = f64::NEG_INFINITY;

    for _ in 0..MPE_RESTARTS {
        if let Some(deadline) = deadline {
            if deadline.is_expired() {
                log::warn!(
                    "evidence_network: mpe hit its deadline after {}ms, returning the best assignment found so far",
                    deadline.elapsed_ms()
                );
                break;
            }
        }

        let mut candidate = network.clone();
        for name in &names {
            let jitter = rng.gen_range(-1.0..1.0) * MPE_STEP;
            let current = candidate.node(name)?.belief;
            candidate.pin_node(name, (current + jitter).clamp(0.0, 1.0))?;
        }
        propagation::propagate(&mut candidate, algorithm, None, &HashMap::new())?;

        let score = names
            .iter()
            .map(|name| candidate.node(name).map(|n| n.belief))
            .collect::<Result<Vec<_>>>()?
            .iter()
            .sum::<f64>()
            / names.len() as f64;
        if score > best_score {
            best_score = score;
            best_assignment = names
                .iter()
                .map(|name| Ok((name.clone(), candidate.node(name)?.belief)))
                .collect::<Result<Vec<_>>>()?;
        }
    }

    Ok(QueryResult::Mpe { assignment: best_assignment, score: best_score })
}

/// Finite-difference sensitivity of `target`'s belief with respect to each node in `wrt`, using a
/// symmetric difference of width [`SENSITIVITY_DELTA`] (§4.2 `Sensitivity(target, wrt: list<node>)`).
/// `deadline` is checked once per `wrt` entry.
fn sensitivity(
    network: &EvidenceNetwork,
    target: &str,
    wrt: &[String],
    algorithm: PropagationAlgorithm,
    deadline: Option<Deadline>,
) -> Result<QueryResult> {
    network.node(target)?;
    if wrt.is_empty() {
        return Err(EdcError::invalid_input("sensitivity query requires at least one 'wrt' node"));
    }

    let mut results = Vec::with_capacity(wrt.len());
    for with_respect_to in wrt {
        if let Some(deadline) = deadline {
            deadline.check()?;
        }

        let base = network.node(with_respect_to)?.belief;

        let mut up = network.clone();
        up.pin_node(with_respect_to, (base + SENSITIVITY_DELTA).clamp(0.0, 1.0))?;
        propagation::propagate(&mut up, algorithm, None, &HashMap::new())?;

        let mut down = network.clone();
        down.pin_node(with_respect_to, (base - SENSITIVITY_DELTA).clamp(0.0, 1.0))?;
        propagation::propagate(&mut down, algorithm, None, &HashMap::new())?;

        let delta_belief = up.node(target)?.belief - down.node(target)?.belief;
        let slope = delta_belief / (2.0 * SENSITIVITY_DELTA);

        results.push(SensitivityResult { with_respect_to: with_respect_to.clone(), delta_belief, slope });
    }

    Ok(QueryResult::Sensitivity { results })
}

/// The do-operator: sever incoming edges of every intervened node on a private clone, pin its
/// value, re-propagate, and report every node's resulting belief (§4.2). With no interventions
/// this degenerates to reporting current beliefs with no severing or re-propagation — `WhatIf`
/// with an empty intervention set is equivalent to `Marginal` over every node (§8 idempotence).
fn what_if(
    network: &EvidenceNetwork,
    interventions: &[(String, f64)],
    algorithm: PropagationAlgorithm,
) -> Result<QueryResult> {
    if interventions.is_empty() {
        let beliefs = network
            .node_names()
            .map(|name| Ok((name.to_string(), network.node(name)?.belief)))
            .collect::<Result<Vec<_>>>()?;
        return Ok(QueryResult::WhatIf { beliefs });
    }
    let targets: Vec<&str> = interventions.iter().map(|(n, _)| n.as_str()).collect();
    let mut clone = network.with_severed_incoming(&targets)?;
    for (name, value) in interventions {
        clone.pin_node(name, *value)?;
    }
    propagation::propagate(&mut clone, algorithm, None, &HashMap::new())?;

    let beliefs = clone
        .node_names()
        .map(|name| Ok((name.to_string(), clone.node(name)?.belief)))
        .collect::<Result<Vec<_>>>()?;

    Ok(QueryResult::WhatIf { beliefs })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence_network::edge::EdgeKind as EK;
    use crate::evidence_network::node::NodeKind;

    fn build_net() -> EvidenceNetwork {
        let mut net = EvidenceNetwork::new();
        net.add_node("context", NodeKind::Context, 0.7).unwrap();
        net.add_node("output", NodeKind::Output, 0.3).unwrap();
        net.add_edge("context", "output", EK::Causal, 1.0).unwrap();
        net
    }

    #[test]
    fn marginal_reads_current_belief() {
        let net = build_net();
        let result = run(&net, QuerySpec::Marginal { node: "context".to_string() }, None).unwrap();
        assert!(matches!(result, QueryResult::Marginal { belief } if (belief - 0.7).abs() < 1e-9));
    }

    #[test]
    fn conditional_does_not_mutate_original_network() {
        let net = build_net();
        let _ = run(
            &net,
            QuerySpec::Conditional {
                node: "output".to_string(),
                given: vec![("context".to_string(), 0.99)],
                confidence_level: 0.95,
            },
            None,
        )
        .unwrap();
        assert!((net.node("context").unwrap().belief - 0.7).abs() < 1e-9);
    }

    #[test]
    fn what_if_severs_incoming_edges_before_pinning() {
        let net = build_net();
        let result = run(
            &net,
            QuerySpec::WhatIf {
                interventions: vec![("output".to_string(), 0.01)],
                algorithm: PropagationAlgorithm::BeliefPropagation,
            },
            None,
        )
        .unwrap();
        let QueryResult::WhatIf { beliefs } = result else { panic!("expected WhatIf") };
        let output_belief = beliefs.iter().find(|(n, _)| n == "output").unwrap().1;
        assert!((output_belief - 0.01).abs() < 1e-6);
    }

    #[test]
    fn what_if_with_no_interventions_matches_marginal_beliefs() {
        let net = build_net();
        let result = run(
            &net,
            QuerySpec::WhatIf { interventions: Vec::new(), algorithm: PropagationAlgorithm::BeliefPropagation },
            None,
        )
        .unwrap();
        let QueryResult::WhatIf { beliefs } = result else { panic!("expected WhatIf") };
        for (name, belief) in beliefs {
            assert!((belief - net.node(&name).unwrap().belief).abs() < 1e-12);
        }
    }

    #[test]
    fn sensitivity_is_zero_for_unrelated_nodes() {
        let mut net = EvidenceNetwork::new();
        net.add_node("isolated", NodeKind::Domain, 0.5).unwrap();
        net.add_node("other", NodeKind::Domain, 0.5).unwrap();
        let result = run(
            &net,
            QuerySpec::Sensitivity {
                target: "isolated".to_string(),
                wrt: vec!["other".to_string()],
                algorithm: PropagationAlgorithm::BeliefPropagation,
            },
            None,
        )
        .unwrap();
        let QueryResult::Sensitivity { results } = result else { panic!("expected Sensitivity") };
        assert_eq!(results.len(), 1);
        assert!(results[0].delta_belief.abs() < 1e-9);
    }

    #[test]
    fn sensitivity_reports_one_result_per_wrt_node() {
        let mut net = EvidenceNetwork::new();
        net.add_node("target", NodeKind::Output, 0.5).unwrap();
        net.add_node("a", NodeKind::Domain, 0.5).unwrap();
        net.add_node("b", NodeKind::Domain, 0.5).unwrap();
        net.add_edge("a", "target", EK::Causal, 1.0).unwrap();
        net.add_edge("b", "target", EK::Causal, 1.0).unwrap();
        let result = run(
            &net,
            QuerySpec::Sensitivity {
                target: "target".to_string(),
                wrt: vec!["a".to_string(), "b".to_string()],
                algorithm: PropagationAlgorithm::BeliefPropagation,
            },
            None,
        )
        .unwrap();
        let QueryResult::Sensitivity { results } = result else { panic!("expected Sensitivity") };
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn mpe_scope_only_explores_named_nodes() {
        let net = build_net();
        let result = run(
            &net,
            QuerySpec::Mpe {
                algorithm: PropagationAlgorithm::BeliefPropagation,
                seed: 1,
                scope: vec!["output".to_string()],
            },
            None,
        )
        .unwrap();
        let QueryResult::Mpe { assignment, .. } = result else { panic!("expected Mpe") };
        assert_eq!(assignment.len(), 1);
        assert_eq!(assignment[0].0, "output");
    }

    #[test]
    fn mpe_respects_an_already_expired_deadline() {
        let net = build_net();
        let deadline = Deadline::from_now(std::time::Duration::from_millis(0));
        std::thread::sleep(std::time::Duration::from_millis(5));
        let result = run(
            &net,
            QuerySpec::Mpe { algorithm: PropagationAlgorithm::BeliefPropagation, seed: 1, scope: Vec::new() },
            Some(deadline),
        );
        assert!(matches!(result, Err(EdcError::Deadline { .. })));
    }
}
