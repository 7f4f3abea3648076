use crate::deadline::Deadline;
use crate::error::{EdcError, Result};
use crate::evidence_network::graph::EvidenceNetwork;
use petgraph::Direction;

const MAX_ITERATIONS: usize = 200;
const CONVERGENCE_EPSILON: f64 = 1e-4;
/// Under-relaxation factor: each iteration moves only this far from the previous belief toward
/// the mean-field update, damping oscillation in networks with cycles.
const RELAXATION_LAMBDA: f64 = 0.5;

/// Mean-field variational approximation over the *entire* graph, including the approximate
/// (cyclic-capable) edge kinds belief propagation cannot traverse (§4.2).
///
/// Iterates until the largest per-node belief change drops below [`CONVERGENCE_EPSILON`] or
/// [`MAX_ITERATIONS`] is reached; non-convergence is not an error; it is the teacher's `info`-
/// level outcome, reflected here by returning the iteration count reached.
///
/// `deadline` is checked once per iteration (§5); each iteration's belief updates are applied to
/// `network` before the check, so an expired deadline still leaves the best-effort partially
/// converged state in place.
pub fn propagate(network: &mut EvidenceNetwork, deadline: Option<Deadline>) -> Result<usize> {
    let indices: Vec<_> = network.graph.node_indices().collect();

    for iteration in 1..=MAX_ITERATIONS {
        let mut max_delta = 0.0_f64;

        for &index in &indices {
            let incoming: Vec<(f64, f64)> = network
                .graph
                .edges_directed(index, Direction::Incoming)
                .map(|e| (network.graph[e.source()].belief, e.weight().signed_weight()))
                .collect();

            if incoming.is_empty() {
                continue;
            }

            let weight_total: f64 = incoming.iter().map(|(_, w)| w.abs()).sum();
            if weight_total < 1e-12 {
                continue;
            }

            let mean_field: f64 = incoming.iter().map(|(belief, w)| belief * w).sum::<f64>() / weight_total;
            let mean_field = mean_field.clamp(0.0, 1.0);

            let old_belief = network.graph[index].belief;
            let new_belief =
                ((1.0 - RELAXATION_LAMBDA) * old_belief + RELAXATION_LAMBDA * mean_field).clamp(1e-6, 1.0 - 1e-6);

            max_delta = max_delta.max((new_belief - old_belief).abs());
            network.graph[index].belief = new_belief;
        }

        if max_delta < CONVERGENCE_EPSILON {
            log::debug!("evidence_network: variational bayes converged after {iteration} iterations");
            return Ok(iteration);
        }

        if let Some(deadline) = deadline {
            if deadline.is_expired() {
                return Err(EdcError::Deadline { elapsed_ms: deadline.elapsed_ms() });
            }
        }
    }

    log::info!("evidence_network: variational bayes hit the {MAX_ITERATIONS}-iteration cap without converging");
    Ok(MAX_ITERATIONS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence_network::edge::EdgeKind;
    use crate::evidence_network::node::NodeKind;

    #[test]
    fn converges_on_a_simple_two_cycle() {
        let mut net = EvidenceNetwork::new();
        net.add_node("a", NodeKind::Domain, 0.9).unwrap();
        net.add_node("b", NodeKind::Domain, 0.1).unwrap();
        net.add_edge("a", "b", EdgeKind::Correlational, 1.0).unwrap();
        net.add_edge("b", "a", EdgeKind::Correlational, 1.0).unwrap();

        let iterations = propagate(&mut net, None).unwrap();
        assert!(iterations <= MAX_ITERATIONS);

        let a = net.node("a").unwrap().belief;
        let b = net.node("b").unwrap().belief;
        assert!((a - b).abs() < 0.2, "a cyclic pair should converge toward each other");
    }

    #[test]
    fn isolated_node_is_unaffected() {
        let mut net = EvidenceNetwork::new();
        net.add_node("lonely", NodeKind::Domain, 0.42).unwrap();
        propagate(&mut net, None).unwrap();
        assert!((net.node("lonely").unwrap().belief - 0.42).abs() < 1e-9);
    }

    #[test]
    fn expired_deadline_stops_iteration_early() {
        let mut net = EvidenceNetwork::new();
        net.add_node("a", NodeKind::Domain, 0.9).unwrap();
        net.add_node("b", NodeKind::Domain, 0.1).unwrap();
        net.add_edge("a", "b", EdgeKind::Correlational, 1.0).unwrap();
        net.add_edge("b", "a", EdgeKind::Correlational, 1.0).unwrap();

        let deadline = Deadline::from_now(std::time::Duration::from_millis(0));
        std::thread::sleep(std::time::Duration::from_millis(5));
        let result = propagate(&mut net, Some(deadline));
        assert!(matches!(result, Err(EdcError::Deadline { .. })));
    }
}
