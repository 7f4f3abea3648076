use crate::deadline::Deadline;
use crate::error::Result;
use crate::evidence_network::graph::EvidenceNetwork;
use crate::stats::correlation_coefficient;
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const BURN_IN: usize = 1000;
const THINNING: usize = 10;
const SAMPLE_COUNT: usize = 5000;
/// Gibbs proposal noise standard deviation, small enough to keep acceptance reasonable on a
/// belief scale of `[0, 1]`.
const PROPOSAL_SIGMA: f64 = 0.05;

/// How often (in sweeps) the step loop checks `deadline`; checking every sweep would dominate
/// runtime at `BURN_IN + SAMPLE_COUNT * THINNING` iterations.
const DEADLINE_CHECK_INTERVAL: usize = 200;

fn override_usize(params: &HashMap<String, f64>, key: &str, default: usize) -> usize {
    params.get(key).map(|&v| v.max(0.0).round() as usize).unwrap_or(default)
}

fn override_f64(params: &HashMap<String, f64>, key: &str, default: f64) -> f64 {
    params.get(key).copied().unwrap_or(default)
}

/// Outcome of the Gibbs sampler: posterior mean beliefs plus a lag-1 autocorrelation diagnostic
/// per node (computed on the retained, thinned chain) so callers can judge mixing quality. Keyed
/// by node name rather than the internal `NodeIndex` so it carries across the wire facade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McmcDiagnostics {
    pub lag1_autocorrelation: HashMap<String, f64>,
}

/// Seeded Gibbs sampler over the full graph (§4.2). Deterministic given `seed` and the effective
/// `burn_in`/`thinning`/`sample_count`/`proposal_sigma` (each overridable via `params`, falling
/// back to the module defaults), which makes it the one propagation mode exercised in property
/// tests (§8) expecting bit-for-bit repeatability.
///
/// `deadline` is checked every [`DEADLINE_CHECK_INTERVAL`] sweeps (§5). On expiry the chain stops
/// where it stands; beliefs are still updated from whatever samples were collected so far, so the
/// network carries the sampler's best-effort state, before the deadline error propagates.
pub fn propagate(
    network: &mut EvidenceNetwork,
    seed: u64,
    deadline: Option<Deadline>,
    params: &HashMap<String, f64>,
) -> Result<McmcDiagnostics> {
    let burn_in = override_usize(params, "burn_in", BURN_IN);
    let thinning = override_usize(params, "thinning", THINNING).max(1);
    let sample_count = override_usize(params, "sample_count", SAMPLE_COUNT);
    let proposal_sigma = override_f64(params, "proposal_sigma", PROPOSAL_SIGMA);

    let mut rng = StdRng::seed_from_u64(seed);
    let indices: Vec<_> = network.graph.node_indices().collect();
    let normal = Normal::new(0.0, proposal_sigma.max(1e-9)).map_err(|e| crate::error::EdcError::invalid_input(e.to_string()))?;

    let mut chains: HashMap<NodeIndex, Vec<f64>> = indices.iter().map(|&i| (i, Vec::new())).collect();

    let total_steps = burn_in + sample_count * thinning;
    let mut expired_at = None;
    for step in 0..total_steps {
        for &index in &indices {
            gibbs_step(network, index, &normal, &mut rng);
        }
        if step >= burn_in && (step - burn_in) % thinning == 0 {
            for &index in &indices {
                chains.get_mut(&index).unwrap().push(network.graph[index].belief);
            }
        }
        if step % DEADLINE_CHECK_INTERVAL == 0 {
            if let Some(deadline) = deadline {
                if deadline.is_expired() {
                    expired_at = Some(deadline.elapsed_ms());
                    break;
                }
            }
        }
    }

    let mut lag1_autocorrelation = HashMap::new();
    for &index in &indices {
        let name = network.graph[index].name.clone();
        let chain = &chains[&index];
        if chain.len() > 2 {
            let lag = &chain[..chain.len() - 1];
            let lead = &chain[1..];
            let corr = correlation_coefficient(lag, lead).unwrap_or(0.0);
            lag1_autocorrelation.insert(name, corr);
        } else {
            lag1_autocorrelation.insert(name, 0.0);
        }

        if !chain.is_empty() {
            let mean = chain.iter().sum::<f64>() / chain.len() as f64;
            network.graph[index].belief = mean.clamp(1e-6, 1.0 - 1e-6);
        }
    }

    if let Some(elapsed_ms) = expired_at {
        return Err(crate::error::EdcError::Deadline { elapsed_ms });
    }

    Ok(McmcDiagnostics { lag1_autocorrelation })
}

fn gibbs_step(network: &mut EvidenceNetwork, index: NodeIndex, normal: &Normal<f64>, rng: &mut StdRng) {
    let incoming: Vec<(f64, f64)> = network
        .graph
        .edges_directed(index, Direction::Incoming)
        .map(|e| (network.graph[e.source()].belief, e.weight().signed_weight()))
        .collect();

    let current = network.graph[index].belief;
    let conditional_mean = if incoming.is_empty() {
        current
    } else {
        let weight_total: f64 = incoming.iter().map(|(_, w)| w.abs()).sum();
        if weight_total < 1e-12 {
            current
        } else {
            (incoming.iter().map(|(b, w)| b * w).sum::<f64>() / weight_total).clamp(0.0, 1.0)
        }
    };

    let noise = normal.sample(rng);
    let proposal = (conditional_mean + noise).clamp(1e-6, 1.0 - 1e-6);

    // Metropolis correction against the (symmetric) prior-anchored target; acceptance favors
    // proposals closer to the conditional mean without ever rejecting a strict improvement.
    let current_distance = (current - conditional_mean).abs();
    let proposal_distance = (proposal - conditional_mean).abs();
    let accept = proposal_distance <= current_distance || rng.gen::<f64>() < 0.3;

    if accept {
        network.graph[index].belief = proposal;
    }
}
