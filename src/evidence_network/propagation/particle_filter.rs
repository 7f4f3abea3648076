use crate::error::Result;
use crate::evidence_network::graph::EvidenceNetwork;
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const PARTICLE_COUNT: usize = 1000;
const PROCESS_NOISE_SIGMA: f64 = 0.03;

fn override_usize(params: &HashMap<String, f64>, key: &str, default: usize) -> usize {
    params.get(key).map(|&v| v.max(1.0).round() as usize).unwrap_or(default)
}

fn override_f64(params: &HashMap<String, f64>, key: &str, default: f64) -> f64 {
    params.get(key).copied().unwrap_or(default)
}

/// Effective sample size and final particle count, reported so callers can judge filter health
/// (§4.2: "ESS diagnostic reported").
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParticleFilterDiagnostics {
    pub effective_sample_size: f64,
    pub particle_count: usize,
}

struct ParticleSet {
    /// `beliefs[node][particle]`.
    beliefs: HashMap<NodeIndex, Vec<f64>>,
    weights: Vec<f64>,
}

/// Sequential importance-resampling particle filter over the full graph (§4.2). Resamples only
/// when the effective sample size drops below `particle_count / 2`, using systematic resampling
/// to keep particle diversity stable. `particle_count`/`process_noise_sigma` default to the module
/// constants and are overridable via `params` (`"particle_count"`, `"process_noise_sigma"`).
pub fn propagate(network: &mut EvidenceNetwork, seed: u64, params: &HashMap<String, f64>) -> Result<ParticleFilterDiagnostics> {
    let particle_count = override_usize(params, "particle_count", PARTICLE_COUNT);
    let process_noise_sigma = override_f64(params, "process_noise_sigma", PROCESS_NOISE_SIGMA);

    let mut rng = StdRng::seed_from_u64(seed);
    let indices: Vec<_> = network.graph.node_indices().collect();
    let noise = Normal::new(0.0, process_noise_sigma.max(1e-9)).map_err(|e| crate::error::EdcError::invalid_input(e.to_string()))?;

    let mut particles = initialize_particles(network, &indices, &noise, &mut rng, particle_count);

    propagate_particles(network, &indices, &mut particles, &noise, &mut rng, particle_count);
    reweight_particles(network, &indices, &mut particles);

    let mut ess = effective_sample_size(&particles.weights);
    if ess < particle_count as f64 / 2.0 {
        systematic_resample(&mut particles, &mut rng);
        ess = effective_sample_size(&particles.weights);
    }

    update_beliefs_from_particles(network, &indices, &particles);

    Ok(ParticleFilterDiagnostics {
        effective_sample_size: ess,
        particle_count,
    })
}

fn initialize_particles(
    network: &EvidenceNetwork,
    indices: &[NodeIndex],
    noise: &Normal<f64>,
    rng: &mut StdRng,
    particle_count: usize,
) -> ParticleSet {
    let mut beliefs = HashMap::new();
    for &index in indices {
        let center = network.graph[index].belief;
        let samples = (0..particle_count)
            .map(|_| (center + noise.sample(rng)).clamp(1e-6, 1.0 - 1e-6))
            .collect();
        beliefs.insert(index, samples);
    }
    ParticleSet {
        beliefs,
        weights: vec![1.0 / particle_count as f64; particle_count],
    }
}

fn propagate_particles(
    network: &EvidenceNetwork,
    indices: &[NodeIndex],
    particles: &mut ParticleSet,
    noise: &Normal<f64>,
    rng: &mut StdRng,
    particle_count: usize,
) {
    for &index in indices {
        let incoming: Vec<(NodeIndex, f64)> = network
            .graph
            .edges_directed(index, Direction::Incoming)
            .map(|e| (e.source(), e.weight().signed_weight()))
            .collect();
        if incoming.is_empty() {
            continue;
        }
        let weight_total: f64 = incoming.iter().map(|(_, w)| w.abs()).sum();
        if weight_total < 1e-12 {
            continue;
        }

        for p in 0..particle_count {
            let parent_mean: f64 = incoming
                .iter()
                .map(|(parent, w)| particles.beliefs[parent][p] * w)
                .sum::<f64>()
                / weight_total;
            let moved = (parent_mean.clamp(0.0, 1.0) + noise.sample(rng)).clamp(1e-6, 1.0 - 1e-6);
            particles.beliefs.get_mut(&index).unwrap()[p] = moved;
        }
    }
}

fn reweight_particles(network: &EvidenceNetwork, indices: &[NodeIndex], particles: &mut ParticleSet) {
    for (p, weight) in particles.weights.iter_mut().enumerate() {
        let likelihood: f64 = indices
            .iter()
            .map(|index| {
                let target = network.graph[*index].belief;
                let sample = particles.beliefs[index][p];
                (-((sample - target).powi(2)) / (2.0 * 0.1_f64.powi(2))).exp()
            })
            .product();
        *weight *= likelihood.max(1e-300);
    }
    let total: f64 = particles.weights.iter().sum();
    if total > 0.0 {
        for w in &mut particles.weights {
            *w /= total;
        }
    }
}

fn effective_sample_size(weights: &[f64]) -> f64 {
    let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
    if sum_sq < 1e-300 {
        0.0
    } else {
        1.0 / sum_sq
    }
}

/// Systematic resampling: a single uniform draw determines `P` evenly-spaced selection points
/// along the cumulative weight distribution, minimizing resampling variance versus multinomial
/// resampling.
fn systematic_resample(particles: &mut ParticleSet, rng: &mut StdRng) {
    let n = particles.weights.len();
    let start: f64 = rng.gen_range(0.0..(1.0 / n as f64));
    let cumulative: Vec<f64> = particles
        .weights
        .iter()
        .scan(0.0, |acc, w| {
            *acc += w;
            Some(*acc)
        })
        .collect();

    let mut selected_indices = Vec::with_capacity(n);
    let mut cursor = 0usize;
    for i in 0..n {
        let target = start + i as f64 / n as f64;
        while cursor < cumulative.len() - 1 && cumulative[cursor] < target {
            cursor += 1;
        }
        selected_indices.push(cursor);
    }

    let keys: Vec<NodeIndex> = particles.beliefs.keys().copied().collect();
    for key in keys {
        let old = particles.beliefs[&key].clone();
        let resampled = selected_indices.iter().map(|&i| old[i]).collect();
        particles.beliefs.insert(key, resampled);
    }
    particles.weights = vec![1.0 / n as f64; n];
}

fn update_beliefs_from_particles(network: &mut EvidenceNetwork, indices: &[NodeIndex], particles: &ParticleSet) {
    for &index in indices {
        let samples = &particles.beliefs[&index];
        let mean: f64 = samples
            .iter()
            .zip(particles.weights.iter())
            .map(|(s, w)| s * w)
            .sum();
        network.graph[index].belief = mean.clamp(1e-6, 1.0 - 1e-6);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence_network::edge::EdgeKind;
    use crate::evidence_network::node::NodeKind;

    #[test]
    fn ess_never_exceeds_particle_count() {
        let mut net = EvidenceNetwork::new();
        net.add_node("a", NodeKind::Domain, 0.7).unwrap();
        net.add_node("b", NodeKind::Domain, 0.3).unwrap();
        net.add_edge("a", "b", EdgeKind::Causal, 1.0).unwrap();

        let diagnostics = propagate(&mut net, 11, &HashMap::new()).unwrap();
        assert!(diagnostics.effective_sample_size <= diagnostics.particle_count as f64 + 1e-6);
        assert!(diagnostics.effective_sample_size >= 0.0);
    }

    #[test]
    fn beliefs_stay_in_unit_interval() {
        let mut net = EvidenceNetwork::new();
        net.add_node("a", NodeKind::Domain, 0.95).unwrap();
        propagate(&mut net, 3, &HashMap::new()).unwrap();
        let belief = net.node("a").unwrap().belief;
        assert!((0.0..=1.0).contains(&belief));
    }

    #[test]
    fn particle_count_override_is_reflected_in_diagnostics() {
        let mut net = EvidenceNetwork::new();
        net.add_node("a", NodeKind::Domain, 0.5).unwrap();
        let mut params = HashMap::new();
        params.insert("particle_count".to_string(), 64.0);
        let diagnostics = propagate(&mut net, 5, &params).unwrap();
        assert_eq!(diagnostics.particle_count, 64);
    }
}
