mod belief_propagation;
mod mcmc;
mod particle_filter;
mod variational;

pub use mcmc::McmcDiagnostics;
pub use particle_filter::ParticleFilterDiagnostics;

use crate::deadline::Deadline;
use crate::error::Result;
use crate::evidence_network::graph::EvidenceNetwork;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which propagation algorithm to run (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropagationAlgorithm {
    /// Exact sum-product over the acyclic subgraph only.
    BeliefPropagation,
    /// Mean-field variational approximation over the whole graph.
    VariationalBayes,
    /// Seeded Gibbs sampling; requires a `seed` for determinism.
    Mcmc { seed: u64 },
    /// Sequential importance-resampling particle filter.
    ParticleFilter { seed: u64 },
}

/// The outcome of a propagation run, carrying whichever diagnostic its algorithm produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PropagationOutcome {
    BeliefPropagation,
    VariationalBayes { iterations: usize },
    Mcmc(McmcDiagnostics),
    ParticleFilter(ParticleFilterDiagnostics),
}

/// Runs `algorithm` against `network`. `deadline` is checked at every natural iteration boundary
/// inside the MCMC step loop and the variational iteration loop (§5 cancellation contract); belief
/// propagation and the particle filter do a single bounded pass, so they only check once at entry.
/// `params` overrides the algorithm's module-level sampling constants by name (§4.2 `propagate`'s
/// wire `params` map): `"burn_in"`, `"thinning"`, `"sample_count"`, `"proposal_sigma"` for MCMC;
/// `"particle_count"`, `"process_noise_sigma"` for the particle filter. Unrecognized keys are
/// ignored; keys an algorithm doesn't use are ignored too.
pub fn propagate(
    network: &mut EvidenceNetwork,
    algorithm: PropagationAlgorithm,
    deadline: Option<Deadline>,
    params: &HashMap<String, f64>,
) -> Result<PropagationOutcome> {
    if let Some(deadline) = deadline {
        deadline.check()?;
    }
    match algorithm {
        PropagationAlgorithm::BeliefPropagation => {
            belief_propagation::propagate(network)?;
            Ok(PropagationOutcome::BeliefPropagation)
        }
        PropagationAlgorithm::VariationalBayes => {
            let iterations = variational::propagate(network, deadline)?;
            Ok(PropagationOutcome::VariationalBayes { iterations })
        }
        PropagationAlgorithm::Mcmc { seed } => {
            let diagnostics = mcmc::propagate(network, seed, deadline, params)?;
            Ok(PropagationOutcome::Mcmc(diagnostics))
        }
        PropagationAlgorithm::ParticleFilter { seed } => {
            let diagnostics = particle_filter::propagate(network, seed, params)?;
            Ok(PropagationOutcome::ParticleFilter(diagnostics))
        }
    }
}
