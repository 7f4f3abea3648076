mod edge;
mod graph;
mod node;
mod propagation;
mod query;

pub use edge::{EdgeKind, EvidenceEdge};
pub use graph::{EvidenceNetwork, NetworkStatistics};
pub use node::{EvidenceNode, NodeKind};
pub use propagation::{McmcDiagnostics, ParticleFilterDiagnostics, PropagationAlgorithm, PropagationOutcome};
pub use query::{run as run_query, ConfidenceInterval, QueryResult, QuerySpec};

pub fn propagate(
    network: &mut EvidenceNetwork,
    algorithm: PropagationAlgorithm,
    deadline: Option<crate::deadline::Deadline>,
    params: &std::collections::HashMap<String, f64>,
) -> crate::error::Result<PropagationOutcome> {
    propagation::propagate(network, algorithm, deadline, params)
}
