//! Evidential Decision Core: fuzzy inference, a Bayesian evidence network, and a metacognitive
//! strategy optimizer, exposed behind a handle-oriented API and a JSON façade (`facade::handle`).

pub mod autobahn;
pub mod deadline;
pub mod error;
pub mod evidence_network;
pub mod facade;
pub mod fuzzy;
pub mod optimizer;
pub mod registry;
pub mod stats;

pub use error::{EdcError, Result};
pub use registry::{default_registries, DefaultRegistries, Handle, Registry};

/// Initializes the `log`/`env_logger` backend the rest of the crate logs through. Safe to call
/// more than once; only the first call takes effect. A host that already configures its own
/// `log` backend (e.g. embedding EDC inside a larger service) can skip this.
pub fn init_logging() {
    let _ = env_logger::try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registries_are_reachable() {
        let registries = default_registries();
        let handle = registries.networks.insert(evidence_network::EvidenceNetwork::new());
        assert!(registries.networks.get(handle).is_ok());
        registries.networks.destroy(handle).unwrap();
    }
}
