use crate::error::{EdcError, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

/// The façade (§4.5) is synchronous end to end except for this one delegation path (§4.6
/// "Suspension points"). A single lazily-built multi-thread runtime drives whatever
/// [`RemoteReasoner`] future a caller hands to [`block_on`], so the façade never needs its own
/// `#[tokio::main]` entry point.
static RUNTIME: Lazy<tokio::runtime::Runtime> = Lazy::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .build()
        .expect("tokio runtime construction should never fail")
});

/// Blocks the calling thread until `future` resolves, on the shared remote-bridge runtime.
pub fn block_on<F: Future>(future: F) -> F::Output {
    RUNTIME.block_on(future)
}

/// Environment variable naming an optional remote reasoning endpoint (§9 "Remote bridge").
pub const REMOTE_ENDPOINT_ENV: &str = "EDC_REMOTE_ENDPOINT";

/// A response from a remote reasoner. `opaque_metrics` carries whatever the remote collaborator
/// reports (consciousness level, ATP consumption, membrane coherence, and similar "autobahn"
/// diagnostics) untouched: the core never parses or acts on it (§9 Open Question (a)).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub value: f64,
    pub opaque_metrics: Value,
}

/// Narrow capability a remote collaborator may provide. Distinct from the core registries:
/// nothing in this crate requires one to exist, and the default configuration has none.
#[async_trait]
pub trait RemoteReasoner: Send + Sync {
    async fn bayesian_inference(&self, node_beliefs: &[(String, f64)]) -> Result<RemoteResponse>;
    async fn fuzzy_logic(&self, memberships: &[(String, f64)]) -> Result<RemoteResponse>;
    async fn network_update(&self, network_stats: &Value) -> Result<RemoteResponse>;
}

/// HTTP-backed [`RemoteReasoner`] talking to an endpoint read from [`REMOTE_ENDPOINT_ENV`].
pub struct HttpRemoteReasoner {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl HttpRemoteReasoner {
    fn new(base_url: reqwest::Url) -> Self {
        Self { client: reqwest::Client::new(), base_url }
    }

    async fn post(&self, path: &str, body: &Value) -> Result<RemoteResponse> {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| EdcError::internal(format!("bad remote path '{path}': {e}")))?;
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| EdcError::resource(format!("remote reasoner request failed: {e}")))?;

        response
            .json::<RemoteResponse>()
            .await
            .map_err(|e| EdcError::resource(format!("remote reasoner returned an unparseable body: {e}")))
    }
}

#[async_trait]
impl RemoteReasoner for HttpRemoteReasoner {
    async fn bayesian_inference(&self, node_beliefs: &[(String, f64)]) -> Result<RemoteResponse> {
        self.post("bayesian_inference", &serde_json::json!({ "node_beliefs": node_beliefs })).await
    }

    async fn fuzzy_logic(&self, memberships: &[(String, f64)]) -> Result<RemoteResponse> {
        self.post("fuzzy_logic", &serde_json::json!({ "memberships": memberships })).await
    }

    async fn network_update(&self, network_stats: &Value) -> Result<RemoteResponse> {
        self.post("network_update", network_stats).await
    }
}

/// Reads [`REMOTE_ENDPOINT_ENV`]; returns `None` if it is unset (the common case), `Some` if a
/// well-formed URL is configured, or `Err` on a malformed value — a startup configuration
/// failure, not a runtime one (§9).
pub fn detect_remote_reasoner() -> Result<Option<HttpRemoteReasoner>> {
    let Ok(raw) = std::env::var(REMOTE_ENDPOINT_ENV) else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let url = reqwest::Url::parse(&raw).map_err(|e| {
        EdcError::invalid_input(format!("{REMOTE_ENDPOINT_ENV} is not a valid URL: {e}"))
    })?;
    log::info!("autobahn: remote reasoner configured at {url}");
    Ok(Some(HttpRemoteReasoner::new(url)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_endpoint_yields_no_reasoner() {
        std::env::remove_var(REMOTE_ENDPOINT_ENV);
        let result = detect_remote_reasoner().unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn malformed_endpoint_is_a_configuration_error() {
        std::env::set_var(REMOTE_ENDPOINT_ENV, "not a url");
        let result = detect_remote_reasoner();
        std::env::remove_var(REMOTE_ENDPOINT_ENV);
        assert!(result.is_err());
    }
}
