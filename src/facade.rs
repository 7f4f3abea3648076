use crate::deadline::Deadline;
use crate::error::{EdcError, Result, WireError};
use crate::evidence_network::{
    EdgeKind, EvidenceNetwork, NodeKind, PropagationAlgorithm, QueryResult, QuerySpec,
};
use crate::fuzzy::{FuzzyEvidence, FuzzyInferenceEngine, FuzzyRule, FuzzySet, MembershipFunction};
use crate::optimizer::{DecisionContext, MetacognitiveOptimizer, StrategyOutcome};
use crate::registry::{default_registries, Handle};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

fn to_deadline(deadline_ms: Option<u64>) -> Option<Deadline> {
    deadline_ms.map(|ms| Deadline::from_now(Duration::from_millis(ms)))
}

/// Dispatches one wire-level operation (§6). Every call is infallible at the Rust boundary: a
/// failure inside the operation becomes `{"error": WireError}` rather than propagating a panic
/// or an `Err` across the JSON seam.
pub fn handle(op: &str, params: Value) -> Value {
    match dispatch(op, params) {
        Ok(value) => json!({ "ok": value }),
        Err(err) => json!({ "error": WireError::from(&err) }),
    }
}

fn parse<T: for<'de> Deserialize<'de>>(params: Value) -> Result<T> {
    serde_json::from_value(params).map_err(|e| EdcError::invalid_input(format!("bad params: {e}")))
}

fn dispatch(op: &str, params: Value) -> Result<Value> {
    match op {
        "fuzzy.create_set" => fuzzy_create_set(parse(params)?),
        "fuzzy.add_rule" => fuzzy_add_rule(parse(params)?),
        "fuzzy.inference" => fuzzy_inference(parse(params)?),
        "fuzzy.defuzzify" => fuzzy_defuzzify(parse(params)?),
        "fuzzy.combine_evidence" => fuzzy_combine_evidence(parse(params)?),

        "net.create" => net_create(),
        "net.add_node" => net_add_node(parse(params)?),
        "net.add_edge" => net_add_edge(parse(params)?),
        "net.update_evidence" => net_update_evidence(parse(params)?),
        "net.propagate" => net_propagate(parse(params)?),
        "net.query" => net_query(parse(params)?),
        "net.stats" => net_stats(parse(params)?),

        "opt.create" => opt_create(),
        "opt.optimize" => opt_optimize(parse(params)?),
        "opt.evaluate" => opt_evaluate(parse(params)?),
        "opt.update" => opt_update(parse(params)?),
        "opt.stats" => opt_stats(parse(params)?),

        "remote.bayesian_inference" => remote_bayesian_inference(parse(params)?),
        "remote.fuzzy_logic" => remote_fuzzy_logic(parse(params)?),
        "remote.network_update" => remote_network_update(parse(params)?),

        other => Err(EdcError::invalid_input(format!("unknown operation '{other}'"))),
    }
}

#[derive(Deserialize)]
struct NetHandleParam {
    handle: Handle<EvidenceNetwork>,
}

#[derive(Deserialize)]
struct OptHandleParam {
    handle: Handle<MetacognitiveOptimizer>,
}

// ---- fuzzy.* --------------------------------------------------------------

#[derive(Deserialize)]
struct CreateSetParams {
    handle: Option<Handle<FuzzyInferenceEngine>>,
    name: String,
    universe_min: f64,
    universe_max: f64,
    membership_function: MembershipFunction,
}

fn fuzzy_create_set(params: CreateSetParams) -> Result<Value> {
    let registries = default_registries();
    let handle = match params.handle {
        Some(handle) => handle,
        None => registries.fuzzy_engines.insert(FuzzyInferenceEngine::new()),
    };
    let engine = registries.fuzzy_engines.get(handle)?;
    let set = FuzzySet::new(params.name, params.universe_min, params.universe_max, params.membership_function)?;
    engine.write().add_fuzzy_set(set)?;
    Ok(json!({ "handle": handle.id() }))
}

#[derive(Deserialize)]
struct AddRuleParams {
    handle: Handle<FuzzyInferenceEngine>,
    rule: FuzzyRule,
}

fn fuzzy_add_rule(params: AddRuleParams) -> Result<Value> {
    let engine = default_registries().fuzzy_engines.get(params.handle)?;
    engine.write().add_rule(params.rule)?;
    Ok(Value::Null)
}

#[derive(Deserialize)]
struct InferenceParams {
    handle: Handle<FuzzyInferenceEngine>,
    inputs: HashMap<String, f64>,
}

fn fuzzy_inference(params: InferenceParams) -> Result<Value> {
    let engine = default_registries().fuzzy_engines.get(params.handle)?;
    let outputs = engine.read().inference(&params.inputs)?;
    serde_json::to_value(outputs).map_err(|e| EdcError::internal(e.to_string()))
}

#[derive(Deserialize)]
struct DefuzzifyParams {
    handle: Handle<FuzzyInferenceEngine>,
    output: crate::fuzzy::FuzzyOutputSet,
    method: crate::fuzzy::DefuzzifyMethod,
}

fn fuzzy_defuzzify(params: DefuzzifyParams) -> Result<Value> {
    let engine = default_registries().fuzzy_engines.get(params.handle)?;
    let value = engine.read().defuzzify(&params.output, params.method)?;
    Ok(json!({ "value": value }))
}

#[derive(Deserialize)]
struct CombineEvidenceParams {
    handle: Handle<FuzzyInferenceEngine>,
    evidences: Vec<FuzzyEvidence>,
}

fn fuzzy_combine_evidence(params: CombineEvidenceParams) -> Result<Value> {
    let engine = default_registries().fuzzy_engines.get(params.handle)?;
    let combined = engine.read().combine_evidence(&params.evidences)?;
    serde_json::to_value(combined).map_err(|e| EdcError::internal(e.to_string()))
}

// ---- net.* -----------------------------------------------------------------

fn net_create() -> Result<Value> {
    let handle = default_registries().networks.insert(EvidenceNetwork::new());
    Ok(json!({ "handle": handle.id() }))
}

#[derive(Deserialize)]
struct AddNodeParams {
    handle: Handle<EvidenceNetwork>,
    name: String,
    kind: NodeKind,
    prior: f64,
}

fn net_add_node(params: AddNodeParams) -> Result<Value> {
    let net = default_registries().networks.get(params.handle)?;
    net.write().add_node(params.name, params.kind, params.prior)?;
    Ok(Value::Null)
}

#[derive(Deserialize)]
struct AddEdgeParams {
    handle: Handle<EvidenceNetwork>,
    from: String,
    to: String,
    kind: EdgeKind,
    weight: f64,
}

fn net_add_edge(params: AddEdgeParams) -> Result<Value> {
    let net = default_registries().networks.get(params.handle)?;
    net.write().add_edge(&params.from, &params.to, params.kind, params.weight)?;
    Ok(Value::Null)
}

#[derive(Deserialize)]
struct UpdateEvidenceParams {
    handle: Handle<EvidenceNetwork>,
    node: String,
    evidence: FuzzyEvidence,
}

fn net_update_evidence(params: UpdateEvidenceParams) -> Result<Value> {
    let net = default_registries().networks.get(params.handle)?;
    net.write().update_node_evidence(&params.node, params.evidence)?;
    Ok(Value::Null)
}

#[derive(Deserialize)]
struct PropagateParams {
    handle: Handle<EvidenceNetwork>,
    algorithm: PropagationAlgorithm,
    deadline_ms: Option<u64>,
    #[serde(default)]
    params: HashMap<String, f64>,
}

fn net_propagate(params: PropagateParams) -> Result<Value> {
    let net = default_registries().networks.get(params.handle)?;
    let outcome = crate::evidence_network::propagate(
        &mut net.write(),
        params.algorithm,
        to_deadline(params.deadline_ms),
        &params.params,
    )?;
    serde_json::to_value(outcome).map_err(|e| EdcError::internal(e.to_string()))
}

#[derive(Deserialize)]
struct QueryParams {
    handle: Handle<EvidenceNetwork>,
    query: WireQuerySpec,
    deadline_ms: Option<u64>,
}

/// A wire-friendly mirror of [`QuerySpec`]; kept separate so the JSON shape does not have to
/// track internal field renames in the native enum.
#[derive(Deserialize)]
#[serde(tag = "type")]
enum WireQuerySpec {
    Marginal { node: String },
    Conditional { node: String, given: Vec<(String, f64)>, confidence_level: f64 },
    Mpe { algorithm: PropagationAlgorithm, seed: u64, #[serde(default)] scope: Vec<String> },
    Sensitivity { target: String, wrt: Vec<String>, algorithm: PropagationAlgorithm },
    WhatIf { interventions: Vec<(String, f64)>, algorithm: PropagationAlgorithm },
}

impl From<WireQuerySpec> for QuerySpec {
    fn from(spec: WireQuerySpec) -> Self {
        match spec {
            WireQuerySpec::Marginal { node } => QuerySpec::Marginal { node },
            WireQuerySpec::Conditional { node, given, confidence_level } => {
                QuerySpec::Conditional { node, given, confidence_level }
            }
            WireQuerySpec::Mpe { algorithm, seed, scope } => QuerySpec::Mpe { algorithm, seed, scope },
            WireQuerySpec::Sensitivity { target, wrt, algorithm } => {
                QuerySpec::Sensitivity { target, wrt, algorithm }
            }
            WireQuerySpec::WhatIf { interventions, algorithm } => QuerySpec::WhatIf { interventions, algorithm },
        }
    }
}

fn net_query(params: QueryParams) -> Result<Value> {
    let net = default_registries().networks.get(params.handle)?;
    let deadline = to_deadline(params.deadline_ms);
    let result: QueryResult = crate::evidence_network::run_query(&net.read(), params.query.into(), deadline)?;
    serde_json::to_value(result).map_err(|e| EdcError::internal(e.to_string()))
}

fn net_stats(params: NetHandleParam) -> Result<Value> {
    let net = default_registries().networks.get(params.handle)?;
    serde_json::to_value(net.read().statistics()).map_err(|e| EdcError::internal(e.to_string()))
}

// ---- opt.* -----------------------------------------------------------------

fn opt_create() -> Result<Value> {
    let handle = default_registries().optimizers.insert(MetacognitiveOptimizer::default());
    Ok(json!({ "handle": handle.id() }))
}

#[derive(Deserialize)]
struct OptimizeParams {
    handle: Handle<MetacognitiveOptimizer>,
    context: DecisionContext,
    network_handle: Option<Handle<EvidenceNetwork>>,
    deadline_ms: Option<u64>,
}

fn opt_optimize(params: OptimizeParams) -> Result<Value> {
    let registries = default_registries();
    let opt = registries.optimizers.get(params.handle)?;

    let network_arc = match params.network_handle {
        Some(net_handle) => Some(registries.networks.get(net_handle)?),
        None => None,
    };
    let network_guard = network_arc.as_ref().map(|arc| arc.read());
    let network_ref = network_guard.as_deref();

    let result = opt.write().optimize(&params.context, network_ref, to_deadline(params.deadline_ms))?;
    serde_json::to_value(result).map_err(|e| EdcError::internal(e.to_string()))
}

#[derive(Deserialize)]
struct EvaluateParams {
    handle: Handle<MetacognitiveOptimizer>,
    result: crate::optimizer::OptimizationResult,
    observed_quality: f64,
}

fn opt_evaluate(params: EvaluateParams) -> Result<Value> {
    let opt = default_registries().optimizers.get(params.handle)?;
    let score = opt.write().evaluate_decision(&params.result, params.observed_quality)?;
    serde_json::to_value(score).map_err(|e| EdcError::internal(e.to_string()))
}

#[derive(Deserialize)]
struct UpdateParams {
    handle: Handle<MetacognitiveOptimizer>,
    strategy_id: String,
    outcome: StrategyOutcome,
}

fn opt_update(params: UpdateParams) -> Result<Value> {
    let opt = default_registries().optimizers.get(params.handle)?;
    opt.write().update_strategy_performance(&params.strategy_id, &params.outcome)?;
    Ok(Value::Null)
}

fn opt_stats(params: OptHandleParam) -> Result<Value> {
    let opt = default_registries().optimizers.get(params.handle)?;
    serde_json::to_value(opt.read().stats()).map_err(|e| EdcError::internal(e.to_string()))
}

// ---- remote.* ----------------------------------------------------------------
//
// The only I/O-bound, suspending path behind the façade (§4.6 "Suspension points"). Absent
// `EDC_REMOTE_ENDPOINT`, every one of these ops is a validation error — there is no in-process
// fallback implementation to delegate to instead, matching the source's "absence is the default"
// behavior.

#[derive(Deserialize)]
struct BayesianInferenceParams {
    node_beliefs: Vec<(String, f64)>,
}

fn remote_bayesian_inference(params: BayesianInferenceParams) -> Result<Value> {
    let reasoner = crate::autobahn::detect_remote_reasoner()?
        .ok_or_else(|| EdcError::resource(format!("{} is not set", crate::autobahn::REMOTE_ENDPOINT_ENV)))?;
    let response = crate::autobahn::block_on(reasoner.bayesian_inference(&params.node_beliefs))?;
    serde_json::to_value(response).map_err(|e| EdcError::internal(e.to_string()))
}

#[derive(Deserialize)]
struct FuzzyLogicParams {
    memberships: Vec<(String, f64)>,
}

fn remote_fuzzy_logic(params: FuzzyLogicParams) -> Result<Value> {
    let reasoner = crate::autobahn::detect_remote_reasoner()?
        .ok_or_else(|| EdcError::resource(format!("{} is not set", crate::autobahn::REMOTE_ENDPOINT_ENV)))?;
    let response = crate::autobahn::block_on(reasoner.fuzzy_logic(&params.memberships))?;
    serde_json::to_value(response).map_err(|e| EdcError::internal(e.to_string()))
}

#[derive(Deserialize)]
struct NetworkUpdateParams {
    network_stats: Value,
}

fn remote_network_update(params: NetworkUpdateParams) -> Result<Value> {
    let reasoner = crate::autobahn::detect_remote_reasoner()?
        .ok_or_else(|| EdcError::resource(format!("{} is not set", crate::autobahn::REMOTE_ENDPOINT_ENV)))?;
    let response = crate::autobahn::block_on(reasoner.network_update(&params.network_stats))?;
    serde_json::to_value(response).map_err(|e| EdcError::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_operation_is_reported_as_invalid_input() {
        let response = handle("fuzzy.nonexistent", json!({}));
        assert_eq!(response["error"]["kind"], "InvalidInput");
    }

    #[test]
    fn net_create_returns_a_handle() {
        let response = handle("net.create", json!({}));
        assert!(response["ok"]["handle"].is_u64());
    }

    #[test]
    fn remote_op_without_an_endpoint_is_a_resource_error() {
        std::env::remove_var(crate::autobahn::REMOTE_ENDPOINT_ENV);
        let response = handle("remote.bayesian_inference", json!({ "node_beliefs": [] }));
        assert_eq!(response["error"]["kind"], "Resource");
    }

    #[test]
    fn opt_create_and_stats_round_trip() {
        let created = handle("opt.create", json!({}));
        let handle_id = created["ok"]["handle"].as_u64().unwrap();
        let stats = handle("opt.stats", json!({ "handle": handle_id }));
        assert_eq!(stats["ok"]["strategy_count"], 8);
    }
}
