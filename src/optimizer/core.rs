use super::context::{DecisionContext, StrategyOutcome};
use super::portfolio::default_portfolio;
use super::selection::{allocate_resources, score_candidates, select_mmr, ResourcePlan};
use super::strategy::StrategyRecord;
use crate::deadline::Deadline;
use crate::error::{EdcError, Result};
use crate::evidence_network::{EvidenceNetwork, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Bound on the optimizer's retained decision log (§4.3 `stats`: "decision log size").
const DECISION_LOG_CAPACITY: usize = 256;
/// Default EWMA smoothing factor for `success_rate` and `expected_gain` updates.
const DEFAULT_ALPHA: f64 = 0.2;
/// A realized outcome counts as a success when its quality meets or exceeds this threshold.
const SUCCESS_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub selected_strategy_ids: Vec<String>,
    pub resource_allocation: std::collections::HashMap<String, std::collections::HashMap<String, f64>>,
    pub dropped_strategy_ids: Vec<String>,
    pub predicted_gain: f64,
    pub rationale: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub selected_strategy_ids: Vec<String>,
    pub predicted_gain: f64,
    pub observed_quality: Option<f64>,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecisionScore {
    pub predicted_gain: f64,
    pub observed_quality: f64,
    pub error: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerStats {
    pub strategy_count: usize,
    pub average_success_rate: f64,
    pub decision_log_size: usize,
}

pub struct MetacognitiveOptimizer {
    portfolio: Vec<StrategyRecord>,
    decision_log: VecDeque<DecisionRecord>,
    alpha: f64,
}

impl Default for MetacognitiveOptimizer {
    fn default() -> Self {
        Self::new(None, DEFAULT_ALPHA)
    }
}

impl MetacognitiveOptimizer {
    pub fn new(seed_strategies: Option<Vec<StrategyRecord>>, alpha: f64) -> Self {
        Self {
            portfolio: seed_strategies.unwrap_or_else(default_portfolio),
            decision_log: VecDeque::with_capacity(DECISION_LOG_CAPACITY),
            alpha,
        }
    }

    /// §4.3 `optimize`: select a strategy bundle and resource plan for `context`, optionally
    /// reading the bound network's `Meta` node belief as the uncertainty-penalty prior. Checks
    /// `deadline` once at entry (§5) — candidate scoring and resource allocation are bounded by
    /// the portfolio size, not unbounded iteration, so there is no natural mid-operation
    /// checkpoint to add beyond the entry check.
    pub fn optimize(
        &mut self,
        context: &DecisionContext,
        network: Option<&EvidenceNetwork>,
        deadline: Option<Deadline>,
    ) -> Result<OptimizationResult> {
        if let Some(deadline) = deadline {
            deadline.check()?;
        }

        let uncertainty_penalty = network
            .and_then(|net| {
                net.node_names()
                    .find(|name| net.node(name).map(|n| n.kind == NodeKind::Meta).unwrap_or(false))
                    .and_then(|name| net.node(name).ok())
                    .map(|n| n.belief)
            })
            .unwrap_or(context.uncertainty_tolerance);

        let scored = score_candidates(&self.portfolio, context, uncertainty_penalty);
        if scored.is_empty() {
            log::info!("optimizer: no applicable strategy for context");
            return Ok(OptimizationResult {
                selected_strategy_ids: Vec::new(),
                resource_allocation: Default::default(),
                dropped_strategy_ids: Vec::new(),
                predicted_gain: 0.0,
                rationale: vec!["NoApplicableStrategy".to_string()],
            });
        }

        let selected = select_mmr(&scored, context.uncertainty_tolerance);
        let ResourcePlan { allocated, dropped } =
            allocate_resources(&self.portfolio, &scored, &selected, &context.available_resources);

        let selected_strategy_ids: Vec<String> = selected
            .iter()
            .filter(|i| !dropped.contains(i))
            .map(|&i| self.portfolio[i].id.clone())
            .collect();
        let dropped_strategy_ids: Vec<String> = dropped.iter().map(|&i| self.portfolio[i].id.clone()).collect();

        let predicted_gain: f64 = scored
            .iter()
            .filter(|s| selected_strategy_ids.contains(&self.portfolio[s.index].id))
            .map(|s| s.score)
            .sum();

        let rationale = vec![format!(
            "selected {} of {} applicable strategies, dropped {} for resource overflow",
            selected_strategy_ids.len(),
            scored.len(),
            dropped_strategy_ids.len()
        )];

        let result = OptimizationResult {
            selected_strategy_ids: selected_strategy_ids.clone(),
            resource_allocation: allocated,
            dropped_strategy_ids,
            predicted_gain,
            rationale,
        };

        self.record_decision(DecisionRecord {
            selected_strategy_ids,
            predicted_gain,
            observed_quality: None,
            recorded_at: chrono::Utc::now(),
        });

        Ok(result)
    }

    fn record_decision(&mut self, record: DecisionRecord) {
        if self.decision_log.len() == DECISION_LOG_CAPACITY {
            self.decision_log.pop_front();
        }
        self.decision_log.push_back(record);
    }

    /// §4.3 `evaluate_decision`: compare the most recent matching decision's predicted gain
    /// against an observed outcome.
    pub fn evaluate_decision(&mut self, result: &OptimizationResult, observed_quality: f64) -> Result<DecisionScore> {
        if !(0.0..=1.0).contains(&observed_quality) {
            return Err(EdcError::invalid_input("InconsistentFeedback: observed_quality must be in [0, 1]"));
        }
        if let Some(record) = self
            .decision_log
            .iter_mut()
            .rev()
            .find(|r| r.selected_strategy_ids == result.selected_strategy_ids)
        {
            record.observed_quality = Some(observed_quality);
        }
        Ok(DecisionScore {
            predicted_gain: result.predicted_gain,
            observed_quality,
            error: (result.predicted_gain - observed_quality).abs(),
        })
    }

    /// §4.3 `update_strategy_performance`: EWMA-update `success_rate` and every `expected_gain`
    /// dimension named in `outcome`, with 3σ outlier clipping handled by `StrategyRecord`.
    pub fn update_strategy_performance(&mut self, strategy_id: &str, outcome: &StrategyOutcome) -> Result<()> {
        if !(0.0..=1.0).contains(&outcome.user_feedback) {
            return Err(EdcError::invalid_input("InconsistentFeedback: user_feedback must be in [0, 1]"));
        }
        let strategy = self
            .portfolio
            .iter_mut()
            .find(|s| s.id == strategy_id)
            .ok_or_else(|| EdcError::invalid_input(format!("unknown strategy '{strategy_id}'")))?;

        let clipped_quality = strategy.record_outcome(outcome.quality_achieved);
        let indicator = if clipped_quality >= SUCCESS_THRESHOLD { 1.0 } else { 0.0 };
        strategy.success_rate = self.alpha * indicator + (1.0 - self.alpha) * strategy.success_rate;

        let realized_gain = clipped_quality * outcome.user_feedback;
        let entry = strategy.expected_gain.entry("quality".to_string()).or_insert(realized_gain);
        *entry = self.alpha * realized_gain + (1.0 - self.alpha) * *entry;

        log::debug!("optimizer: strategy '{strategy_id}' success_rate -> {:.3}", strategy.success_rate);
        Ok(())
    }

    pub fn stats(&self) -> OptimizerStats {
        let average_success_rate = if self.portfolio.is_empty() {
            0.0
        } else {
            self.portfolio.iter().map(|s| s.success_rate).sum::<f64>() / self.portfolio.len() as f64
        };
        OptimizerStats {
            strategy_count: self.portfolio.len(),
            average_success_rate,
            decision_log_size: self.decision_log.len(),
        }
    }
}
