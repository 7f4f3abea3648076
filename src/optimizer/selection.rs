use super::context::DecisionContext;
use super::strategy::StrategyRecord;
use nalgebra::DVector;
use ordered_float::OrderedFloat;
use std::collections::HashMap;

/// Scoring weights for §4.3 step 2: `score = w_q·quality + w_e·efficiency − w_r·cost − w_u·uncertainty`.
const WEIGHT_QUALITY: f64 = 0.4;
const WEIGHT_EFFICIENCY: f64 = 0.3;
const WEIGHT_COST: f64 = 0.2;
const WEIGHT_UNCERTAINTY: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct ScoredStrategy {
    pub index: usize,
    pub score: f64,
    /// `(expected_quality, expected_efficiency)`, the coordinates MMR diversity is measured in.
    pub coordinates: DVector<f64>,
}

/// Score every applicable strategy in `portfolio` against `context` (§4.3 steps 1-2).
/// `uncertainty_penalty` comes from the bound network's Meta-node belief when one is available,
/// else falls back to `context.uncertainty_tolerance` as the prior.
pub fn score_candidates(
    portfolio: &[StrategyRecord],
    context: &DecisionContext,
    uncertainty_penalty: f64,
) -> Vec<ScoredStrategy> {
    let total_available: f64 = context.available_resources.values().sum::<f64>().max(1e-9);

    portfolio
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_applicable(|f| context.field(f)) && s.required_time <= context.time_budget)
        .map(|(index, s)| {
            let expected_quality = s.expected_gain.get("quality").copied().unwrap_or(0.0) * s.success_rate;
            let expected_efficiency = s.expected_gain.get("efficiency").copied().unwrap_or(0.0) * s.success_rate;
            let total_cost: f64 = s.resource_cost.values().sum();
            let normalized_cost = (total_cost / total_available).clamp(0.0, 1.0);

            let score = WEIGHT_QUALITY * expected_quality + WEIGHT_EFFICIENCY * expected_efficiency
                - WEIGHT_COST * normalized_cost
                - WEIGHT_UNCERTAINTY * uncertainty_penalty;

            ScoredStrategy {
                index,
                score,
                coordinates: DVector::from_vec(vec![expected_quality, expected_efficiency]),
            }
        })
        .collect()
}

/// MMR selection with λ = `1 − uncertainty_tolerance` (§4.3 step 3): greedily grow the selected
/// set, at each step favoring high score but increasingly favoring novelty (distance from
/// already-selected coordinates) as `uncertainty_tolerance` rises.
pub fn select_mmr(candidates: &[ScoredStrategy], uncertainty_tolerance: f64) -> Vec<usize> {
    if candidates.is_empty() {
        return Vec::new();
    }
    let lambda = (1.0 - uncertainty_tolerance).clamp(0.0, 1.0);

    let mut remaining: Vec<&ScoredStrategy> = candidates.iter().collect();
    remaining.sort_by_key(|c| std::cmp::Reverse(OrderedFloat(c.score)));

    let mut selected: Vec<&ScoredStrategy> = Vec::new();
    let mut pool = remaining;

    while !pool.is_empty() {
        let (best_pos, _) = pool
            .iter()
            .enumerate()
            .map(|(i, candidate)| {
                let diversity = selected
                    .iter()
                    .map(|s| (candidate.coordinates.clone() - s.coordinates.clone()).norm())
                    .fold(f64::INFINITY, f64::min);
                let diversity = if diversity.is_finite() { diversity } else { 0.0 };
                let mmr = lambda * candidate.score + (1.0 - lambda) * diversity;
                (i, mmr)
            })
            .max_by_key(|&(_, mmr)| OrderedFloat(mmr))
            .expect("pool is non-empty");

        let chosen = pool.remove(best_pos);
        // Only keep candidates whose score is non-negative; a strategy actively expected to hurt
        // outcomes should not ride along just to satisfy diversity.
        if chosen.score >= 0.0 {
            selected.push(chosen);
        }
    }

    selected.into_iter().map(|s| s.index).collect()
}

/// Outcome of proportional resource fitting: which of the `selected` candidates survived, and
/// the resource allocation given to each.
#[derive(Debug, Clone, Default)]
pub struct ResourcePlan {
    pub allocated: HashMap<String, HashMap<String, f64>>,
    pub dropped: Vec<usize>,
}

/// Proportional-fitting resource allocation with greedy repair (§4.3 step 4): distribute each
/// resource across `selected` strategies proportionally to score, clamp by each strategy's own
/// cost ceiling, and if the total still exceeds `available_resources`, drop the lowest-scoring
/// selected strategy and retry.
pub fn allocate_resources(
    portfolio: &[StrategyRecord],
    scored: &[ScoredStrategy],
    selected: &[usize],
    available_resources: &HashMap<String, f64>,
) -> ResourcePlan {
    let mut remaining: Vec<usize> = selected.to_vec();
    let mut dropped = Vec::new();

    loop {
        if remaining.is_empty() {
            return ResourcePlan { allocated: HashMap::new(), dropped };
        }

        let score_by_index: HashMap<usize, f64> =
            scored.iter().map(|s| (s.index, s.score.max(0.0))).collect();
        let score_total: f64 = remaining.iter().map(|i| score_by_index[i]).sum::<f64>().max(1e-9);

        let mut allocated: HashMap<String, HashMap<String, f64>> = HashMap::new();
        let mut overflow = false;

        for (resource, &available) in available_resources {
            let mut spent = 0.0;
            for &index in &remaining {
                let strategy = &portfolio[index];
                let share = available * (score_by_index[&index] / score_total);
                let ceiling = strategy.resource_cost.get(resource).copied().unwrap_or(0.0);
                let granted = share.min(ceiling);
                spent += granted;
                allocated.entry(strategy.id.clone()).or_default().insert(resource.clone(), granted);
            }
            if spent > available + 1e-6 {
                overflow = true;
            }
        }

        if !overflow {
            return ResourcePlan { allocated, dropped };
        }

        let worst = remaining
            .iter()
            .min_by_key(|i| OrderedFloat(score_by_index[i]))
            .copied()
            .expect("remaining is non-empty");
        remaining.retain(|&i| i != worst);
        dropped.push(worst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::portfolio::default_portfolio;
    use std::collections::HashSet;

    fn context() -> DecisionContext {
        let mut available_resources = HashMap::new();
        available_resources.insert("cpu".to_string(), 0.5);
        DecisionContext {
            query_complexity: 0.9,
            available_resources,
            quality_requirements: HashMap::new(),
            time_budget: 5.0,
            uncertainty_tolerance: 0.1,
            tags: HashSet::new(),
        }
    }

    #[test]
    fn strategies_exceeding_time_budget_are_excluded() {
        let mut portfolio = default_portfolio();
        portfolio[0].required_time = 999.0;
        let scored = score_candidates(&portfolio, &context(), 0.2);
        assert!(scored.iter().all(|s| s.index != 0));
    }

    #[test]
    fn resource_allocation_never_exceeds_available_cpu() {
        let portfolio = default_portfolio();
        let ctx = context();
        let scored = score_candidates(&portfolio, &ctx, 0.2);
        let selected = select_mmr(&scored, ctx.uncertainty_tolerance);
        let plan = allocate_resources(&portfolio, &scored, &selected, &ctx.available_resources);

        let total_cpu: f64 = plan
            .allocated
            .values()
            .filter_map(|resources| resources.get("cpu"))
            .sum();
        assert!(total_cpu <= ctx.available_resources["cpu"] + 1e-6);
    }
}
