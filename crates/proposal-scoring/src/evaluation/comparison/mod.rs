mod normalizer;
mod weights;

pub use normalizer::{normalize, NormalizedMetrics};
pub use weights::{criterion_metric, resolve_weights, ResolvedWeights, WeightVector};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{ExtractedProposal, SupplierId};
use super::metrics::{BaseMetrics, MetricKind};

/// Transparent composite score for one supplier in a comparison run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonBreakdown {
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub rank: usize,
    pub total_score: f64,
    /// Per-metric contribution, unrounded. Sums to `total_score` before the
    /// total is clamped and rounded to two decimals.
    pub weighted_scores: BTreeMap<MetricKind, f64>,
    pub metrics: NormalizedMetrics,
    pub raw: BaseMetrics,
    pub matrix_used: bool,
}

/// Weighted mean of normalised metrics, clamped to 0..=100 and rounded to two
/// decimals. Returns the total alongside each metric's exact contribution.
pub fn compare(
    normalized: &NormalizedMetrics,
    weights: &WeightVector,
) -> (f64, BTreeMap<MetricKind, f64>) {
    let total_weight = weights.total();
    let mut weighted_scores = BTreeMap::new();
    let mut total = 0.0;

    for (kind, weight) in weights.iter() {
        let contribution = if total_weight > 0.0 {
            weight * normalized.get(kind) / total_weight
        } else {
            0.0
        };
        total += contribution;
        weighted_scores.insert(kind, contribution);
    }

    (round2(total.clamp(0.0, 100.0)), weighted_scores)
}

/// Score every proposal against the pool and order them for presentation.
pub fn run_comparison(
    proposals: &[ExtractedProposal],
    weights: &ResolvedWeights,
) -> Vec<ComparisonBreakdown> {
    let pool: Vec<BaseMetrics> = proposals.iter().map(BaseMetrics::from_proposal).collect();
    let normalized = normalize(&pool);

    let breakdowns = proposals
        .iter()
        .zip(pool)
        .zip(normalized)
        .map(|((proposal, raw), metrics)| {
            let (total_score, weighted_scores) = compare(&metrics, &weights.weights);
            ComparisonBreakdown {
                supplier_id: proposal.supplier_id.clone(),
                supplier_name: proposal.display_name().to_string(),
                rank: 0,
                total_score,
                weighted_scores,
                metrics,
                raw,
                matrix_used: weights.matrix_used,
            }
        })
        .collect();

    rank(breakdowns)
}

/// Descending by total score, ties broken by supplier id; assigns 1-based ranks.
pub fn rank(mut breakdowns: Vec<ComparisonBreakdown>) -> Vec<ComparisonBreakdown> {
    breakdowns.sort_by(|left, right| {
        right
            .total_score
            .total_cmp(&left.total_score)
            .then_with(|| left.supplier_id.cmp(&right.supplier_id))
    });
    for (idx, breakdown) in breakdowns.iter_mut().enumerate() {
        breakdown.rank = idx + 1;
    }
    breakdowns
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
