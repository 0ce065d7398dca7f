use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::super::domain::SupplierId;
use super::super::metrics::{BaseMetrics, MetricDirection, MetricKind};

/// Metrics rescaled onto 0..=100 relative to the supplier pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMetrics {
    pub supplier_id: SupplierId,
    pub scores: BTreeMap<MetricKind, f64>,
    /// Metrics the extractor could not determine; they normalise to 0.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unknown: Vec<MetricKind>,
}

impl NormalizedMetrics {
    pub fn get(&self, kind: MetricKind) -> f64 {
        self.scores.get(&kind).copied().unwrap_or(0.0)
    }
}

/// Min/max rescale each metric across the pool.
///
/// When every known value of a metric is equal (including a pool of one) the
/// metric collapses to 100 for all suppliers, as there is nothing to separate
/// them. Output order matches input order.
pub fn normalize(pool: &[BaseMetrics]) -> Vec<NormalizedMetrics> {
    let bounds: BTreeMap<MetricKind, Option<(f64, f64)>> = MetricKind::ordered()
        .into_iter()
        .map(|kind| (kind, pool_bounds(pool, kind)))
        .collect();

    pool.iter()
        .map(|metrics| {
            let mut scores = BTreeMap::new();
            let mut unknown = Vec::new();

            for kind in MetricKind::ordered() {
                let score = match (metrics.value(kind), bounds.get(&kind).copied().flatten()) {
                    (Some(value), Some((min, max))) => rescale(value, min, max, kind.direction()),
                    _ => {
                        unknown.push(kind);
                        0.0
                    }
                };
                scores.insert(kind, score);
            }

            NormalizedMetrics {
                supplier_id: metrics.supplier_id.clone(),
                scores,
                unknown,
            }
        })
        .collect()
}

fn pool_bounds(pool: &[BaseMetrics], kind: MetricKind) -> Option<(f64, f64)> {
    pool.iter()
        .filter_map(|metrics| metrics.value(kind))
        .filter(|value| value.is_finite())
        .fold(None, |bounds, value| match bounds {
            None => Some((value, value)),
            Some((min, max)) => Some((f64::min(min, value), f64::max(max, value))),
        })
}

pub(crate) fn rescale(value: f64, min: f64, max: f64, direction: MetricDirection) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let span = max - min;
    if span.abs() < f64::EPSILON {
        return 100.0;
    }

    let scaled = match direction {
        MetricDirection::HigherIsBetter => 100.0 * (value - min) / span,
        MetricDirection::LowerIsBetter => 100.0 * (max - value) / span,
    };
    scaled.clamp(0.0, 100.0)
}
