use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::super::domain::EvaluationMatrix;
use super::super::error::ScoringError;
use super::super::metrics::MetricKind;

const DEFAULT_WEIGHTS: [(MetricKind, f64); 6] = [
    (MetricKind::Price, 0.30),
    (MetricKind::RequirementsCoverage, 0.30),
    (MetricKind::RiskExposure, 0.15),
    (MetricKind::TechnicalDepth, 0.10),
    (MetricKind::Differentiation, 0.10),
    (MetricKind::DemoQuality, 0.05),
];

/// Non-negative per-metric weights with a strictly positive sum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightVector {
    weights: BTreeMap<MetricKind, f64>,
}

impl WeightVector {
    pub fn new(weights: BTreeMap<MetricKind, f64>) -> Result<Self, ScoringError> {
        if let Some((kind, weight)) = weights
            .iter()
            .find(|(_, weight)| !weight.is_finite() || **weight < 0.0)
        {
            return Err(ScoringError::Validation(format!(
                "weight for {} must be a non-negative number, got {weight}",
                kind.label()
            )));
        }

        let total: f64 = weights.values().sum();
        if total <= 0.0 {
            return Err(ScoringError::Validation(
                "weight vector must sum to a positive value".to_string(),
            ));
        }

        Ok(Self { weights })
    }

    pub fn get(&self, kind: MetricKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKind, f64)> + '_ {
        self.weights.iter().map(|(kind, weight)| (*kind, *weight))
    }

    /// Multiply every weight by `factor`; the ranking is unaffected.
    pub fn scaled(&self, factor: f64) -> Result<Self, ScoringError> {
        Self::new(
            self.weights
                .iter()
                .map(|(kind, weight)| (*kind, weight * factor))
                .collect(),
        )
    }
}

impl Default for WeightVector {
    fn default() -> Self {
        Self {
            weights: DEFAULT_WEIGHTS.into_iter().collect(),
        }
    }
}

/// Weight vector plus whether a buyer-authored matrix produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedWeights {
    pub weights: WeightVector,
    pub matrix_used: bool,
}

impl ResolvedWeights {
    pub fn defaults() -> Self {
        Self {
            weights: WeightVector::default(),
            matrix_used: false,
        }
    }
}

/// Fixed mapping from buyer criterion names onto engine metrics.
pub fn criterion_metric(name: &str) -> Option<MetricKind> {
    let name = name.trim().to_ascii_lowercase();
    let matches = |needles: &[&str]| needles.iter().any(|needle| name.contains(needle));

    if matches(&["price", "cost", "pricing", "commercial"]) {
        Some(MetricKind::Price)
    } else if matches(&["requirement", "coverage", "functional", "scope"]) {
        Some(MetricKind::RequirementsCoverage)
    } else if matches(&["risk"]) {
        Some(MetricKind::RiskExposure)
    } else if matches(&["technical", "technology", "architecture", "security"]) {
        Some(MetricKind::TechnicalDepth)
    } else if matches(&["differentiat", "innovation", "value add"]) {
        Some(MetricKind::Differentiation)
    } else if matches(&["demo", "presentation"]) {
        Some(MetricKind::DemoQuality)
    } else {
        None
    }
}

/// Convert a buyer matrix into engine weights.
///
/// Mapped criteria are normalised to sum to one and used as-is for their
/// slots. Slots no criterion maps onto keep their default weight, so a matrix
/// naming only "Price" still leaves coverage, risk and the rest in play; a
/// price-only ranking needs an explicit [`WeightVector`]. Falls back to the
/// defaults (logged) when nothing usable maps.
pub fn resolve_weights(matrix: Option<&EvaluationMatrix>) -> ResolvedWeights {
    let Some(matrix) = matrix else {
        return ResolvedWeights::defaults();
    };

    let mut mapped: BTreeMap<MetricKind, f64> = BTreeMap::new();
    for criterion in &matrix.criteria {
        if !criterion.weight.is_finite() || criterion.weight < 0.0 {
            warn!(
                criterion = %criterion.name,
                weight = criterion.weight,
                "dropping criterion with invalid weight"
            );
            continue;
        }
        match criterion_metric(&criterion.name) {
            Some(kind) => *mapped.entry(kind).or_insert(0.0) += criterion.weight,
            None => {
                warn!(criterion = %criterion.name, "dropping unmapped evaluation criterion");
            }
        }
    }

    let mapped_total: f64 = mapped.values().sum();
    if mapped.is_empty() || mapped_total <= 0.0 {
        warn!("evaluation matrix produced no usable weights; using default weights");
        return ResolvedWeights::defaults();
    }

    let defaults = WeightVector::default();
    let weights: BTreeMap<MetricKind, f64> = MetricKind::ordered()
        .into_iter()
        .map(|kind| {
            let weight = match mapped.get(&kind) {
                Some(weight) => weight / mapped_total,
                None => defaults.get(kind),
            };
            (kind, weight)
        })
        .collect();

    match WeightVector::new(weights) {
        Ok(weights) => ResolvedWeights {
            weights,
            matrix_used: true,
        },
        Err(err) => {
            warn!(error = %err, "evaluation matrix weights rejected; using default weights");
            ResolvedWeights::defaults()
        }
    }
}
