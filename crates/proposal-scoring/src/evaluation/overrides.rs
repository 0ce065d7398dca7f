use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{ActorId, ExtractedProposal, Requirement, RequirementId, ReviewComment, SupplierId};
use super::error::ScoringError;

/// Outcome bucket of an auto-scored matrix cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Pass,
    Partial,
    Fail,
    /// The supplier never addressed the requirement.
    Missing,
    /// Scoring this cell failed; the rest of the matrix is unaffected.
    Error,
}

impl CellStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CellStatus::Pass => "pass",
            CellStatus::Partial => "partial",
            CellStatus::Fail => "fail",
            CellStatus::Missing => "missing",
            CellStatus::Error => "error",
        }
    }
}

/// Machine-computed score for one requirement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoScore {
    pub raw_score: f64,
    pub rationale: String,
    pub status: CellStatus,
    #[serde(default)]
    pub differentiator: bool,
}

impl AutoScore {
    pub fn missing() -> Self {
        Self {
            raw_score: 0.0,
            rationale: "supplier did not address this requirement".to_string(),
            status: CellStatus::Missing,
            differentiator: false,
        }
    }
}

/// Reviewer-supplied replacement score with audit metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuyerOverride {
    pub override_score: f64,
    pub override_reason: String,
    pub overridden_at: DateTime<Utc>,
    pub overridden_by_user_id: ActorId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementScore {
    pub requirement_id: RequirementId,
    pub auto_score: AutoScore,
    #[serde(default)]
    pub buyer_override: Option<BuyerOverride>,
}

impl RequirementScore {
    pub fn new(requirement_id: RequirementId, auto_score: AutoScore) -> Self {
        Self {
            requirement_id,
            auto_score,
            buyer_override: None,
        }
    }

    pub fn effective_score(&self) -> f64 {
        match &self.buyer_override {
            Some(buyer_override) => buyer_override.override_score,
            None => self.auto_score.raw_score,
        }
    }

    /// Gap between the auto score and the effective score; 0 without an override.
    pub fn variance(&self) -> f64 {
        match &self.buyer_override {
            Some(_) => (self.auto_score.raw_score - self.effective_score()).abs(),
            None => 0.0,
        }
    }
}

/// Persisted requirement scores for one (opportunity, supplier) pair.
///
/// `version` increases on every write and backs optimistic concurrency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementScoreSet {
    pub supplier_id: SupplierId,
    pub version: u64,
    pub scores: Vec<RequirementScore>,
}

impl RequirementScoreSet {
    pub fn empty(supplier_id: SupplierId) -> Self {
        Self {
            supplier_id,
            version: 0,
            scores: Vec::new(),
        }
    }

    pub fn get(&self, requirement_id: &RequirementId) -> Option<&RequirementScore> {
        self.scores
            .iter()
            .find(|score| &score.requirement_id == requirement_id)
    }
}

/// Variance bucket shown next to overridden scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceLevel {
    Low,
    Medium,
    High,
}

/// Thresholds for variance buckets and must-have violations.
///
/// Defaults: variance below 10 is low, 10 through 25 medium, above 25 high;
/// a must-have requirement scoring below 50 is a violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverridePolicy {
    pub variance_low: f64,
    pub variance_high: f64,
    pub must_have_min_pass: f64,
}

impl Default for OverridePolicy {
    fn default() -> Self {
        Self {
            variance_low: 10.0,
            variance_high: 25.0,
            must_have_min_pass: 50.0,
        }
    }
}

impl OverridePolicy {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.variance_low >= 0.0 && self.variance_low <= self.variance_high) {
            return Err(format!(
                "variance thresholds must satisfy 0 <= low <= high (low {}, high {})",
                self.variance_low, self.variance_high
            ));
        }
        if !(0.0..=100.0).contains(&self.must_have_min_pass) {
            return Err(format!(
                "must-have minimum pass score must be within 0..=100, got {}",
                self.must_have_min_pass
            ));
        }
        Ok(())
    }

    pub fn variance_level(&self, variance: f64) -> VarianceLevel {
        if variance < self.variance_low {
            VarianceLevel::Low
        } else if variance <= self.variance_high {
            VarianceLevel::Medium
        } else {
            VarianceLevel::High
        }
    }

    pub fn must_have_violation(&self, requirement: &Requirement, score: &RequirementScore) -> bool {
        requirement.must_have && score.effective_score() < self.must_have_min_pass
    }
}

pub fn validate_override(score: f64, reason: &str) -> Result<(), ScoringError> {
    if !score.is_finite() || !(0.0..=100.0).contains(&score) {
        return Err(ScoringError::Validation(format!(
            "override score must be within 0..=100, got {score}"
        )));
    }
    if reason.trim().is_empty() {
        return Err(ScoringError::Validation(
            "override requires a justification".to_string(),
        ));
    }
    Ok(())
}

/// Fold previous overrides onto freshly computed auto scores.
///
/// Only `auto_score` comes from `fresh`; every `buyer_override` in `previous`
/// is copied forward untouched. Overridden requirements missing from `fresh`
/// keep their previous entry and are appended after the fresh ones.
pub fn merge_preserving_overrides(
    previous: &[RequirementScore],
    fresh: Vec<(RequirementId, AutoScore)>,
) -> Vec<RequirementScore> {
    let mut overrides: HashMap<&RequirementId, &BuyerOverride> = previous
        .iter()
        .filter_map(|score| {
            score
                .buyer_override
                .as_ref()
                .map(|buyer_override| (&score.requirement_id, buyer_override))
        })
        .collect();

    let mut merged: Vec<RequirementScore> = fresh
        .into_iter()
        .map(|(requirement_id, auto_score)| {
            let buyer_override = overrides.remove(&requirement_id).cloned();
            RequirementScore {
                requirement_id,
                auto_score,
                buyer_override,
            }
        })
        .collect();

    for score in previous {
        if overrides.contains_key(&score.requirement_id) {
            merged.push(score.clone());
        }
    }

    merged
}

/// Overridden requirements that the current template no longer defines.
pub fn orphaned_overrides<'a>(
    scores: &'a [RequirementScore],
    requirements: &[Requirement],
) -> Vec<&'a RequirementId> {
    scores
        .iter()
        .filter(|score| score.buyer_override.is_some())
        .filter(|score| {
            !requirements
                .iter()
                .any(|requirement| requirement.id == score.requirement_id)
        })
        .map(|score| &score.requirement_id)
        .collect()
}

pub(crate) fn apply_override(
    scores: &mut [RequirementScore],
    requirement_id: &RequirementId,
    buyer_override: BuyerOverride,
) -> Result<RequirementScore, ScoringError> {
    let score = scores
        .iter_mut()
        .find(|score| &score.requirement_id == requirement_id)
        .ok_or_else(|| ScoringError::not_found("requirement", requirement_id))?;
    score.buyer_override = Some(buyer_override);
    Ok(score.clone())
}

pub(crate) fn clear_override(
    scores: &mut [RequirementScore],
    requirement_id: &RequirementId,
) -> Result<RequirementScore, ScoringError> {
    let score = scores
        .iter_mut()
        .find(|score| &score.requirement_id == requirement_id)
        .ok_or_else(|| ScoringError::not_found("requirement", requirement_id))?;
    score.buyer_override = None;
    Ok(score.clone())
}

/// Evaluation-workspace row joining a score with requirement metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringItem {
    pub requirement_id: RequirementId,
    pub requirement_title: String,
    pub category: String,
    pub supplier_response_text: Option<String>,
    pub status: CellStatus,
    pub auto_score: f64,
    pub override_score: Option<f64>,
    pub override_justification: Option<String>,
    pub effective_score: f64,
    pub variance: f64,
    pub variance_level: VarianceLevel,
    pub must_have: bool,
    pub must_have_violation: bool,
    pub comments: Vec<ReviewComment>,
}

pub fn scoring_items(
    requirements: &[Requirement],
    scores: &RequirementScoreSet,
    proposal: &ExtractedProposal,
    comments: &[ReviewComment],
    policy: &OverridePolicy,
) -> Vec<ScoringItem> {
    requirements
        .iter()
        .map(|requirement| {
            let score = scores
                .get(&requirement.id)
                .cloned()
                .unwrap_or_else(|| RequirementScore::new(requirement.id.clone(), AutoScore::missing()));
            let variance = score.variance();
            let supplier_response_text = proposal
                .findings_for(requirement)
                .into_iter()
                .find_map(|finding| finding.response_text.clone());

            ScoringItem {
                requirement_id: requirement.id.clone(),
                requirement_title: requirement.title.clone(),
                category: requirement.category.clone(),
                supplier_response_text,
                status: score.auto_score.status,
                auto_score: score.auto_score.raw_score,
                override_score: score
                    .buyer_override
                    .as_ref()
                    .map(|buyer_override| buyer_override.override_score),
                override_justification: score
                    .buyer_override
                    .as_ref()
                    .map(|buyer_override| buyer_override.override_reason.clone()),
                effective_score: score.effective_score(),
                variance,
                variance_level: policy.variance_level(variance),
                must_have: requirement.must_have,
                must_have_violation: policy.must_have_violation(requirement, &score),
                comments: comments
                    .iter()
                    .filter(|comment| comment.requirement_id == requirement.id)
                    .cloned()
                    .collect(),
            }
        })
        .collect()
}
