use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::warn;

use super::super::comparison::round2;
use super::super::domain::{ComplianceLevel, ExtractedProposal, Requirement, RequirementId, SupplierId};
use super::super::error::ScoringError;
use super::super::overrides::{
    merge_preserving_overrides, AutoScore, CellStatus, OverridePolicy, RequirementScore,
    RequirementScoreSet,
};
use super::{MatrixMeta, RequirementRow, ScoringMatrix, SupplierCell, SupplierSummary};

const DIFFERENTIATOR_BONUS: f64 = 10.0;

/// Scoring failure confined to a single cell.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CellError {
    #[error("conflicting coverage findings ({0})")]
    ConflictingFindings(String),
}

/// Auto-score one requirement for one proposal.
pub fn score_cell(
    requirement: &Requirement,
    proposal: &ExtractedProposal,
) -> Result<AutoScore, CellError> {
    let findings = proposal.findings_for(requirement);
    if findings.is_empty() {
        return Ok(AutoScore::missing());
    }

    let levels: BTreeSet<&'static str> = findings
        .iter()
        .filter(|finding| finding.level != ComplianceLevel::Unknown)
        .map(|finding| level_label(finding.level))
        .collect();
    if levels.len() > 1 {
        return Err(CellError::ConflictingFindings(
            levels.into_iter().collect::<Vec<_>>().join(" vs "),
        ));
    }

    let level = findings
        .iter()
        .map(|finding| finding.level)
        .find(|level| *level != ComplianceLevel::Unknown)
        .unwrap_or(ComplianceLevel::Unknown);

    let (base, status, mut rationale) = match level {
        ComplianceLevel::FullyMet => (100.0, CellStatus::Pass, "requirement fully met".to_string()),
        ComplianceLevel::PartiallyMet => (
            50.0,
            CellStatus::Partial,
            "requirement partially met".to_string(),
        ),
        ComplianceLevel::NotMet => (0.0, CellStatus::Fail, "requirement not met".to_string()),
        ComplianceLevel::Unknown => (
            25.0,
            CellStatus::Partial,
            "response present but compliance could not be determined".to_string(),
        ),
    };

    if let Some(evidence) = findings.iter().find_map(|finding| finding.evidence.as_deref()) {
        rationale.push_str(&format!("; evidence: {evidence}"));
    }

    let differentiator =
        level != ComplianceLevel::NotMet && proposal.differentiates(&requirement.id);
    let raw_score = if differentiator {
        rationale.push_str(&format!("; differentiator bonus +{DIFFERENTIATOR_BONUS:.0}"));
        (base + DIFFERENTIATOR_BONUS).min(100.0)
    } else {
        base
    };

    Ok(AutoScore {
        raw_score,
        rationale,
        status,
        differentiator,
    })
}

fn level_label(level: ComplianceLevel) -> &'static str {
    match level {
        ComplianceLevel::FullyMet => "fully met",
        ComplianceLevel::PartiallyMet => "partially met",
        ComplianceLevel::NotMet => "not met",
        ComplianceLevel::Unknown => "unknown",
    }
}

/// Fresh auto scores for every requirement, in requirement order.
///
/// Cells that fail to score become `error` cells instead of aborting.
pub fn auto_scores(
    requirements: &[Requirement],
    proposal: &ExtractedProposal,
) -> Vec<(RequirementId, AutoScore)> {
    requirements
        .iter()
        .map(|requirement| {
            let auto_score = score_cell(requirement, proposal).unwrap_or_else(|err| {
                warn!(
                    supplier = %proposal.supplier_id,
                    requirement = %requirement.id,
                    error = %err,
                    "requirement cell could not be scored"
                );
                AutoScore {
                    raw_score: 0.0,
                    rationale: format!("scoring error: {err}"),
                    status: CellStatus::Error,
                    differentiator: false,
                }
            });
            (requirement.id.clone(), auto_score)
        })
        .collect()
}

/// Everything the builder reads; no I/O happens inside the build.
pub struct MatrixInputs<'a> {
    pub requirements: &'a [Requirement],
    /// Submitted proposals only.
    pub proposals: &'a [ExtractedProposal],
    /// Persisted scores whose overrides are folded into the matrix.
    pub stored: &'a HashMap<SupplierId, RequirementScoreSet>,
}

pub fn build_matrix(
    inputs: &MatrixInputs<'_>,
    policy: &OverridePolicy,
    generated_at: DateTime<Utc>,
    version: u64,
) -> Result<ScoringMatrix, ScoringError> {
    if inputs.proposals.is_empty() {
        return Err(ScoringError::NoData(
            "no submitted supplier responses to score".to_string(),
        ));
    }
    if inputs.requirements.is_empty() {
        return Err(ScoringError::NoData(
            "opportunity has no requirements defined".to_string(),
        ));
    }

    let mut proposals: Vec<&ExtractedProposal> = inputs.proposals.iter().collect();
    proposals.sort_by(|left, right| left.supplier_id.cmp(&right.supplier_id));

    let columns: Vec<(&ExtractedProposal, HashMap<RequirementId, RequirementScore>)> = proposals
        .into_iter()
        .map(|proposal| {
            let previous = inputs
                .stored
                .get(&proposal.supplier_id)
                .map(|set| set.scores.as_slice())
                .unwrap_or_default();
            let merged = merge_preserving_overrides(
                previous,
                auto_scores(inputs.requirements, proposal),
            );
            let by_requirement: HashMap<RequirementId, RequirementScore> = merged
                .into_iter()
                .map(|score| (score.requirement_id.clone(), score))
                .collect();
            (proposal, by_requirement)
        })
        .collect();

    let requirements: Vec<RequirementRow> = inputs
        .requirements
        .iter()
        .map(|requirement| RequirementRow {
            requirement: requirement.clone(),
            cells: columns
                .iter()
                .map(|(proposal, scores)| {
                    let score = scores.get(&requirement.id).cloned().unwrap_or_else(|| {
                        RequirementScore::new(requirement.id.clone(), AutoScore::missing())
                    });
                    SupplierCell {
                        supplier_id: proposal.supplier_id.clone(),
                        supplier_name: proposal.display_name().to_string(),
                        effective_score: score.effective_score(),
                        must_have_violation: policy.must_have_violation(requirement, &score),
                        score,
                    }
                })
                .collect(),
        })
        .collect();

    let supplier_summaries = summarize(&requirements, &columns);

    Ok(ScoringMatrix {
        meta: MatrixMeta {
            total_requirements: requirements.len(),
            total_suppliers: columns.len(),
            generated_at,
            version,
        },
        requirements,
        supplier_summaries,
    })
}

fn summarize<T>(
    rows: &[RequirementRow],
    columns: &[(&ExtractedProposal, T)],
) -> Vec<SupplierSummary> {
    let mut summaries: Vec<SupplierSummary> = columns
        .iter()
        .enumerate()
        .map(|(column, (proposal, _))| {
            let mut summary = SupplierSummary {
                supplier_id: proposal.supplier_id.clone(),
                supplier_name: proposal.display_name().to_string(),
                aggregated_score: 0.0,
                rank: 0,
                pass_count: 0,
                partial_count: 0,
                fail_count: 0,
                missing_count: 0,
                error_count: 0,
                differentiator_count: 0,
                must_have_violations: 0,
            };

            let mut weighted_total = 0.0;
            let mut weight_sum = 0.0;
            for row in rows {
                let cell = &row.cells[column];
                let weight = row.requirement.effective_weight();
                weighted_total += weight * cell.effective_score;
                weight_sum += weight;

                match cell.score.auto_score.status {
                    CellStatus::Pass => summary.pass_count += 1,
                    CellStatus::Partial => summary.partial_count += 1,
                    CellStatus::Fail => summary.fail_count += 1,
                    CellStatus::Missing => summary.missing_count += 1,
                    CellStatus::Error => summary.error_count += 1,
                }
                if cell.score.auto_score.differentiator {
                    summary.differentiator_count += 1;
                }
                if cell.must_have_violation {
                    summary.must_have_violations += 1;
                }
            }

            summary.aggregated_score = if weight_sum > 0.0 {
                round2(weighted_total / weight_sum)
            } else {
                let total: f64 = rows.iter().map(|row| row.cells[column].effective_score).sum();
                round2(total / rows.len().max(1) as f64)
            };
            summary
        })
        .collect();

    summaries.sort_by(|left, right| {
        right
            .aggregated_score
            .total_cmp(&left.aggregated_score)
            .then_with(|| left.supplier_id.cmp(&right.supplier_id))
    });
    for (idx, summary) in summaries.iter_mut().enumerate() {
        summary.rank = idx + 1;
    }
    summaries
}
