mod config;
mod policy;
mod rules;

pub use config::ReadinessConfig;
pub use policy::{indicator_for, ReadinessIndicator};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ComplianceGap, DemoSummary, ExtractedProposal, Requirement, RiskFlag, SupplierId,
};
use super::matrix::score_cell;
use super::metrics::coverage_pct;
use super::overrides::CellStatus;
use policy::compose_rationale;

/// Pass/partial/fail tally over a proposal's must-have requirements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MandatoryStatus {
    pub total: usize,
    pub passed: usize,
    /// Titles of mandatory requirements that are only partially met.
    pub partial: Vec<String>,
    /// Titles of mandatory requirements that fail, are missing, or errored.
    pub failed: Vec<String>,
}

/// Facts the classifier reads; overrides never feed into readiness.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadinessInput {
    pub supplier_id: SupplierId,
    pub mandatory: MandatoryStatus,
    pub requirements_coverage_pct: Option<f64>,
    pub compliance_gaps: Vec<ComplianceGap>,
    pub risks: Vec<RiskFlag>,
    pub price_total: Option<f64>,
    pub demo: Option<DemoSummary>,
}

impl ReadinessInput {
    pub fn from_proposal(proposal: &ExtractedProposal, requirements: &[Requirement]) -> Self {
        let mut mandatory = MandatoryStatus::default();
        for requirement in requirements.iter().filter(|requirement| requirement.must_have) {
            mandatory.total += 1;
            let status = score_cell(requirement, proposal)
                .map(|score| score.status)
                .unwrap_or(CellStatus::Error);
            match status {
                CellStatus::Pass => mandatory.passed += 1,
                CellStatus::Partial => mandatory.partial.push(requirement.title.clone()),
                CellStatus::Fail | CellStatus::Missing | CellStatus::Error => {
                    mandatory.failed.push(requirement.title.clone())
                }
            }
        }

        Self {
            supplier_id: proposal.supplier_id.clone(),
            mandatory,
            requirements_coverage_pct: coverage_pct(proposal),
            compliance_gaps: proposal.compliance_gaps.clone(),
            risks: proposal.risks.clone(),
            price_total: proposal
                .pricing
                .as_ref()
                .and_then(|pricing| pricing.resolved_total()),
            demo: proposal.demo.clone(),
        }
    }
}

/// One deduction applied to the base readiness score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessPenalty {
    pub reason: String,
    pub points: f64,
}

/// Readiness verdict with the trail that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessResult {
    pub supplier_id: SupplierId,
    pub indicator: ReadinessIndicator,
    pub score: f64,
    pub rationale: String,
    pub critical_issues: Vec<String>,
    pub conditional_factors: Vec<String>,
    pub strengths: Vec<String>,
    pub penalties: Vec<ReadinessPenalty>,
    pub classified_at: DateTime<Utc>,
}

/// Stateless classifier applying a [`ReadinessConfig`] to one supplier.
pub struct ReadinessClassifier {
    config: ReadinessConfig,
}

impl ReadinessClassifier {
    pub fn new(config: ReadinessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReadinessConfig {
        &self.config
    }

    pub fn classify(&self, input: &ReadinessInput, classified_at: DateTime<Utc>) -> ReadinessResult {
        let (score, signals) = rules::score_readiness(input, &self.config);
        let indicator = indicator_for(score, &self.config);
        let rationale = compose_rationale(indicator, score, &signals, &self.config);

        ReadinessResult {
            supplier_id: input.supplier_id.clone(),
            indicator,
            score,
            rationale,
            critical_issues: signals.critical_issues,
            conditional_factors: signals.conditional_factors,
            strengths: signals.strengths,
            penalties: signals.penalties,
            classified_at,
        }
    }
}

impl Default for ReadinessClassifier {
    fn default() -> Self {
        Self::new(ReadinessConfig::default())
    }
}
