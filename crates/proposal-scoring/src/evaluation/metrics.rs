use serde::{Deserialize, Serialize};

use super::domain::{ComplianceLevel, ExtractedProposal, RiskSeverity, SupplierId};

/// Comparable dimensions of a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Price,
    RequirementsCoverage,
    RiskExposure,
    TechnicalDepth,
    Differentiation,
    DemoQuality,
}

/// Whether larger raw values are better or worse for the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricDirection {
    HigherIsBetter,
    LowerIsBetter,
}

impl MetricKind {
    pub const fn ordered() -> [MetricKind; 6] {
        [
            MetricKind::Price,
            MetricKind::RequirementsCoverage,
            MetricKind::RiskExposure,
            MetricKind::TechnicalDepth,
            MetricKind::Differentiation,
            MetricKind::DemoQuality,
        ]
    }

    pub const fn direction(self) -> MetricDirection {
        match self {
            MetricKind::Price | MetricKind::RiskExposure => MetricDirection::LowerIsBetter,
            _ => MetricDirection::HigherIsBetter,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            MetricKind::Price => "price",
            MetricKind::RequirementsCoverage => "requirements_coverage",
            MetricKind::RiskExposure => "risk_exposure",
            MetricKind::TechnicalDepth => "technical_depth",
            MetricKind::Differentiation => "differentiation",
            MetricKind::DemoQuality => "demo_quality",
        }
    }
}

/// Raw, unit-bearing metrics for one supplier in one comparison run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseMetrics {
    pub supplier_id: SupplierId,
    pub price_total: Option<f64>,
    pub requirements_coverage_pct: Option<f64>,
    pub risk_count: u32,
    pub high_severity_risk_count: u32,
    pub technical_claim_count: u32,
    pub differentiator_count: u32,
    pub demo_score: Option<f64>,
}

impl BaseMetrics {
    /// Map extracted proposal facts onto the fixed metric record.
    pub fn from_proposal(proposal: &ExtractedProposal) -> Self {
        let price_total = proposal
            .pricing
            .as_ref()
            .and_then(|pricing| pricing.resolved_total());

        let demo_score = proposal
            .demo
            .as_ref()
            .and_then(|demo| demo.overall_score)
            .filter(|score| score.is_finite())
            .map(|score| score.clamp(0.0, 100.0));

        Self {
            supplier_id: proposal.supplier_id.clone(),
            price_total,
            requirements_coverage_pct: coverage_pct(proposal),
            risk_count: proposal.risks.len() as u32,
            high_severity_risk_count: proposal
                .risks
                .iter()
                .filter(|risk| risk.severity >= RiskSeverity::High)
                .count() as u32,
            technical_claim_count: proposal.technical_claims.len() as u32,
            differentiator_count: proposal.differentiators.len() as u32,
            demo_score,
        }
    }

    /// Raw value for `kind`; `None` means the extractor could not tell.
    pub fn value(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Price => self.price_total,
            MetricKind::RequirementsCoverage => self.requirements_coverage_pct,
            // high-severity risks count double
            MetricKind::RiskExposure => {
                Some(self.risk_count as f64 + self.high_severity_risk_count as f64)
            }
            MetricKind::TechnicalDepth => Some(self.technical_claim_count as f64),
            MetricKind::Differentiation => Some(self.differentiator_count as f64),
            MetricKind::DemoQuality => self.demo_score,
        }
    }
}

/// Share of assessed requirements met, with partial matches counting half.
pub fn coverage_pct(proposal: &ExtractedProposal) -> Option<f64> {
    let assessed: Vec<f64> = proposal
        .coverage
        .iter()
        .filter_map(|finding| match finding.level {
            ComplianceLevel::FullyMet => Some(1.0),
            ComplianceLevel::PartiallyMet => Some(0.5),
            ComplianceLevel::NotMet => Some(0.0),
            ComplianceLevel::Unknown => None,
        })
        .collect();

    if assessed.is_empty() {
        return None;
    }

    Some(100.0 * assessed.iter().sum::<f64>() / assessed.len() as f64)
}
