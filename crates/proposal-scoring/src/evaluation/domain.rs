use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for the tenant (buyer company) that owns an opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub String);

/// Identifier wrapper for a buyer request (RFP) under evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpportunityId(pub String);

/// Identifier wrapper for a competing supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SupplierId(pub String);

/// Identifier wrapper for a single evaluable requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequirementId(pub String);

/// Identity of the reviewer acting on an evaluation, resolved by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub String);

macro_rules! display_id {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        })*
    };
}

display_id!(TenantId, OpportunityId, SupplierId, RequirementId, ActorId);

/// Tenant-qualified opportunity key; every read and write is scoped by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpportunityScope {
    pub tenant_id: TenantId,
    pub opportunity_id: OpportunityId,
}

impl OpportunityScope {
    pub fn new(tenant_id: impl Into<String>, opportunity_id: impl Into<String>) -> Self {
        Self {
            tenant_id: TenantId(tenant_id.into()),
            opportunity_id: OpportunityId(opportunity_id.into()),
        }
    }
}

impl fmt::Display for OpportunityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.opportunity_id)
    }
}

/// Requirement definition supplied by the template provider, in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub must_have: bool,
    #[serde(default)]
    pub weight: Option<f64>,
}

impl Requirement {
    /// Aggregation weight; absent, non-finite, or negative weights count as 1.
    pub fn effective_weight(&self) -> f64 {
        match self.weight {
            Some(weight) if weight.is_finite() && weight >= 0.0 => weight,
            _ => 1.0,
        }
    }
}

/// Buyer-authored evaluation matrix: free-form criteria with relative weights.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EvaluationMatrix {
    #[serde(default)]
    pub criteria: Vec<EvaluationCriterion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCriterion {
    pub name: String,
    pub weight: f64,
}

/// Lifecycle of a supplier's response to an opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    Draft,
    Submitted,
    Withdrawn,
}

/// Structured facts the extraction collaborator produced for one supplier.
///
/// Every field is optional on the wire; anything missing or malformed degrades
/// to "unknown" instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractedProposal {
    pub supplier_id: SupplierId,
    #[serde(default)]
    pub supplier_name: String,
    #[serde(default)]
    pub status: ResponseStatus,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pricing: Option<PricingBreakdown>,
    #[serde(default)]
    pub coverage: Vec<CoverageFinding>,
    #[serde(default)]
    pub technical_claims: Vec<TechnicalClaim>,
    #[serde(default)]
    pub risks: Vec<RiskFlag>,
    #[serde(default)]
    pub differentiators: Vec<Differentiator>,
    #[serde(default)]
    pub compliance_gaps: Vec<ComplianceGap>,
    #[serde(default)]
    pub demo: Option<DemoSummary>,
}

impl ExtractedProposal {
    pub fn is_submitted(&self) -> bool {
        self.status == ResponseStatus::Submitted
    }

    pub fn display_name(&self) -> &str {
        if self.supplier_name.trim().is_empty() {
            &self.supplier_id.0
        } else {
            &self.supplier_name
        }
    }

    /// Coverage findings addressing `requirement`, matched by id first and by
    /// case-insensitive title when the extractor could not resolve an id.
    pub fn findings_for<'a>(&'a self, requirement: &'a Requirement) -> Vec<&'a CoverageFinding> {
        self.coverage
            .iter()
            .filter(|finding| match &finding.requirement_id {
                Some(id) => id == &requirement.id,
                None => finding
                    .requirement_title
                    .trim()
                    .eq_ignore_ascii_case(requirement.title.trim()),
            })
            .collect()
    }

    pub fn differentiates(&self, requirement: &RequirementId) -> bool {
        self.differentiators
            .iter()
            .any(|item| item.requirement_id.as_ref() == Some(requirement))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PricingBreakdown {
    #[serde(default)]
    pub total: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub line_items: Vec<PriceLineItem>,
}

impl PricingBreakdown {
    /// Stated total, else the sum of line items; `None` when neither is usable.
    pub fn resolved_total(&self) -> Option<f64> {
        if let Some(total) = self.total.filter(|total| total.is_finite() && *total >= 0.0) {
            return Some(total);
        }

        let amounts: Vec<f64> = self
            .line_items
            .iter()
            .filter_map(|item| item.amount)
            .filter(|amount| amount.is_finite() && *amount >= 0.0)
            .collect();
        if amounts.is_empty() {
            None
        } else {
            Some(amounts.iter().sum())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLineItem {
    pub label: String,
    #[serde(default)]
    pub amount: Option<f64>,
}

/// How well a proposal addresses one requirement, per the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceLevel {
    FullyMet,
    PartiallyMet,
    NotMet,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverageFinding {
    #[serde(default)]
    pub requirement_id: Option<RequirementId>,
    #[serde(default)]
    pub requirement_title: String,
    #[serde(default)]
    pub level: ComplianceLevel,
    #[serde(default)]
    pub response_text: Option<String>,
    #[serde(default)]
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalClaim {
    pub claim: String,
    #[serde(default)]
    pub verified: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSeverity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl RiskSeverity {
    pub const fn label(self) -> &'static str {
        match self {
            RiskSeverity::Low => "low",
            RiskSeverity::Medium => "medium",
            RiskSeverity::High => "high",
            RiskSeverity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFlag {
    pub description: String,
    #[serde(default)]
    pub severity: RiskSeverity,
    #[serde(default)]
    pub mitigation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Differentiator {
    pub title: String,
    #[serde(default)]
    pub requirement_id: Option<RequirementId>,
}

/// Compliance finding that blocks or conditions award until resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceGap {
    pub description: String,
    #[serde(default)]
    pub critical: bool,
    #[serde(default)]
    pub resolved: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DemoSummary {
    #[serde(default)]
    pub overall_score: Option<f64>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub concerns: Vec<String>,
}

/// Reviewer note attached to a requirement in the evaluation workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub requirement_id: RequirementId,
    pub author: ActorId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
