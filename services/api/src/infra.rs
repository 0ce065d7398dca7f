use metrics_exporter_prometheus::PrometheusHandle;
use proposal_scoring::error::AppError;
use proposal_scoring::evaluation::{
    EvaluationMatrix, ExtractedProposal, InMemoryScoringStore, OpportunityScope, Requirement,
    ReviewComment, SupplierId,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

const DEFAULT_TENANT: &str = "local";
const DEFAULT_OPPORTUNITY: &str = "bundle";

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Reviewer comment as it appears in a bundle file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct BundleComment {
    pub(crate) supplier_id: SupplierId,
    #[serde(flatten)]
    pub(crate) comment: ReviewComment,
}

/// Everything needed to score one opportunity offline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct OpportunityBundle {
    #[serde(default)]
    pub(crate) tenant_id: Option<String>,
    #[serde(default)]
    pub(crate) opportunity_id: Option<String>,
    pub(crate) requirements: Vec<Requirement>,
    pub(crate) proposals: Vec<ExtractedProposal>,
    #[serde(default)]
    pub(crate) evaluation_matrix: Option<EvaluationMatrix>,
    #[serde(default)]
    pub(crate) comments: Vec<BundleComment>,
}

impl OpportunityBundle {
    pub(crate) fn from_path(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub(crate) fn from_json(raw: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub(crate) fn scope(&self) -> OpportunityScope {
        OpportunityScope::new(
            self.tenant_id.as_deref().unwrap_or(DEFAULT_TENANT),
            self.opportunity_id.as_deref().unwrap_or(DEFAULT_OPPORTUNITY),
        )
    }

    /// Load the bundle into `store` under its scope.
    pub(crate) fn seed(&self, store: &InMemoryScoringStore) -> Result<OpportunityScope, AppError> {
        let scope = self.scope();
        store.put_requirements(&scope, self.requirements.clone())?;
        if let Some(matrix) = &self.evaluation_matrix {
            store.put_evaluation_matrix(&scope, matrix.clone())?;
        }
        for proposal in &self.proposals {
            store.upsert_proposal(&scope, proposal.clone())?;
        }
        for entry in &self.comments {
            store.add_comment(&scope, &entry.supplier_id, entry.comment.clone())?;
        }
        Ok(scope)
    }
}
