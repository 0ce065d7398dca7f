use super::comparison::ComparisonBreakdown;
use super::domain::{
    EvaluationMatrix, ExtractedProposal, OpportunityScope, Requirement, ReviewComment, SupplierId,
};
use super::matrix::MatrixSnapshot;
use super::overrides::RequirementScoreSet;
use super::readiness::ReadinessResult;

/// Extraction data provider: parsed proposal facts per supplier.
pub trait ProposalSource: Send + Sync {
    /// All supplier responses for the opportunity, whatever their status.
    fn proposals(
        &self,
        scope: &OpportunityScope,
    ) -> Result<Vec<ExtractedProposal>, RepositoryError>;
}

/// Requirement/template provider plus the optional buyer evaluation matrix.
pub trait RequirementSource: Send + Sync {
    fn requirements(&self, scope: &OpportunityScope) -> Result<Vec<Requirement>, RepositoryError>;
    fn evaluation_matrix(
        &self,
        scope: &OpportunityScope,
    ) -> Result<Option<EvaluationMatrix>, RepositoryError>;
}

/// Latest-only snapshots: scoring matrix, comparison breakdowns, readiness.
pub trait SnapshotStore: Send + Sync {
    fn load_matrix_snapshot(
        &self,
        scope: &OpportunityScope,
    ) -> Result<Option<MatrixSnapshot>, RepositoryError>;
    fn save_matrix_snapshot(
        &self,
        scope: &OpportunityScope,
        snapshot: MatrixSnapshot,
    ) -> Result<(), RepositoryError>;
    /// Flag the stored snapshot so the next read recomputes it.
    fn mark_matrix_stale(&self, scope: &OpportunityScope) -> Result<(), RepositoryError>;

    fn save_comparison(
        &self,
        scope: &OpportunityScope,
        breakdown: &ComparisonBreakdown,
    ) -> Result<(), RepositoryError>;
    fn load_comparison(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Option<ComparisonBreakdown>, RepositoryError>;

    fn save_readiness(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
        result: &ReadinessResult,
    ) -> Result<(), RepositoryError>;
    fn load_readiness(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Option<ReadinessResult>, RepositoryError>;
}

/// Requirement scores per (opportunity, supplier) and reviewer comments.
pub trait ScoreStore: Send + Sync {
    fn load_scores(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Option<RequirementScoreSet>, RepositoryError>;

    /// Persist `set` if the stored version still equals `expected_version`
    /// (0 when nothing is stored yet); returns the set with its new version.
    fn save_scores(
        &self,
        scope: &OpportunityScope,
        set: RequirementScoreSet,
        expected_version: u64,
    ) -> Result<RequirementScoreSet, RepositoryError>;

    /// Counter bumped by every successful `save_scores` in the opportunity.
    fn score_generation(&self, scope: &OpportunityScope) -> Result<u64, RepositoryError>;

    fn comments(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Vec<ReviewComment>, RepositoryError>;
}

/// Everything the scoring service needs from persistence.
pub trait ScoringRepository: ProposalSource + RequirementSource + SnapshotStore + ScoreStore {}

impl<T> ScoringRepository for T where
    T: ProposalSource + RequirementSource + SnapshotStore + ScoreStore
{
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("version conflict (expected {expected}, found {found})")]
    VersionConflict { expected: u64, found: u64 },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}
