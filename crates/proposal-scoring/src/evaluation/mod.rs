//! Supplier evaluation and scoring for competitive opportunities.
//!
//! Extracted proposal facts flow through a pure pipeline (metrics,
//! cross-supplier normalisation, weighted comparison, requirement matrix,
//! readiness) while [`ScoringService`] owns every side effect: snapshot
//! caching, override persistence and per-supplier serialisation.

pub mod comparison;
pub mod domain;
mod error;
pub(crate) mod locks;
pub mod matrix;
pub mod metrics;
pub mod overrides;
pub mod persistence;
pub mod readiness;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use comparison::{
    compare, normalize, rank, resolve_weights, run_comparison, ComparisonBreakdown,
    NormalizedMetrics, ResolvedWeights, WeightVector,
};
pub use domain::{
    ActorId, ComplianceGap, ComplianceLevel, CoverageFinding, DemoSummary, Differentiator,
    EvaluationCriterion, EvaluationMatrix, ExtractedProposal, OpportunityId, OpportunityScope,
    PriceLineItem, PricingBreakdown, Requirement, RequirementId, ResponseStatus, ReviewComment,
    RiskFlag, RiskSeverity, SupplierId, TechnicalClaim, TenantId,
};
pub use error::ScoringError;
pub use matrix::{
    export_csv, is_stale, MatrixConfig, MatrixFilter, MatrixSnapshot, ScoringMatrix,
    SupplierSummary,
};
pub use metrics::{BaseMetrics, MetricDirection, MetricKind};
pub use overrides::{
    merge_preserving_overrides, orphaned_overrides, AutoScore, BuyerOverride, CellStatus,
    OverridePolicy, RequirementScore, RequirementScoreSet, ScoringItem, VarianceLevel,
};
pub use persistence::InMemoryScoringStore;
pub use readiness::{
    indicator_for, MandatoryStatus, ReadinessClassifier, ReadinessConfig, ReadinessIndicator,
    ReadinessInput, ReadinessPenalty, ReadinessResult,
};
pub use repository::{
    ProposalSource, RepositoryError, RequirementSource, ScoreStore, ScoringRepository,
    SnapshotStore,
};
pub use router::scoring_router;
pub use service::{
    Clock, EngineConfig, ReadinessBatch, ReadinessFailure, ScoringService, SystemClock,
};
