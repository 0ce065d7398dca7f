use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::comparison::{self, resolve_weights, ComparisonBreakdown};
use super::domain::{
    ActorId, ExtractedProposal, OpportunityScope, Requirement, RequirementId, SupplierId,
};
use super::error::ScoringError;
use super::locks::KeyedLocks;
use super::matrix::{
    auto_scores, build_matrix, export_csv, MatrixCache, MatrixConfig, MatrixFilter,
    MatrixInputs, ScoringMatrix,
};
use super::overrides::{
    self, merge_preserving_overrides, orphaned_overrides, validate_override, BuyerOverride,
    OverridePolicy, RequirementScore, RequirementScoreSet, ScoringItem,
};
use super::readiness::{ReadinessClassifier, ReadinessConfig, ReadinessInput, ReadinessResult};
use super::repository::ScoringRepository;

/// Source of "now" for timestamps and staleness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Tunables for every engine component.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub matrix: MatrixConfig,
    pub overrides: OverridePolicy,
    pub readiness: ReadinessConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ScoringError> {
        if self.matrix.staleness_window <= chrono::Duration::zero() {
            return Err(ScoringError::Validation(
                "matrix staleness window must be positive".to_string(),
            ));
        }
        self.overrides.validate().map_err(ScoringError::Validation)?;
        self.readiness.validate().map_err(ScoringError::Validation)
    }
}

/// Per-supplier outcome of a batch readiness run that did not classify.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadinessFailure {
    pub supplier_id: SupplierId,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadinessBatch {
    pub results: Vec<ReadinessResult>,
    pub failures: Vec<ReadinessFailure>,
}

/// Facade exposing every scoring operation over a repository.
pub struct ScoringService<R> {
    repository: Arc<R>,
    clock: Arc<dyn Clock>,
    cache: Arc<MatrixCache>,
    policy: Arc<OverridePolicy>,
    classifier: Arc<ReadinessClassifier>,
    score_locks: Arc<KeyedLocks<(OpportunityScope, SupplierId)>>,
}

impl<R> ScoringService<R>
where
    R: ScoringRepository + 'static,
{
    pub fn new(repository: Arc<R>, config: EngineConfig) -> Self {
        Self::with_clock(repository, config, Arc::new(SystemClock))
    }

    pub fn with_clock(repository: Arc<R>, config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            clock,
            cache: Arc::new(MatrixCache::new(config.matrix)),
            policy: Arc::new(config.overrides),
            classifier: Arc::new(ReadinessClassifier::new(config.readiness)),
            score_locks: Arc::new(KeyedLocks::default()),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Score every submitted supplier against the pool and persist each breakdown.
    pub fn run_comparison(
        &self,
        scope: &OpportunityScope,
    ) -> Result<Vec<ComparisonBreakdown>, ScoringError> {
        let submitted = self.submitted_proposals(scope)?;
        if submitted.is_empty() {
            return Err(ScoringError::NoData(format!(
                "opportunity {scope} has no submitted supplier responses to compare"
            )));
        }

        let evaluation_matrix = self.repository.evaluation_matrix(scope)?;
        let weights = resolve_weights(evaluation_matrix.as_ref());
        let breakdowns = comparison::run_comparison(&submitted, &weights);

        for breakdown in &breakdowns {
            self.repository.save_comparison(scope, breakdown)?;
        }

        info!(
            opportunity = %scope,
            suppliers = breakdowns.len(),
            matrix_used = weights.matrix_used,
            "comparison persisted"
        );
        Ok(breakdowns)
    }

    /// Cached matrix, recomputed when stale, invalidated, or forced.
    pub fn get_scoring_matrix(
        &self,
        scope: &OpportunityScope,
        force_recompute: bool,
    ) -> Result<ScoringMatrix, ScoringError> {
        let now = self.clock.now();
        let (matrix, _outcome) = self.cache.get_or_recompute(
            self.repository.as_ref(),
            scope,
            force_recompute,
            now,
            |version| self.build_matrix(scope, now, version),
        )?;
        Ok(matrix)
    }

    /// Matrix with view filters applied; the stored snapshot is never filtered.
    pub fn scoring_matrix_view(
        &self,
        scope: &OpportunityScope,
        force_recompute: bool,
        filter: &MatrixFilter,
    ) -> Result<ScoringMatrix, ScoringError> {
        filter.validate()?;
        let matrix = self.get_scoring_matrix(scope, force_recompute)?;
        filter.apply(&matrix)
    }

    pub fn export_scoring_matrix(
        &self,
        scope: &OpportunityScope,
        filter: &MatrixFilter,
    ) -> Result<String, ScoringError> {
        let view = self.scoring_matrix_view(scope, false, filter)?;
        export_csv(&view)
    }

    pub fn apply_override(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
        requirement_id: &RequirementId,
        score: f64,
        reason: &str,
        actor: &ActorId,
    ) -> Result<RequirementScore, ScoringError> {
        validate_override(score, reason)?;

        let buyer_override = BuyerOverride {
            override_score: score,
            override_reason: reason.trim().to_string(),
            overridden_at: self.clock.now(),
            overridden_by_user_id: actor.clone(),
        };

        let updated = self.update_scores(scope, supplier_id, |scores| {
            overrides::apply_override(scores, requirement_id, buyer_override)
        })?;

        info!(
            opportunity = %scope,
            supplier = %supplier_id,
            requirement = %requirement_id,
            actor = %actor,
            auto_score = updated.auto_score.raw_score,
            override_score = score,
            "override applied"
        );
        Ok(updated)
    }

    pub fn clear_override(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
        requirement_id: &RequirementId,
    ) -> Result<RequirementScore, ScoringError> {
        let updated = self.update_scores(scope, supplier_id, |scores| {
            overrides::clear_override(scores, requirement_id)
        })?;

        info!(
            opportunity = %scope,
            supplier = %supplier_id,
            requirement = %requirement_id,
            "override cleared"
        );
        Ok(updated)
    }

    /// Recompute auto scores for one supplier, carrying every override forward.
    pub fn regenerate_scores(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Vec<RequirementScore>, ScoringError> {
        let saved = self.score_locks.with_lock(&(scope.clone(), supplier_id.clone()), || {
            let proposal = self.submitted_proposal(scope, supplier_id)?;
            let requirements = self.requirements(scope)?;
            let stored = self.repository.load_scores(scope, supplier_id)?;
            let expected_version = stored.as_ref().map(|set| set.version).unwrap_or(0);
            let previous = stored.map(|set| set.scores).unwrap_or_default();

            let merged =
                merge_preserving_overrides(&previous, auto_scores(&requirements, &proposal));
            for requirement_id in orphaned_overrides(&merged, &requirements) {
                warn!(
                    opportunity = %scope,
                    supplier = %supplier_id,
                    requirement = %requirement_id,
                    "carrying forward override for requirement no longer in template"
                );
            }
            let set = RequirementScoreSet {
                supplier_id: supplier_id.clone(),
                version: expected_version,
                scores: merged,
            };
            let saved = self.repository.save_scores(scope, set, expected_version)?;
            self.repository.mark_matrix_stale(scope)?;
            Ok::<_, ScoringError>(saved)
        })?;

        info!(
            opportunity = %scope,
            supplier = %supplier_id,
            version = saved.version,
            overrides = saved.scores.iter().filter(|score| score.buyer_override.is_some()).count(),
            "requirement scores regenerated"
        );
        Ok(saved.scores)
    }

    /// Evaluation-workspace rows; unscored suppliers get fresh auto scores
    /// without anything being written.
    pub fn scoring_items(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Vec<ScoringItem>, ScoringError> {
        let proposal = self.submitted_proposal(scope, supplier_id)?;
        let requirements = self.requirements(scope)?;
        let scores = match self.repository.load_scores(scope, supplier_id)? {
            Some(set) => set,
            None => RequirementScoreSet {
                supplier_id: supplier_id.clone(),
                version: 0,
                scores: merge_preserving_overrides(&[], auto_scores(&requirements, &proposal)),
            },
        };
        let comments = self.repository.comments(scope, supplier_id)?;

        Ok(overrides::scoring_items(
            &requirements,
            &scores,
            &proposal,
            &comments,
            &self.policy,
        ))
    }

    pub fn classify_readiness(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<ReadinessResult, ScoringError> {
        let proposal = self.submitted_proposal(scope, supplier_id)?;
        let requirements = self.repository.requirements(scope)?;
        self.classify_proposal(scope, &proposal, &requirements)
    }

    /// Classify every submitted supplier; one supplier failing never blocks the rest.
    pub fn classify_readiness_batch(
        &self,
        scope: &OpportunityScope,
    ) -> Result<ReadinessBatch, ScoringError> {
        let submitted = self.submitted_proposals(scope)?;
        if submitted.is_empty() {
            return Err(ScoringError::NoData(format!(
                "opportunity {scope} has no submitted supplier responses to classify"
            )));
        }
        let requirements = self.repository.requirements(scope)?;

        let mut batch = ReadinessBatch {
            results: Vec::with_capacity(submitted.len()),
            failures: Vec::new(),
        };
        for proposal in &submitted {
            match self.classify_proposal(scope, proposal, &requirements) {
                Ok(result) => batch.results.push(result),
                Err(err) => {
                    warn!(
                        opportunity = %scope,
                        supplier = %proposal.supplier_id,
                        error = %err,
                        "readiness classification failed"
                    );
                    batch.failures.push(ReadinessFailure {
                        supplier_id: proposal.supplier_id.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }
        Ok(batch)
    }

    fn classify_proposal(
        &self,
        scope: &OpportunityScope,
        proposal: &ExtractedProposal,
        requirements: &[Requirement],
    ) -> Result<ReadinessResult, ScoringError> {
        let input = ReadinessInput::from_proposal(proposal, requirements);
        let result = self.classifier.classify(&input, self.clock.now());
        self.repository
            .save_readiness(scope, &proposal.supplier_id, &result)?;

        info!(
            opportunity = %scope,
            supplier = %proposal.supplier_id,
            indicator = result.indicator.label(),
            score = result.score,
            "readiness classified"
        );
        Ok(result)
    }

    fn build_matrix(
        &self,
        scope: &OpportunityScope,
        generated_at: DateTime<Utc>,
        version: u64,
    ) -> Result<ScoringMatrix, ScoringError> {
        let proposals = self.submitted_proposals(scope)?;
        let requirements = self.repository.requirements(scope)?;

        let mut stored = HashMap::new();
        for proposal in &proposals {
            if let Some(set) = self.repository.load_scores(scope, &proposal.supplier_id)? {
                stored.insert(proposal.supplier_id.clone(), set);
            }
        }

        let inputs = MatrixInputs {
            requirements: &requirements,
            proposals: &proposals,
            stored: &stored,
        };
        build_matrix(&inputs, &self.policy, generated_at, version)
    }

    /// Locked read-modify-write of one supplier's requirement scores.
    ///
    /// A supplier without stored scores is materialised from fresh auto
    /// scores first. The write is checked against the version that was read,
    /// and the opportunity's matrix snapshot is invalidated afterwards.
    fn update_scores<F>(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
        mutate: F,
    ) -> Result<RequirementScore, ScoringError>
    where
        F: FnOnce(&mut [RequirementScore]) -> Result<RequirementScore, ScoringError>,
    {
        let key = (scope.clone(), supplier_id.clone());
        self.score_locks.with_lock(&key, || -> Result<RequirementScore, ScoringError> {
            let proposal = self.submitted_proposal(scope, supplier_id)?;
            let requirements = self.repository.requirements(scope)?;
            let stored = self.repository.load_scores(scope, supplier_id)?;
            let expected_version = stored.as_ref().map(|set| set.version).unwrap_or(0);

            let mut scores = stored.map(|set| set.scores).unwrap_or_default();
            for (requirement_id, auto_score) in auto_scores(&requirements, &proposal) {
                if !scores.iter().any(|score| score.requirement_id == requirement_id) {
                    scores.push(RequirementScore::new(requirement_id, auto_score));
                }
            }

            let updated = mutate(scores.as_mut_slice())?;
            let set = RequirementScoreSet {
                supplier_id: supplier_id.clone(),
                version: expected_version,
                scores,
            };
            self.repository.save_scores(scope, set, expected_version)?;
            self.repository.mark_matrix_stale(scope)?;
            Ok(updated)
        })
    }

    fn submitted_proposals(
        &self,
        scope: &OpportunityScope,
    ) -> Result<Vec<ExtractedProposal>, ScoringError> {
        let proposals = self.repository.proposals(scope)?;
        Ok(proposals
            .into_iter()
            .filter(ExtractedProposal::is_submitted)
            .collect())
    }

    /// `NotFound` for an unknown supplier, `NoData` when it has not submitted.
    fn submitted_proposal(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<ExtractedProposal, ScoringError> {
        let proposal = self
            .repository
            .proposals(scope)?
            .into_iter()
            .find(|proposal| &proposal.supplier_id == supplier_id)
            .ok_or_else(|| ScoringError::not_found("supplier", supplier_id))?;

        if !proposal.is_submitted() {
            return Err(ScoringError::NoData(format!(
                "supplier {supplier_id} has no submitted response for opportunity {scope}"
            )));
        }
        Ok(proposal)
    }

    fn requirements(&self, scope: &OpportunityScope) -> Result<Vec<Requirement>, ScoringError> {
        let requirements = self.repository.requirements(scope)?;
        if requirements.is_empty() {
            return Err(ScoringError::NoData(format!(
                "opportunity {scope} has no requirements defined"
            )));
        }
        Ok(requirements)
    }
}
