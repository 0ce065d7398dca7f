//! Persistence boundary for scoring state.
//!
//! Everything written through [`InMemoryScoringStore`] is stored as a JSON
//! envelope tagged with [`SCHEMA_VERSION`]. Requirement-score blobs written
//! before envelopes existed were bare camelCase arrays; [`decode_scores`]
//! still reads those and upgrades them to the current shape. Scoring logic
//! only ever sees the typed structs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::comparison::ComparisonBreakdown;
use super::domain::{
    ActorId, EvaluationMatrix, ExtractedProposal, OpportunityScope, Requirement, RequirementId,
    ReviewComment, SupplierId,
};
use super::matrix::MatrixSnapshot;
use super::overrides::{AutoScore, BuyerOverride, CellStatus, RequirementScore, RequirementScoreSet};
use super::readiness::ReadinessResult;
use super::repository::{
    ProposalSource, RepositoryError, RequirementSource, ScoreStore, SnapshotStore,
};

pub const SCHEMA_VERSION: u32 = 2;

/// Version tag wrapped around every stored payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEnvelope<T> {
    pub schema_version: u32,
    pub payload: T,
}

pub fn encode<T: Serialize>(payload: &T) -> Result<String, RepositoryError> {
    let envelope = SnapshotEnvelope {
        schema_version: SCHEMA_VERSION,
        payload,
    };
    serde_json::to_string(&envelope).map_err(|err| RepositoryError::Corrupt(err.to_string()))
}

pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, RepositoryError> {
    let envelope: SnapshotEnvelope<T> =
        serde_json::from_str(raw).map_err(|err| RepositoryError::Corrupt(err.to_string()))?;
    check_schema(envelope.schema_version)?;
    Ok(envelope.payload)
}

fn check_schema(found: u32) -> Result<(), RepositoryError> {
    if found == SCHEMA_VERSION {
        Ok(())
    } else {
        Err(RepositoryError::Corrupt(format!(
            "unsupported schema version {found} (expected {SCHEMA_VERSION})"
        )))
    }
}

pub fn encode_scores(set: &RequirementScoreSet) -> Result<String, RepositoryError> {
    encode(set)
}

/// Decode a stored requirement-score blob, accepting the legacy array form.
///
/// Legacy arrays carry no version and are treated as version 1 of the set.
pub fn decode_scores(
    raw: &str,
    supplier_id: &SupplierId,
) -> Result<RequirementScoreSet, RepositoryError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|err| RepositoryError::Corrupt(err.to_string()))?;

    match value {
        Value::Array(_) => {
            let legacy: Vec<LegacyRequirementScore> = serde_json::from_value(value)
                .map_err(|err| RepositoryError::Corrupt(format!("legacy scores: {err}")))?;
            Ok(RequirementScoreSet {
                supplier_id: supplier_id.clone(),
                version: 1,
                scores: legacy.into_iter().map(LegacyRequirementScore::upgrade).collect(),
            })
        }
        Value::Object(_) => {
            let envelope: SnapshotEnvelope<RequirementScoreSet> = serde_json::from_value(value)
                .map_err(|err| RepositoryError::Corrupt(err.to_string()))?;
            check_schema(envelope.schema_version)?;
            Ok(envelope.payload)
        }
        other => Err(RepositoryError::Corrupt(format!(
            "unexpected requirement score blob: {other}"
        ))),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyRequirementScore {
    requirement_id: String,
    auto_score: LegacyAutoScore,
    #[serde(default)]
    buyer_override: Option<LegacyBuyerOverride>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyAutoScore {
    raw_score: f64,
    #[serde(default)]
    rationale: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyBuyerOverride {
    override_score: f64,
    #[serde(default)]
    override_reason: String,
    overridden_at: DateTime<Utc>,
    overridden_by_user_id: String,
}

impl LegacyRequirementScore {
    fn upgrade(self) -> RequirementScore {
        // legacy blobs never stored a status; infer it from the raw score
        let status = if self.auto_score.raw_score >= 100.0 {
            CellStatus::Pass
        } else if self.auto_score.raw_score > 0.0 {
            CellStatus::Partial
        } else {
            CellStatus::Fail
        };

        RequirementScore {
            requirement_id: RequirementId(self.requirement_id),
            auto_score: AutoScore {
                raw_score: self.auto_score.raw_score,
                rationale: self.auto_score.rationale,
                status,
                differentiator: false,
            },
            buyer_override: self.buyer_override.map(|legacy| BuyerOverride {
                override_score: legacy.override_score,
                override_reason: legacy.override_reason,
                overridden_at: legacy.overridden_at,
                overridden_by_user_id: ActorId(legacy.overridden_by_user_id),
            }),
        }
    }
}

type SupplierKey = (OpportunityScope, SupplierId);

#[derive(Default)]
struct StoreState {
    requirements: HashMap<OpportunityScope, Vec<Requirement>>,
    evaluation_matrices: HashMap<OpportunityScope, EvaluationMatrix>,
    proposals: HashMap<OpportunityScope, Vec<ExtractedProposal>>,
    comments: HashMap<SupplierKey, Vec<ReviewComment>>,
    matrix_snapshots: HashMap<OpportunityScope, String>,
    comparisons: HashMap<SupplierKey, String>,
    readiness: HashMap<SupplierKey, String>,
    scores: HashMap<SupplierKey, String>,
    score_generations: HashMap<OpportunityScope, u64>,
}

/// Process-local store keeping every snapshot as an encoded blob.
#[derive(Default, Clone)]
pub struct InMemoryScoringStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryScoringStore {
    fn state(&self) -> Result<MutexGuard<'_, StoreState>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("scoring store mutex poisoned".to_string()))
    }

    pub fn put_requirements(
        &self,
        scope: &OpportunityScope,
        requirements: Vec<Requirement>,
    ) -> Result<(), RepositoryError> {
        self.state()?.requirements.insert(scope.clone(), requirements);
        Ok(())
    }

    pub fn put_evaluation_matrix(
        &self,
        scope: &OpportunityScope,
        matrix: EvaluationMatrix,
    ) -> Result<(), RepositoryError> {
        self.state()?
            .evaluation_matrices
            .insert(scope.clone(), matrix);
        Ok(())
    }

    /// Insert or replace the proposal for its supplier.
    pub fn upsert_proposal(
        &self,
        scope: &OpportunityScope,
        proposal: ExtractedProposal,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        let proposals = state.proposals.entry(scope.clone()).or_default();
        match proposals
            .iter_mut()
            .find(|existing| existing.supplier_id == proposal.supplier_id)
        {
            Some(existing) => *existing = proposal,
            None => proposals.push(proposal),
        }
        Ok(())
    }

    pub fn add_comment(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
        comment: ReviewComment,
    ) -> Result<(), RepositoryError> {
        self.state()?
            .comments
            .entry((scope.clone(), supplier_id.clone()))
            .or_default()
            .push(comment);
        Ok(())
    }

    /// Stored requirement-score blob as written, for audits and imports.
    pub fn raw_scores(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Option<String>, RepositoryError> {
        Ok(self
            .state()?
            .scores
            .get(&(scope.clone(), supplier_id.clone()))
            .cloned())
    }

    /// Seed a requirement-score blob verbatim, e.g. one exported by an older release.
    pub fn put_raw_scores(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
        raw: impl Into<String>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        state
            .scores
            .insert((scope.clone(), supplier_id.clone()), raw.into());
        *state.score_generations.entry(scope.clone()).or_default() += 1;
        Ok(())
    }
}

impl ProposalSource for InMemoryScoringStore {
    fn proposals(
        &self,
        scope: &OpportunityScope,
    ) -> Result<Vec<ExtractedProposal>, RepositoryError> {
        Ok(self.state()?.proposals.get(scope).cloned().unwrap_or_default())
    }
}

impl RequirementSource for InMemoryScoringStore {
    fn requirements(&self, scope: &OpportunityScope) -> Result<Vec<Requirement>, RepositoryError> {
        Ok(self
            .state()?
            .requirements
            .get(scope)
            .cloned()
            .unwrap_or_default())
    }

    fn evaluation_matrix(
        &self,
        scope: &OpportunityScope,
    ) -> Result<Option<EvaluationMatrix>, RepositoryError> {
        Ok(self.state()?.evaluation_matrices.get(scope).cloned())
    }
}

impl SnapshotStore for InMemoryScoringStore {
    fn load_matrix_snapshot(
        &self,
        scope: &OpportunityScope,
    ) -> Result<Option<MatrixSnapshot>, RepositoryError> {
        self.state()?
            .matrix_snapshots
            .get(scope)
            .map(|raw| decode(raw))
            .transpose()
    }

    fn save_matrix_snapshot(
        &self,
        scope: &OpportunityScope,
        snapshot: MatrixSnapshot,
    ) -> Result<(), RepositoryError> {
        let raw = encode(&snapshot)?;
        self.state()?.matrix_snapshots.insert(scope.clone(), raw);
        Ok(())
    }

    fn mark_matrix_stale(&self, scope: &OpportunityScope) -> Result<(), RepositoryError> {
        let mut state = self.state()?;
        if let Some(raw) = state.matrix_snapshots.get_mut(scope) {
            let mut snapshot: MatrixSnapshot = decode(raw)?;
            snapshot.invalidated = true;
            *raw = encode(&snapshot)?;
        }
        Ok(())
    }

    fn save_comparison(
        &self,
        scope: &OpportunityScope,
        breakdown: &ComparisonBreakdown,
    ) -> Result<(), RepositoryError> {
        let raw = encode(breakdown)?;
        self.state()?
            .comparisons
            .insert((scope.clone(), breakdown.supplier_id.clone()), raw);
        Ok(())
    }

    fn load_comparison(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Option<ComparisonBreakdown>, RepositoryError> {
        self.state()?
            .comparisons
            .get(&(scope.clone(), supplier_id.clone()))
            .map(|raw| decode(raw))
            .transpose()
    }

    fn save_readiness(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
        result: &ReadinessResult,
    ) -> Result<(), RepositoryError> {
        let raw = encode(result)?;
        self.state()?
            .readiness
            .insert((scope.clone(), supplier_id.clone()), raw);
        Ok(())
    }

    fn load_readiness(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Option<ReadinessResult>, RepositoryError> {
        self.state()?
            .readiness
            .get(&(scope.clone(), supplier_id.clone()))
            .map(|raw| decode(raw))
            .transpose()
    }
}

impl ScoreStore for InMemoryScoringStore {
    fn load_scores(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Option<RequirementScoreSet>, RepositoryError> {
        self.state()?
            .scores
            .get(&(scope.clone(), supplier_id.clone()))
            .map(|raw| decode_scores(raw, supplier_id))
            .transpose()
    }

    fn save_scores(
        &self,
        scope: &OpportunityScope,
        mut set: RequirementScoreSet,
        expected_version: u64,
    ) -> Result<RequirementScoreSet, RepositoryError> {
        let key = (scope.clone(), set.supplier_id.clone());
        let mut state = self.state()?;

        let found = match state.scores.get(&key) {
            Some(raw) => decode_scores(raw, &set.supplier_id)?.version,
            None => 0,
        };
        if found != expected_version {
            return Err(RepositoryError::VersionConflict {
                expected: expected_version,
                found,
            });
        }

        set.version = found + 1;
        state.scores.insert(key, encode_scores(&set)?);
        *state.score_generations.entry(scope.clone()).or_default() += 1;
        Ok(set)
    }

    fn score_generation(&self, scope: &OpportunityScope) -> Result<u64, RepositoryError> {
        Ok(self
            .state()?
            .score_generations
            .get(scope)
            .copied()
            .unwrap_or(0))
    }

    fn comments(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Vec<ReviewComment>, RepositoryError> {
        Ok(self
            .state()?
            .comments
            .get(&(scope.clone(), supplier_id.clone()))
            .cloned()
            .unwrap_or_default())
    }
}
