use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::super::domain::OpportunityScope;
use super::super::error::ScoringError;
use super::super::locks::KeyedLocks;
use super::super::repository::{ScoreStore, SnapshotStore};
use super::ScoringMatrix;

const DEFAULT_STALENESS_MINUTES: i64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct MatrixConfig {
    /// Maximum age of a snapshot before it is recomputed.
    pub staleness_window: Duration,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            staleness_window: Duration::minutes(DEFAULT_STALENESS_MINUTES),
        }
    }
}

/// Stored matrix plus what it was computed from.
///
/// `score_generation` is the store's score-write counter read before the
/// scores were loaded. A write that lands during or after the computation
/// moves the counter past it, whatever the `invalidated` flag says.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixSnapshot {
    pub matrix: ScoringMatrix,
    #[serde(default)]
    pub invalidated: bool,
    #[serde(default)]
    pub score_generation: u64,
}

impl MatrixSnapshot {
    pub fn fresh(matrix: ScoringMatrix, score_generation: u64) -> Self {
        Self {
            matrix,
            invalidated: false,
            score_generation,
        }
    }

    /// Fresh by age and flag, and no score write happened since it was computed.
    pub fn is_current(
        &self,
        now: DateTime<Utc>,
        window: Duration,
        score_generation: u64,
    ) -> bool {
        !is_stale(self, now, window) && self.score_generation == score_generation
    }
}

/// The single staleness policy for matrix snapshots.
pub fn is_stale(snapshot: &MatrixSnapshot, now: DateTime<Utc>, window: Duration) -> bool {
    snapshot.invalidated || now - snapshot.matrix.meta.generated_at >= window
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// A fresh snapshot was returned untouched.
    Hit,
    /// This caller recomputed and persisted a new version.
    Recomputed,
    /// Another caller finished a recompute while this one waited.
    Joined,
}

/// Snapshot reuse with at most one in-flight recompute per opportunity.
pub struct MatrixCache {
    config: MatrixConfig,
    locks: KeyedLocks<OpportunityScope>,
}

impl MatrixCache {
    pub fn new(config: MatrixConfig) -> Self {
        Self {
            config,
            locks: KeyedLocks::default(),
        }
    }

    pub fn config(&self) -> &MatrixConfig {
        &self.config
    }

    /// Return a usable snapshot or recompute one.
    ///
    /// `compute` receives the version to stamp on the new matrix. A caller
    /// that had to wait for another recompute reuses its result when that
    /// result is newer than what it first observed and still current. The
    /// score generation is read before `compute` loads any scores.
    pub fn get_or_recompute<S, F>(
        &self,
        store: &S,
        scope: &OpportunityScope,
        force_recompute: bool,
        now: DateTime<Utc>,
        compute: F,
    ) -> Result<(ScoringMatrix, CacheOutcome), ScoringError>
    where
        S: SnapshotStore + ScoreStore + ?Sized,
        F: FnOnce(u64) -> Result<ScoringMatrix, ScoringError>,
    {
        let window = self.config.staleness_window;
        let generation = store.score_generation(scope)?;
        let observed = store.load_matrix_snapshot(scope)?;

        if !force_recompute {
            if let Some(snapshot) = &observed {
                if snapshot.is_current(now, window, generation) {
                    debug!(
                        opportunity = %scope,
                        version = snapshot.matrix.meta.version,
                        "scoring matrix cache hit"
                    );
                    return Ok((snapshot.matrix.clone(), CacheOutcome::Hit));
                }
            }
        }

        let observed_version = observed
            .as_ref()
            .map(|snapshot| snapshot.matrix.meta.version)
            .unwrap_or(0);

        self.locks.with_lock(scope, || {
            let generation = store.score_generation(scope)?;
            let current = store.load_matrix_snapshot(scope)?;

            if let Some(snapshot) = &current {
                if snapshot.matrix.meta.version > observed_version
                    && snapshot.is_current(now, window, generation)
                {
                    debug!(
                        opportunity = %scope,
                        version = snapshot.matrix.meta.version,
                        "joined concurrent scoring matrix recompute"
                    );
                    return Ok((snapshot.matrix.clone(), CacheOutcome::Joined));
                }
            }

            let next_version = current
                .as_ref()
                .map(|snapshot| snapshot.matrix.meta.version + 1)
                .unwrap_or(1);
            let matrix = compute(next_version)?;
            let snapshot = MatrixSnapshot::fresh(matrix.clone(), generation);
            store.save_matrix_snapshot(scope, snapshot)?;

            info!(
                opportunity = %scope,
                version = next_version,
                forced = force_recompute,
                score_generation = generation,
                requirements = matrix.meta.total_requirements,
                suppliers = matrix.meta.total_suppliers,
                "scoring matrix recomputed"
            );
            Ok((matrix, CacheOutcome::Recomputed))
        })
    }
}

impl Default for MatrixCache {
    fn default() -> Self {
        Self::new(MatrixConfig::default())
    }
}
