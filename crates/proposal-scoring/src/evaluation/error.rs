use super::repository::RepositoryError;

/// Failure taxonomy surfaced by the scoring engine.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    /// Caller input is out of range or inconsistent; never retried.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    /// Well-formed request with nothing to compute over.
    #[error("no data: {0}")]
    NoData(String),
    /// A concurrent writer changed the requirement scores; refetch and retry.
    #[error("concurrent update detected: {0}")]
    ConcurrencyConflict(String),
    #[error("export failed: {0}")]
    Export(String),
    #[error(transparent)]
    Repository(RepositoryError),
}

impl ScoringError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, ScoringError::NoData(_))
    }
}

impl From<RepositoryError> for ScoringError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(what) => ScoringError::NotFound {
                kind: "record",
                id: what,
            },
            RepositoryError::VersionConflict { expected, found } => {
                ScoringError::ConcurrencyConflict(format!(
                    "expected requirement scores at version {expected}, found {found}"
                ))
            }
            other => ScoringError::Repository(other),
        }
    }
}
