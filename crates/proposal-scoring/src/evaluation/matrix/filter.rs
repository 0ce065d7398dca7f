use serde::{Deserialize, Serialize};

use super::super::error::ScoringError;
use super::super::overrides::CellStatus;
use super::{RequirementRow, ScoringMatrix};

/// View-layer row filter; applying it never touches the cached snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixFilter {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub only_differentiators: bool,
    #[serde(default)]
    pub only_failed_or_partial: bool,
    #[serde(default, alias = "search")]
    pub search_term: Option<String>,
}

impl MatrixFilter {
    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && !self.only_differentiators
            && !self.only_failed_or_partial
            && self.search_term.is_none()
    }

    pub fn validate(&self) -> Result<(), ScoringError> {
        if matches!(&self.category, Some(category) if category.trim().is_empty()) {
            return Err(ScoringError::Validation(
                "category filter must not be blank".to_string(),
            ));
        }
        if matches!(&self.search_term, Some(term) if term.trim().is_empty()) {
            return Err(ScoringError::Validation(
                "search term must not be blank".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy of `matrix` keeping only matching requirement rows.
    ///
    /// Summaries and `meta` describe the full matrix and are left as is.
    pub fn apply(&self, matrix: &ScoringMatrix) -> Result<ScoringMatrix, ScoringError> {
        self.validate()?;

        let mut view = matrix.clone();
        if !self.is_empty() {
            view.requirements.retain(|row| self.matches(row));
        }
        Ok(view)
    }

    fn matches(&self, row: &RequirementRow) -> bool {
        if let Some(category) = &self.category {
            if !row.requirement.category.trim().eq_ignore_ascii_case(category.trim()) {
                return false;
            }
        }

        if self.only_differentiators
            && !row.cells.iter().any(|cell| cell.score.auto_score.differentiator)
        {
            return false;
        }

        if self.only_failed_or_partial
            && !row.cells.iter().any(|cell| {
                matches!(
                    cell.score.auto_score.status,
                    CellStatus::Fail | CellStatus::Partial | CellStatus::Missing
                )
            })
        {
            return false;
        }

        if let Some(term) = &self.search_term {
            let needle = term.trim().to_lowercase();
            let requirement = &row.requirement;
            let hit = requirement.title.to_lowercase().contains(&needle)
                || requirement.id.0.to_lowercase().contains(&needle)
                || requirement.category.to_lowercase().contains(&needle)
                || row
                    .cells
                    .iter()
                    .any(|cell| cell.score.auto_score.rationale.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        true
    }
}
