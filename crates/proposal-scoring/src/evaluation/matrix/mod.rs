//! Requirement × supplier scoring matrix.
//!
//! The builder walks every requirement for every submitted supplier so the
//! grid is always a full rectangle. Snapshots are cached per opportunity and
//! reused until they age past the staleness window, the caller forces a
//! recompute, or a score write lands after the snapshot's scores were read
//! (tracked by the store's per-opportunity score generation). Filters and CSV export
//! only ever look at an already built matrix.

mod builder;
mod cache;
mod export;
mod filter;

pub use builder::{auto_scores, build_matrix, score_cell, CellError, MatrixInputs};
pub use cache::{is_stale, CacheOutcome, MatrixCache, MatrixConfig, MatrixSnapshot};
pub use export::{export_csv, EXPORT_HEADER};
pub use filter::MatrixFilter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Requirement, SupplierId};
use super::overrides::RequirementScore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierCell {
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub score: RequirementScore,
    pub effective_score: f64,
    pub must_have_violation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementRow {
    pub requirement: Requirement,
    pub cells: Vec<SupplierCell>,
}

/// Per-supplier roll-up across every requirement row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierSummary {
    pub supplier_id: SupplierId,
    pub supplier_name: String,
    pub aggregated_score: f64,
    pub rank: usize,
    pub pass_count: usize,
    pub partial_count: usize,
    pub fail_count: usize,
    pub missing_count: usize,
    pub error_count: usize,
    pub differentiator_count: usize,
    pub must_have_violations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixMeta {
    pub total_requirements: usize,
    pub total_suppliers: usize,
    pub generated_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringMatrix {
    pub requirements: Vec<RequirementRow>,
    pub supplier_summaries: Vec<SupplierSummary>,
    pub meta: MatrixMeta,
}

impl ScoringMatrix {
    pub fn cell_count(&self) -> usize {
        self.requirements.iter().map(|row| row.cells.len()).sum()
    }

    pub fn summary_for(&self, supplier_id: &SupplierId) -> Option<&SupplierSummary> {
        self.supplier_summaries
            .iter()
            .find(|summary| &summary.supplier_id == supplier_id)
    }
}
