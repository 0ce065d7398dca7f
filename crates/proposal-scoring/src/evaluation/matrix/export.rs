use super::super::error::ScoringError;
use super::ScoringMatrix;

/// Column order of the flat export: one row per requirement × supplier cell.
pub const EXPORT_HEADER: [&str; 13] = [
    "requirement_id",
    "requirement_title",
    "category",
    "must_have",
    "supplier_id",
    "supplier_name",
    "status",
    "auto_score",
    "override_score",
    "effective_score",
    "variance",
    "rationale",
    "override_reason",
];

/// Flatten a (possibly filtered) matrix to CSV.
///
/// Rows follow requirement order, then supplier order within each row, and
/// scores are printed with two decimals, so equal input yields equal bytes.
pub fn export_csv(matrix: &ScoringMatrix) -> Result<String, ScoringError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_HEADER).map_err(export_error)?;

    for row in &matrix.requirements {
        let requirement = &row.requirement;
        for cell in &row.cells {
            let buyer_override = cell.score.buyer_override.as_ref();
            let auto_score = format!("{:.2}", cell.score.auto_score.raw_score);
            let override_score = buyer_override
                .map(|value| format!("{:.2}", value.override_score))
                .unwrap_or_default();
            let effective_score = format!("{:.2}", cell.effective_score);
            let variance = format!("{:.2}", cell.score.variance());
            let override_reason = buyer_override
                .map(|value| value.override_reason.as_str())
                .unwrap_or_default();

            writer
                .write_record([
                    requirement.id.0.as_str(),
                    requirement.title.as_str(),
                    requirement.category.as_str(),
                    if requirement.must_have { "yes" } else { "no" },
                    cell.supplier_id.0.as_str(),
                    cell.supplier_name.as_str(),
                    cell.score.auto_score.status.label(),
                    auto_score.as_str(),
                    override_score.as_str(),
                    effective_score.as_str(),
                    variance.as_str(),
                    cell.score.auto_score.rationale.as_str(),
                    override_reason,
                ])
                .map_err(export_error)?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| ScoringError::Export(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| ScoringError::Export(err.to_string()))
}

fn export_error(err: csv::Error) -> ScoringError {
    ScoringError::Export(err.to_string())
}
