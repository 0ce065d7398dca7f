use std::collections::HashMap;

use chrono::Duration;

use super::common::*;
use crate::evaluation::domain::{ComplianceLevel, CoverageFinding, ExtractedProposal, SupplierId};
use crate::evaluation::matrix::{
    build_matrix, export_csv, is_stale, score_cell, CellError, MatrixFilter, MatrixInputs,
    MatrixSnapshot, ScoringMatrix, EXPORT_HEADER,
};
use crate::evaluation::overrides::{
    BuyerOverride, CellStatus, OverridePolicy, RequirementScoreSet,
};
use crate::evaluation::ScoringError;

fn matrix_for(proposals: &[ExtractedProposal]) -> ScoringMatrix {
    let requirements = requirements();
    let stored = HashMap::new();
    build_matrix(
        &MatrixInputs {
            requirements: &requirements,
            proposals,
            stored: &stored,
        },
        &OverridePolicy::default(),
        fixed_now(),
        1,
    )
    .expect("matrix builds")
}

fn cell_status(matrix: &ScoringMatrix, row: usize, supplier: &SupplierId) -> CellStatus {
    matrix.requirements[row]
        .cells
        .iter()
        .find(|cell| &cell.supplier_id == supplier)
        .map(|cell| cell.score.auto_score.status)
        .expect("cell present")
}

#[test]
fn compliance_levels_map_to_scores_and_statuses() {
    let requirements = requirements();
    let cases = [
        (ComplianceLevel::FullyMet, 100.0, CellStatus::Pass),
        (ComplianceLevel::PartiallyMet, 50.0, CellStatus::Partial),
        (ComplianceLevel::NotMet, 0.0, CellStatus::Fail),
        (ComplianceLevel::Unknown, 25.0, CellStatus::Partial),
    ];

    for (level, expected_score, expected_status) in cases {
        let proposal = ExtractedProposal {
            coverage: vec![finding("req-sso", level)],
            ..acme_proposal()
        };
        let score = score_cell(&requirements[0], &proposal).expect("scores");
        assert_eq!(score.raw_score, expected_score, "{level:?}");
        assert_eq!(score.status, expected_status, "{level:?}");
        assert!(!score.differentiator);
    }
}

#[test]
fn differentiator_bonus_is_capped_and_skips_unmet() {
    let requirements = requirements();
    let api = &requirements[2];

    let partial = score_cell(api, &acme_proposal()).expect("scores");
    assert_eq!(partial.raw_score, 60.0);
    assert!(partial.differentiator);
    assert!(partial.rationale.contains("differentiator bonus +10"));

    let full = ExtractedProposal {
        coverage: vec![finding("req-api", ComplianceLevel::FullyMet)],
        ..acme_proposal()
    };
    assert_eq!(score_cell(api, &full).expect("scores").raw_score, 100.0);

    let unmet = ExtractedProposal {
        coverage: vec![finding("req-api", ComplianceLevel::NotMet)],
        ..acme_proposal()
    };
    let unmet = score_cell(api, &unmet).expect("scores");
    assert_eq!(unmet.raw_score, 0.0);
    assert!(!unmet.differentiator);
}

#[test]
fn findings_match_by_title_when_id_is_missing() {
    let requirements = requirements();
    let proposal = ExtractedProposal {
        coverage: vec![CoverageFinding {
            requirement_id: None,
            requirement_title: "  single SIGN-ON ".to_string(),
            level: ComplianceLevel::FullyMet,
            ..CoverageFinding::default()
        }],
        ..globex_proposal()
    };

    let score = score_cell(&requirements[0], &proposal).expect("scores");
    assert_eq!(score.status, CellStatus::Pass);
}

#[test]
fn conflicting_findings_isolate_an_error_cell() {
    let requirements = requirements();
    let mut proposal = acme_proposal();
    proposal
        .coverage
        .push(finding("req-audit", ComplianceLevel::NotMet));

    let err = score_cell(&requirements[1], &proposal).expect_err("conflict");
    assert!(matches!(err, CellError::ConflictingFindings(_)));

    let matrix = matrix_for(&[proposal, globex_proposal()]);
    assert_eq!(matrix.cell_count(), 6);
    assert_eq!(cell_status(&matrix, 1, &acme()), CellStatus::Error);
    assert_eq!(cell_status(&matrix, 0, &acme()), CellStatus::Pass);

    let summary = matrix.summary_for(&acme()).expect("summary");
    assert_eq!(summary.error_count, 1);
}

#[test]
fn matrix_is_a_full_rectangle_even_for_silent_suppliers() {
    let silent = ExtractedProposal {
        supplier_id: SupplierId("hooli".to_string()),
        supplier_name: "Hooli".to_string(),
        coverage: Vec::new(),
        ..globex_proposal()
    };

    let matrix = matrix_for(&[globex_proposal(), silent, acme_proposal()]);

    assert_eq!(matrix.meta.total_requirements, 3);
    assert_eq!(matrix.meta.total_suppliers, 3);
    assert_eq!(matrix.cell_count(), 9);
    for row in &matrix.requirements {
        let ids: Vec<&str> = row.cells.iter().map(|cell| cell.supplier_id.0.as_str()).collect();
        assert_eq!(ids, vec!["acme", "globex", "hooli"]);
    }
    let hooli = matrix
        .summary_for(&SupplierId("hooli".to_string()))
        .expect("summary");
    assert_eq!(hooli.missing_count, 3);
    assert_eq!(hooli.aggregated_score, 0.0);
}

#[test]
fn summaries_aggregate_weighted_effective_scores() {
    let matrix = matrix_for(&[acme_proposal(), globex_proposal()]);

    let acme_summary = &matrix.supplier_summaries[0];
    assert_eq!(acme_summary.supplier_id, acme());
    assert_eq!(acme_summary.rank, 1);
    assert_eq!(acme_summary.aggregated_score, 90.0);
    assert_eq!(acme_summary.pass_count, 2);
    assert_eq!(acme_summary.partial_count, 1);
    assert_eq!(acme_summary.differentiator_count, 1);
    assert_eq!(acme_summary.must_have_violations, 0);

    let globex_summary = &matrix.supplier_summaries[1];
    assert_eq!(globex_summary.rank, 2);
    assert_eq!(globex_summary.aggregated_score, 12.5);
    assert_eq!(globex_summary.partial_count, 1);
    assert_eq!(globex_summary.fail_count, 1);
    assert_eq!(globex_summary.missing_count, 1);
    assert_eq!(globex_summary.must_have_violations, 1);
}

#[test]
fn stored_overrides_flow_into_cells_and_summaries() {
    let requirements = requirements();
    let proposals = [acme_proposal(), globex_proposal()];
    let mut globex_scores = RequirementScoreSet::empty(globex());
    globex_scores.version = 3;
    globex_scores.scores = crate::evaluation::matrix::auto_scores(&requirements, &proposals[1])
        .into_iter()
        .map(|(id, auto)| crate::evaluation::overrides::RequirementScore::new(id, auto))
        .collect();
    globex_scores.scores[1].buyer_override = Some(BuyerOverride {
        override_score: 80.0,
        override_reason: "audit module shown in demo".to_string(),
        overridden_at: fixed_now(),
        overridden_by_user_id: crate::evaluation::domain::ActorId("reviewer-7".to_string()),
    });
    let stored = HashMap::from([(globex(), globex_scores)]);

    let matrix = build_matrix(
        &MatrixInputs {
            requirements: &requirements,
            proposals: &proposals,
            stored: &stored,
        },
        &OverridePolicy::default(),
        fixed_now(),
        4,
    )
    .expect("matrix builds");

    let audit = &matrix.requirements[1].cells[1];
    assert_eq!(audit.effective_score, 80.0);
    assert_eq!(audit.score.auto_score.status, CellStatus::Fail);
    assert!(!audit.must_have_violation);

    let summary = matrix.summary_for(&globex()).expect("summary");
    assert_eq!(summary.aggregated_score, 52.5);
    assert_eq!(summary.must_have_violations, 0);
    assert_eq!(matrix.meta.version, 4);
}

#[test]
fn empty_inputs_report_no_data() {
    let requirements = requirements();
    let stored = HashMap::new();
    let err = build_matrix(
        &MatrixInputs {
            requirements: &requirements,
            proposals: &[],
            stored: &stored,
        },
        &OverridePolicy::default(),
        fixed_now(),
        1,
    )
    .expect_err("no proposals");
    assert!(matches!(err, ScoringError::NoData(_)));

    let proposals = [acme_proposal()];
    let err = build_matrix(
        &MatrixInputs {
            requirements: &[],
            proposals: &proposals,
            stored: &stored,
        },
        &OverridePolicy::default(),
        fixed_now(),
        1,
    )
    .expect_err("no requirements");
    assert!(matches!(err, ScoringError::NoData(_)));
}

#[test]
fn filters_select_rows_without_touching_summaries() {
    let matrix = matrix_for(&[acme_proposal(), globex_proposal()]);

    let security = MatrixFilter {
        category: Some("security".to_string()),
        ..MatrixFilter::default()
    }
    .apply(&matrix)
    .expect("valid filter");
    assert_eq!(security.requirements.len(), 1);
    assert_eq!(security.requirements[0].requirement.id, req("req-sso"));
    assert_eq!(security.supplier_summaries, matrix.supplier_summaries);
    assert_eq!(security.meta, matrix.meta);

    let differentiators = MatrixFilter {
        only_differentiators: true,
        ..MatrixFilter::default()
    }
    .apply(&matrix)
    .expect("valid filter");
    assert_eq!(differentiators.requirements.len(), 1);
    assert_eq!(differentiators.requirements[0].requirement.id, req("req-api"));

    let evidence = MatrixFilter {
        search_term: Some("SAML".to_string()),
        ..MatrixFilter::default()
    }
    .apply(&matrix)
    .expect("valid filter");
    assert_eq!(evidence.requirements.len(), 1);

    let unfiltered = MatrixFilter::default().apply(&matrix).expect("valid filter");
    assert_eq!(unfiltered, matrix);
}

#[test]
fn failed_or_partial_filter_skips_clean_rows() {
    let matrix = matrix_for(&[acme_proposal()]);

    let view = MatrixFilter {
        only_failed_or_partial: true,
        ..MatrixFilter::default()
    }
    .apply(&matrix)
    .expect("valid filter");

    let ids: Vec<&str> = view
        .requirements
        .iter()
        .map(|row| row.requirement.id.0.as_str())
        .collect();
    assert_eq!(ids, vec!["req-api"]);
}

#[test]
fn blank_filter_values_are_rejected() {
    let matrix = matrix_for(&[acme_proposal()]);

    for filter in [
        MatrixFilter {
            category: Some("  ".to_string()),
            ..MatrixFilter::default()
        },
        MatrixFilter {
            search_term: Some(String::new()),
            ..MatrixFilter::default()
        },
    ] {
        let err = filter.apply(&matrix).expect_err("blank filter");
        assert!(matches!(err, ScoringError::Validation(_)));
    }
}

#[test]
fn csv_export_is_flat_and_deterministic() {
    let matrix = matrix_for(&[globex_proposal(), acme_proposal()]);

    let first = export_csv(&matrix).expect("exports");
    let second = export_csv(&matrix).expect("exports");
    assert_eq!(first, second);

    let mut reader = csv::Reader::from_reader(first.as_bytes());
    let headers = reader.headers().expect("header row").clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), EXPORT_HEADER.to_vec());

    let records: Vec<csv::StringRecord> = reader
        .records()
        .collect::<Result<_, _>>()
        .expect("records parse");
    assert_eq!(records.len(), 6);
    assert_eq!(&records[0][0], "req-sso");
    assert_eq!(&records[0][4], "acme");
    assert_eq!(&records[1][4], "globex");
    assert_eq!(&records[0][3], "yes");
    assert_eq!(&records[5][6], "missing");
    assert_eq!(&records[4][7], "60.00");
    assert_eq!(&records[4][8], "");
}

#[test]
fn snapshots_go_stale_on_age_or_invalidation() {
    let matrix = matrix_for(&[acme_proposal()]);
    let window = Duration::minutes(60);
    let mut snapshot = MatrixSnapshot::fresh(matrix, 3);

    assert!(!is_stale(&snapshot, fixed_now() + Duration::minutes(59), window));
    assert!(is_stale(&snapshot, fixed_now() + Duration::minutes(60), window));
    assert!(snapshot.is_current(fixed_now(), window, 3));
    assert!(!snapshot.is_current(fixed_now(), window, 4));

    snapshot.invalidated = true;
    assert!(is_stale(&snapshot, fixed_now(), window));
}
