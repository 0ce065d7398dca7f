use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use proposal_scoring::evaluation::{
    merge_preserving_overrides, run_comparison, ActorId, AutoScore, BuyerOverride, CellStatus,
    ComplianceLevel, CoverageFinding, DemoSummary, EngineConfig, ExtractedProposal,
    InMemoryScoringStore, MetricKind, OpportunityScope, OverridePolicy, PricingBreakdown,
    ReadinessIndicator, Requirement, RequirementId, RequirementScore, ResolvedWeights,
    ResponseStatus, ScoreStore, ScoringError, ScoringService, SupplierId, VarianceLevel,
    WeightVector,
};

fn scope() -> OpportunityScope {
    OpportunityScope::new("tenant-harbor", "rfp-fleet-telematics")
}

fn requirement(id: &str, title: &str, must_have: bool) -> Requirement {
    Requirement {
        id: RequirementId(id.to_string()),
        title: title.to_string(),
        category: "Platform".to_string(),
        must_have,
        weight: None,
    }
}

fn proposal(id: &str, price: f64, levels: &[(&str, ComplianceLevel)]) -> ExtractedProposal {
    ExtractedProposal {
        supplier_id: SupplierId(id.to_string()),
        supplier_name: id.to_uppercase(),
        status: ResponseStatus::Submitted,
        pricing: Some(PricingBreakdown {
            total: Some(price),
            currency: Some("EUR".to_string()),
            line_items: Vec::new(),
        }),
        coverage: levels
            .iter()
            .map(|(requirement_id, level)| CoverageFinding {
                requirement_id: Some(RequirementId(requirement_id.to_string())),
                level: *level,
                ..CoverageFinding::default()
            })
            .collect(),
        ..ExtractedProposal::default()
    }
}

fn seeded_service() -> (ScoringService<InMemoryScoringStore>, Arc<InMemoryScoringStore>) {
    let store = Arc::new(InMemoryScoringStore::default());
    store
        .put_requirements(
            &scope(),
            vec![
                requirement("req-gps", "GPS tracking", true),
                requirement("req-eld", "ELD compliance", true),
                requirement("req-fuel", "Fuel card integration", false),
            ],
        )
        .expect("seed requirements");
    store
        .upsert_proposal(
            &scope(),
            proposal(
                "vendor-a",
                1000.0,
                &[
                    ("req-gps", ComplianceLevel::FullyMet),
                    ("req-eld", ComplianceLevel::FullyMet),
                    ("req-fuel", ComplianceLevel::PartiallyMet),
                ],
            ),
        )
        .expect("seed proposal");
    store
        .upsert_proposal(&scope(), proposal("vendor-b", 2000.0, &[]))
        .expect("seed proposal");
    let service = ScoringService::new(store.clone(), EngineConfig::default());
    (service, store)
}

#[test]
fn price_only_comparison_ranks_the_cheaper_supplier_first() {
    let proposals = [
        proposal("vendor-a", 1000.0, &[]),
        proposal("vendor-b", 2000.0, &[]),
    ];
    let weights = ResolvedWeights {
        weights: WeightVector::new(BTreeMap::from([(MetricKind::Price, 1.0)]))
            .expect("valid weights"),
        matrix_used: false,
    };

    let breakdowns = run_comparison(&proposals, &weights);

    let summary: Vec<(&str, f64, f64)> = breakdowns
        .iter()
        .map(|row| {
            (
                row.supplier_id.0.as_str(),
                row.metrics.get(MetricKind::Price),
                row.total_score,
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![("vendor-a", 100.0, 100.0), ("vendor-b", 0.0, 0.0)]
    );
}

#[test]
fn single_supplier_pool_normalises_to_full_marks() {
    let mut only = proposal("vendor-a", 1000.0, &[("req-gps", ComplianceLevel::NotMet)]);
    only.demo = Some(DemoSummary {
        overall_score: Some(42.0),
        highlights: Vec::new(),
        concerns: Vec::new(),
    });

    let breakdowns = run_comparison(&[only], &ResolvedWeights::defaults());

    assert_eq!(breakdowns.len(), 1);
    for kind in MetricKind::ordered() {
        assert_eq!(breakdowns[0].metrics.get(kind), 100.0, "{kind:?}");
    }
}

#[test]
fn override_survives_regeneration_with_new_auto_score() {
    let previous = vec![RequirementScore {
        requirement_id: RequirementId("req-eld".to_string()),
        auto_score: AutoScore {
            raw_score: 40.0,
            rationale: "requirement partially met".to_string(),
            status: CellStatus::Partial,
            differentiator: false,
        },
        buyer_override: Some(BuyerOverride {
            override_score: 90.0,
            override_reason: "demo proved capability".to_string(),
            overridden_at: Utc
                .with_ymd_and_hms(2024, 6, 3, 15, 0, 0)
                .single()
                .expect("valid timestamp"),
            overridden_by_user_id: ActorId("buyer-lead".to_string()),
        }),
    }];
    let policy = OverridePolicy::default();
    assert_eq!(previous[0].effective_score(), 90.0);
    assert_eq!(policy.variance_level(previous[0].variance()), VarianceLevel::High);

    let fresh = AutoScore {
        raw_score: 45.0,
        ..previous[0].auto_score.clone()
    };
    let merged = merge_preserving_overrides(
        &previous,
        vec![(RequirementId("req-eld".to_string()), fresh)],
    );

    assert_eq!(merged[0].buyer_override, previous[0].buyer_override);
    assert_eq!(merged[0].effective_score(), 90.0);
    assert_eq!(merged[0].variance(), 45.0);
}

#[test]
fn legacy_scores_are_upgraded_and_keep_their_override() {
    let (service, store) = seeded_service();
    let vendor_b = SupplierId("vendor-b".to_string());
    store
        .put_raw_scores(
            &scope(),
            &vendor_b,
            r#"[{"requirementId":"req-eld","autoScore":{"rawScore":40,"rationale":"legacy"},
                "buyerOverride":{"overrideScore":90,"overrideReason":"demo proved capability",
                "overriddenAt":"2024-06-03T15:00:00Z","overriddenByUserId":"buyer-lead"}}]"#,
        )
        .expect("seed legacy blob");

    let regenerated = service
        .regenerate_scores(&scope(), &vendor_b)
        .expect("regenerated");

    let eld = regenerated
        .iter()
        .find(|score| score.requirement_id.0 == "req-eld")
        .expect("eld score");
    assert_eq!(eld.auto_score.status, CellStatus::Missing);
    assert_eq!(eld.effective_score(), 90.0);
    assert_eq!(eld.variance(), 90.0);

    let stored = store
        .load_scores(&scope(), &vendor_b)
        .expect("store readable")
        .expect("scores present");
    assert_eq!(stored.version, 2);
    let raw = store
        .raw_scores(&scope(), &vendor_b)
        .expect("store readable")
        .expect("blob present");
    assert!(raw.contains("\"schema_version\":2"));
}

#[test]
fn matrix_covers_every_requirement_for_every_submitted_supplier() {
    let (service, _store) = seeded_service();

    let matrix = service
        .get_scoring_matrix(&scope(), false)
        .expect("matrix");

    assert_eq!(matrix.cell_count(), 6);
    let silent = matrix
        .summary_for(&SupplierId("vendor-b".to_string()))
        .expect("summary");
    assert_eq!(silent.missing_count, 3);
    assert_eq!(silent.must_have_violations, 2);
    assert_eq!(matrix.supplier_summaries[0].supplier_id.0, "vendor-a");
}

#[test]
fn readiness_separates_prepared_and_silent_suppliers() {
    let (service, _store) = seeded_service();

    let batch = service
        .classify_readiness_batch(&scope())
        .expect("batch");

    assert_eq!(batch.results[0].indicator, ReadinessIndicator::Ready);
    assert_eq!(batch.results[1].indicator, ReadinessIndicator::NotReady);
    assert_eq!(batch.results[1].critical_issues.len(), 2);
}

#[test]
fn opportunity_without_submissions_reports_no_data() {
    let store = Arc::new(InMemoryScoringStore::default());
    store
        .put_requirements(&scope(), vec![requirement("req-gps", "GPS tracking", true)])
        .expect("seed requirements");
    let mut draft = proposal("vendor-a", 1000.0, &[]);
    draft.status = ResponseStatus::Draft;
    store.upsert_proposal(&scope(), draft).expect("seed proposal");
    let service = ScoringService::new(store, EngineConfig::default());

    let err = service
        .get_scoring_matrix(&scope(), false)
        .expect_err("nothing submitted");

    assert!(matches!(err, ScoringError::NoData(_)));
}

#[test]
fn tenants_never_see_each_others_snapshots() {
    let (service, _store) = seeded_service();
    service
        .get_scoring_matrix(&scope(), false)
        .expect("matrix");

    let other = OpportunityScope::new("tenant-quay", "rfp-fleet-telematics");
    let err = service
        .get_scoring_matrix(&other, false)
        .expect_err("other tenant has no data");

    assert!(err.is_no_data());
}
