use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::evaluation::comparison::ComparisonBreakdown;
use crate::evaluation::domain::{
    ComplianceGap, ComplianceLevel, CoverageFinding, DemoSummary, Differentiator,
    EvaluationMatrix, ExtractedProposal, OpportunityScope, PricingBreakdown, Requirement,
    RequirementId, ResponseStatus, ReviewComment, RiskFlag, RiskSeverity, SupplierId,
    TechnicalClaim,
};
use crate::evaluation::matrix::MatrixSnapshot;
use crate::evaluation::overrides::RequirementScoreSet;
use crate::evaluation::persistence::InMemoryScoringStore;
use crate::evaluation::readiness::ReadinessResult;
use crate::evaluation::repository::{
    ProposalSource, RepositoryError, RequirementSource, ScoreStore, SnapshotStore,
};
use crate::evaluation::service::{Clock, EngineConfig, ScoringService};

pub(super) fn scope() -> OpportunityScope {
    OpportunityScope::new("tenant-northwind", "rfp-2024-017")
}

pub(super) fn acme() -> SupplierId {
    SupplierId("acme".to_string())
}

pub(super) fn globex() -> SupplierId {
    SupplierId("globex".to_string())
}

pub(super) fn initech() -> SupplierId {
    SupplierId("initech".to_string())
}

pub(super) fn req(id: &str) -> RequirementId {
    RequirementId(id.to_string())
}

pub(super) fn requirements() -> Vec<Requirement> {
    vec![
        Requirement {
            id: req("req-sso"),
            title: "Single sign-on".to_string(),
            category: "Security".to_string(),
            must_have: true,
            weight: None,
        },
        Requirement {
            id: req("req-audit"),
            title: "Audit logging".to_string(),
            category: "Compliance".to_string(),
            must_have: true,
            weight: Some(2.0),
        },
        Requirement {
            id: req("req-api"),
            title: "Public REST API".to_string(),
            category: "Integration".to_string(),
            must_have: false,
            weight: None,
        },
    ]
}

pub(super) fn finding(requirement: &str, level: ComplianceLevel) -> CoverageFinding {
    CoverageFinding {
        requirement_id: Some(req(requirement)),
        level,
        response_text: Some(format!("Response covering {requirement}")),
        ..CoverageFinding::default()
    }
}

/// Strong, cheap supplier: every must-have met, differentiates on the API.
pub(super) fn acme_proposal() -> ExtractedProposal {
    ExtractedProposal {
        supplier_id: acme(),
        supplier_name: "Acme Corp".to_string(),
        status: ResponseStatus::Submitted,
        submitted_at: Some(fixed_now() - Duration::days(2)),
        pricing: Some(PricingBreakdown {
            total: Some(1000.0),
            currency: Some("USD".to_string()),
            line_items: Vec::new(),
        }),
        coverage: vec![
            CoverageFinding {
                evidence: Some("SAML 2.0 and OIDC".to_string()),
                ..finding("req-sso", ComplianceLevel::FullyMet)
            },
            finding("req-audit", ComplianceLevel::FullyMet),
            finding("req-api", ComplianceLevel::PartiallyMet),
        ],
        technical_claims: vec![
            TechnicalClaim {
                claim: "99.95% uptime SLA".to_string(),
                verified: Some(true),
            },
            TechnicalClaim {
                claim: "Multi-region failover".to_string(),
                verified: None,
            },
        ],
        risks: vec![RiskFlag {
            description: "Vendor lock-in".to_string(),
            severity: RiskSeverity::Low,
            mitigation: None,
        }],
        differentiators: vec![Differentiator {
            title: "Open API sandbox".to_string(),
            requirement_id: Some(req("req-api")),
        }],
        compliance_gaps: Vec::new(),
        demo: Some(DemoSummary {
            overall_score: Some(85.0),
            highlights: vec!["Live SSO walkthrough".to_string()],
            concerns: Vec::new(),
        }),
    }
}

/// Expensive supplier missing the audit requirement and the API entirely.
pub(super) fn globex_proposal() -> ExtractedProposal {
    ExtractedProposal {
        supplier_id: globex(),
        supplier_name: "Globex Ltd".to_string(),
        status: ResponseStatus::Submitted,
        submitted_at: Some(fixed_now() - Duration::days(1)),
        pricing: Some(PricingBreakdown {
            total: Some(2000.0),
            currency: Some("USD".to_string()),
            line_items: Vec::new(),
        }),
        coverage: vec![
            finding("req-sso", ComplianceLevel::PartiallyMet),
            finding("req-audit", ComplianceLevel::NotMet),
        ],
        technical_claims: Vec::new(),
        risks: vec![RiskFlag {
            description: "Key engineer dependency".to_string(),
            severity: RiskSeverity::High,
            mitigation: None,
        }],
        differentiators: Vec::new(),
        compliance_gaps: vec![ComplianceGap {
            description: "SOC 2 report pending".to_string(),
            critical: false,
            resolved: false,
        }],
        demo: None,
    }
}

pub(super) fn initech_draft() -> ExtractedProposal {
    ExtractedProposal {
        supplier_id: initech(),
        supplier_name: "Initech".to_string(),
        status: ResponseStatus::Draft,
        coverage: vec![finding("req-sso", ComplianceLevel::FullyMet)],
        ..ExtractedProposal::default()
    }
}

pub(super) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 14, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

/// Manually advanced clock for staleness tests.
pub(super) struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub(super) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock mutex poisoned");
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) fn seeded_store() -> InMemoryScoringStore {
    let store = InMemoryScoringStore::default();
    let scope = scope();
    store
        .put_requirements(&scope, requirements())
        .expect("seed requirements");
    for proposal in [acme_proposal(), globex_proposal(), initech_draft()] {
        store.upsert_proposal(&scope, proposal).expect("seed proposal");
    }
    store
        .add_comment(
            &scope,
            &acme(),
            ReviewComment {
                requirement_id: req("req-api"),
                author: crate::evaluation::domain::ActorId("reviewer-2".to_string()),
                body: "Sandbox looked solid in the demo".to_string(),
                created_at: fixed_now(),
            },
        )
        .expect("seed comment");
    store
}

pub(super) fn build_service() -> (
    ScoringService<InMemoryScoringStore>,
    Arc<InMemoryScoringStore>,
    Arc<FixedClock>,
) {
    let store = Arc::new(seeded_store());
    let clock = Arc::new(FixedClock::new(fixed_now()));
    let service =
        ScoringService::with_clock(store.clone(), EngineConfig::default(), clock.clone());
    (service, store, clock)
}

/// Store whose requirement-score writes always lose the version race.
#[derive(Default)]
pub(super) struct ConflictRepository {
    pub(super) inner: InMemoryScoringStore,
}

impl ConflictRepository {
    pub(super) fn seeded() -> Self {
        Self {
            inner: seeded_store(),
        }
    }
}

impl ProposalSource for ConflictRepository {
    fn proposals(
        &self,
        scope: &OpportunityScope,
    ) -> Result<Vec<ExtractedProposal>, RepositoryError> {
        self.inner.proposals(scope)
    }
}

impl RequirementSource for ConflictRepository {
    fn requirements(&self, scope: &OpportunityScope) -> Result<Vec<Requirement>, RepositoryError> {
        self.inner.requirements(scope)
    }

    fn evaluation_matrix(
        &self,
        scope: &OpportunityScope,
    ) -> Result<Option<EvaluationMatrix>, RepositoryError> {
        self.inner.evaluation_matrix(scope)
    }
}

impl SnapshotStore for ConflictRepository {
    fn load_matrix_snapshot(
        &self,
        scope: &OpportunityScope,
    ) -> Result<Option<MatrixSnapshot>, RepositoryError> {
        self.inner.load_matrix_snapshot(scope)
    }

    fn save_matrix_snapshot(
        &self,
        scope: &OpportunityScope,
        snapshot: MatrixSnapshot,
    ) -> Result<(), RepositoryError> {
        self.inner.save_matrix_snapshot(scope, snapshot)
    }

    fn mark_matrix_stale(&self, scope: &OpportunityScope) -> Result<(), RepositoryError> {
        self.inner.mark_matrix_stale(scope)
    }

    fn save_comparison(
        &self,
        scope: &OpportunityScope,
        breakdown: &ComparisonBreakdown,
    ) -> Result<(), RepositoryError> {
        self.inner.save_comparison(scope, breakdown)
    }

    fn load_comparison(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Option<ComparisonBreakdown>, RepositoryError> {
        self.inner.load_comparison(scope, supplier_id)
    }

    fn save_readiness(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
        result: &ReadinessResult,
    ) -> Result<(), RepositoryError> {
        self.inner.save_readiness(scope, supplier_id, result)
    }

    fn load_readiness(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Option<ReadinessResult>, RepositoryError> {
        self.inner.load_readiness(scope, supplier_id)
    }
}

impl ScoreStore for ConflictRepository {
    fn load_scores(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Option<RequirementScoreSet>, RepositoryError> {
        self.inner.load_scores(scope, supplier_id)
    }

    fn save_scores(
        &self,
        _scope: &OpportunityScope,
        _set: RequirementScoreSet,
        expected_version: u64,
    ) -> Result<RequirementScoreSet, RepositoryError> {
        Err(RepositoryError::VersionConflict {
            expected: expected_version,
            found: expected_version + 1,
        })
    }

    fn score_generation(&self, scope: &OpportunityScope) -> Result<u64, RepositoryError> {
        self.inner.score_generation(scope)
    }

    fn comments(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Vec<ReviewComment>, RepositoryError> {
        self.inner.comments(scope, supplier_id)
    }
}

type ScoreReadHook = Box<dyn FnOnce() + Send>;

/// Store that runs a one-shot hook right after a chosen supplier's scores
/// are read, so a write can land in the middle of a matrix recompute.
pub(super) struct InterleavingRepository {
    pub(super) inner: Arc<InMemoryScoringStore>,
    supplier: SupplierId,
    hook: Mutex<Option<ScoreReadHook>>,
}

impl InterleavingRepository {
    pub(super) fn new(inner: Arc<InMemoryScoringStore>, supplier: SupplierId) -> Self {
        Self {
            inner,
            supplier,
            hook: Mutex::new(None),
        }
    }

    pub(super) fn after_next_read(&self, hook: impl FnOnce() + Send + 'static) {
        *self.hook.lock().expect("hook mutex poisoned") = Some(Box::new(hook));
    }
}

impl ProposalSource for InterleavingRepository {
    fn proposals(
        &self,
        scope: &OpportunityScope,
    ) -> Result<Vec<ExtractedProposal>, RepositoryError> {
        self.inner.proposals(scope)
    }
}

impl RequirementSource for InterleavingRepository {
    fn requirements(&self, scope: &OpportunityScope) -> Result<Vec<Requirement>, RepositoryError> {
        self.inner.requirements(scope)
    }

    fn evaluation_matrix(
        &self,
        scope: &OpportunityScope,
    ) -> Result<Option<EvaluationMatrix>, RepositoryError> {
        self.inner.evaluation_matrix(scope)
    }
}

impl SnapshotStore for InterleavingRepository {
    fn load_matrix_snapshot(
        &self,
        scope: &OpportunityScope,
    ) -> Result<Option<MatrixSnapshot>, RepositoryError> {
        self.inner.load_matrix_snapshot(scope)
    }

    fn save_matrix_snapshot(
        &self,
        scope: &OpportunityScope,
        snapshot: MatrixSnapshot,
    ) -> Result<(), RepositoryError> {
        self.inner.save_matrix_snapshot(scope, snapshot)
    }

    fn mark_matrix_stale(&self, scope: &OpportunityScope) -> Result<(), RepositoryError> {
        self.inner.mark_matrix_stale(scope)
    }

    fn save_comparison(
        &self,
        scope: &OpportunityScope,
        breakdown: &ComparisonBreakdown,
    ) -> Result<(), RepositoryError> {
        self.inner.save_comparison(scope, breakdown)
    }

    fn load_comparison(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Option<ComparisonBreakdown>, RepositoryError> {
        self.inner.load_comparison(scope, supplier_id)
    }

    fn save_readiness(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
        result: &ReadinessResult,
    ) -> Result<(), RepositoryError> {
        self.inner.save_readiness(scope, supplier_id, result)
    }

    fn load_readiness(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Option<ReadinessResult>, RepositoryError> {
        self.inner.load_readiness(scope, supplier_id)
    }
}

impl ScoreStore for InterleavingRepository {
    fn load_scores(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Option<RequirementScoreSet>, RepositoryError> {
        let loaded = self.inner.load_scores(scope, supplier_id);
        if supplier_id == &self.supplier {
            let hook = self.hook.lock().expect("hook mutex poisoned").take();
            if let Some(hook) = hook {
                hook();
            }
        }
        loaded
    }

    fn save_scores(
        &self,
        scope: &OpportunityScope,
        set: RequirementScoreSet,
        expected_version: u64,
    ) -> Result<RequirementScoreSet, RepositoryError> {
        self.inner.save_scores(scope, set, expected_version)
    }

    fn score_generation(&self, scope: &OpportunityScope) -> Result<u64, RepositoryError> {
        self.inner.score_generation(scope)
    }

    fn comments(
        &self,
        scope: &OpportunityScope,
        supplier_id: &SupplierId,
    ) -> Result<Vec<ReviewComment>, RepositoryError> {
        self.inner.comments(scope, supplier_id)
    }
}

pub(super) struct UnavailableRepository;

fn offline<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("database offline".to_string()))
}

impl ProposalSource for UnavailableRepository {
    fn proposals(
        &self,
        _scope: &OpportunityScope,
    ) -> Result<Vec<ExtractedProposal>, RepositoryError> {
        offline()
    }
}

impl RequirementSource for UnavailableRepository {
    fn requirements(&self, _scope: &OpportunityScope) -> Result<Vec<Requirement>, RepositoryError> {
        offline()
    }

    fn evaluation_matrix(
        &self,
        _scope: &OpportunityScope,
    ) -> Result<Option<EvaluationMatrix>, RepositoryError> {
        offline()
    }
}

impl SnapshotStore for UnavailableRepository {
    fn load_matrix_snapshot(
        &self,
        _scope: &OpportunityScope,
    ) -> Result<Option<MatrixSnapshot>, RepositoryError> {
        offline()
    }

    fn save_matrix_snapshot(
        &self,
        _scope: &OpportunityScope,
        _snapshot: MatrixSnapshot,
    ) -> Result<(), RepositoryError> {
        offline()
    }

    fn mark_matrix_stale(&self, _scope: &OpportunityScope) -> Result<(), RepositoryError> {
        offline()
    }

    fn save_comparison(
        &self,
        _scope: &OpportunityScope,
        _breakdown: &ComparisonBreakdown,
    ) -> Result<(), RepositoryError> {
        offline()
    }

    fn load_comparison(
        &self,
        _scope: &OpportunityScope,
        _supplier_id: &SupplierId,
    ) -> Result<Option<ComparisonBreakdown>, RepositoryError> {
        offline()
    }

    fn save_readiness(
        &self,
        _scope: &OpportunityScope,
        _supplier_id: &SupplierId,
        _result: &ReadinessResult,
    ) -> Result<(), RepositoryError> {
        offline()
    }

    fn load_readiness(
        &self,
        _scope: &OpportunityScope,
        _supplier_id: &SupplierId,
    ) -> Result<Option<ReadinessResult>, RepositoryError> {
        offline()
    }
}

impl ScoreStore for UnavailableRepository {
    fn load_scores(
        &self,
        _scope: &OpportunityScope,
        _supplier_id: &SupplierId,
    ) -> Result<Option<RequirementScoreSet>, RepositoryError> {
        offline()
    }

    fn save_scores(
        &self,
        _scope: &OpportunityScope,
        _set: RequirementScoreSet,
        _expected_version: u64,
    ) -> Result<RequirementScoreSet, RepositoryError> {
        offline()
    }

    fn score_generation(&self, _scope: &OpportunityScope) -> Result<u64, RepositoryError> {
        offline()
    }

    fn comments(
        &self,
        _scope: &OpportunityScope,
        _supplier_id: &SupplierId,
    ) -> Result<Vec<ReviewComment>, RepositoryError> {
        offline()
    }
}

pub(super) fn assert_conflict_response(response: Response) {
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let body = axum::body::to_bytes(response.into_body(), 256 * 1024)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8 payload")
}

pub(super) fn scoring_router_with_service(
    service: ScoringService<InMemoryScoringStore>,
) -> axum::Router {
    crate::evaluation::scoring_router(Arc::new(service))
}
