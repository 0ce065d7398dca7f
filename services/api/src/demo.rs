use crate::infra::{BundleComment, OpportunityBundle};
use chrono::{TimeZone, Utc};
use clap::{Args, ValueEnum};
use proposal_scoring::config::AppConfig;
use proposal_scoring::error::AppError;
use proposal_scoring::evaluation::{
    ActorId, ComparisonBreakdown, ComplianceGap, ComplianceLevel, CoverageFinding, DemoSummary,
    Differentiator, EngineConfig, EvaluationCriterion, EvaluationMatrix, ExtractedProposal,
    InMemoryScoringStore, MetricKind, OpportunityScope, PricingBreakdown, ReadinessResult,
    Requirement, RequirementId, ResponseStatus, ReviewComment, RiskFlag, RiskSeverity,
    ScoringError, ScoringMatrix, ScoringService, SupplierId, TechnicalClaim,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable summary tables
    #[default]
    Table,
    /// Flat requirement x supplier matrix export
    Csv,
    /// Full comparison, matrix, and readiness payload
    Json,
}

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// Opportunity bundle (requirements, proposals, optional evaluation matrix) as JSON
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub(crate) format: OutputFormat,
    /// Restrict comparison and readiness output to one supplier
    #[arg(long)]
    pub(crate) supplier: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EvaluationReport {
    pub(crate) scope: OpportunityScope,
    pub(crate) comparison: Vec<ComparisonBreakdown>,
    pub(crate) matrix: ScoringMatrix,
    pub(crate) readiness: Vec<ReadinessResult>,
}

pub(crate) fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let EvaluateArgs {
        input,
        format,
        supplier,
    } = args;

    let bundle = OpportunityBundle::from_path(&input)?;
    let engine = AppConfig::load()?.engine();
    let supplier = supplier.map(SupplierId);

    match format {
        OutputFormat::Csv => match export_bundle(&bundle, engine) {
            Ok(csv) => print!("{csv}"),
            Err(err) => return report_no_data(err),
        },
        OutputFormat::Json => match evaluate_bundle(&bundle, engine, supplier.as_ref()) {
            Ok(report) => println!("{}", serde_json::to_string_pretty(&report)?),
            Err(err) => return report_no_data(err),
        },
        OutputFormat::Table => match evaluate_bundle(&bundle, engine, supplier.as_ref()) {
            Ok(report) => render_report(&report),
            Err(err) => return report_no_data(err),
        },
    }
    Ok(())
}

pub(crate) fn run_demo() -> Result<(), AppError> {
    println!("Supplier evaluation demo");
    let bundle = sample_bundle();
    let (service, scope) = scoring_service(&bundle, EngineConfig::default())?;

    let report = build_report(&service, &scope, None)?;
    render_report(&report);

    let supplier = SupplierId("northwind".to_string());
    let requirement = RequirementId("req-dispatch".to_string());
    println!("\nReviewer override");
    let score = service.apply_override(
        &scope,
        &supplier,
        &requirement,
        85.0,
        "live dispatch console shown in demo",
        &ActorId("panel-chair".to_string()),
    )?;
    println!(
        "- {} / {}: auto {:.0} -> override {:.0} (variance {:.0})",
        supplier,
        requirement,
        score.auto_score.raw_score,
        score.effective_score(),
        score.variance()
    );

    let items = service.scoring_items(&scope, &supplier)?;
    for item in items.iter().filter(|item| item.override_score.is_some()) {
        println!(
            "  variance level {:?}; must-have violation: {}",
            item.variance_level, item.must_have_violation
        );
    }

    let regenerated = service.regenerate_scores(&scope, &supplier)?;
    let kept = regenerated
        .iter()
        .filter(|score| score.buyer_override.is_some())
        .count();
    println!("- Regenerated {} scores, {} override(s) kept", regenerated.len(), kept);

    let matrix = service.get_scoring_matrix(&scope, false)?;
    println!(
        "- Matrix rebuilt at version {} after override invalidation",
        matrix.meta.version
    );
    Ok(())
}

fn scoring_service(
    bundle: &OpportunityBundle,
    engine: EngineConfig,
) -> Result<(ScoringService<InMemoryScoringStore>, OpportunityScope), AppError> {
    engine.validate()?;
    let store = Arc::new(InMemoryScoringStore::default());
    let scope = bundle.seed(&store)?;
    Ok((ScoringService::new(store, engine), scope))
}

fn evaluate_bundle(
    bundle: &OpportunityBundle,
    engine: EngineConfig,
    supplier: Option<&SupplierId>,
) -> Result<EvaluationReport, AppError> {
    let (service, scope) = scoring_service(bundle, engine)?;
    build_report(&service, &scope, supplier)
}

fn export_bundle(bundle: &OpportunityBundle, engine: EngineConfig) -> Result<String, AppError> {
    let (service, scope) = scoring_service(bundle, engine)?;
    Ok(service.export_scoring_matrix(&scope, &Default::default())?)
}

fn build_report(
    service: &ScoringService<InMemoryScoringStore>,
    scope: &OpportunityScope,
    supplier: Option<&SupplierId>,
) -> Result<EvaluationReport, AppError> {
    let mut comparison = service.run_comparison(scope)?;
    let matrix = service.get_scoring_matrix(scope, false)?;
    let readiness = match supplier {
        Some(supplier) => {
            comparison.retain(|row| &row.supplier_id == supplier);
            vec![service.classify_readiness(scope, supplier)?]
        }
        None => {
            let batch = service.classify_readiness_batch(scope)?;
            for failure in &batch.failures {
                eprintln!(
                    "readiness unavailable for {}: {}",
                    failure.supplier_id, failure.error
                );
            }
            batch.results
        }
    };

    Ok(EvaluationReport {
        scope: scope.clone(),
        comparison,
        matrix,
        readiness,
    })
}

/// An opportunity without submissions is an empty state, not a CLI failure.
fn report_no_data(err: AppError) -> Result<(), AppError> {
    match err {
        AppError::Scoring(ScoringError::NoData(detail)) => {
            println!("No data: {detail}");
            Ok(())
        }
        other => Err(other),
    }
}

pub(crate) fn render_report(report: &EvaluationReport) {
    println!("Opportunity {}", report.scope);

    println!("\nComposite ranking");
    for row in &report.comparison {
        let matrix_note = if row.matrix_used {
            "buyer weights"
        } else {
            "default weights"
        };
        println!(
            "{}. {} ({}) - {:.2}/100 [{}]",
            row.rank, row.supplier_name, row.supplier_id, row.total_score, matrix_note
        );
        let contributions: Vec<String> = MetricKind::ordered()
            .into_iter()
            .filter_map(|kind| {
                row.weighted_scores
                    .get(&kind)
                    .map(|value| format!("{} {:.2}", kind.label(), value))
            })
            .collect();
        println!("   {}", contributions.join(" | "));
        if !row.metrics.unknown.is_empty() {
            let unknown: Vec<&str> = row.metrics.unknown.iter().map(|kind| kind.label()).collect();
            println!("   unknown: {}", unknown.join(", "));
        }
    }

    println!(
        "\nRequirement matrix (version {}, {} requirements x {} suppliers)",
        report.matrix.meta.version,
        report.matrix.meta.total_requirements,
        report.matrix.meta.total_suppliers
    );
    for row in &report.matrix.requirements {
        let must_have = if row.requirement.must_have { " *" } else { "" };
        println!("- {}{}", row.requirement.title, must_have);
        for cell in &row.cells {
            println!(
                "    {}: {:.0} ({})",
                cell.supplier_name,
                cell.effective_score,
                cell.score.auto_score.status.label()
            );
        }
    }
    for summary in &report.matrix.supplier_summaries {
        println!(
            "  #{} {}: {:.2} aggregated | {} pass / {} partial / {} fail / {} missing | {} must-have violation(s)",
            summary.rank,
            summary.supplier_name,
            summary.aggregated_score,
            summary.pass_count,
            summary.partial_count,
            summary.fail_count,
            summary.missing_count,
            summary.must_have_violations
        );
    }

    println!("\nAward readiness");
    for result in &report.readiness {
        println!(
            "- {}: {} ({:.1})",
            result.supplier_id,
            result.indicator.label(),
            result.score
        );
        println!("  {}", result.rationale);
        for issue in &result.critical_issues {
            println!("  ! {issue}");
        }
        for factor in &result.conditional_factors {
            println!("  ? {factor}");
        }
    }
}

fn requirement(id: &str, title: &str, category: &str, must_have: bool) -> Requirement {
    Requirement {
        id: RequirementId(id.to_string()),
        title: title.to_string(),
        category: category.to_string(),
        must_have,
        weight: None,
    }
}

fn finding(id: &str, level: ComplianceLevel, response: &str) -> CoverageFinding {
    CoverageFinding {
        requirement_id: Some(RequirementId(id.to_string())),
        level,
        response_text: Some(response.to_string()),
        ..CoverageFinding::default()
    }
}

fn pricing(total: f64) -> Option<PricingBreakdown> {
    Some(PricingBreakdown {
        total: Some(total),
        currency: Some("USD".to_string()),
        line_items: Vec::new(),
    })
}

/// Three suppliers bidding on a fleet dispatch platform.
pub(crate) fn sample_bundle() -> OpportunityBundle {
    let submitted_at = Utc.with_ymd_and_hms(2024, 4, 22, 17, 0, 0).single();

    OpportunityBundle {
        tenant_id: Some("demo-tenant".to_string()),
        opportunity_id: Some("rfp-dispatch-2024".to_string()),
        requirements: vec![
            requirement("req-dispatch", "Real-time dispatch console", "Operations", true),
            requirement("req-sso", "SAML single sign-on", "Security", true),
            requirement("req-mobile", "Offline driver app", "Mobile", false),
            requirement("req-reporting", "Custom reporting", "Analytics", false),
        ],
        proposals: vec![
            ExtractedProposal {
                supplier_id: SupplierId("northwind".to_string()),
                supplier_name: "Northwind Logistics Software".to_string(),
                status: ResponseStatus::Submitted,
                submitted_at,
                pricing: pricing(184_000.0),
                coverage: vec![
                    finding("req-dispatch", ComplianceLevel::PartiallyMet, "Console GA in Q3"),
                    finding("req-sso", ComplianceLevel::FullyMet, "SAML 2.0 via Okta and Entra"),
                    finding("req-mobile", ComplianceLevel::FullyMet, "Offline-first Android/iOS"),
                    finding("req-reporting", ComplianceLevel::PartiallyMet, "Template reports only"),
                ],
                technical_claims: vec![TechnicalClaim {
                    claim: "Sub-second location updates".to_string(),
                    verified: Some(true),
                }],
                risks: vec![RiskFlag {
                    description: "Dispatch console not yet generally available".to_string(),
                    severity: RiskSeverity::High,
                    mitigation: Some("Early-access program with weekly builds".to_string()),
                }],
                differentiators: vec![Differentiator {
                    title: "Offline route caching".to_string(),
                    requirement_id: Some(RequirementId("req-mobile".to_string())),
                }],
                compliance_gaps: Vec::new(),
                demo: Some(DemoSummary {
                    overall_score: Some(82.0),
                    highlights: vec!["Driver app worked in airplane mode".to_string()],
                    concerns: Vec::new(),
                }),
            },
            ExtractedProposal {
                supplier_id: SupplierId("contoso".to_string()),
                supplier_name: "Contoso Fleet".to_string(),
                status: ResponseStatus::Submitted,
                submitted_at,
                pricing: pricing(221_500.0),
                coverage: vec![
                    finding("req-dispatch", ComplianceLevel::FullyMet, "Live map with drag-and-drop"),
                    finding("req-sso", ComplianceLevel::FullyMet, "SAML and SCIM provisioning"),
                    finding("req-mobile", ComplianceLevel::PartiallyMet, "Read-only offline mode"),
                    finding("req-reporting", ComplianceLevel::FullyMet, "Embedded BI workspace"),
                ],
                technical_claims: vec![
                    TechnicalClaim {
                        claim: "99.99% uptime".to_string(),
                        verified: None,
                    },
                    TechnicalClaim {
                        claim: "SOC 2 Type II".to_string(),
                        verified: Some(true),
                    },
                ],
                risks: Vec::new(),
                differentiators: vec![Differentiator {
                    title: "Embedded analytics".to_string(),
                    requirement_id: Some(RequirementId("req-reporting".to_string())),
                }],
                compliance_gaps: vec![ComplianceGap {
                    description: "Data processing addendum unsigned".to_string(),
                    critical: false,
                    resolved: false,
                }],
                demo: Some(DemoSummary {
                    overall_score: Some(91.0),
                    highlights: vec!["Dispatch reassignment in two clicks".to_string()],
                    concerns: Vec::new(),
                }),
            },
            ExtractedProposal {
                supplier_id: SupplierId("fabrikam".to_string()),
                supplier_name: "Fabrikam Routing".to_string(),
                status: ResponseStatus::Submitted,
                submitted_at,
                pricing: pricing(139_900.0),
                coverage: vec![
                    finding("req-dispatch", ComplianceLevel::NotMet, "Batch dispatch only"),
                    finding("req-sso", ComplianceLevel::PartiallyMet, "SSO on enterprise tier"),
                ],
                technical_claims: Vec::new(),
                risks: vec![RiskFlag {
                    description: "Single hosting region".to_string(),
                    severity: RiskSeverity::Critical,
                    mitigation: None,
                }],
                differentiators: Vec::new(),
                compliance_gaps: vec![ComplianceGap {
                    description: "No penetration test report".to_string(),
                    critical: true,
                    resolved: false,
                }],
                demo: None,
            },
            ExtractedProposal {
                supplier_id: SupplierId("tailspin".to_string()),
                supplier_name: "Tailspin Telematics".to_string(),
                status: ResponseStatus::Draft,
                ..ExtractedProposal::default()
            },
        ],
        evaluation_matrix: Some(EvaluationMatrix {
            criteria: vec![
                EvaluationCriterion {
                    name: "Commercial".to_string(),
                    weight: 40.0,
                },
                EvaluationCriterion {
                    name: "Functional fit".to_string(),
                    weight: 40.0,
                },
                EvaluationCriterion {
                    name: "Delivery risk".to_string(),
                    weight: 20.0,
                },
            ],
        }),
        comments: vec![BundleComment {
            supplier_id: SupplierId("northwind".to_string()),
            comment: ReviewComment {
                requirement_id: RequirementId("req-dispatch".to_string()),
                author: ActorId("panel-chair".to_string()),
                body: "Ask for the console roadmap in writing".to_string(),
                created_at: Utc::now(),
            },
        }],
    }
}
