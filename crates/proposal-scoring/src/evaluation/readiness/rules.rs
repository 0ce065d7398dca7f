use super::super::domain::RiskSeverity;
use super::config::ReadinessConfig;
use super::{ReadinessInput, ReadinessPenalty};

const DEMO_STRENGTH_SCORE: f64 = 75.0;
const COVERAGE_STRENGTH_PCT: f64 = 90.0;

pub(crate) struct ReadinessSignals {
    pub base: f64,
    pub coverage_pct: f64,
    pub mandatory_pass_rate: f64,
    pub penalties: Vec<ReadinessPenalty>,
    pub critical_issues: Vec<String>,
    pub conditional_factors: Vec<String>,
    pub strengths: Vec<String>,
}

/// Base score from coverage and mandatory pass rate, less enumerated penalties.
pub(crate) fn score_readiness(
    input: &ReadinessInput,
    config: &ReadinessConfig,
) -> (f64, ReadinessSignals) {
    let mut penalties = Vec::new();
    let mut critical_issues = Vec::new();
    let mut conditional_factors = Vec::new();
    let mut strengths = Vec::new();

    let coverage_pct = match input.requirements_coverage_pct {
        Some(pct) => {
            let pct = pct.clamp(0.0, 100.0);
            if pct >= COVERAGE_STRENGTH_PCT {
                strengths.push(format!("{pct:.0}% requirements coverage"));
            }
            pct
        }
        None => {
            conditional_factors.push("requirements coverage could not be determined".to_string());
            0.0
        }
    };

    let mandatory = &input.mandatory;
    let mandatory_pass_rate = if mandatory.total == 0 {
        100.0
    } else {
        100.0 * mandatory.passed as f64 / mandatory.total as f64
    };
    for title in &mandatory.failed {
        critical_issues.push(format!("mandatory requirement not met: {title}"));
    }
    for title in &mandatory.partial {
        conditional_factors.push(format!("mandatory requirement only partially met: {title}"));
    }
    if mandatory.total > 0 && mandatory.passed == mandatory.total {
        strengths.push(format!(
            "all {} mandatory requirements met",
            mandatory.total
        ));
    }

    let weight_sum = config.coverage_weight + config.mandatory_weight;
    let base = if weight_sum > 0.0 {
        (config.coverage_weight * coverage_pct + config.mandatory_weight * mandatory_pass_rate)
            / weight_sum
    } else {
        0.0
    };

    for gap in input.compliance_gaps.iter().filter(|gap| !gap.resolved) {
        if gap.critical {
            critical_issues.push(format!("unresolved critical compliance gap: {}", gap.description));
            penalties.push(ReadinessPenalty {
                reason: format!("critical compliance gap: {}", gap.description),
                points: config.critical_gap_penalty,
            });
        } else {
            conditional_factors.push(format!("open compliance gap: {}", gap.description));
            penalties.push(ReadinessPenalty {
                reason: format!("compliance gap: {}", gap.description),
                points: config.gap_penalty,
            });
        }
    }

    let mut severe_risks = 0;
    for risk in &input.risks {
        let (points, bucket) = match risk.severity {
            RiskSeverity::Critical => (config.critical_risk_penalty, &mut critical_issues),
            RiskSeverity::High => (config.high_risk_penalty, &mut conditional_factors),
            RiskSeverity::Medium | RiskSeverity::Low => continue,
        };
        severe_risks += 1;

        let mitigation = risk
            .mitigation
            .as_deref()
            .map(|mitigation| format!(" (mitigation: {mitigation})"))
            .unwrap_or_default();
        bucket.push(format!(
            "{} risk: {}{mitigation}",
            risk.severity.label(),
            risk.description
        ));
        penalties.push(ReadinessPenalty {
            reason: format!("{} risk: {}", risk.severity.label(), risk.description),
            points,
        });
    }
    if severe_risks == 0 {
        strengths.push("no high-severity risks flagged".to_string());
    }

    if input.price_total.is_none() {
        conditional_factors.push("pricing missing or unreadable".to_string());
        penalties.push(ReadinessPenalty {
            reason: "pricing missing".to_string(),
            points: config.missing_pricing_penalty,
        });
    }

    if let Some(demo) = &input.demo {
        if let Some(score) = demo.overall_score.filter(|score| score.is_finite()) {
            if score >= DEMO_STRENGTH_SCORE {
                strengths.push(format!("strong demo ({score:.0}/100)"));
            }
        }
        strengths.extend(demo.highlights.iter().map(|item| format!("demo: {item}")));
        conditional_factors.extend(
            demo.concerns
                .iter()
                .map(|item| format!("demo concern: {item}")),
        );
    }

    let deducted: f64 = penalties.iter().map(|penalty| penalty.points).sum();
    let score = (base - deducted).clamp(0.0, 100.0);

    (
        score,
        ReadinessSignals {
            base,
            coverage_pct,
            mandatory_pass_rate,
            penalties,
            critical_issues,
            conditional_factors,
            strengths,
        },
    )
}
