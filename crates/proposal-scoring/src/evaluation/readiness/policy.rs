use serde::{Deserialize, Serialize};

use super::config::ReadinessConfig;
use super::rules::ReadinessSignals;

/// Three-valued award readiness verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadinessIndicator {
    Ready,
    Conditional,
    NotReady,
}

impl ReadinessIndicator {
    pub const fn label(self) -> &'static str {
        match self {
            ReadinessIndicator::Ready => "READY",
            ReadinessIndicator::Conditional => "CONDITIONAL",
            ReadinessIndicator::NotReady => "NOT_READY",
        }
    }
}

/// Thresholds are inclusive lower bounds on the unrounded score.
pub fn indicator_for(score: f64, config: &ReadinessConfig) -> ReadinessIndicator {
    if score >= config.ready_threshold {
        ReadinessIndicator::Ready
    } else if score >= config.conditional_threshold {
        ReadinessIndicator::Conditional
    } else {
        ReadinessIndicator::NotReady
    }
}

pub(crate) fn compose_rationale(
    indicator: ReadinessIndicator,
    score: f64,
    signals: &ReadinessSignals,
    config: &ReadinessConfig,
) -> String {
    let mut rationale = format!(
        "{} at {:.1}/100: base {:.1} from {:.0}% requirements coverage and {:.0}% mandatory pass rate",
        indicator.label(),
        score,
        signals.base,
        signals.coverage_pct,
        signals.mandatory_pass_rate
    );

    if !signals.penalties.is_empty() {
        let penalties: Vec<String> = signals
            .penalties
            .iter()
            .map(|penalty| format!("{} (-{:.0})", penalty.reason, penalty.points))
            .collect();
        rationale.push_str(&format!("; penalties: {}", penalties.join(", ")));
    }

    rationale.push_str(&format!(
        "; ready at {:.0}, conditional at {:.0}",
        config.ready_threshold, config.conditional_threshold
    ));
    rationale
}
