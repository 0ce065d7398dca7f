use serde::{Deserialize, Serialize};

/// Readiness thresholds and penalty weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Scores at or above this are READY.
    pub ready_threshold: f64,
    /// Scores at or above this (and below `ready_threshold`) are CONDITIONAL.
    pub conditional_threshold: f64,
    pub coverage_weight: f64,
    pub mandatory_weight: f64,
    pub critical_gap_penalty: f64,
    pub gap_penalty: f64,
    pub critical_risk_penalty: f64,
    pub high_risk_penalty: f64,
    pub missing_pricing_penalty: f64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            ready_threshold: 80.0,
            conditional_threshold: 60.0,
            coverage_weight: 0.6,
            mandatory_weight: 0.4,
            critical_gap_penalty: 15.0,
            gap_penalty: 5.0,
            critical_risk_penalty: 20.0,
            high_risk_penalty: 10.0,
            missing_pricing_penalty: 5.0,
        }
    }
}

impl ReadinessConfig {
    pub fn validate(&self) -> Result<(), String> {
        let ordered = 0.0 <= self.conditional_threshold
            && self.conditional_threshold < self.ready_threshold
            && self.ready_threshold <= 100.0;
        if !ordered {
            return Err(format!(
                "readiness thresholds must satisfy 0 <= conditional < ready <= 100 (conditional {}, ready {})",
                self.conditional_threshold, self.ready_threshold
            ));
        }

        let weights = self.coverage_weight + self.mandatory_weight;
        if self.coverage_weight < 0.0 || self.mandatory_weight < 0.0 || weights <= 0.0 {
            return Err("readiness base weights must be non-negative with a positive sum".to_string());
        }
        Ok(())
    }
}
