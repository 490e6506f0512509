//! Severity score to risk tier classification.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Score assumed when a record has no usable severity.
pub const DEFAULT_SEVERITY: f64 = 5.0;

const URGENT_THRESHOLD: f64 = 8.0;
const MODERATE_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Urgent,
    Moderate,
    Low,
}

impl RiskTier {
    /// Boundaries resolve upward: 8.0 is urgent, 5.0 is moderate.
    pub fn from_score(score: f64) -> Self {
        if score >= URGENT_THRESHOLD {
            RiskTier::Urgent
        } else if score >= MODERATE_THRESHOLD {
            RiskTier::Moderate
        } else {
            RiskTier::Low
        }
    }

    /// Row id in the runtime's `risk_category` table.
    pub fn category_id(&self) -> i64 {
        match self {
            RiskTier::Urgent => 1,
            RiskTier::Moderate => 2,
            RiskTier::Low => 3,
        }
    }

    /// Rating key used by the runtime.
    pub fn rating(&self) -> &'static str {
        match self {
            RiskTier::Urgent => "urgent",
            RiskTier::Moderate => "non_urgent",
            RiskTier::Low => "low_risk",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RiskTier::Urgent => "Urgent",
            RiskTier::Moderate => "Moderate",
            RiskTier::Low => "Low",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskTier::Urgent => "Contact a veterinarian immediately",
            RiskTier::Moderate => "Schedule a veterinary examination",
            RiskTier::Low => "Monitor at home and follow the first-aid advice",
        }
    }
}

/// Classify an optional score; absent scores use [`DEFAULT_SEVERITY`].
pub fn classify(score: Option<f64>) -> RiskTier {
    RiskTier::from_score(score.unwrap_or(DEFAULT_SEVERITY))
}

/// Read a severity from a loosely-typed value.
///
/// Numbers and numeric strings are accepted. Anything else, including
/// non-finite values, yields `None`.
pub fn severity_from_value(value: Option<&Value>) -> Option<f64> {
    let score = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    score.is_finite().then_some(score)
}
