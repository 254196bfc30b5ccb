use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The kind of failure recorded on a calculation result.
///
/// Domain failures are data, not exceptions: every kind here is recorded
/// per task and the batch continues. Only configuration failures (checked
/// once, before any task runs) abort a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureKind {
    /// The calculation ran but did not reach equilibrium.
    Convergence,
    /// The calculation exceeded its wall-clock budget.
    Timeout,
    /// The output artifact was unreadable or malformed.
    Parse,
    /// The artifact could not be read or written.
    Io,
    /// Anything else.
    Other,
}

impl FailureKind {
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Convergence => "convergence",
            FailureKind::Timeout => "timeout",
            FailureKind::Parse => "parse",
            FailureKind::Io => "io",
            FailureKind::Other => "other",
        }
    }
}

/// The typed outcome of one equilibrium calculation.
///
/// `method` records how the result was produced (external solver vs.
/// heuristic approximation) so downstream consumers can tell
/// solver-verified results from approximations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    pub converged: bool,
    #[serde(default)]
    pub method: String,
    /// Phase name → amount in moles.
    #[serde(default)]
    pub phases: BTreeMap<String, f64>,
    #[serde(rename = "pH", default)]
    pub ph: Option<f64>,
    /// Redox potential (pe).
    #[serde(default)]
    pub pe: Option<f64>,
    #[serde(default)]
    pub ionic_strength: Option<f64>,
    #[serde(default)]
    pub gibbs_energy: Option<f64>,
    #[serde(default)]
    pub temperature_k: Option<f64>,
    #[serde(default)]
    pub pressure_bar: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub failure: Option<FailureKind>,
    #[serde(default)]
    pub execution_time_s: f64,
}

impl Default for CalculationResult {
    fn default() -> Self {
        Self {
            converged: false,
            method: String::new(),
            phases: BTreeMap::new(),
            ph: None,
            pe: None,
            ionic_strength: None,
            gibbs_energy: None,
            temperature_k: None,
            pressure_bar: None,
            error: None,
            failure: None,
            execution_time_s: 0.0,
        }
    }
}

impl CalculationResult {
    /// A non-converged placeholder carrying a failure kind and message.
    pub fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            converged: false,
            error: Some(message.into()),
            failure: Some(kind),
            ..Self::default()
        }
    }

    /// True when the calculation ran to completion without a recorded
    /// failure (it may still be non-converged).
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_results_carry_kind_and_message() {
        let result = CalculationResult::failed(FailureKind::Timeout, "exceeded 300s");
        assert!(!result.converged);
        assert!(!result.is_success());
        assert_eq!(result.failure, Some(FailureKind::Timeout));
        assert_eq!(result.error.as_deref(), Some("exceeded 300s"));
    }

    #[test]
    fn ph_serializes_under_its_conventional_name() {
        let result = CalculationResult {
            converged: true,
            ph: Some(12.5),
            ..CalculationResult::default()
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"pH\":12.5"));
    }

    #[test]
    fn missing_optional_fields_deserialize_to_defaults() {
        let result: CalculationResult =
            serde_json::from_str(r#"{"converged": true}"#).unwrap();
        assert!(result.converged);
        assert!(result.phases.is_empty());
        assert!(result.ph.is_none());
        assert!(result.is_success());
    }
}
