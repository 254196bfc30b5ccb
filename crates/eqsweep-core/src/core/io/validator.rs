//! Physical-plausibility validation of parsed results.
//!
//! Validation never raises and never mutates: it returns a verdict plus a
//! warning list (empty for the all-valid case) so implausible results are
//! flagged for downstream consumers instead of being silently dropped or
//! silently "fixed".

use crate::core::models::result::CalculationResult;

/// A validation verdict: overall flag plus one warning per violated check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Validation {
    pub is_valid: bool,
    pub warnings: Vec<String>,
}

/// Checks a parsed result for physical plausibility.
pub fn validate(result: &CalculationResult) -> Validation {
    let mut warnings = Vec::new();

    if !result.converged {
        warnings.push("Calculation did not converge".to_string());
    }

    if result.phases.is_empty() {
        warnings.push("No phases found in result".to_string());
    } else {
        let negative: Vec<&str> = result
            .phases
            .iter()
            .filter(|(_, amount)| **amount < 0.0)
            .map(|(name, _)| name.as_str())
            .collect();
        if !negative.is_empty() {
            warnings.push(format!("Negative phase amounts: {}", negative.join(", ")));
        }
    }

    if let Some(ph) = result.ph {
        if !(0.0..=14.0).contains(&ph) {
            warnings.push(format!("pH out of range [0, 14]: {ph}"));
        }
    }

    if let Some(ionic_strength) = result.ionic_strength {
        if ionic_strength < 0.0 {
            warnings.push(format!("Negative ionic strength: {ionic_strength}"));
        }
    }

    Validation {
        is_valid: warnings.is_empty(),
        warnings,
    }
}
