//! Result-artifact parsing with format sniffing.
//!
//! Solver output arrives in one of three shapes: the structured JSON our
//! own tooling writes, GEMS-style free text, or opaque `.dat` dumps that
//! are attempted as text. Format is decided by extension first, then by
//! sniffing the first non-blank line. Parsing never fails: a missing or
//! malformed artifact yields a non-converged placeholder result so batch
//! aggregation is never blocked by one bad file.

use crate::core::models::result::{CalculationResult, FailureKind};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Detected artifact format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultFormat {
    Json,
    Text,
    Dat,
}

/// Case-sensitive substrings any of which marks a converged free-text
/// output, checked in this order.
pub const CONVERGENCE_MARKERS: [&str; 4] = [
    "CONVERGED",
    "Gibbs energy minimized",
    "Solution converged",
    "Equilibrium reached",
];

// Scalar extractors, each applied independently with the first match
// winning. All are case-insensitive. `pe` requires a word boundary so it
// does not fire inside words like "temperature".
static PH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)pH[:\s=]+\s*([-+]?\d*\.?\d+)").expect("valid pH pattern")
});
static PE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bpe[:\s=]+\s*([-+]?\d*\.?\d+)").expect("valid pe pattern")
});
static IONIC_STRENGTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ionic\s+strength[:\s=]+\s*([-+]?\d*\.?\d+(?:[eE][-+]?\d+)?)")
        .expect("valid ionic strength pattern")
});
static GIBBS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Gibbs\s+energy[:\s=]+\s*([-+]?\d*\.?\d+(?:[eE][-+]?\d+)?)")
        .expect("valid Gibbs energy pattern")
});
static TEMPERATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)temperature[:\s=]+\s*([-+]?\d*\.?\d+)").expect("valid temperature pattern")
});
static PRESSURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)pressure[:\s=]+\s*([-+]?\d*\.?\d+)").expect("valid pressure pattern")
});

// Phase-amount extractors: a `name amount mol` line shape, and the
// `Phase: name Amount: x` shape of GEMS-style reports.
static PHASE_MOL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(\S+)\s+([-+]?\d*\.?\d+(?:[eE][-+]?\d+)?)\s+mol")
        .expect("valid phase-line pattern")
});
static PHASE_REPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Phase:\s+(\S+)\s+Amount:\s+([-+]?\d*\.?\d+(?:[eE][-+]?\d+)?)")
        .expect("valid phase-report pattern")
});

/// Decides the artifact format: extension first, content sniffing for
/// ambiguous extensions.
pub fn detect_format(path: &Path) -> ResultFormat {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("json") => ResultFormat::Json,
        Some("dat") | Some("bin") => ResultFormat::Dat,
        _ => match std::fs::read_to_string(path) {
            Ok(content) => {
                let first_line = content.lines().find(|l| !l.trim().is_empty());
                if first_line.is_some_and(|l| l.trim_start().starts_with('{')) {
                    ResultFormat::Json
                } else {
                    ResultFormat::Text
                }
            }
            Err(_) => ResultFormat::Text,
        },
    }
}

/// Parses a result artifact into a typed result. Never fails: a missing
/// file or malformed content produces a non-converged placeholder with the
/// failure recorded.
pub fn parse(path: &Path) -> CalculationResult {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            return CalculationResult::failed(
                FailureKind::Io,
                format!("Result artifact not readable: {}: {e}", path.display()),
            );
        }
    };

    match detect_format(path) {
        ResultFormat::Json => parse_json(&content, path),
        // DAT dumps have no documented structure; the text scanner is the
        // best effort available.
        ResultFormat::Dat | ResultFormat::Text => parse_text(&content),
    }
}

fn parse_json(content: &str, path: &Path) -> CalculationResult {
    let value: Value = match serde_json::from_str(content) {
        Ok(value) => value,
        Err(e) => {
            return CalculationResult::failed(
                FailureKind::Parse,
                format!("Malformed JSON in {}: {e}", path.display()),
            );
        }
    };

    let mut result = CalculationResult {
        converged: value["converged"].as_bool().unwrap_or(false),
        method: value["method"].as_str().unwrap_or_default().to_string(),
        phases: extract_json_phases(&value["phases"]),
        ph: value["pH"].as_f64(),
        pe: value["pe"].as_f64(),
        ionic_strength: value["ionic_strength"].as_f64(),
        gibbs_energy: value["gibbs_energy"].as_f64(),
        temperature_k: value["temperature_k"].as_f64(),
        pressure_bar: value["pressure_bar"].as_f64(),
        error: value["error"].as_str().map(str::to_string),
        failure: serde_json::from_value(value["failure"].clone()).unwrap_or(None),
        execution_time_s: value["execution_time_s"].as_f64().unwrap_or(0.0),
    };
    if !result.converged && result.failure.is_none() && result.error.is_some() {
        result.failure = Some(FailureKind::Convergence);
    }
    debug!(phases = result.phases.len(), converged = result.converged, "Parsed JSON artifact.");
    result
}

/// Accepts both phase map shapes: `{"Calcite": 0.15}` and the richer
/// `{"Calcite": {"moles": 0.15, "mass_kg": ...}}`.
fn extract_json_phases(value: &Value) -> BTreeMap<String, f64> {
    let Some(map) = value.as_object() else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(name, entry)| {
            let amount = entry.as_f64().or_else(|| entry["moles"].as_f64())?;
            Some((name.clone(), amount))
        })
        .collect()
}

fn parse_text(content: &str) -> CalculationResult {
    let converged = CONVERGENCE_MARKERS
        .iter()
        .any(|marker| content.contains(marker));

    let mut result = CalculationResult {
        converged,
        phases: extract_text_phases(content),
        ph: extract_scalar(&PH_RE, content),
        pe: extract_scalar(&PE_RE, content),
        ionic_strength: extract_scalar(&IONIC_STRENGTH_RE, content),
        gibbs_energy: extract_scalar(&GIBBS_RE, content),
        temperature_k: extract_scalar(&TEMPERATURE_RE, content),
        pressure_bar: extract_scalar(&PRESSURE_RE, content),
        ..CalculationResult::default()
    };
    if !converged {
        result.error = Some("No convergence marker found in solver output".to_string());
        result.failure = Some(FailureKind::Convergence);
    }
    result
}

fn extract_scalar(pattern: &Regex, content: &str) -> Option<f64> {
    pattern
        .captures(content)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Only positive amounts are kept; a zero or negative line means the phase
/// is absent from the assemblage.
fn extract_text_phases(content: &str) -> BTreeMap<String, f64> {
    let mut phases = BTreeMap::new();
    for pattern in [&*PHASE_MOL_RE, &*PHASE_REPORT_RE] {
        for caps in pattern.captures_iter(content) {
            if let (Some(name), Some(amount)) = (caps.get(1), caps.get(2)) {
                if let Ok(amount) = amount.as_str().parse::<f64>() {
                    if amount > 0.0 {
                        phases.insert(name.as_str().to_string(), amount);
                    }
                }
            }
        }
    }
    phases
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn json_extension_decides_the_format() {
        assert_eq!(detect_format(Path::new("MIX_0000.json")), ResultFormat::Json);
        assert_eq!(detect_format(Path::new("MIX_0000.dat")), ResultFormat::Dat);
    }

    #[test]
    fn ambiguous_extension_is_sniffed_from_content() {
        let dir = tempdir().unwrap();

        let json_like = dir.path().join("a.out");
        fs::write(&json_like, "\n  {\"converged\": true}").unwrap();
        assert_eq!(detect_format(&json_like), ResultFormat::Json);

        let text_like = dir.path().join("b.out");
        fs::write(&text_like, "CONVERGED\npH = 12.0\n").unwrap();
        assert_eq!(detect_format(&text_like), ResultFormat::Text);
    }

    #[test]
    fn structured_json_fields_parse_directly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MIX_0000.json");
        fs::write(
            &path,
            r#"{"converged": true, "phases": {"Calcite": 0.15}, "pH": 12.5}"#,
        )
        .unwrap();

        let result = parse(&path);
        assert!(result.converged);
        assert_relative_eq!(result.phases["Calcite"], 0.15);
        assert_eq!(result.ph, Some(12.5));
        assert!(result.is_success());
    }

    #[test]
    fn nested_phase_entries_resolve_to_their_molar_amount() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MIX_0001.json");
        fs::write(
            &path,
            r#"{
                "converged": true,
                "phases": {
                    "Calcite": {"moles": 0.31, "mass_kg": 0.031},
                    "Portlandite": {"moles": 0.12, "mass_kg": 0.009}
                }
            }"#,
        )
        .unwrap();

        let result = parse(&path);
        assert_relative_eq!(result.phases["Calcite"], 0.31);
        assert_relative_eq!(result.phases["Portlandite"], 0.12);
    }

    #[test]
    fn free_text_convergence_marker_and_ph_are_extracted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MIX_0002.out");
        fs::write(&path, "Iteration 42\nCONVERGED\npH = 12.5\n").unwrap();

        let result = parse(&path);
        assert!(result.converged);
        assert_eq!(result.ph, Some(12.5));
    }

    #[test]
    fn free_text_scalars_parse_case_insensitively() {
        let text = "converged\nCONVERGED\n\
                    Temperature: 298.15\nPressure = 1.01325\n\
                    Ionic Strength: 1.2e-2\nGIBBS ENERGY = -1523.4\npe: 4.0\n";
        let result = parse_text(text);
        assert_eq!(result.temperature_k, Some(298.15));
        assert_eq!(result.pressure_bar, Some(1.01325));
        assert_eq!(result.ionic_strength, Some(1.2e-2));
        assert_eq!(result.gibbs_energy, Some(-1523.4));
        assert_eq!(result.pe, Some(4.0));
    }

    #[test]
    fn convergence_markers_are_case_sensitive() {
        let result = parse_text("converged\npH = 11.0\n");
        assert!(!result.converged);
        assert_eq!(result.failure, Some(FailureKind::Convergence));
        // Scalars are still extracted from non-converged output.
        assert_eq!(result.ph, Some(11.0));
    }

    #[test]
    fn phase_lines_keep_only_positive_amounts() {
        let text = "CONVERGED\n\
                    Calcite 0.15 mol\n\
                    Portlandite 0.0 mol\n\
                    Ettringite -0.01 mol\n\
                    Phase: Hydrotalcite Amount: 2.5e-3\n";
        let result = parse_text(text);
        assert_eq!(result.phases.len(), 2);
        assert_relative_eq!(result.phases["Calcite"], 0.15);
        assert_relative_eq!(result.phases["Hydrotalcite"], 2.5e-3);
    }

    #[test]
    fn missing_file_yields_an_io_placeholder_not_a_panic() {
        let dir = tempdir().unwrap();
        let result = parse(&dir.path().join("absent.json"));
        assert!(!result.converged);
        assert_eq!(result.failure, Some(FailureKind::Io));
        assert!(result.error.is_some());
    }

    #[test]
    fn malformed_json_yields_a_parse_placeholder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();

        let result = parse(&path);
        assert!(!result.converged);
        assert_eq!(result.failure, Some(FailureKind::Parse));
    }

    #[test]
    fn dat_artifacts_fall_back_to_the_text_scanner() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("MIX_0003.dat");
        fs::write(&path, "Equilibrium reached\nQuartz 1.25 mol\n").unwrap();

        let result = parse(&path);
        assert!(result.converged);
        assert_relative_eq!(result.phases["Quartz"], 1.25);
    }
}
