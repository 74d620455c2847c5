//! Report rendering.
//!
//! Renderers never mutate the result they are given. Severity-threshold
//! filtering happens here at the boundary, so the aggregate stays complete
//! and a different threshold never requires a rescan.

pub mod html;
pub mod json;
pub mod terminal;

pub use html::HtmlReporter;
pub use json::JsonReporter;
pub use terminal::TerminalReporter;

use crate::findings::{ScanResult, Severity, Summary};

pub trait Reporter {
    fn report(&self, result: &ScanResult) -> String;
}

/// Returns a copy of the result keeping only findings at or above `min`,
/// with the summary and totals recomputed to match.
pub fn apply_min_severity(result: &ScanResult, min: Severity) -> ScanResult {
    let mut filtered = result.clone();
    filtered.findings.retain(|f| f.severity >= min);
    filtered.total_findings = filtered.findings.len();
    filtered.summary = Summary::from_findings(&filtered.findings);
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{Finding, ScanStatus};

    fn result_with(severities: &[Severity]) -> ScanResult {
        let findings: Vec<Finding> = severities
            .iter()
            .map(|&severity| Finding {
                severity,
                title: format!("{severity} issue"),
                file: "a.py".to_string(),
                line: 1,
                description: "d".to_string(),
                recommendation: "r".to_string(),
                cwe_id: None,
                snippet: None,
                confidence: 0.8,
            })
            .collect();
        let mut result = ScanResult::new("a.py", ScanStatus::Completed);
        result.files_scanned = 1;
        result.total_findings = findings.len();
        result.summary = Summary::from_findings(&findings);
        result.findings = findings;
        result
    }

    #[test]
    fn threshold_drops_lower_severities_and_recomputes_summary() {
        let result = result_with(&[Severity::Critical, Severity::Medium, Severity::Info]);
        let filtered = apply_min_severity(&result, Severity::Medium);
        assert_eq!(filtered.findings.len(), 2);
        assert_eq!(filtered.total_findings, 2);
        assert_eq!(filtered.summary.info, 0);
        assert_eq!(filtered.summary.medium, 1);
        // The input is untouched.
        assert_eq!(result.findings.len(), 3);
    }

    #[test]
    fn info_threshold_keeps_everything() {
        let result = result_with(&[Severity::Low, Severity::Info]);
        let filtered = apply_min_severity(&result, Severity::Info);
        assert_eq!(filtered.findings.len(), 2);
    }
}
