//! Merges per-file scan outputs into one deterministic result.
//!
//! Ordering is byte-stable for a given set of inputs no matter which order
//! workers finished in: file path first, then line, then severity
//! (critical first) to break line ties, then title. Duplicates reported by
//! overlapping analyses collapse when they share a file, a CWE (or
//! normalized title) and nearby lines.

use std::sync::Arc;

use tracing::debug;

use crate::discovery::ScanTarget;
use crate::error::ScanWarning;
use crate::findings::{Finding, ScanResult, ScanStatus, Summary};

/// Everything one file contributed to the scan.
#[derive(Debug)]
pub struct FileScan {
    pub target: Arc<ScanTarget>,
    pub findings: Vec<Finding>,
    pub warnings: Vec<ScanWarning>,
    pub from_cache: bool,
}

#[derive(Debug, Clone)]
pub struct Aggregator {
    /// Findings this many lines apart (or closer) can be duplicates.
    line_tolerance: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Aggregator { line_tolerance: 2 }
    }
}

impl Aggregator {
    pub fn with_line_tolerance(mut self, tolerance: usize) -> Self {
        self.line_tolerance = tolerance;
        self
    }

    pub fn aggregate(
        &self,
        scans: Vec<FileScan>,
        target: &str,
        status: ScanStatus,
        extra_warnings: Vec<ScanWarning>,
    ) -> ScanResult {
        let files_scanned = scans.len();
        let mut findings = Vec::new();
        let mut warnings = extra_warnings;
        for scan in scans {
            findings.extend(scan.findings);
            warnings.extend(scan.warnings);
        }

        let findings = self.dedupe(findings);
        let summary = Summary::from_findings(&findings);
        debug!(
            files = files_scanned,
            findings = findings.len(),
            warnings = warnings.len(),
            "aggregation complete"
        );

        let mut result = ScanResult::new(target, status);
        result.files_scanned = files_scanned;
        result.total_findings = findings.len();
        result.summary = summary;
        result.findings = findings;
        result.warnings = warnings;
        result
    }

    /// Collapses near-duplicates and applies the canonical ordering.
    fn dedupe(&self, mut findings: Vec<Finding>) -> Vec<Finding> {
        // Group duplicates together: same file and key, lines ascending,
        // higher severity first within a line so the kept instance wins.
        findings.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then_with(|| dedupe_key(a).cmp(&dedupe_key(b)))
                .then(a.line.cmp(&b.line))
                .then(b.severity.cmp(&a.severity))
                .then(a.title.cmp(&b.title))
        });

        let mut kept: Vec<Finding> = Vec::with_capacity(findings.len());
        for finding in findings {
            let duplicate_of = kept.iter_mut().rev().take_while(|k| {
                k.file == finding.file && dedupe_key(k) == dedupe_key(&finding)
            });
            let mut merged = false;
            for existing in duplicate_of {
                if finding.line.abs_diff(existing.line) <= self.line_tolerance {
                    if finding.severity > existing.severity {
                        *existing = finding.clone();
                    }
                    merged = true;
                    break;
                }
            }
            if !merged {
                kept.push(finding);
            }
        }

        kept.sort_by(|a, b| {
            a.file
                .cmp(&b.file)
                .then(a.line.cmp(&b.line))
                .then(b.severity.cmp(&a.severity))
                .then(a.title.cmp(&b.title))
        });
        kept
    }
}

/// Identity used for duplicate detection: the CWE when present, otherwise
/// the normalized title.
fn dedupe_key(finding: &Finding) -> String {
    finding
        .cwe_id
        .clone()
        .unwrap_or_else(|| finding.title.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Language;
    use crate::findings::Severity;
    use std::path::PathBuf;

    fn target(path: &str) -> Arc<ScanTarget> {
        Arc::new(ScanTarget {
            path: PathBuf::from(path),
            language: Language::Python,
            size: 0,
        })
    }

    fn finding(file: &str, line: usize, severity: Severity, cwe: Option<&str>) -> Finding {
        Finding {
            severity,
            title: "SQL Injection".to_string(),
            file: file.to_string(),
            line,
            description: "desc".to_string(),
            recommendation: "fix".to_string(),
            cwe_id: cwe.map(|c| c.to_string()),
            snippet: None,
            confidence: 0.9,
        }
    }

    fn scan(file: &str, findings: Vec<Finding>) -> FileScan {
        FileScan {
            target: target(file),
            findings,
            warnings: Vec::new(),
            from_cache: false,
        }
    }

    #[test]
    fn nearby_same_cwe_findings_collapse() {
        let result = Aggregator::default().aggregate(
            vec![scan(
                "a.py",
                vec![
                    finding("a.py", 10, Severity::High, Some("CWE-89")),
                    finding("a.py", 11, Severity::Critical, Some("CWE-89")),
                ],
            )],
            "a.py",
            ScanStatus::Completed,
            Vec::new(),
        );
        assert_eq!(result.findings.len(), 1);
        // The higher-severity instance survives.
        assert_eq!(result.findings[0].severity, Severity::Critical);
        assert_eq!(result.summary.critical, 1);
        assert_eq!(result.summary.high, 0);
    }

    #[test]
    fn different_cwes_on_the_same_line_do_not_collapse() {
        let result = Aggregator::default().aggregate(
            vec![scan(
                "a.py",
                vec![
                    finding("a.py", 10, Severity::High, Some("CWE-89")),
                    finding("a.py", 10, Severity::High, Some("CWE-79")),
                ],
            )],
            "a.py",
            ScanStatus::Completed,
            Vec::new(),
        );
        assert_eq!(result.findings.len(), 2);
    }

    #[test]
    fn distant_same_cwe_findings_do_not_collapse() {
        let result = Aggregator::default().aggregate(
            vec![scan(
                "a.py",
                vec![
                    finding("a.py", 10, Severity::High, Some("CWE-89")),
                    finding("a.py", 40, Severity::High, Some("CWE-89")),
                ],
            )],
            "a.py",
            ScanStatus::Completed,
            Vec::new(),
        );
        assert_eq!(result.findings.len(), 2);
    }

    #[test]
    fn title_is_the_key_when_cwe_is_absent() {
        let mut a = finding("a.py", 5, Severity::Medium, None);
        a.title = "Weak Hash".to_string();
        let mut b = finding("a.py", 6, Severity::Medium, None);
        b.title = "  weak hash ".to_string();
        let result = Aggregator::default().aggregate(
            vec![scan("a.py", vec![a, b])],
            "a.py",
            ScanStatus::Completed,
            Vec::new(),
        );
        assert_eq!(result.findings.len(), 1);
    }

    #[test]
    fn ordering_is_invariant_under_input_permutation() {
        let pool = vec![
            finding("b.py", 7, Severity::Low, Some("CWE-22")),
            finding("a.py", 30, Severity::Critical, Some("CWE-89")),
            finding("a.py", 5, Severity::Medium, Some("CWE-79")),
            finding("b.py", 7, Severity::High, Some("CWE-327")),
            finding("a.py", 5, Severity::High, Some("CWE-798")),
        ];
        let aggregator = Aggregator::default();
        let baseline = aggregator.aggregate(
            vec![scan("x", pool.clone())],
            "root",
            ScanStatus::Completed,
            Vec::new(),
        );
        let mut shuffled = pool;
        shuffled.reverse();
        shuffled.swap(0, 2);
        let permuted = aggregator.aggregate(
            vec![scan("x", shuffled)],
            "root",
            ScanStatus::Completed,
            Vec::new(),
        );
        assert_eq!(baseline.findings, permuted.findings);
        // Within a.py line 5, higher severity comes first.
        assert_eq!(baseline.findings[0].file, "a.py");
        assert_eq!(baseline.findings[0].line, 5);
        assert_eq!(baseline.findings[0].severity, Severity::High);
    }

    #[test]
    fn warnings_and_status_are_carried() {
        let mut s = scan("a.py", Vec::new());
        s.warnings.push(crate::error::ScanWarning::new(
            "a.py",
            crate::error::WarningKind::Parse,
            "bad json",
        ));
        let result = Aggregator::default().aggregate(
            vec![s],
            "root",
            ScanStatus::Cancelled,
            vec![crate::error::ScanWarning::new(
                "root",
                crate::error::WarningKind::Io,
                "denied",
            )],
        );
        assert_eq!(result.status, ScanStatus::Cancelled);
        assert_eq!(result.warnings.len(), 2);
        assert_eq!(result.files_scanned, 1);
    }
}
