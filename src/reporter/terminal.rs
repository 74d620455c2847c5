use colored::Colorize;

use crate::findings::{Finding, ScanResult, ScanStatus, Severity};
use crate::reporter::Reporter;

pub struct TerminalReporter {
    verbose: bool,
}

impl TerminalReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn severity_label(&self, severity: Severity) -> colored::ColoredString {
        let label = format!("[{}]", severity.as_str().to_uppercase());
        match severity {
            Severity::Critical => label.red().bold(),
            Severity::High => label.yellow().bold(),
            Severity::Medium => label.cyan(),
            Severity::Low => label.white(),
            Severity::Info => label.dimmed(),
        }
    }

    fn format_finding(&self, finding: &Finding) -> String {
        let mut output = String::new();
        let location = if finding.line > 0 {
            format!("{}:{}", finding.file, finding.line)
        } else {
            format!("{} (line unknown)", finding.file)
        };
        output.push_str(&format!(
            "{} {} {}\n",
            self.severity_label(finding.severity),
            finding.title.bold(),
            finding
                .cwe_id
                .as_deref()
                .map(|c| format!("({c})").bright_blue().to_string())
                .unwrap_or_default()
        ));
        output.push_str(&format!("  Location: {location}\n"));
        if let Some(ref snippet) = finding.snippet {
            output.push_str(&format!("  Code: {}\n", snippet.dimmed()));
        }
        output.push_str(&format!("  Issue: {}\n", finding.description));
        output.push_str(&format!(
            "  Fix: {}\n",
            finding.recommendation.green()
        ));
        if self.verbose {
            output.push_str(&format!("  Confidence: {:.0}%\n", finding.confidence * 100.0));
        }
        output
    }
}

impl Reporter for TerminalReporter {
    fn report(&self, result: &ScanResult) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}\n\n",
            format!("code-sentinel v{} - AI Security Scanner", result.version).bold()
        ));
        output.push_str(&format!("Target: {}\n", result.target));
        output.push_str(&format!("Files scanned: {}\n\n", result.files_scanned));

        if result.status == ScanStatus::Cancelled {
            output.push_str(&format!(
                "{}\n\n",
                "Scan was cancelled; results below are partial.".yellow().bold()
            ));
        }

        if result.findings.is_empty() {
            output.push_str(&"No security issues found.\n".green().to_string());
        } else {
            let mut current_file = "";
            for finding in &result.findings {
                if finding.file != current_file {
                    current_file = &finding.file;
                    output.push_str(&format!("{}\n", current_file.underline()));
                }
                output.push_str(&self.format_finding(finding));
                output.push('\n');
            }
        }

        if !result.warnings.is_empty() {
            output.push_str(&format!(
                "{}\n",
                format!("{} warning(s):", result.warnings.len()).yellow()
            ));
            for warning in &result.warnings {
                output.push_str(&format!("  {}: {}\n", warning.scope, warning.message));
            }
            output.push('\n');
        }

        output.push_str(&format!("{}\n", "━".repeat(50)));
        output.push_str(&format!(
            "Summary: {} critical, {} high, {} medium, {} low, {} info\n",
            result.summary.critical.to_string().red().bold(),
            result.summary.high.to_string().yellow().bold(),
            result.summary.medium.to_string().cyan(),
            result.summary.low,
            result.summary.info
        ));

        let verdict = if result.summary.passed {
            "PASS".green().bold()
        } else {
            "FAIL".red().bold()
        };
        output.push_str(&format!("Result: {verdict}\n"));

        output
    }
}
