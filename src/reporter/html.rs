use crate::findings::ScanResult;
use crate::reporter::Reporter;

pub struct HtmlReporter;

impl HtmlReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HtmlReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter for HtmlReporter {
    fn report(&self, result: &ScanResult) -> String {
        let status_class = if result.summary.passed { "passed" } else { "failed" };
        let status_text = if result.summary.passed { "PASSED" } else { "FAILED" };

        let findings_html: String = result
            .findings
            .iter()
            .map(|f| {
                let severity = f.severity.as_str();
                let location = if f.line > 0 {
                    format!("{}:{}", html_escape(&f.file), f.line)
                } else {
                    format!("{} (line unknown)", html_escape(&f.file))
                };
                let snippet_html = f
                    .snippet
                    .as_deref()
                    .map(|s| {
                        format!(
                            r#"
                <div class="finding-code"><pre><code>{}</code></pre></div>"#,
                            html_escape(s)
                        )
                    })
                    .unwrap_or_default();
                let cwe_html = f
                    .cwe_id
                    .as_deref()
                    .map(|c| format!(r#"<span class="cwe-badge">{}</span>"#, html_escape(c)))
                    .unwrap_or_default();
                format!(
                    r#"
            <div class="finding severity-{severity}">
                <div class="finding-header">
                    <span class="severity-badge {severity}">{}</span>
                    <span class="finding-title">{}</span>
                    {cwe_html}
                </div>
                <div class="finding-location"><code>{location}</code></div>{snippet_html}
                <div class="finding-description">{}</div>
                <div class="finding-recommendation">
                    <strong>Recommendation:</strong> {}
                </div>
            </div>"#,
                    severity.to_uppercase(),
                    html_escape(&f.title),
                    html_escape(&f.description),
                    html_escape(&f.recommendation)
                )
            })
            .collect();

        let warnings_html = if result.warnings.is_empty() {
            String::new()
        } else {
            let items: String = result
                .warnings
                .iter()
                .map(|w| {
                    format!(
                        "<li><code>{}</code>: {}</li>",
                        html_escape(&w.scope),
                        html_escape(&w.message)
                    )
                })
                .collect();
            format!(
                r#"
        <div class="warnings">
            <h2>Warnings</h2>
            <ul>{items}</ul>
        </div>"#
            )
        };

        let cancelled_html = if result.status == crate::findings::ScanStatus::Cancelled {
            r#"<p class="cancelled">Scan was cancelled; results are partial.</p>"#
        } else {
            ""
        };

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>code-sentinel Security Report</title>
    <style>
        :root {{
            --critical: #dc2626;
            --high: #ea580c;
            --medium: #ca8a04;
            --low: #2563eb;
            --info: #6b7280;
            --passed: #16a34a;
            --failed: #dc2626;
        }}
        * {{ margin: 0; padding: 0; box-sizing: border-box; }}
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            line-height: 1.6;
            color: #1f2937;
            background: #f3f4f6;
            padding: 2rem;
        }}
        .container {{ max-width: 960px; margin: 0 auto; }}
        header {{ margin-bottom: 2rem; }}
        .status {{ font-weight: 700; }}
        .status.passed {{ color: var(--passed); }}
        .status.failed {{ color: var(--failed); }}
        .cancelled {{ color: var(--high); font-weight: 600; }}
        .summary {{ display: flex; gap: 1rem; margin: 1.5rem 0; }}
        .summary-item {{
            background: #fff; border-radius: 8px; padding: 0.75rem 1.25rem;
            text-align: center; box-shadow: 0 1px 2px rgba(0,0,0,0.06);
        }}
        .summary-item .count {{ font-size: 1.5rem; font-weight: 700; }}
        .finding {{
            background: #fff; border-radius: 8px; padding: 1rem 1.25rem;
            margin-bottom: 1rem; border-left: 4px solid var(--info);
            box-shadow: 0 1px 2px rgba(0,0,0,0.06);
        }}
        .finding.severity-critical {{ border-left-color: var(--critical); }}
        .finding.severity-high {{ border-left-color: var(--high); }}
        .finding.severity-medium {{ border-left-color: var(--medium); }}
        .finding.severity-low {{ border-left-color: var(--low); }}
        .finding-header {{ display: flex; align-items: center; gap: 0.5rem; }}
        .finding-title {{ font-weight: 600; }}
        .severity-badge {{
            color: #fff; border-radius: 4px; padding: 0.1rem 0.5rem;
            font-size: 0.75rem; font-weight: 700; background: var(--info);
        }}
        .severity-badge.critical {{ background: var(--critical); }}
        .severity-badge.high {{ background: var(--high); }}
        .severity-badge.medium {{ background: var(--medium); }}
        .severity-badge.low {{ background: var(--low); }}
        .cwe-badge {{ color: var(--low); font-size: 0.8rem; }}
        .finding-location {{ margin: 0.25rem 0; color: #6b7280; }}
        .finding-code pre {{
            background: #111827; color: #e5e7eb; border-radius: 6px;
            padding: 0.75rem; overflow-x: auto; margin: 0.5rem 0;
        }}
        .warnings {{ margin-top: 2rem; color: #92400e; }}
    </style>
</head>
<body>
    <div class="container">
        <header>
            <h1>code-sentinel Security Report</h1>
            <p>Target: <code>{target}</code> &middot; Files scanned: {files} &middot;
               Status: <span class="status {status_class}">{status_text}</span></p>
            <p>Generated: {generated} &middot; v{version}</p>
            {cancelled_html}
        </header>
        <div class="summary">
            <div class="summary-item"><div class="count">{critical}</div>critical</div>
            <div class="summary-item"><div class="count">{high}</div>high</div>
            <div class="summary-item"><div class="count">{medium}</div>medium</div>
            <div class="summary-item"><div class="count">{low}</div>low</div>
            <div class="summary-item"><div class="count">{info}</div>info</div>
        </div>
        {findings_html}
        {warnings_html}
    </div>
</body>
</html>"#,
            target = html_escape(&result.target),
            files = result.files_scanned,
            generated = html_escape(&result.scanned_at),
            version = html_escape(&result.version),
            critical = result.summary.critical,
            high = result.summary.high,
            medium = result.summary.medium,
            low = result.summary.low,
            info = result.summary.info,
        )
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{Finding, ScanStatus, Severity, Summary};

    fn result_with(findings: Vec<Finding>) -> ScanResult {
        let mut result = ScanResult::new("src/", ScanStatus::Completed);
        result.files_scanned = 1;
        result.total_findings = findings.len();
        result.summary = Summary::from_findings(&findings);
        result.findings = findings;
        result
    }

    #[test]
    fn empty_report_is_a_complete_document() {
        let output = HtmlReporter::new().report(&result_with(vec![]));
        assert!(output.starts_with("<!DOCTYPE html>"));
        assert!(output.contains("PASSED"));
        assert!(output.ends_with("</html>"));
    }

    #[test]
    fn finding_content_is_escaped() {
        let output = HtmlReporter::new().report(&result_with(vec![Finding {
            severity: Severity::High,
            title: "XSS <script>".to_string(),
            file: "a.js".to_string(),
            line: 7,
            description: "renders <img> unescaped".to_string(),
            recommendation: "escape & encode".to_string(),
            cwe_id: Some("CWE-79".to_string()),
            snippet: Some("el.innerHTML = data".to_string()),
            confidence: 0.8,
        }]));
        assert!(output.contains("XSS &lt;script&gt;"));
        assert!(output.contains("escape &amp; encode"));
        assert!(!output.contains("XSS <script>"));
        assert!(output.contains("FAILED"));
    }
}
