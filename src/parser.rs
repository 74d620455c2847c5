//! Parses and validates untrusted model output into findings.
//!
//! Model text is hostile input: prose wrappers, markdown fences, truncated
//! JSON, invented severities and out-of-range line numbers all show up in
//! practice. Nothing in here panics or fails the scan; the worst outcome is
//! a `Failed` tagged with warnings.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::chunker::CodeUnit;
use crate::error::{ScanWarning, WarningKind};
use crate::findings::{Finding, Severity};

static CWE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^CWE-\d+$").unwrap());

/// Phrases that mark a prose "all clear" answer.
const CLEAN_PHRASES: &[&str] = &[
    "no vulnerabilities",
    "no security issues",
    "no issues found",
    "appears secure",
    "appears to be secure",
    "looks secure",
];

/// How one response parse went.
#[derive(Debug)]
pub enum ParseOutcome {
    /// Every record validated.
    Ok(Vec<Finding>),
    /// Some records validated, some were dropped or repaired.
    Partial(Vec<Finding>, Vec<ScanWarning>),
    /// No usable payload.
    Failed(Vec<ScanWarning>),
}

impl ParseOutcome {
    pub fn into_parts(self) -> (Vec<Finding>, Vec<ScanWarning>) {
        match self {
            ParseOutcome::Ok(findings) => (findings, Vec::new()),
            ParseOutcome::Partial(findings, warnings) => (findings, warnings),
            ParseOutcome::Failed(warnings) => (Vec::new(), warnings),
        }
    }
}

/// The record shape the model is asked to emit. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct RawFinding {
    #[serde(rename = "type", alias = "title")]
    title: Option<String>,
    severity: Option<String>,
    line: Option<i64>,
    #[serde(alias = "snippet")]
    code_snippet: Option<String>,
    description: Option<String>,
    recommendation: Option<String>,
    cwe_id: Option<String>,
    confidence: Option<f64>,
}

/// Parses raw model text for one code unit. Line numbers in the output are
/// file-absolute; the payload's numbers are relative to the unit.
pub fn parse_response(raw: &str, unit: &CodeUnit) -> ParseOutcome {
    let Some(payload) = extract_payload(raw) else {
        return parse_loose_response(raw, unit);
    };

    let records = match payload.get("vulnerabilities").or_else(|| payload.get("findings")) {
        Some(Value::Array(items)) => items.clone(),
        Some(_) => {
            return ParseOutcome::Failed(vec![ScanWarning::new(
                unit.scope(),
                WarningKind::Parse,
                "findings key is not an array",
            )]);
        }
        // A bare object with no findings key reads as an empty report.
        None => Vec::new(),
    };

    let mut findings = Vec::new();
    let mut warnings = Vec::new();
    for (idx, record) in records.into_iter().enumerate() {
        match validate_record(record, idx, unit, &mut warnings) {
            Some(finding) => findings.push(finding),
            None => continue,
        }
    }

    debug!(
        scope = %unit.scope(),
        findings = findings.len(),
        warnings = warnings.len(),
        "parsed provider response"
    );
    if warnings.is_empty() {
        ParseOutcome::Ok(findings)
    } else {
        ParseOutcome::Partial(findings, warnings)
    }
}

fn validate_record(
    record: Value,
    idx: usize,
    unit: &CodeUnit,
    warnings: &mut Vec<ScanWarning>,
) -> Option<Finding> {
    let raw: RawFinding = match serde_json::from_value(record) {
        Ok(raw) => raw,
        Err(err) => {
            warnings.push(ScanWarning::new(
                unit.scope(),
                WarningKind::Parse,
                format!("record {idx} is malformed: {err}"),
            ));
            return None;
        }
    };

    // Title and description are the minimum for an actionable finding.
    let (Some(title), Some(description)) = (raw.title, raw.description) else {
        warnings.push(ScanWarning::new(
            unit.scope(),
            WarningKind::Parse,
            format!("record {idx} dropped: missing type or description"),
        ));
        return None;
    };

    let severity = match raw.severity.as_deref().and_then(Severity::parse) {
        Some(severity) => severity,
        None => {
            warnings.push(ScanWarning::new(
                unit.scope(),
                WarningKind::Parse,
                format!(
                    "record {idx}: unrecognized severity {:?}, normalized to info",
                    raw.severity.as_deref().unwrap_or("")
                ),
            ));
            Severity::Info
        }
    };

    let line = match raw.line {
        Some(l) if l >= 1 && (l as usize) <= unit.line_count() => {
            unit.start_line + (l as usize) - 1
        }
        Some(l) => {
            warnings.push(ScanWarning::new(
                unit.scope(),
                WarningKind::Parse,
                format!("record {idx}: line {l} outside unit range, marked unknown"),
            ));
            0
        }
        None => 0,
    };

    let cwe_id = raw.cwe_id.and_then(|id| {
        let id = id.trim().to_uppercase();
        if CWE_ID.is_match(&id) {
            Some(id)
        } else {
            warnings.push(ScanWarning::new(
                unit.scope(),
                WarningKind::Parse,
                format!("record {idx}: invalid CWE id {id:?} dropped"),
            ));
            None
        }
    });

    Some(Finding {
        severity,
        title,
        file: unit.target.path.display().to_string(),
        line,
        description,
        recommendation: raw
            .recommendation
            .unwrap_or_else(|| "Review the reported code manually.".to_string()),
        cwe_id,
        snippet: raw.code_snippet,
        confidence: raw.confidence.unwrap_or(0.5).clamp(0.0, 1.0),
    })
}

/// Locates and parses the JSON payload: fenced block first, then the
/// outermost balanced object, then the whole trimmed text.
fn extract_payload(raw: &str) -> Option<Value> {
    for candidate in [
        extract_fenced_block(raw),
        extract_balanced_object(raw),
        Some(raw.trim().to_string()),
    ]
    .into_iter()
    .flatten()
    {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&candidate) {
            return Some(value);
        }
    }
    None
}

fn extract_fenced_block(text: &str) -> Option<String> {
    let start = text.find("```json").map(|i| i + 7).or_else(|| {
        // A bare fence counts when JSON follows it.
        let i = text.find("```")? + 3;
        text[i..].trim_start().starts_with('{').then_some(i)
    })?;
    let body = &text[start..];
    let end = body.find("```")?;
    Some(body[..end].trim().to_string())
}

/// Finds the outermost `{..}` span, tracking string and escape state so
/// braces inside string literals do not unbalance the scan.
fn extract_balanced_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + offset + 1].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Fallback for plain-prose answers with no JSON at all. A recognizable
/// "all clear" yields an empty result; text that still talks about
/// severities becomes one generic medium finding.
fn parse_loose_response(raw: &str, unit: &CodeUnit) -> ParseOutcome {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ParseOutcome::Failed(vec![ScanWarning::new(
            unit.scope(),
            WarningKind::Parse,
            "provider returned empty text",
        )]);
    }

    let lowered = trimmed.to_lowercase();
    if CLEAN_PHRASES.iter().any(|p| lowered.contains(p)) {
        return ParseOutcome::Ok(Vec::new());
    }

    let warning = ScanWarning::new(
        unit.scope(),
        WarningKind::Parse,
        "response was not JSON",
    );
    if ["critical", "high", "medium", "low", "vulnerab"]
        .iter()
        .any(|kw| lowered.contains(kw))
    {
        let description: String = trimmed.chars().take(500).collect();
        let finding = Finding {
            severity: Severity::Medium,
            title: "Potential Security Issue".to_string(),
            file: unit.target.path.display().to_string(),
            line: 0,
            description,
            recommendation: "Review the model's analysis manually.".to_string(),
            cwe_id: None,
            snippet: None,
            confidence: 0.5,
        };
        return ParseOutcome::Partial(vec![finding], vec![warning]);
    }

    ParseOutcome::Failed(vec![warning])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{Language, ScanTarget};
    use std::path::PathBuf;
    use std::sync::Arc;

    fn unit_at(start_line: usize, lines: usize) -> CodeUnit {
        CodeUnit {
            target: Arc::new(ScanTarget {
                path: PathBuf::from("app.py"),
                language: Language::Python,
                size: 0,
            }),
            text: "code\n".repeat(lines),
            start_line,
            end_line: start_line + lines - 1,
            index: if start_line == 1 { 0 } else { 1 },
        }
    }

    fn unit() -> CodeUnit {
        unit_at(1, 100)
    }

    const WELL_FORMED: &str = r#"{
        "vulnerabilities": [
            {
                "type": "SQL Injection",
                "severity": "critical",
                "line": 42,
                "code_snippet": "cursor.execute(q)",
                "description": "User input reaches a query string",
                "recommendation": "Use parameterized queries",
                "cwe_id": "CWE-89",
                "confidence": 0.95
            }
        ]
    }"#;

    #[test]
    fn parses_well_formed_json() {
        let outcome = parse_response(WELL_FORMED, &unit());
        let ParseOutcome::Ok(findings) = outcome else {
            panic!("expected Ok, got {outcome:?}");
        };
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].line, 42);
        assert_eq!(findings[0].cwe_id.as_deref(), Some("CWE-89"));
        assert_eq!(findings[0].file, "app.py");
    }

    #[test]
    fn same_payload_wrapped_in_prose_parses_identically() {
        let wrapped = format!("Here is my analysis:\n\n{WELL_FORMED}\n\nLet me know!");
        let (plain, _) = parse_response(WELL_FORMED, &unit()).into_parts();
        let (prose, _) = parse_response(&wrapped, &unit()).into_parts();
        assert_eq!(plain, prose);
    }

    #[test]
    fn fenced_block_is_preferred() {
        let fenced = format!("```json\n{WELL_FORMED}\n```");
        let (findings, warnings) = parse_response(&fenced, &unit()).into_parts();
        assert_eq!(findings.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn truncated_json_fails_with_warning() {
        let truncated = &WELL_FORMED[..WELL_FORMED.len() / 2];
        let outcome = parse_response(truncated, &unit());
        let ParseOutcome::Failed(warnings) = outcome else {
            panic!("expected Failed, got {outcome:?}");
        };
        assert_eq!(warnings[0].kind, WarningKind::Parse);
    }

    #[test]
    fn empty_text_fails_with_warning() {
        let outcome = parse_response("", &unit());
        assert!(matches!(outcome, ParseOutcome::Failed(w) if w.len() == 1));
    }

    #[test]
    fn empty_vulnerability_list_is_ok() {
        let outcome = parse_response(r#"{"vulnerabilities": []}"#, &unit());
        assert!(matches!(outcome, ParseOutcome::Ok(f) if f.is_empty()));
    }

    #[test]
    fn findings_key_is_accepted_as_alias() {
        let raw = r#"{"findings": [{"type": "XSS", "severity": "high",
            "description": "unescaped output"}]}"#;
        let (findings, _) = parse_response(raw, &unit()).into_parts();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "XSS");
    }

    #[test]
    fn record_missing_description_is_dropped_others_kept() {
        let raw = r#"{"vulnerabilities": [
            {"type": "A", "severity": "low"},
            {"type": "B", "severity": "low", "description": "real",
             "recommendation": "fix"}
        ]}"#;
        let outcome = parse_response(raw, &unit());
        let ParseOutcome::Partial(findings, warnings) = outcome else {
            panic!("expected Partial, got {outcome:?}");
        };
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "B");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn unknown_severity_normalizes_to_info_with_warning() {
        let raw = r#"{"vulnerabilities": [{"type": "A", "severity": "apocalyptic",
            "description": "d", "recommendation": "r"}]}"#;
        let (findings, warnings) = parse_response(raw, &unit()).into_parts();
        assert_eq!(findings[0].severity, Severity::Info);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn out_of_range_line_clamps_to_unknown() {
        let raw = r#"{"vulnerabilities": [{"type": "A", "severity": "low",
            "description": "d", "line": 5000, "recommendation": "r"}]}"#;
        let (findings, warnings) = parse_response(raw, &unit()).into_parts();
        assert_eq!(findings[0].line, 0);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn lines_translate_to_file_absolute() {
        // Unit starts at file line 51; relative line 3 is absolute 53.
        let raw = r#"{"vulnerabilities": [{"type": "A", "severity": "low",
            "description": "d", "line": 3, "recommendation": "r"}]}"#;
        let (findings, _) = parse_response(raw, &unit_at(51, 20)).into_parts();
        assert_eq!(findings[0].line, 53);
    }

    #[test]
    fn invalid_cwe_is_dropped() {
        let raw = r#"{"vulnerabilities": [{"type": "A", "severity": "low",
            "description": "d", "cwe_id": "89", "recommendation": "r"}]}"#;
        let (findings, warnings) = parse_response(raw, &unit()).into_parts();
        assert_eq!(findings[0].cwe_id, None);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn braces_inside_strings_do_not_break_extraction() {
        let raw = r#"Sure: {"vulnerabilities": [{"type": "Fmt {weird}",
            "severity": "low", "description": "has { and } inside",
            "recommendation": "r"}]} done."#;
        let (findings, _) = parse_response(raw, &unit()).into_parts();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].title, "Fmt {weird}");
    }

    #[test]
    fn prose_all_clear_is_empty_ok() {
        let outcome = parse_response(
            "I reviewed the code carefully and found no vulnerabilities.",
            &unit(),
        );
        assert!(matches!(outcome, ParseOutcome::Ok(f) if f.is_empty()));
    }

    #[test]
    fn prose_with_severity_talk_becomes_generic_finding() {
        let outcome = parse_response(
            "There is a high risk of SQL injection in this function.",
            &unit(),
        );
        let ParseOutcome::Partial(findings, warnings) = outcome else {
            panic!("expected Partial, got {outcome:?}");
        };
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert_eq!(findings[0].confidence, 0.5);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn confidence_is_clamped() {
        let raw = r#"{"vulnerabilities": [{"type": "A", "severity": "low",
            "description": "d", "confidence": 7.5, "recommendation": "r"}]}"#;
        let (findings, _) = parse_response(raw, &unit()).into_parts();
        assert_eq!(findings[0].confidence, 1.0);
    }
}
