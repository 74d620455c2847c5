//! Prompt profiles and prompt assembly.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::chunker::CodeUnit;

/// How thorough the analysis prompt should be.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PromptProfile {
    /// Balanced depth, the default.
    #[default]
    Standard,
    /// Exhaustive review with data-flow reasoning.
    Detailed,
    /// Fast pass over the highest-impact vulnerability classes.
    Quick,
}

impl PromptProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptProfile::Standard => "standard",
            PromptProfile::Detailed => "detailed",
            PromptProfile::Quick => "quick",
        }
    }
}

impl std::fmt::Display for PromptProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The response schema the model is asked to produce.
const SCHEMA: &str = r#"Respond with ONLY valid JSON in exactly this format:
{
  "vulnerabilities": [
    {
      "type": "vulnerability name",
      "severity": "critical|high|medium|low|info",
      "line": 42,
      "code_snippet": "the offending code",
      "description": "what is wrong and why it matters",
      "recommendation": "how to fix it",
      "cwe_id": "CWE-89",
      "confidence": 0.9
    }
  ]
}
If the code has no vulnerabilities, respond with {"vulnerabilities": []}."#;

/// Builds the full analysis prompt for one code unit.
pub fn build_prompt(unit: &CodeUnit, profile: PromptProfile) -> String {
    let instructions = match profile {
        PromptProfile::Standard => {
            "Analyze the following source code for security vulnerabilities. \
             Look for injection flaws, hardcoded secrets, insecure deserialization, \
             path traversal, weak cryptography, and unsafe input handling."
        }
        PromptProfile::Detailed => {
            "Perform an exhaustive security review of the following source code. \
             Trace data flow from every input to every sink. Consider injection flaws, \
             authentication and session weaknesses, hardcoded secrets, insecure \
             deserialization, path traversal, SSRF, race conditions, weak cryptography, \
             and error-handling gaps. Report every plausible issue with its exact line."
        }
        PromptProfile::Quick => {
            "Quickly scan the following source code for high-impact security \
             vulnerabilities only: injection flaws, hardcoded secrets, and remote \
             code execution vectors. Skip stylistic or low-severity concerns."
        }
    };

    let location = if unit.start_line > 1 || unit.index > 0 {
        format!(
            "File: {} (lines {}-{}, part {})\n",
            unit.target.path.display(),
            unit.start_line,
            unit.end_line,
            unit.index + 1
        )
    } else {
        format!("File: {}\n", unit.target.path.display())
    };

    format!(
        "{instructions}\n\n{location}Language: {}\n\n```\n{}\n```\n\n{SCHEMA}\n\
         Line numbers must be relative to the code shown above, starting at 1.",
        unit.target.language, unit.text
    )
}
