//! Deterministic static validation of generated scripts.
//!
//! A checklist, not a linter: empty output, missing error-handling
//! constructs, and the presence of blocked commands. Anything subtler is left
//! to the LLM review pass.

use bk25_core::policy;
use bk25_core::types::Platform;

use crate::types::ScriptValidation;

/// Score penalty per reported issue.
const ISSUE_PENALTY: u8 = 30;

pub fn validate_script(script: &str, platform: Platform) -> ScriptValidation {
    let mut issues = Vec::new();

    if script.trim().is_empty() {
        issues.push("script is empty".to_string());
        return ScriptValidation {
            is_valid: false,
            issues,
            score: 0,
        };
    }

    if !has_error_handling(script, platform) {
        issues.push(missing_error_handling_message(platform).to_string());
    }

    for token in policy::find_denylisted(script, platform) {
        issues.push(format!("contains dangerous command: {}", token));
    }

    let score = 100u8.saturating_sub(ISSUE_PENALTY.saturating_mul(issues.len() as u8));
    ScriptValidation {
        is_valid: issues.is_empty(),
        issues,
        score,
    }
}

fn has_error_handling(script: &str, platform: Platform) -> bool {
    let lower = script.to_lowercase();
    match platform {
        Platform::PowerShell => lower.contains("try") && lower.contains("catch"),
        Platform::AppleScript => lower.contains("on error"),
        Platform::Bash => lower.contains("set -e") || lower.contains("trap"),
    }
}

fn missing_error_handling_message(platform: Platform) -> &'static str {
    match platform {
        Platform::PowerShell => "missing error handling (no try/catch block)",
        Platform::AppleScript => "missing error handling (no on error block)",
        Platform::Bash => "missing error handling (no set -e or trap)",
    }
}
