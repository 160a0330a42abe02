//! Admission checks applied before any script reaches a subprocess.
//!
//! Not a sandbox: OS-level isolation is out of scope. The gate catches the
//! destructive commands an LLM is most likely to emit and enforces the
//! read-only allowlist under the `safe` policy.

use tracing::warn;

use bk25_core::error::Bk25Error;
use bk25_core::policy::{find_denylisted, mentions_allowlisted};
use bk25_core::types::{ExecutionPolicy, Platform};

use crate::types::MAX_TIMEOUT_SECS;

/// Decide whether a script may run.
///
/// Rejects with `PolicyViolation` when:
/// - the timeout exceeds the hard ceiling,
/// - the script contains any denylisted token for its platform,
/// - the policy is `safe` and no allowlisted token is present.
pub fn check_admission(
    script: &str,
    platform: Platform,
    policy: ExecutionPolicy,
    timeout_seconds: u64,
) -> Result<(), Bk25Error> {
    if timeout_seconds > MAX_TIMEOUT_SECS {
        return Err(Bk25Error::PolicyViolation {
            reason: format!(
                "timeout {}s exceeds maximum limit ({}s)",
                timeout_seconds, MAX_TIMEOUT_SECS
            ),
        });
    }

    let blocked = find_denylisted(script, platform);
    if !blocked.is_empty() {
        warn!(platform = %platform, tokens = ?blocked, "script rejected by denylist");
        return Err(Bk25Error::PolicyViolation {
            reason: format!("blocked commands detected: {}", blocked.join(", ")),
        });
    }

    if policy == ExecutionPolicy::Safe && !mentions_allowlisted(script, platform) {
        warn!(platform = %platform, "safe policy requires an allowlisted command");
        return Err(Bk25Error::PolicyViolation {
            reason: "safe policy requires only safe commands".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bk25_core::policy::denylist;

    #[test]
    fn safe_bash_listing_is_admitted() {
        assert!(check_admission("ls -la", Platform::Bash, ExecutionPolicy::Safe, 10).is_ok());
    }

    #[test]
    fn every_denylisted_token_rejects_under_every_policy() {
        let policies = [
            ExecutionPolicy::Safe,
            ExecutionPolicy::Restricted,
            ExecutionPolicy::Standard,
            ExecutionPolicy::Elevated,
        ];
        for platform in Platform::ALL {
            for token in denylist(platform) {
                for policy in policies {
                    let script = format!("echo before\n{} target\n", token);
                    let result = check_admission(&script, platform, policy, 30);
                    let err = result.expect_err(&format!(
                        "{token} must be rejected on {platform} under {policy}"
                    ));
                    assert!(err.to_string().contains(token.trim()));
                }
            }
        }
    }

    #[test]
    fn rejection_reason_names_the_token() {
        let err =
            check_admission("rm -rf /", Platform::Bash, ExecutionPolicy::Safe, 30).unwrap_err();
        assert!(err.to_string().contains("rm"));
        assert_eq!(err.code(), "policy_violation");
    }

    #[test]
    fn safe_policy_without_allowlisted_token_rejects() {
        let err = check_admission(
            "curl http://example.com",
            Platform::Bash,
            ExecutionPolicy::Safe,
            30,
        )
        .unwrap_err();
        assert_eq!(err.code(), "policy_violation");
    }

    #[test]
    fn standard_policy_allows_non_allowlisted_commands() {
        assert!(check_admission(
            "sleep 30",
            Platform::Bash,
            ExecutionPolicy::Standard,
            30
        )
        .is_ok());
    }

    #[test]
    fn oversized_timeout_rejects() {
        let err =
            check_admission("ls", Platform::Bash, ExecutionPolicy::Safe, 3601).unwrap_err();
        assert_eq!(err.code(), "policy_violation");
        assert!(check_admission("ls", Platform::Bash, ExecutionPolicy::Safe, 3600).is_ok());
    }

    #[test]
    fn powershell_safe_requires_get_cmdlets() {
        assert!(check_admission(
            "Get-Process | Format-Table",
            Platform::PowerShell,
            ExecutionPolicy::Safe,
            30
        )
        .is_ok());
        assert!(check_admission(
            "Write-Host 'hi'",
            Platform::PowerShell,
            ExecutionPolicy::Safe,
            30
        )
        .is_err());
    }
}
