//! Target-platform resolution and automation-pattern suggestions.

use bk25_core::types::Platform;

use crate::types::{PlatformChoice, Suggestion};

/// Named automation patterns with their platform preference order.
/// Matched as `pattern_name` with underscores read as spaces.
pub const AUTOMATION_PATTERNS: &[(&str, &[Platform])] = &[
    ("file_processing", &[Platform::PowerShell, Platform::Bash, Platform::AppleScript]),
    ("system_monitoring", &[Platform::Bash, Platform::PowerShell]),
    ("backup_automation", &[Platform::Bash, Platform::PowerShell]),
    ("email_automation", &[Platform::PowerShell, Platform::Bash]),
    ("active_directory", &[Platform::PowerShell]),
    ("mac_automation", &[Platform::AppleScript]),
    ("linux_admin", &[Platform::Bash]),
    ("cross_platform", &[Platform::Bash, Platform::PowerShell]),
];

const POWERSHELL_KEYWORDS: &[&str] =
    &["windows", "active directory", "powershell", "exchange", "office 365"];
const APPLESCRIPT_KEYWORDS: &[&str] =
    &["mac", "macos", "finder", "safari", "system preferences"];
const BASH_KEYWORDS: &[&str] = &["linux", "unix", "bash", "systemctl", "apt", "yum"];

/// Resolve the target platform for a generation request.
///
/// Keyword checks run in precedence order (PowerShell, AppleScript, Bash),
/// then named automation patterns, then the Bash default.
pub fn resolve_platform(choice: PlatformChoice, description: &str) -> Platform {
    if let Some(fixed) = choice.fixed() {
        return fixed;
    }

    let lower = description.to_lowercase();

    if POWERSHELL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Platform::PowerShell;
    }
    if APPLESCRIPT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Platform::AppleScript;
    }
    if BASH_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return Platform::Bash;
    }

    for (pattern, platforms) in AUTOMATION_PATTERNS {
        if lower.contains(&pattern.replace('_', " ")) {
            return platforms[0];
        }
    }

    Platform::Bash
}

/// Automation suggestions for a free-text description: matched patterns plus
/// environment hints.
pub fn suggestions(description: &str) -> Vec<Suggestion> {
    let lower = description.to_lowercase();
    let mut out = Vec::new();

    for (pattern, platforms) in AUTOMATION_PATTERNS {
        let spoken = pattern.replace('_', " ");
        if lower.contains(&spoken) {
            out.push(Suggestion {
                pattern: pattern.to_string(),
                platforms: platforms.to_vec(),
                description: format!("Detected {} pattern", spoken),
                recommended_platform: platforms[0],
            });
        }
    }

    if lower.contains("windows") || lower.contains("active directory") {
        out.push(Suggestion {
            pattern: "windows_enterprise".to_string(),
            platforms: vec![Platform::PowerShell],
            description: "Windows enterprise environment detected".to_string(),
            recommended_platform: Platform::PowerShell,
        });
    }
    if lower.contains("mac") || lower.contains("macos") {
        out.push(Suggestion {
            pattern: "mac_automation".to_string(),
            platforms: vec![Platform::AppleScript],
            description: "macOS automation detected".to_string(),
            recommended_platform: Platform::AppleScript,
        });
    }
    if lower.contains("linux") || lower.contains("unix") {
        out.push(Suggestion {
            pattern: "linux_unix".to_string(),
            platforms: vec![Platform::Bash],
            description: "Linux/Unix environment detected".to_string(),
            recommended_platform: Platform::Bash,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auto(description: &str) -> Platform {
        resolve_platform(PlatformChoice::Auto, description)
    }

    #[test]
    fn fixed_choice_short_circuits() {
        assert_eq!(
            resolve_platform(PlatformChoice::AppleScript, "anything windows related"),
            Platform::AppleScript
        );
    }

    #[test]
    fn windows_keywords_pick_powershell() {
        assert_eq!(auto("list windows processes via powershell"), Platform::PowerShell);
        assert_eq!(auto("sync Active Directory accounts"), Platform::PowerShell);
        assert_eq!(auto("manage Office 365 mailboxes"), Platform::PowerShell);
    }

    #[test]
    fn mac_keywords_pick_applescript() {
        assert_eq!(auto("automate safari on macOS"), Platform::AppleScript);
        assert_eq!(auto("organize files in Finder"), Platform::AppleScript);
    }

    #[test]
    fn linux_keywords_pick_bash() {
        assert_eq!(auto("restart a service with systemctl"), Platform::Bash);
        assert_eq!(auto("install packages with apt"), Platform::Bash);
    }

    #[test]
    fn powershell_precedence_over_later_sets() {
        // Mentions both Windows and Linux: PowerShell keywords win.
        assert_eq!(auto("migrate from windows to linux"), Platform::PowerShell);
    }

    #[test]
    fn pattern_match_picks_first_platform() {
        assert_eq!(auto("nightly backup automation job"), Platform::Bash);
        assert_eq!(auto("email automation for reminders"), Platform::PowerShell);
    }

    #[test]
    fn default_is_bash() {
        assert_eq!(auto("do something"), Platform::Bash);
    }

    #[test]
    fn suggestions_include_patterns_and_hints() {
        let s = suggestions("system monitoring on linux");
        let patterns: Vec<&str> = s.iter().map(|x| x.pattern.as_str()).collect();
        assert!(patterns.contains(&"system_monitoring"));
        assert!(patterns.contains(&"linux_unix"));

        let monitoring = s.iter().find(|x| x.pattern == "system_monitoring").unwrap();
        assert_eq!(monitoring.recommended_platform, Platform::Bash);
    }

    #[test]
    fn no_match_no_suggestions() {
        assert!(suggestions("completely unrelated request").is_empty());
    }
}
