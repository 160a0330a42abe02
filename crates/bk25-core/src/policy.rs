//! Per-platform safety token tables.
//!
//! Shared by the code generator's static validator and the execution
//! supervisor's admission check. Matching is case-insensitive substring
//! matching against the full script text: crude, but it catches the footgun
//! commands an LLM is most likely to emit, and it never has to parse three
//! different shell grammars.

use crate::types::Platform;

/// Commands that block execution under every policy.
pub fn denylist(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::PowerShell => &[
            "Remove-Item",
            "Delete",
            "Format-Volume",
            "Clear-Content",
            "Stop-Process",
            "Restart-Computer",
            "Shutdown-Computer",
        ],
        Platform::AppleScript => &["delete", "move", "duplicate", "eject", "restart", "shut down"],
        Platform::Bash => &[
            "rm", "rmdir", "del", "format", "mkfs", "dd", "shutdown", "reboot", "halt", "poweroff",
        ],
    }
}

/// Read-only commands whose presence is required under the `safe` policy.
pub fn allowlist(platform: Platform) -> &'static [&'static str] {
    match platform {
        Platform::PowerShell => &[
            "Get-Process",
            "Get-Service",
            "Get-ComputerInfo",
            "Get-Date",
            "Get-Location",
            "Get-ChildItem",
            "Get-Content",
            "Measure-Object",
            "Select-Object",
            "Where-Object",
            "Sort-Object",
            "Format-Table",
        ],
        Platform::AppleScript => &[
            "get name of every process",
            "get name of every file",
            "current date",
            "system info",
            "get volume settings",
        ],
        Platform::Bash => &[
            "ls", "pwd", "date", "whoami", "uname", "ps", "df", "du", "cat", "head", "tail",
            "grep", "wc", "sort", "uniq",
        ],
    }
}

/// Every denylisted token present in `script`, in table order.
pub fn find_denylisted(script: &str, platform: Platform) -> Vec<&'static str> {
    let lower = script.to_lowercase();
    denylist(platform)
        .iter()
        .filter(|token| lower.contains(&token.to_lowercase()))
        .copied()
        .collect()
}

/// True when the script mentions at least one allowlisted token.
pub fn mentions_allowlisted(script: &str, platform: Platform) -> bool {
    let lower = script.to_lowercase();
    allowlist(platform)
        .iter()
        .any(|token| lower.contains(&token.to_lowercase()))
}
