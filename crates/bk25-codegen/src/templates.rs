//! Platform script templates and the basic skeleton fallback.
//!
//! Template selection scores the request description against each template's
//! description with Jaccard word-set overlap. Below the threshold the
//! platform's basic skeleton is instantiated instead.

use std::collections::HashSet;

use bk25_core::types::Platform;

/// Minimum Jaccard overlap for a template to be used. Tunable; below this the
/// basic skeleton wins.
pub const TEMPLATE_MATCH_THRESHOLD: f64 = 0.3;

pub struct ScriptTemplate {
    pub name: &'static str,
    pub description: &'static str,
    pub template: &'static str,
}

pub fn templates_for(platform: Platform) -> &'static [ScriptTemplate] {
    match platform {
        Platform::PowerShell => POWERSHELL_TEMPLATES,
        Platform::AppleScript => APPLESCRIPT_TEMPLATES,
        Platform::Bash => BASH_TEMPLATES,
    }
}

pub fn template_names(platform: Platform) -> Vec<String> {
    templates_for(platform)
        .iter()
        .map(|t| t.name.to_string())
        .collect()
}

/// Jaccard overlap of lowercased word sets.
pub fn match_score(description: &str, template_description: &str) -> f64 {
    let a: HashSet<String> = description
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();
    let b: HashSet<String> = template_description
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect();

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    intersection as f64 / union as f64
}

/// Best-scoring template for a description, with its score.
pub fn best_template(
    platform: Platform,
    description: &str,
) -> Option<(&'static ScriptTemplate, f64)> {
    templates_for(platform)
        .iter()
        .map(|t| (t, match_score(description, t.description)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

/// Minimal runnable script carrying the request description when no template
/// matches well enough.
pub fn basic_skeleton(platform: Platform, description: &str) -> String {
    match platform {
        Platform::PowerShell => format!(
            r#"# PowerShell: {description}
# Generated by BK25 - Enterprise automation without enterprise complexity

param(
    [Parameter(Mandatory=$false)]
    [switch]$VerboseOutput
)

try {{
    Write-Host "Starting automation: {description}" -ForegroundColor Green

    # TODO: Implement automation logic here
    # {description}

    Write-Host "Automation completed successfully!" -ForegroundColor Green

}} catch {{
    Write-Error "Automation failed: $($_.Exception.Message)"
    exit 1
}}"#
        ),
        Platform::AppleScript => format!(
            r#"#!/usr/bin/osascript

-- AppleScript: {description}
-- Generated by BK25 - Enterprise automation without enterprise complexity

on run
    try
        display notification "Starting automation..." with title "BK25"

        -- TODO: Implement automation logic here
        -- {description}

        display notification "Automation completed successfully!" with title "BK25"

    on error errorMessage
        display dialog "Automation failed: " & errorMessage buttons {{"OK"}} default button "OK" with icon stop
        return false
    end try

    return true
end run"#
        ),
        Platform::Bash => format!(
            r#"#!/bin/bash

# Bash: {description}
# Generated by BK25 - Enterprise automation without enterprise complexity

set -e
set -u

GREEN='\033[0;32m'
RED='\033[0;31m'
NC='\033[0m'

print_status() {{
    echo -e "${{GREEN}}[INFO]${{NC}} $1"
}}

print_error() {{
    echo -e "${{RED}}[ERROR]${{NC}} $1"
}}

trap 'print_error "Error occurred. Cleaning up..."; exit 1' ERR

main() {{
    print_status "Starting automation: {description}"

    # TODO: Implement automation logic here
    # {description}

    print_status "Automation completed successfully!"
}}

main "$@""#
        ),
    }
}

const POWERSHELL_TEMPLATES: &[ScriptTemplate] = &[
    ScriptTemplate {
        name: "system_info",
        description: "Get system information and display computer details",
        template: r#"# Get-SystemInfo.ps1
# Collects and displays core system information.

param(
    [Parameter(Mandatory=$false)]
    [switch]$IncludeServices
)

try {
    Write-Host "Collecting system information..." -ForegroundColor Green

    $info = Get-ComputerInfo |
        Select-Object CsName, OsName, OsVersion, OsArchitecture, CsTotalPhysicalMemory
    $info | Format-Table -AutoSize

    Write-Host "Top processes by memory:" -ForegroundColor Green
    Get-Process |
        Sort-Object WorkingSet -Descending |
        Select-Object -First 10 Name, Id, WorkingSet |
        Format-Table -AutoSize

    if ($IncludeServices) {
        Write-Host "Running services:" -ForegroundColor Green
        Get-Service | Where-Object { $_.Status -eq 'Running' } | Format-Table -AutoSize
    }

    Write-Host "System information collected successfully!" -ForegroundColor Green

} catch {
    Write-Error "Failed to collect system information: $($_.Exception.Message)"
    exit 1
}"#,
    },
    ScriptTemplate {
        name: "service_status",
        description: "Check status of windows services and report problems",
        template: r#"# Check-ServiceStatus.ps1
# Reports services that are stopped but set to start automatically.

param(
    [Parameter(Mandatory=$false)]
    [string]$NameFilter = "*"
)

try {
    Write-Host "Checking service status..." -ForegroundColor Green

    $stopped = Get-Service -Name $NameFilter |
        Where-Object { $_.StartType -eq 'Automatic' -and $_.Status -ne 'Running' } |
        Sort-Object DisplayName

    if ($stopped) {
        Write-Host "Automatic services not running:" -ForegroundColor Yellow
        $stopped | Select-Object DisplayName, Status, StartType | Format-Table -AutoSize
    } else {
        Write-Host "All automatic services are running." -ForegroundColor Green
    }

} catch {
    Write-Error "Service check failed: $($_.Exception.Message)"
    exit 1
}"#,
    },
    ScriptTemplate {
        name: "file_report",
        description: "Process files in a folder and report sizes",
        template: r#"# Get-FileReport.ps1
# Summarizes file counts and sizes under a directory.

param(
    [Parameter(Mandatory=$false)]
    [string]$Path = "."
)

try {
    Write-Host "Scanning $Path..." -ForegroundColor Green

    $files = Get-ChildItem -Path $Path -Recurse -File
    $total = $files | Measure-Object -Property Length -Sum

    Write-Host ("{0} files, {1:N0} bytes total" -f $total.Count, $total.Sum) -ForegroundColor Green

    $files |
        Sort-Object Length -Descending |
        Select-Object -First 10 FullName, Length |
        Format-Table -AutoSize

} catch {
    Write-Error "File report failed: $($_.Exception.Message)"
    exit 1
}"#,
    },
];

const APPLESCRIPT_TEMPLATES: &[ScriptTemplate] = &[
    ScriptTemplate {
        name: "list_processes",
        description: "List running applications and processes on mac",
        template: r#"#!/usr/bin/osascript

-- ListProcesses.scpt
-- Shows the names of every visible process.

on run
    try
        tell application "System Events" to get name of every process whose visible is true
        set processNames to the result

        display notification ((count of processNames) as text) & " visible processes" with title "BK25"
        return processNames

    on error errorMessage
        display dialog "Could not list processes: " & errorMessage buttons {"OK"} default button "OK" with icon stop
        return false
    end try
end run"#,
    },
    ScriptTemplate {
        name: "notification",
        description: "Show a notification message to the user",
        template: r#"#!/usr/bin/osascript

-- Notify.scpt
-- Displays a notification with sound.

on run argv
    try
        set messageText to "Task finished"
        if (count of argv) > 0 then set messageText to item 1 of argv

        display notification messageText with title "BK25" sound name "Glass"
        return true

    on error errorMessage
        display dialog "Notification failed: " & errorMessage buttons {"OK"} default button "OK" with icon stop
        return false
    end try
end run"#,
    },
    ScriptTemplate {
        name: "system_snapshot",
        description: "Collect system info and current date on macos",
        template: r#"#!/usr/bin/osascript

-- SystemSnapshot.scpt
-- Reports system info and the current date.

on run
    try
        set snapshot to system info
        set nowStamp to current date

        display notification "Snapshot taken " & (nowStamp as text) with title "BK25"
        return {snapshot, nowStamp}

    on error errorMessage
        display dialog "Snapshot failed: " & errorMessage buttons {"OK"} default button "OK" with icon stop
        return false
    end try
end run"#,
    },
];

const BASH_TEMPLATES: &[ScriptTemplate] = &[
    ScriptTemplate {
        name: "system_monitoring",
        description: "Monitor system resources cpu memory and disk usage",
        template: r#"#!/bin/bash

# system-monitor.sh
# One-shot snapshot of cpu, memory, and disk usage.

set -e
set -u

trap 'echo "[ERROR] monitoring failed" >&2; exit 1' ERR

echo "[INFO] Host: $(uname -n), uptime: $(uptime -p 2>/dev/null || true)"

echo "[INFO] Top processes by cpu:"
ps aux --sort=-%cpu 2>/dev/null | head -6 || ps aux | head -6

echo "[INFO] Disk usage:"
df -h

echo "[INFO] Largest directories under /var/log:"
du -sh /var/log/* 2>/dev/null | sort -rh | head -5 || true

echo "[INFO] Monitoring snapshot complete"
"#,
    },
    ScriptTemplate {
        name: "backup_files",
        description: "Backup files from a directory into a tar archive",
        template: r#"#!/bin/bash

# backup.sh
# Archives a source directory into a timestamped tarball.

set -e
set -u

SRC="${1:-.}"
DEST="${2:-./backups}"

trap 'echo "[ERROR] backup failed" >&2; exit 1' ERR

mkdir -p "$DEST"
STAMP=$(date +%Y%m%d-%H%M%S)
ARCHIVE="$DEST/backup-$STAMP.tar.gz"

echo "[INFO] Backing up $SRC to $ARCHIVE"
tar -czf "$ARCHIVE" -C "$(dirname "$SRC")" "$(basename "$SRC")"

echo "[INFO] Archive contents:"
tar -tzf "$ARCHIVE" | head -20

echo "[INFO] Backup complete: $(du -h "$ARCHIVE" | cut -f1)"
"#,
    },
    ScriptTemplate {
        name: "log_summary",
        description: "Analyze log files and count error lines",
        template: r#"#!/bin/bash

# log-summary.sh
# Counts warnings and errors in a log file.

set -e
set -u

LOG_FILE="${1:?usage: log-summary.sh <logfile>}"

trap 'echo "[ERROR] analysis failed" >&2; exit 1' ERR

echo "[INFO] Analyzing $LOG_FILE"
echo "[INFO] Lines:    $(wc -l < "$LOG_FILE")"
echo "[INFO] Errors:   $(grep -ci "error" "$LOG_FILE" || true)"
echo "[INFO] Warnings: $(grep -ci "warn" "$LOG_FILE" || true)"

echo "[INFO] Most frequent error messages:"
grep -i "error" "$LOG_FILE" | sort | uniq -c | sort -rn | head -5 || true

echo "[INFO] Analysis complete"
"#,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jaccard_identical_is_one() {
        assert!((match_score("get system information", "get system information") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn jaccard_disjoint_is_zero() {
        assert_eq!(match_score("alpha beta", "gamma delta"), 0.0);
        assert_eq!(match_score("", "anything"), 0.0);
    }

    #[test]
    fn system_info_request_beats_threshold() {
        let (template, score) =
            best_template(Platform::PowerShell, "Get system information").unwrap();
        assert_eq!(template.name, "system_info");
        assert!(score > TEMPLATE_MATCH_THRESHOLD, "score was {score}");
    }

    #[test]
    fn unrelated_request_scores_below_threshold() {
        let (_, score) = best_template(Platform::Bash, "do something").unwrap();
        assert!(score <= TEMPLATE_MATCH_THRESHOLD, "score was {score}");
    }

    #[test]
    fn skeletons_carry_description_and_error_handling() {
        let ps = basic_skeleton(Platform::PowerShell, "sync mailboxes");
        assert!(ps.contains("sync mailboxes"));
        assert!(ps.contains("try {") && ps.contains("} catch {"));
        assert!(ps.contains("Write-Host"));
        assert!(ps.contains("TODO"));

        let sh = basic_skeleton(Platform::Bash, "rotate logs");
        assert!(sh.contains("rotate logs"));
        assert!(sh.contains("set -e"));
        assert!(sh.contains("trap"));

        let scpt = basic_skeleton(Platform::AppleScript, "open safari");
        assert!(scpt.contains("open safari"));
        assert!(scpt.contains("on error"));
    }

    #[test]
    fn every_template_passes_its_own_platform_validator() {
        use crate::validate::validate_script;
        for platform in Platform::ALL {
            for template in templates_for(platform) {
                let verdict = validate_script(template.template, platform);
                assert!(
                    verdict.is_valid,
                    "template {} on {} failed validation: {:?}",
                    template.name, platform, verdict.issues
                );
            }
        }
    }
}
