use serde::{Deserialize, Serialize};
use std::fmt;

/// Target shell for generated and executed scripts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(rename = "powershell")]
    PowerShell,
    #[serde(rename = "applescript")]
    AppleScript,
    Bash,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::PowerShell, Platform::AppleScript, Platform::Bash];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::PowerShell => "powershell",
            Platform::AppleScript => "applescript",
            Platform::Bash => "bash",
        }
    }

    /// Canonical script file extension, without the dot.
    pub fn file_extension(&self) -> &'static str {
        match self {
            Platform::PowerShell => "ps1",
            Platform::AppleScript => "scpt",
            Platform::Bash => "sh",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::PowerShell => "PowerShell",
            Platform::AppleScript => "AppleScript",
            Platform::Bash => "Bash",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "powershell" => Ok(Platform::PowerShell),
            "applescript" => Ok(Platform::AppleScript),
            "bash" => Ok(Platform::Bash),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// Task scheduling priority. Higher values dispatch first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low = 1,
    #[default]
    Normal = 2,
    High = 3,
    Critical = 4,
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Normal => write!(f, "normal"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "normal" => Ok(TaskPriority::Normal),
            "high" => Ok(TaskPriority::High),
            "critical" => Ok(TaskPriority::Critical),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// Admission mode controlling how permissively a script may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPolicy {
    /// Read-only commands only: the script must mention an allowlisted token.
    #[default]
    Safe,
    /// Limited system access.
    Restricted,
    /// Normal execution with denylist checks.
    Standard,
    /// Elevated privileges (still denylist-checked).
    Elevated,
}

impl fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionPolicy::Safe => write!(f, "safe"),
            ExecutionPolicy::Restricted => write!(f, "restricted"),
            ExecutionPolicy::Standard => write!(f, "standard"),
            ExecutionPolicy::Elevated => write!(f, "elevated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_roundtrip() {
        for p in Platform::ALL {
            let parsed: Platform = p.as_str().parse().expect("parse failed");
            assert_eq!(parsed, p);
        }
    }

    #[test]
    fn platform_serde_names() {
        assert_eq!(
            serde_json::to_string(&Platform::PowerShell).unwrap(),
            "\"powershell\""
        );
        assert_eq!(
            serde_json::from_str::<Platform>("\"applescript\"").unwrap(),
            Platform::AppleScript
        );
    }

    #[test]
    fn priority_ordering() {
        assert!(TaskPriority::Critical > TaskPriority::High);
        assert!(TaskPriority::High > TaskPriority::Normal);
        assert!(TaskPriority::Normal > TaskPriority::Low);
    }

    #[test]
    fn unknown_platform_is_err() {
        assert!("python".parse::<Platform>().is_err());
    }
}
