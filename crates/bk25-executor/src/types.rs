use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use bk25_core::types::{ExecutionPolicy, Platform, TaskPriority};

/// Hard ceiling on any execution timeout.
pub const MAX_TIMEOUT_SECS: u64 = 3600;
/// Default timeout when the request gives none.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Lifecycle state of an execution task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Preparing,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
    Paused,
}

impl TaskStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Timeout | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Preparing => "preparing",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Timeout => "timeout",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// Caller-facing task submission record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub script: String,
    pub platform: Platform,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_retries() -> u32 {
    3
}

/// A queued unit of script execution. The supervisor exclusively owns the
/// live value; callers only ever receive clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionTask {
    pub id: String,
    pub name: String,
    pub description: String,
    pub script: String,
    pub platform: Platform,
    pub priority: TaskPriority,
    pub tags: Vec<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock seconds spent running.
    pub execution_time: f64,
    pub exit_code: Option<i32>,
    pub output: Option<String>,
    pub error: Option<String>,
    /// Retry bookkeeping for higher-level policies; retries are never
    /// triggered automatically.
    pub retry_count: u32,
    pub max_retries: u32,
}

impl ExecutionTask {
    pub fn from_descriptor(id: String, descriptor: TaskDescriptor) -> Self {
        Self {
            id,
            name: descriptor.name,
            description: descriptor.description,
            script: descriptor.script,
            platform: descriptor.platform,
            priority: descriptor.priority,
            tags: descriptor.tags,
            metadata: descriptor.metadata,
            status: TaskStatus::Queued,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            execution_time: 0.0,
            exit_code: None,
            output: None,
            error: None,
            retry_count: 0,
            max_retries: descriptor.max_retries,
        }
    }
}

/// Lazy per-task resource time series, sampled while the subprocess runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMetrics {
    pub task_id: String,
    pub cpu_percent: Vec<f32>,
    pub resident_memory_bytes: Vec<u64>,
    /// Cumulative bytes transferred (read + written) at each sample.
    pub io_op_count: Vec<u64>,
    pub network_connection_count: Vec<u32>,
    /// Unix seconds of first and last sample.
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
}

impl TaskMetrics {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            cpu_percent: Vec::new(),
            resident_memory_bytes: Vec::new(),
            io_op_count: Vec::new(),
            network_connection_count: Vec::new(),
            start_time: None,
            end_time: None,
        }
    }
}

/// Synchronous one-shot execution request (bypasses the queue).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub script: String,
    pub platform: Platform,
    #[serde(default)]
    pub working_directory: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub policy: ExecutionPolicy,
    #[serde(default)]
    pub environment: Option<HashMap<String, String>>,
    /// Text piped to the subprocess's stdin.
    #[serde(default)]
    pub user_input: Option<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ExecutionRequest {
    pub fn new(script: impl Into<String>, platform: Platform) -> Self {
        Self {
            script: script.into(),
            platform,
            working_directory: None,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            policy: ExecutionPolicy::default(),
            environment: None,
            user_input: None,
        }
    }
}

/// Outcome of a single subprocess run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub status: TaskStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    pub execution_time: f64,
}

/// Optional filters for `history()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryFilters {
    pub status: Option<TaskStatus>,
    pub platform: Option<Platform>,
    pub tag: Option<String>,
}

/// Rolling 24-hour execution counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentStatistics {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub failed_tasks: usize,
    /// Percent of recent tasks that completed, rounded to 2 decimals.
    pub success_rate: f64,
}

/// Supervisor-wide execution statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStatistics {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub total_execution_time: f64,
    pub average_execution_time: f64,
    pub recent_24h: RecentStatistics,
    pub current_running: usize,
    pub queue_size: usize,
}
