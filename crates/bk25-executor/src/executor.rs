//! Subprocess launcher for the three target shells.
//!
//! One-shot execution with environment augmentation, a working-directory
//! guarantee, optional stdin, a terminate-then-kill timeout ladder, and
//! cooperative cancellation.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bk25_core::types::Platform;

use crate::metrics::{spawn_sampler, MetricsTable};
use crate::types::{ExecutionRequest, ExecutionResult, TaskStatus};

/// Grace period between SIGTERM and SIGKILL.
const KILL_GRACE: Duration = Duration::from_secs(5);
/// Stderr beyond this many bytes is truncated before it reaches callers.
const MAX_STDERR_BYTES: usize = 16 * 1024;

/// Where to report the spawned pid and feed resource samples.
pub struct ExecutionHooks {
    pub cancel: CancellationToken,
    /// Filled with the child's pid right after spawn (used for pause/resume).
    pub pid_slot: Option<Arc<Mutex<Option<u32>>>>,
    /// When set, a sampler appends to `metrics.0[metrics.1]` at `metrics.2`.
    pub sampler: Option<(MetricsTable, String, Duration)>,
}

impl ExecutionHooks {
    pub fn detached() -> Self {
        Self {
            cancel: CancellationToken::new(),
            pid_slot: None,
            sampler: None,
        }
    }
}

/// Safe one-shot script execution engine.
///
/// Admission checks happen before this layer; the executor assumes the script
/// has already passed policy.
pub struct ScriptExecutor;

impl ScriptExecutor {
    pub fn new() -> Self {
        Self
    }

    pub async fn execute(
        &self,
        request: &ExecutionRequest,
        hooks: ExecutionHooks,
    ) -> ExecutionResult {
        let started = Instant::now();

        let mut command = match build_command(request.platform, &request.script) {
            Ok(c) => c,
            Err(reason) => return failure(TaskStatus::Failed, reason, started),
        };

        let working_dir = match prepare_working_dir(request.working_directory.as_deref()) {
            Ok(dir) => dir,
            Err(e) => {
                return failure(
                    TaskStatus::Failed,
                    format!("working directory unavailable: {}", e),
                    started,
                )
            }
        };

        command
            .current_dir(&working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if request.user_input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        if let Some(environment) = &request.environment {
            command.envs(environment);
        }
        // Always present, regardless of the caller's environment map.
        command
            .env("BK25_EXECUTION", "true")
            .env("BK25_TIMESTAMP", unix_seconds().to_string());

        info!(platform = %request.platform, cwd = %working_dir, "starting script execution");

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return failure(
                    TaskStatus::Failed,
                    format!("failed to start subprocess: {}", e),
                    started,
                )
            }
        };

        let pid = child.id();
        if let Some(slot) = &hooks.pid_slot {
            *slot.lock().unwrap() = pid;
        }

        if let Some(input) = &request.user_input {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(input.as_bytes()).await;
                // dropping stdin closes the pipe
            }
        }

        let sampler_stop = CancellationToken::new();
        if let (Some((table, task_id, interval)), Some(pid)) = (&hooks.sampler, pid) {
            spawn_sampler(
                Arc::clone(table),
                task_id.clone(),
                pid,
                *interval,
                sampler_stop.clone(),
            );
        }

        // `wait_with_output` consumes the child, so it runs on its own task
        // and reports back over a oneshot. The pid stays with us for signals.
        let (tx, mut rx) = oneshot::channel();
        tokio::spawn(async move {
            let _ = tx.send(child.wait_with_output().await);
        });

        let timeout = Duration::from_secs(request.timeout_seconds);
        let outcome = tokio::select! {
            result = &mut rx => Outcome::Finished(result),
            _ = tokio::time::sleep(timeout) => Outcome::TimedOut,
            _ = hooks.cancel.cancelled() => Outcome::Cancelled,
        };
        sampler_stop.cancel();

        match outcome {
            Outcome::Finished(Ok(Ok(output))) => {
                let execution_time = started.elapsed().as_secs_f64();
                let exit_code = output.status.code().unwrap_or(-1);
                let success = exit_code == 0;
                let stdout = decode(&output.stdout);
                let stderr = truncate_stderr(decode(&output.stderr));

                let status = if success {
                    TaskStatus::Completed
                } else {
                    TaskStatus::Failed
                };
                debug!(exit_code, execution_time, "script finished");

                ExecutionResult {
                    success,
                    status,
                    output: if stdout.is_empty() { None } else { Some(stdout) },
                    error: if stderr.is_empty() { None } else { Some(stderr) },
                    exit_code: Some(exit_code),
                    execution_time,
                }
            }
            Outcome::Finished(Ok(Err(e))) => {
                failure(TaskStatus::Failed, format!("wait failed: {}", e), started)
            }
            Outcome::Finished(Err(_)) => failure(
                TaskStatus::Failed,
                "subprocess wait task ended unexpectedly".to_string(),
                started,
            ),
            Outcome::TimedOut => {
                warn!(timeout_secs = request.timeout_seconds, "script timed out");
                terminate_then_kill(pid, &mut rx).await;
                failure(
                    TaskStatus::Timeout,
                    format!(
                        "Execution timed out after {} seconds",
                        request.timeout_seconds
                    ),
                    started,
                )
            }
            Outcome::Cancelled => {
                info!("script execution cancelled");
                terminate_then_kill(pid, &mut rx).await;
                failure(
                    TaskStatus::Cancelled,
                    "execution cancelled".to_string(),
                    started,
                )
            }
        }
    }
}

impl Default for ScriptExecutor {
    fn default() -> Self {
        Self::new()
    }
}

enum Outcome {
    Finished(Result<std::io::Result<std::process::Output>, oneshot::error::RecvError>),
    TimedOut,
    Cancelled,
}

/// Map a platform to its launcher command.
///
/// AppleScript rides the uniform `/bin/bash -c` launcher except on macOS
/// hosts where a script with an AppleScript signature goes to `osascript -e`.
fn build_command(platform: Platform, script: &str) -> Result<Command, String> {
    match platform {
        Platform::PowerShell => {
            if !cfg!(windows) {
                return Err("powershell execution requires a Windows host".to_string());
            }
            let mut command = Command::new("powershell.exe");
            command.args(["-ExecutionPolicy", "Bypass", "-Command", script]);
            Ok(command)
        }
        Platform::AppleScript => {
            if cfg!(target_os = "macos") && looks_like_applescript(script) {
                let mut command = Command::new("osascript");
                command.args(["-e", script]);
                Ok(command)
            } else {
                let mut command = Command::new("/bin/bash");
                command.args(["-c", script]);
                Ok(command)
            }
        }
        Platform::Bash => {
            let mut command = Command::new("/bin/bash");
            command.args(["-c", script]);
            Ok(command)
        }
    }
}

/// Heuristic AppleScript signature check.
fn looks_like_applescript(script: &str) -> bool {
    let trimmed = script.trim_start();
    trimmed.starts_with("#!/usr/bin/osascript")
        || trimmed.starts_with("tell application")
        || trimmed.starts_with("on run")
        || script.contains("display dialog")
        || script.contains("display notification")
}

fn prepare_working_dir(requested: Option<&str>) -> std::io::Result<String> {
    let dir = match requested {
        Some(dir) => dir.to_string(),
        None => std::env::current_dir()?.to_string_lossy().into_owned(),
    };
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Output decoding. On Windows PowerShell emits the legacy ANSI codepage;
/// lossy UTF-8 keeps the text readable without an extra decoder dependency.
fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn truncate_stderr(mut stderr: String) -> String {
    if stderr.len() > MAX_STDERR_BYTES {
        let boundary = (0..=MAX_STDERR_BYTES)
            .rev()
            .find(|i| stderr.is_char_boundary(*i))
            .unwrap_or(0);
        stderr.truncate(boundary);
        stderr.push_str("\n[stderr truncated]");
    }
    stderr
}

fn failure(status: TaskStatus, error: String, started: Instant) -> ExecutionResult {
    ExecutionResult {
        success: false,
        status,
        output: None,
        error: Some(error),
        exit_code: None,
        execution_time: started.elapsed().as_secs_f64(),
    }
}

/// SIGTERM, wait up to the grace period for the child to exit, then SIGKILL.
async fn terminate_then_kill(
    pid: Option<u32>,
    rx: &mut oneshot::Receiver<std::io::Result<std::process::Output>>,
) {
    let Some(pid) = pid else { return };

    send_signal(pid, Signal::Terminate);
    if tokio::time::timeout(KILL_GRACE, &mut *rx).await.is_err() {
        warn!(pid, "child survived SIGTERM, sending SIGKILL");
        send_signal(pid, Signal::Kill);
        let _ = tokio::time::timeout(KILL_GRACE, rx).await;
    }
}

pub(crate) enum Signal {
    Terminate,
    Kill,
    Stop,
    Continue,
}

#[cfg(unix)]
pub(crate) fn send_signal(pid: u32, signal: Signal) {
    let signo = match signal {
        Signal::Terminate => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
        Signal::Stop => libc::SIGSTOP,
        Signal::Continue => libc::SIGCONT,
    };
    // Safety: signalling our own direct child by pid.
    unsafe {
        libc::kill(pid as libc::pid_t, signo);
    }
}

#[cfg(not(unix))]
pub(crate) fn send_signal(pid: u32, signal: Signal) {
    // Windows has no SIGSTOP/SIGCONT equivalent here; terminate/kill map to
    // taskkill, pause/resume degrade to status-only behavior.
    if matches!(signal, Signal::Terminate | Signal::Kill) {
        let _ = std::process::Command::new("taskkill")
            .args(["/F", "/PID", &pid.to_string()])
            .output();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use bk25_core::types::ExecutionPolicy;

    fn bash_request(script: &str, timeout: u64) -> ExecutionRequest {
        ExecutionRequest {
            script: script.to_string(),
            platform: Platform::Bash,
            working_directory: None,
            timeout_seconds: timeout,
            policy: ExecutionPolicy::Standard,
            environment: None,
            user_input: None,
        }
    }

    #[tokio::test]
    async fn safe_listing_completes_with_output() {
        let executor = ScriptExecutor::new();
        let result = executor
            .execute(&bash_request("ls -la", 10), ExecutionHooks::detached())
            .await;

        assert!(result.success);
        assert_eq!(result.status, TaskStatus::Completed);
        assert_eq!(result.exit_code, Some(0));
        assert!(result.output.unwrap().contains("total "));
    }

    #[tokio::test]
    async fn nonzero_exit_is_failed() {
        let executor = ScriptExecutor::new();
        let result = executor
            .execute(
                &bash_request("echo oops >&2; exit 3", 10),
                ExecutionHooks::detached(),
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.exit_code, Some(3));
        assert!(result.error.unwrap().contains("oops"));
    }

    #[tokio::test]
    async fn timeout_terminates_within_grace() {
        let executor = ScriptExecutor::new();
        let started = Instant::now();
        let result = executor
            .execute(&bash_request("sleep 30", 1), ExecutionHooks::detached())
            .await;

        assert!(!result.success);
        assert_eq!(result.status, TaskStatus::Timeout);
        assert!(
            started.elapsed() < Duration::from_secs(6),
            "timeout handling took {:?}",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn cancellation_stops_the_child() {
        let executor = ScriptExecutor::new();
        let cancel = CancellationToken::new();
        let hooks = ExecutionHooks {
            cancel: cancel.clone(),
            pid_slot: None,
            sampler: None,
        };

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            cancel.cancel();
        });

        let result = executor.execute(&bash_request("sleep 30", 60), hooks).await;
        let _ = canceller.await;

        assert_eq!(result.status, TaskStatus::Cancelled);
        assert!(result.execution_time < 10.0);
    }

    #[tokio::test]
    async fn environment_keys_are_injected() {
        let executor = ScriptExecutor::new();
        let mut request = bash_request("echo exec=$BK25_EXECUTION extra=$EXTRA_KEY", 10);
        request.environment = Some(
            [("EXTRA_KEY".to_string(), "extra-value".to_string())]
                .into_iter()
                .collect(),
        );

        let result = executor.execute(&request, ExecutionHooks::detached()).await;
        let output = result.output.unwrap();
        assert!(output.contains("exec=true"));
        assert!(output.contains("extra=extra-value"));
    }

    #[tokio::test]
    async fn user_input_reaches_stdin() {
        let executor = ScriptExecutor::new();
        let mut request = bash_request("read line; echo got:$line", 10);
        request.user_input = Some("piped-value\n".to_string());

        let result = executor.execute(&request, ExecutionHooks::detached()).await;
        assert!(result.output.unwrap().contains("got:piped-value"));
    }

    #[tokio::test]
    async fn missing_working_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/workdir");
        let mut request = bash_request("pwd", 10);
        request.working_directory = Some(target.to_string_lossy().into_owned());

        let result = executor_run(&request).await;
        assert!(result.success);
        assert!(result.output.unwrap().contains("workdir"));
    }

    async fn executor_run(request: &ExecutionRequest) -> ExecutionResult {
        ScriptExecutor::new()
            .execute(request, ExecutionHooks::detached())
            .await
    }

    #[tokio::test]
    async fn pid_slot_is_filled() {
        let executor = ScriptExecutor::new();
        let slot = Arc::new(Mutex::new(None));
        let hooks = ExecutionHooks {
            cancel: CancellationToken::new(),
            pid_slot: Some(Arc::clone(&slot)),
            sampler: None,
        };
        let result = executor.execute(&bash_request("ls", 10), hooks).await;
        assert!(result.success);
        assert!(slot.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn powershell_on_unix_is_rejected() {
        let executor = ScriptExecutor::new();
        let request = ExecutionRequest {
            script: "Get-Date".to_string(),
            platform: Platform::PowerShell,
            working_directory: None,
            timeout_seconds: 10,
            policy: ExecutionPolicy::Standard,
            environment: None,
            user_input: None,
        };
        let result = executor.execute(&request, ExecutionHooks::detached()).await;
        assert!(!result.success);
        assert_eq!(result.status, TaskStatus::Failed);
        assert!(result.error.unwrap().contains("Windows host"));
    }
}
