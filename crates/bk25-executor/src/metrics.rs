//! Per-task resource sampling.
//!
//! A sampler task polls the subprocess's counters at a fixed interval and
//! appends to the task's `TaskMetrics`. Sampling failures (process gone,
//! permission denied) end sampling for that task silently.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::types::TaskMetrics;

/// Shared metrics table, written by samplers and read by API callers without
/// touching the supervisor's task lock.
pub type MetricsTable = Arc<DashMap<String, TaskMetrics>>;

pub fn new_metrics_table() -> MetricsTable {
    Arc::new(DashMap::new())
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Spawn a sampler for `pid`, appending into `table[task_id]` every
/// `interval` until the process exits, sampling fails, or `stop` fires.
pub fn spawn_sampler(
    table: MetricsTable,
    task_id: String,
    pid: u32,
    interval: Duration,
    stop: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut system = System::new();
        let sys_pid = Pid::from_u32(pid);
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so cpu deltas have a
        // baseline refresh behind them.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.cancelled() => break,
            }

            let refreshed =
                system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
            if refreshed == 0 {
                break;
            }
            let Some(process) = system.process(sys_pid) else {
                break;
            };

            let cpu = process.cpu_usage();
            let memory = process.memory();
            let disk = process.disk_usage();
            let sockets = socket_count(pid);

            let Some(mut entry) = table.get_mut(&task_id) else {
                break; // metrics swept away underneath us
            };
            let now = unix_now();
            if entry.start_time.is_none() {
                entry.start_time = Some(now);
            }
            entry.end_time = Some(now);
            entry.cpu_percent.push(cpu);
            entry.resident_memory_bytes.push(memory);
            entry
                .io_op_count
                .push(disk.total_read_bytes + disk.total_written_bytes);
            entry.network_connection_count.push(sockets);
        }
        debug!(task_id, pid, "metrics sampler stopped");
    })
}

/// Count open socket descriptors for a pid. Linux-only; other hosts report 0.
#[cfg(target_os = "linux")]
fn socket_count(pid: u32) -> u32 {
    let Ok(entries) = std::fs::read_dir(format!("/proc/{}/fd", pid)) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|entry| {
            std::fs::read_link(entry.path())
                .map(|target| target.to_string_lossy().starts_with("socket:"))
                .unwrap_or(false)
        })
        .count() as u32
}

#[cfg(not(target_os = "linux"))]
fn socket_count(_pid: u32) -> u32 {
    0
}
