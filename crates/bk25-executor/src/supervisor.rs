//! Asynchronous execution supervisor.
//!
//! Task intake goes through a priority queue ordered by
//! `(priority desc, submission order asc)`. A dispatcher task pops the head
//! and waits for a worker permit — the wait-for-worker signal replaces a
//! re-enqueue/sleep loop without changing observable ordering — then runs the
//! task through the subprocess executor. Submission never blocks.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::{watch, Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use bk25_core::config::ExecutorConfig;
use bk25_core::error::Result;
use bk25_core::types::{ExecutionPolicy, TaskPriority};

use crate::executor::{send_signal, ExecutionHooks, ScriptExecutor, Signal};
use crate::metrics::{new_metrics_table, MetricsTable};
use crate::policy::check_admission;
use crate::types::{
    ExecutionRequest, ExecutionResult, ExecutionStatistics, ExecutionTask, HistoryFilters,
    RecentStatistics, TaskDescriptor, TaskMetrics, TaskStatus,
};

/// Retention sweep cadence.
const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

type TaskCallback = Arc<dyn Fn(&ExecutionTask) + Send + Sync>;

/// Queue entry ordering: higher priority first, then earlier submission.
struct QueueEntry {
    priority: TaskPriority,
    seq: u64,
    task_id: String,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct RunningHandle {
    cancel: CancellationToken,
    pid: Arc<Mutex<Option<u32>>>,
}

#[derive(Default)]
struct LifetimeStats {
    total_tasks: u64,
    completed_tasks: u64,
    failed_tasks: u64,
    total_execution_time: f64,
}

struct SupervisorState {
    tasks: HashMap<String, ExecutionTask>,
    queue: BinaryHeap<QueueEntry>,
    running: HashMap<String, RunningHandle>,
    seq: u64,
    stats: LifetimeStats,
}

/// Priority-scheduled, policy-gated script execution with resource metrics,
/// task lifecycle management, and retention.
pub struct ExecutionSupervisor {
    config: ExecutorConfig,
    executor: ScriptExecutor,
    state: Mutex<SupervisorState>,
    metrics: MetricsTable,
    queue_notify: Notify,
    worker_permits: Arc<Semaphore>,
    shutdown_tx: watch::Sender<bool>,
    status_callbacks: Mutex<Vec<TaskCallback>>,
    completion_callbacks: Mutex<Vec<TaskCallback>>,
}

impl ExecutionSupervisor {
    pub fn new(config: ExecutorConfig) -> Arc<Self> {
        let (shutdown_tx, _) = watch::channel(false);
        let worker_permits = Arc::new(Semaphore::new(config.max_concurrent_tasks));
        Arc::new(Self {
            config,
            executor: ScriptExecutor::new(),
            state: Mutex::new(SupervisorState {
                tasks: HashMap::new(),
                queue: BinaryHeap::new(),
                running: HashMap::new(),
                seq: 0,
                stats: LifetimeStats::default(),
            }),
            metrics: new_metrics_table(),
            queue_notify: Notify::new(),
            worker_permits,
            shutdown_tx,
            status_callbacks: Mutex::new(Vec::new()),
            completion_callbacks: Mutex::new(Vec::new()),
        })
    }

    /// Start the dispatcher and the retention sweeper.
    pub fn start(self: &Arc<Self>) {
        info!(
            max_concurrent = self.config.max_concurrent_tasks,
            "execution supervisor starting"
        );
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher.dispatch_loop().await;
        });
        let sweeper = Arc::clone(self);
        tokio::spawn(async move {
            sweeper.sweep_loop().await;
        });
    }

    /// Stop the background loops and cancel everything still running.
    pub fn shutdown(&self) {
        info!("execution supervisor shutting down");
        let _ = self.shutdown_tx.send(true);
        let state = self.state.lock().unwrap();
        for handle in state.running.values() {
            handle.cancel.cancel();
        }
    }

    // -----------------------------------------------------------------------
    // Intake & lifecycle API
    // -----------------------------------------------------------------------

    /// Queue a task. Never blocks; the policy gate runs up front so a
    /// rejected script is never stored.
    pub fn submit(&self, descriptor: TaskDescriptor) -> Result<String> {
        check_admission(
            &descriptor.script,
            descriptor.platform,
            ExecutionPolicy::Standard,
            self.config.default_timeout_secs,
        )?;

        let id = Uuid::new_v4().to_string();
        let task = ExecutionTask::from_descriptor(id.clone(), descriptor);

        {
            let mut state = self.state.lock().unwrap();
            state.seq += 1;
            let seq = state.seq;
            state.queue.push(QueueEntry {
                priority: task.priority,
                seq,
                task_id: id.clone(),
            });
            state.stats.total_tasks += 1;
            state.tasks.insert(id.clone(), task.clone());
        }
        self.metrics.insert(id.clone(), TaskMetrics::new(&id));

        info!(task_id = %id, name = %task.name, priority = %task.priority, "task submitted");
        self.notify_status(&task);
        self.queue_notify.notify_one();
        Ok(id)
    }

    pub fn status(&self, task_id: &str) -> Option<ExecutionTask> {
        self.state.lock().unwrap().tasks.get(task_id).cloned()
    }

    pub fn running(&self) -> Vec<ExecutionTask> {
        self.state
            .lock()
            .unwrap()
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Running)
            .cloned()
            .collect()
    }

    pub fn metrics(&self, task_id: &str) -> Option<TaskMetrics> {
        self.metrics.get(task_id).map(|m| m.value().clone())
    }

    /// Cancel a task. Idempotent: terminal tasks return `false` unchanged.
    pub fn cancel(&self, task_id: &str) -> bool {
        let (task, live_cancel) = {
            let mut state = self.state.lock().unwrap();
            let Some(task) = state.tasks.get_mut(task_id) else {
                return false;
            };
            if task.status.is_terminal() {
                return false;
            }
            task.status = TaskStatus::Cancelled;
            task.completed_at = Some(Utc::now());
            let task = task.clone();
            let cancel = state.running.get(task_id).map(|h| h.cancel.clone());
            (task, cancel)
        };

        if let Some(cancel) = live_cancel {
            cancel.cancel();
        }
        info!(task_id, "task cancelled");
        self.notify_status(&task);
        self.notify_completion(&task);
        true
    }

    /// Pause a running task (SIGSTOP on unix).
    pub fn pause(&self, task_id: &str) -> bool {
        let (task, pid) = {
            let mut state = self.state.lock().unwrap();
            let pid = state
                .running
                .get(task_id)
                .and_then(|h| *h.pid.lock().unwrap());
            let Some(task) = state.tasks.get_mut(task_id) else {
                return false;
            };
            if task.status != TaskStatus::Running {
                return false;
            }
            task.status = TaskStatus::Paused;
            (task.clone(), pid)
        };

        if let Some(pid) = pid {
            send_signal(pid, Signal::Stop);
        }
        info!(task_id, "task paused");
        self.notify_status(&task);
        true
    }

    /// Resume a paused task (SIGCONT on unix).
    pub fn resume(&self, task_id: &str) -> bool {
        let (task, pid) = {
            let mut state = self.state.lock().unwrap();
            let pid = state
                .running
                .get(task_id)
                .and_then(|h| *h.pid.lock().unwrap());
            let Some(task) = state.tasks.get_mut(task_id) else {
                return false;
            };
            if task.status != TaskStatus::Paused {
                return false;
            }
            task.status = TaskStatus::Running;
            (task.clone(), pid)
        };

        if let Some(pid) = pid {
            send_signal(pid, Signal::Continue);
        }
        info!(task_id, "task resumed");
        self.notify_status(&task);
        true
    }

    /// Task history, newest first, optionally filtered.
    pub fn history(&self, limit: usize, filters: &HistoryFilters) -> Vec<ExecutionTask> {
        let state = self.state.lock().unwrap();
        let mut tasks: Vec<ExecutionTask> = state
            .tasks
            .values()
            .filter(|t| filters.status.map_or(true, |s| t.status == s))
            .filter(|t| filters.platform.map_or(true, |p| t.platform == p))
            .filter(|t| {
                filters
                    .tag
                    .as_ref()
                    .map_or(true, |tag| t.tags.iter().any(|x| x == tag))
            })
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks.truncate(limit);
        tasks
    }

    pub fn statistics(&self) -> ExecutionStatistics {
        let state = self.state.lock().unwrap();
        let cutoff = Utc::now() - ChronoDuration::hours(24);

        let recent: Vec<&ExecutionTask> = state
            .tasks
            .values()
            .filter(|t| t.created_at > cutoff)
            .collect();
        let recent_completed = recent
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        let recent_failed = recent
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .count();
        let success_rate = if recent.is_empty() {
            0.0
        } else {
            (recent_completed as f64 / recent.len() as f64 * 10_000.0).round() / 100.0
        };

        let average_execution_time = if state.stats.completed_tasks > 0 {
            state.stats.total_execution_time / state.stats.completed_tasks as f64
        } else {
            0.0
        };

        ExecutionStatistics {
            total_tasks: state.stats.total_tasks,
            completed_tasks: state.stats.completed_tasks,
            failed_tasks: state.stats.failed_tasks,
            total_execution_time: state.stats.total_execution_time,
            average_execution_time,
            recent_24h: RecentStatistics {
                total_tasks: recent.len(),
                completed_tasks: recent_completed,
                failed_tasks: recent_failed,
                success_rate,
            },
            current_running: state.running.len(),
            queue_size: state.queue.len(),
        }
    }

    /// Status callbacks fire on every state transition.
    pub fn register_status_callback(&self, callback: TaskCallback) {
        self.status_callbacks.lock().unwrap().push(callback);
    }

    /// Completion callbacks fire only on transitions into a terminal state.
    pub fn register_completion_callback(&self, callback: TaskCallback) {
        self.completion_callbacks.lock().unwrap().push(callback);
    }

    /// Synchronous one-shot execution, bypassing the queue. The request's own
    /// policy and timeout apply.
    pub async fn execute_direct(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        check_admission(
            &request.script,
            request.platform,
            request.policy,
            request.timeout_seconds,
        )?;
        Ok(self
            .executor
            .execute(request, ExecutionHooks::detached())
            .await)
    }

    // -----------------------------------------------------------------------
    // Dispatcher
    // -----------------------------------------------------------------------

    async fn dispatch_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        info!("dispatcher started");

        loop {
            // Wait for a queued task.
            let entry = loop {
                if *shutdown.borrow() {
                    return;
                }
                if let Some(entry) = self.pop_next_queued() {
                    break entry;
                }
                tokio::select! {
                    _ = self.queue_notify.notified() => {}
                    _ = shutdown.changed() => {}
                }
            };

            // Wait for a free worker. The popped head is held, so ordering
            // among equal priorities is preserved.
            let permit = tokio::select! {
                permit = Arc::clone(&self.worker_permits).acquire_owned() => {
                    match permit {
                        Ok(p) => p,
                        Err(_) => return,
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                    continue;
                }
            };

            let supervisor = Arc::clone(&self);
            tokio::spawn(async move {
                supervisor.run_task(entry.task_id).await;
                drop(permit);
            });
        }
    }

    /// Pop the highest-priority queued entry, skipping entries whose task was
    /// cancelled while waiting.
    fn pop_next_queued(&self) -> Option<QueueEntry> {
        let mut state = self.state.lock().unwrap();
        while let Some(entry) = state.queue.pop() {
            match state.tasks.get(&entry.task_id) {
                Some(task) if task.status == TaskStatus::Queued => return Some(entry),
                _ => debug!(task_id = %entry.task_id, "skipping dequeued task"),
            }
        }
        None
    }

    async fn run_task(self: &Arc<Self>, task_id: String) {
        let cancel = CancellationToken::new();
        let pid = Arc::new(Mutex::new(None));

        // queued -> preparing
        let Some(task) = self.transition(&task_id, |task| {
            if task.status != TaskStatus::Queued {
                return false;
            }
            task.status = TaskStatus::Preparing;
            true
        }) else {
            return;
        };
        {
            let mut state = self.state.lock().unwrap();
            state.running.insert(
                task_id.clone(),
                RunningHandle {
                    cancel: cancel.clone(),
                    pid: Arc::clone(&pid),
                },
            );
        }
        self.notify_status(&task);

        let request = ExecutionRequest {
            script: task.script.clone(),
            platform: task.platform,
            working_directory: None,
            timeout_seconds: self.config.default_timeout_secs,
            policy: ExecutionPolicy::Standard,
            environment: None,
            user_input: None,
        };

        // preparing -> running; a cancellation in between means no subprocess
        // is ever spawned.
        let Some(task) = self.transition(&task_id, |task| {
            if task.status != TaskStatus::Preparing {
                return false;
            }
            task.status = TaskStatus::Running;
            task.started_at = Some(Utc::now());
            true
        }) else {
            self.state.lock().unwrap().running.remove(&task_id);
            return;
        };
        self.notify_status(&task);

        let hooks = ExecutionHooks {
            cancel: cancel.clone(),
            pid_slot: Some(Arc::clone(&pid)),
            sampler: Some((
                Arc::clone(&self.metrics),
                task_id.clone(),
                Duration::from_secs_f64(self.config.metrics_interval_secs.max(0.1)),
            )),
        };
        let result = self.executor.execute(&request, hooks).await;

        self.finish_task(&task_id, result);
        self.state.lock().unwrap().running.remove(&task_id);
    }

    /// Apply the execution outcome, unless a cancellation already made the
    /// task terminal.
    fn finish_task(&self, task_id: &str, result: ExecutionResult) {
        let finished = {
            let mut state = self.state.lock().unwrap();
            let Some(task) = state.tasks.get_mut(task_id) else {
                return;
            };
            if task.status.is_terminal() {
                None
            } else {
                task.status = result.status;
                task.completed_at = Some(Utc::now());
                task.execution_time = result.execution_time;
                task.exit_code = result.exit_code;
                task.output = result.output.clone();
                task.error = result.error.clone();
                let task = task.clone();

                match result.status {
                    TaskStatus::Completed => {
                        state.stats.completed_tasks += 1;
                        state.stats.total_execution_time += result.execution_time;
                    }
                    TaskStatus::Failed | TaskStatus::Timeout => {
                        state.stats.failed_tasks += 1;
                    }
                    _ => {}
                }
                Some(task)
            }
        };

        if let Some(task) = finished {
            info!(task_id, status = %task.status, "task finished");
            self.notify_status(&task);
            self.notify_completion(&task);
        }
    }

    /// Mutate a task under the lock; returns a snapshot when `f` applied.
    fn transition<F>(&self, task_id: &str, f: F) -> Option<ExecutionTask>
    where
        F: FnOnce(&mut ExecutionTask) -> bool,
    {
        let mut state = self.state.lock().unwrap();
        let task = state.tasks.get_mut(task_id)?;
        if f(task) {
            Some(task.clone())
        } else {
            None
        }
    }

    // -----------------------------------------------------------------------
    // Retention
    // -----------------------------------------------------------------------

    async fn sweep_loop(self: Arc<Self>) {
        let mut shutdown = self.shutdown_tx.subscribe();
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        ticker.tick().await; // immediate first tick is a no-op

        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep_old_tasks(),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    fn sweep_old_tasks(&self) {
        let cutoff = Utc::now() - ChronoDuration::days(self.config.retention_days);
        let removed: Vec<String> = {
            let mut state = self.state.lock().unwrap();
            let ids: Vec<String> = state
                .tasks
                .iter()
                .filter(|(_, t)| t.status.is_terminal() && t.created_at < cutoff)
                .map(|(id, _)| id.clone())
                .collect();
            for id in &ids {
                state.tasks.remove(id);
            }
            ids
        };
        for id in &removed {
            self.metrics.remove(id);
        }
        if !removed.is_empty() {
            info!(count = removed.len(), "swept old terminal tasks");
        }
    }

    // -----------------------------------------------------------------------
    // Callbacks
    // -----------------------------------------------------------------------

    fn notify_status(&self, task: &ExecutionTask) {
        let callbacks = self.status_callbacks.lock().unwrap().clone();
        invoke_callbacks(&callbacks, task, "status");
    }

    fn notify_completion(&self, task: &ExecutionTask) {
        let callbacks = self.completion_callbacks.lock().unwrap().clone();
        invoke_callbacks(&callbacks, task, "completion");
    }
}

/// Invoke callbacks against a snapshot; a panicking callback is logged and
/// never affects other callbacks or task state.
fn invoke_callbacks(callbacks: &[TaskCallback], task: &ExecutionTask, kind: &str) {
    for callback in callbacks {
        let result = catch_unwind(AssertUnwindSafe(|| callback(task)));
        if result.is_err() {
            error!(task_id = %task.id, kind, "task callback panicked");
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use bk25_core::types::Platform;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    fn descriptor(name: &str, script: &str, priority: TaskPriority) -> TaskDescriptor {
        TaskDescriptor {
            name: name.to_string(),
            description: String::new(),
            script: script.to_string(),
            platform: Platform::Bash,
            priority,
            tags: vec!["test".to_string()],
            metadata: serde_json::Map::new(),
            max_retries: 3,
        }
    }

    fn test_config(max_concurrent: usize) -> ExecutorConfig {
        ExecutorConfig {
            max_concurrent_tasks: max_concurrent,
            default_timeout_secs: 30,
            metrics_interval_secs: 0.2,
            retention_days: 7,
        }
    }

    async fn wait_terminal(
        supervisor: &Arc<ExecutionSupervisor>,
        task_id: &str,
        within: Duration,
    ) -> ExecutionTask {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if let Some(task) = supervisor.status(task_id) {
                if task.status.is_terminal() {
                    return task;
                }
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "task {task_id} did not reach a terminal state"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    #[test]
    fn queue_orders_by_priority_then_submission() {
        let mut heap = BinaryHeap::new();
        heap.push(QueueEntry {
            priority: TaskPriority::Normal,
            seq: 1,
            task_id: "n1".to_string(),
        });
        heap.push(QueueEntry {
            priority: TaskPriority::Critical,
            seq: 3,
            task_id: "c1".to_string(),
        });
        heap.push(QueueEntry {
            priority: TaskPriority::Normal,
            seq: 2,
            task_id: "n2".to_string(),
        });
        heap.push(QueueEntry {
            priority: TaskPriority::Low,
            seq: 0,
            task_id: "l1".to_string(),
        });

        let order: Vec<String> = std::iter::from_fn(|| heap.pop().map(|e| e.task_id)).collect();
        assert_eq!(order, vec!["c1", "n1", "n2", "l1"]);
    }

    #[tokio::test]
    async fn submit_runs_task_to_completion() {
        let supervisor = ExecutionSupervisor::new(test_config(2));
        supervisor.start();

        let id = supervisor
            .submit(descriptor("echo", "echo done", TaskPriority::Normal))
            .unwrap();
        let task = wait_terminal(&supervisor, &id, Duration::from_secs(10)).await;

        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.exit_code, Some(0));
        assert!(task.output.unwrap().contains("done"));
        assert!(task.started_at.is_some());
        assert!(task.completed_at.is_some());
        supervisor.shutdown();
    }

    #[tokio::test]
    async fn denylisted_submission_is_rejected_without_storing() {
        let supervisor = ExecutionSupervisor::new(test_config(2));
        let err = supervisor
            .submit(descriptor("bad", "rm -rf /", TaskPriority::Normal))
            .unwrap_err();
        assert_eq!(err.code(), "policy_violation");
        assert!(err.to_string().contains("rm"));
        assert_eq!(supervisor.statistics().total_tasks, 0);
    }

    #[tokio::test]
    async fn equal_priority_tasks_complete_in_submission_order() {
        // One worker serializes execution, exposing dispatch order.
        let supervisor = ExecutionSupervisor::new(test_config(1));
        supervisor.start();

        let order: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&order);
        supervisor.register_completion_callback(Arc::new(move |task| {
            seen.lock().unwrap().push(task.name.clone());
        }));

        for name in ["first", "second", "third"] {
            supervisor
                .submit(descriptor(name, "echo x", TaskPriority::Normal))
                .unwrap();
        }

        let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
        while order.lock().unwrap().len() < 3 {
            assert!(tokio::time::Instant::now() < deadline, "tasks did not finish");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
        supervisor.shutdown();
    }

    #[tokio::test]
    async fn higher_priority_jumps_the_queue() {
        let supervisor = ExecutionSupervisor::new(test_config(1));

        let order: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&order);
        supervisor.register_completion_callback(Arc::new(move |task| {
            seen.lock().unwrap().push(task.name.clone());
        }));

        // Enqueue before starting the dispatcher so priorities decide.
        supervisor
            .submit(descriptor("low", "echo low", TaskPriority::Low))
            .unwrap();
        supervisor
            .submit(descriptor("critical", "echo critical", TaskPriority::Critical))
            .unwrap();
        supervisor.start();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
        while order.lock().unwrap().len() < 2 {
            assert!(tokio::time::Instant::now() < deadline, "tasks did not finish");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(*order.lock().unwrap(), vec!["critical", "low"]);
        supervisor.shutdown();
    }

    #[tokio::test]
    async fn cancel_is_idempotent_and_kills_running_tasks() {
        let supervisor = ExecutionSupervisor::new(test_config(2));
        supervisor.start();

        let id = supervisor
            .submit(descriptor("sleeper", "sleep 30", TaskPriority::Normal))
            .unwrap();

        // Wait until it is actually running.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            if supervisor
                .status(&id)
                .is_some_and(|t| t.status == TaskStatus::Running)
            {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "task never ran");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        assert!(supervisor.cancel(&id));
        let task = supervisor.status(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);

        // Second cancel is a no-op returning false.
        assert!(!supervisor.cancel(&id));
        assert_eq!(supervisor.status(&id).unwrap().status, TaskStatus::Cancelled);

        // Unknown ids are false too.
        assert!(!supervisor.cancel("no-such-task"));
        supervisor.shutdown();
    }

    #[tokio::test]
    async fn queued_task_can_be_cancelled_before_dispatch() {
        // Dispatcher not started: the task stays queued.
        let supervisor = ExecutionSupervisor::new(test_config(1));
        let id = supervisor
            .submit(descriptor("queued", "echo x", TaskPriority::Normal))
            .unwrap();

        assert!(supervisor.cancel(&id));
        assert_eq!(supervisor.status(&id).unwrap().status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn status_callbacks_see_every_transition() {
        let supervisor = ExecutionSupervisor::new(test_config(2));
        supervisor.start();

        let transitions: Arc<Mutex<Vec<TaskStatus>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&transitions);
        supervisor.register_status_callback(Arc::new(move |task| {
            sink.lock().unwrap().push(task.status);
        }));

        let completions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&completions);
        supervisor.register_completion_callback(Arc::new(move |_| {
            counter.fetch_add(1, AtomicOrdering::SeqCst);
        }));

        // A panicking callback must not disturb the others.
        supervisor.register_status_callback(Arc::new(|_| panic!("intentional")));

        let id = supervisor
            .submit(descriptor("observed", "echo x", TaskPriority::Normal))
            .unwrap();
        wait_terminal(&supervisor, &id, Duration::from_secs(10)).await;

        let seen = transitions.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                TaskStatus::Queued,
                TaskStatus::Preparing,
                TaskStatus::Running,
                TaskStatus::Completed
            ]
        );
        assert_eq!(completions.load(AtomicOrdering::SeqCst), 1);
        supervisor.shutdown();
    }

    #[tokio::test]
    async fn execute_direct_policy_and_success_paths() {
        let supervisor = ExecutionSupervisor::new(test_config(2));

        // Scenario: safe listing.
        let result = supervisor
            .execute_direct(&ExecutionRequest {
                timeout_seconds: 10,
                ..ExecutionRequest::new("ls -la", Platform::Bash)
            })
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.status, TaskStatus::Completed);
        assert!(result.output.unwrap().contains("total "));

        // Scenario: policy rejection happens before any subprocess exists.
        let err = supervisor
            .execute_direct(&ExecutionRequest::new("rm -rf /", Platform::Bash))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "policy_violation");
        assert!(err.to_string().contains("rm"));

        // Scenario: timeout.
        let started = std::time::Instant::now();
        let result = supervisor
            .execute_direct(&ExecutionRequest {
                timeout_seconds: 1,
                policy: ExecutionPolicy::Standard,
                ..ExecutionRequest::new("sleep 30", Platform::Bash)
            })
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.status, TaskStatus::Timeout);
        assert!(started.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test]
    async fn metrics_are_recorded_for_running_tasks() {
        let supervisor = ExecutionSupervisor::new(test_config(2));
        supervisor.start();

        let id = supervisor
            .submit(descriptor("busy", "sleep 1", TaskPriority::Normal))
            .unwrap();
        wait_terminal(&supervisor, &id, Duration::from_secs(15)).await;

        let metrics = supervisor.metrics(&id).expect("metrics entry exists");
        assert_eq!(metrics.task_id, id);
        assert!(!metrics.cpu_percent.is_empty(), "expected at least one sample");
        supervisor.shutdown();
    }

    #[tokio::test]
    async fn history_filters_and_statistics() {
        let supervisor = ExecutionSupervisor::new(test_config(2));
        supervisor.start();

        let ok_id = supervisor
            .submit(descriptor("ok", "echo fine", TaskPriority::Normal))
            .unwrap();
        let bad_id = supervisor
            .submit(descriptor("bad", "exit 2", TaskPriority::Normal))
            .unwrap();
        wait_terminal(&supervisor, &ok_id, Duration::from_secs(10)).await;
        wait_terminal(&supervisor, &bad_id, Duration::from_secs(10)).await;

        let all = supervisor.history(10, &HistoryFilters::default());
        assert_eq!(all.len(), 2);

        let failed = supervisor.history(
            10,
            &HistoryFilters {
                status: Some(TaskStatus::Failed),
                ..HistoryFilters::default()
            },
        );
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].name, "bad");

        let stats = supervisor.statistics();
        assert_eq!(stats.total_tasks, 2);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.failed_tasks, 1);
        assert_eq!(stats.recent_24h.total_tasks, 2);
        assert!((stats.recent_24h.success_rate - 50.0).abs() < f64::EPSILON);
        assert!(stats.average_execution_time > 0.0);
        supervisor.shutdown();
    }

    #[tokio::test]
    async fn sweeper_removes_old_terminal_tasks() {
        let supervisor = ExecutionSupervisor::new(test_config(2));
        supervisor.start();

        let id = supervisor
            .submit(descriptor("old", "echo x", TaskPriority::Normal))
            .unwrap();
        wait_terminal(&supervisor, &id, Duration::from_secs(10)).await;

        // Age the task past the retention window, then sweep directly.
        {
            let mut state = supervisor.state.lock().unwrap();
            let task = state.tasks.get_mut(&id).unwrap();
            task.created_at = Utc::now() - ChronoDuration::days(8);
        }
        supervisor.sweep_old_tasks();

        assert!(supervisor.status(&id).is_none());
        assert!(supervisor.metrics(&id).is_none());
        supervisor.shutdown();
    }
}
