pub mod executor;
pub mod metrics;
pub mod policy;
pub mod supervisor;
pub mod types;

pub use executor::{ExecutionHooks, ScriptExecutor};
pub use metrics::MetricsTable;
pub use policy::check_admission;
pub use supervisor::ExecutionSupervisor;
pub use types::{
    ExecutionRequest, ExecutionResult, ExecutionStatistics, ExecutionTask, HistoryFilters,
    TaskDescriptor, TaskMetrics, TaskStatus,
};
