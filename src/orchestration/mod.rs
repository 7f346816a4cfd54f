pub mod error;
pub mod job_manager;
pub mod manifest;
pub mod manifest_store;
pub mod plan_validator;
pub mod planner;
pub mod step_execution;
pub mod tool_dispatch;
pub mod tool_schema;

pub use error::OrchestratorError;
pub use job_manager::JobManager;
pub use manifest::{InventorySummary, JobStatus, Manifest, StepRecord, StepStatus};
pub use manifest_store::ManifestStore;
pub use plan_validator::{validate_plan, Plan, PlannedStep};
pub use planner::{Planner, PlannerError};
pub use tool_dispatch::{Tool, ToolContext, ToolDispatchTable, ToolError, ToolOutput};
pub use tool_schema::{ToolSchema, ToolSpec};
