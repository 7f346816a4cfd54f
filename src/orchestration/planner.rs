use crate::orchestration::manifest::InventorySummary;
use crate::orchestration::tool_schema::ToolSchema;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("planner request failed: {0}")]
    Request(String),
    #[error("planner returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// Turns an intent into a raw plan document (`{"plan": {...}}`). Retries and
/// timeouts belong to the implementation; the engine calls it exactly once
/// per job and treats any error as fatal to that job.
pub trait Planner: Send + Sync {
    fn plan(
        &self,
        intent: &str,
        inventory: &InventorySummary,
        tools: &ToolSchema,
    ) -> Result<Value, PlannerError>;
}
