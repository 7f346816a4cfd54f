use crate::orchestration::error::OrchestratorError;
use crate::orchestration::manifest::{
    step_inputs_from_params, StepRecord, StepStatus, StepUpdate,
};
use crate::orchestration::manifest_store::ManifestStore;
use crate::orchestration::plan_validator::PlannedStep;
use crate::orchestration::tool_dispatch::{ToolContext, ToolDispatchTable, ToolError, UnknownTool};

pub(crate) struct StepExecutionContext<'a> {
    pub store: &'a ManifestStore,
    pub tools: &'a ToolDispatchTable,
}

/// Result of one planned step. Failures here are recorded on the step and
/// never stop the remaining plan.
#[derive(Debug)]
pub enum StepOutcome {
    Completed { step_index: usize, outputs: Vec<String> },
    Failed { step_index: usize, failure: StepFailure },
}

impl StepOutcome {
    pub fn step_index(&self) -> usize {
        match self {
            Self::Completed { step_index, .. } | Self::Failed { step_index, .. } => *step_index,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StepFailure {
    #[error("Unknown tool: {}", .0.tool)]
    UnknownTool(UnknownTool),
    #[error("{0}")]
    Tool(ToolError),
}

pub fn step_name(position: usize, tool: &str, registered: bool) -> String {
    if registered {
        format!("step_{position}_{}", tool.to_ascii_lowercase())
    } else {
        format!("step_{position}")
    }
}

/// Appends and runs one step. `position` is the step's 0-based place in the
/// plan. Tool errors of any kind stay on the step; only the engine's own
/// manifest writes surface as `Err`.
pub(crate) fn execute_step(
    context: &StepExecutionContext<'_>,
    job_id: &str,
    position: usize,
    planned: &PlannedStep,
) -> Result<StepOutcome, OrchestratorError> {
    let inputs = step_inputs_from_params(&planned.params);

    let tool = match context.tools.resolve(&planned.tool) {
        Ok(tool) => tool,
        Err(unknown) => {
            let failure = StepFailure::UnknownTool(unknown);
            let mut record = StepRecord::new(
                step_name(position, &planned.tool, false),
                planned.tool.clone(),
                inputs,
            );
            record.status = StepStatus::Failed;
            record.error = Some(failure.to_string());
            let (step_index, _) = context.store.append_step(job_id, record)?;
            tracing::warn!(
                job_id,
                step_index,
                tool = %planned.tool,
                "step skipped: tool is not registered"
            );
            return Ok(StepOutcome::Failed {
                step_index,
                failure,
            });
        }
    };

    let record = StepRecord::new(
        step_name(position, &planned.tool, true),
        planned.tool.clone(),
        inputs,
    );
    let (step_index, _) = context.store.append_step(job_id, record)?;
    context
        .store
        .update_step(job_id, step_index, StepUpdate::status(StepStatus::Running))?;
    tracing::info!(job_id, step_index, tool = %planned.tool, "step started");

    let tool_context = ToolContext {
        job_id,
        step_index,
        manifests: context.store,
    };
    match tool.execute(&tool_context, &planned.params) {
        Ok(output) => {
            context.store.complete_step(
                job_id,
                step_index,
                output.outputs.clone(),
                tool.output_category(),
            )?;
            tracing::info!(
                job_id,
                step_index,
                tool = %planned.tool,
                outputs = output.outputs.len(),
                "step completed"
            );
            Ok(StepOutcome::Completed {
                step_index,
                outputs: output.outputs,
            })
        }
        Err(err) => {
            let failure = StepFailure::Tool(err);
            context
                .store
                .update_step(job_id, step_index, StepUpdate::failed(failure.to_string()))?;
            tracing::warn!(
                job_id,
                step_index,
                tool = %planned.tool,
                error = %failure,
                "step failed"
            );
            Ok(StepOutcome::Failed {
                step_index,
                failure,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_names_follow_plan_position() {
        assert_eq!(step_name(0, "DOC_ANALYSIS", true), "step_0_doc_analysis");
        assert_eq!(step_name(1, "VIDEO_PIPELINE", false), "step_1");
    }

    #[test]
    fn unknown_tool_failure_names_the_tool() {
        let failure = StepFailure::UnknownTool(UnknownTool {
            tool: "VIDEO_PIPELINE".to_string(),
        });
        assert_eq!(failure.to_string(), "Unknown tool: VIDEO_PIPELINE");
    }
}
