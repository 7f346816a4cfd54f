//! Sanitizes raw planner output into an executable [`Plan`].
//!
//! Planner output is untrusted. The only fatal defect is a missing top-level
//! `plan` object; everything below it is repaired or dropped.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_PLAN_SUMMARY: &str = "No summary provided";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub summary: String,
    #[serde(default)]
    pub steps: Vec<PlannedStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub tool: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanValidationError {
    #[error("plan response missing `plan` object")]
    MissingPlan,
}

pub fn validate_plan(raw: &Value) -> Result<Plan, PlanValidationError> {
    let plan = raw
        .get("plan")
        .and_then(Value::as_object)
        .ok_or(PlanValidationError::MissingPlan)?;

    let summary = plan
        .get("summary")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_PLAN_SUMMARY.to_string());

    let steps = plan
        .get("steps")
        .and_then(Value::as_array)
        .map(|steps| {
            steps
                .iter()
                .enumerate()
                .filter_map(|(index, step)| sanitize_step(index, step))
                .collect()
        })
        .unwrap_or_default();

    Ok(Plan { summary, steps })
}

fn sanitize_step(index: usize, step: &Value) -> Option<PlannedStep> {
    let tool = step
        .get("tool")
        .and_then(Value::as_str)
        .filter(|tool| !tool.trim().is_empty());
    let Some(tool) = tool else {
        tracing::warn!(step_index = index, "plan step missing `tool`, dropping");
        return None;
    };
    let params = step
        .get("params")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    Some(PlannedStep {
        tool: tool.to_string(),
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_plan_object_is_fatal() {
        assert_eq!(
            validate_plan(&json!({"summary": "x"})),
            Err(PlanValidationError::MissingPlan)
        );
        assert_eq!(
            validate_plan(&json!({"plan": "do things"})),
            Err(PlanValidationError::MissingPlan)
        );
        assert_eq!(
            validate_plan(&json!([1, 2])),
            Err(PlanValidationError::MissingPlan)
        );
    }

    #[test]
    fn fills_defaults_for_summary_and_steps() {
        let plan = validate_plan(&json!({"plan": {}})).expect("valid");
        assert_eq!(plan.summary, DEFAULT_PLAN_SUMMARY);
        assert!(plan.steps.is_empty());

        let plan = validate_plan(&json!({"plan": {"summary": "Test plan"}})).expect("valid");
        assert_eq!(plan.summary, "Test plan");
        assert!(plan.steps.is_empty());
    }

    #[test]
    fn drops_steps_without_tool_and_preserves_order() {
        let raw = json!({
            "plan": {
                "summary": "Test",
                "steps": [
                    {"tool": "IMAGE_PIPELINE", "params": {"purpose": "cleanup"}},
                    {"params": {}},
                    {"tool": "DOC_ANALYSIS"},
                    {"tool": "", "params": {}},
                    {"tool": "   "},
                    "not-an-object",
                    {"tool": "IMAGE_PIPELINE", "params": ["bad"]}
                ]
            }
        });
        let plan = validate_plan(&raw).expect("valid");
        let tools = plan
            .steps
            .iter()
            .map(|step| step.tool.as_str())
            .collect::<Vec<_>>();
        assert_eq!(tools, vec!["IMAGE_PIPELINE", "DOC_ANALYSIS", "IMAGE_PIPELINE"]);
        assert_eq!(plan.steps[0].params["purpose"], "cleanup");
        assert!(plan.steps[1].params.is_empty());
        assert!(plan.steps[2].params.is_empty());
    }

    #[test]
    fn tool_ids_are_kept_verbatim() {
        let raw = json!({"plan": {"steps": [{"tool": " DOC_ANALYSIS "}]}});
        let plan = validate_plan(&raw).expect("valid");
        assert_eq!(plan.steps[0].tool, " DOC_ANALYSIS ");
    }

    #[test]
    fn validating_a_validated_plan_is_a_no_op() {
        let raw = json!({
            "plan": {
                "steps": [
                    {"tool": "DOC_ANALYSIS", "params": {"query": "q"}},
                    {"params": {}}
                ]
            }
        });
        let once = validate_plan(&raw).expect("valid");
        let reencoded = json!({"plan": serde_json::to_value(&once).expect("encode")});
        let twice = validate_plan(&reencoded).expect("valid");
        assert_eq!(once, twice);
    }
}
