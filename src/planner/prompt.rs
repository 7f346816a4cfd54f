use crate::orchestration::manifest::InventorySummary;
use crate::orchestration::tool_schema::ToolSchema;
use std::fs;
use std::path::Path;

pub const EXAMPLES_HEADING: &str = "## Examples";

pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are the planning component of an offline file-processing appliance.

When a user drops files into an "inputs" folder and describes what they want, you must:
1. Analyze the available files (from the inventory provided)
2. Understand the user's intent
3. Create a structured plan using the available tools
4. Return ONLY valid JSON describing the plan

You must respond with ONLY valid JSON in this format:
{
  "plan": {
    "summary": "Brief description of what will be done",
    "steps": [
      {
        "tool": "TOOL_NAME",
        "params": {}
      }
    ]
  }
}"#;

const RESPONSE_FORMAT_REMINDER: &str = r#"You must respond with ONLY valid JSON in this exact format:
{
  "plan": {
    "summary": "Brief description of the plan",
    "steps": [
      {
        "tool": "TOOL_NAME",
        "params": {}
      }
    ]
  }
}"#;

/// System prompt from a template file: everything above the first
/// `## Examples` line. Falls back to the built-in prompt when the file is
/// absent or unreadable.
pub fn load_system_prompt(template: Option<&Path>) -> String {
    let Some(path) = template else {
        return DEFAULT_SYSTEM_PROMPT.to_string();
    };
    match fs::read_to_string(path) {
        Ok(content) => {
            let prompt = system_prompt_from_template(&content);
            if prompt.is_empty() {
                DEFAULT_SYSTEM_PROMPT.to_string()
            } else {
                prompt
            }
        }
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "planner prompt template unavailable; using default"
            );
            DEFAULT_SYSTEM_PROMPT.to_string()
        }
    }
}

pub fn system_prompt_from_template(content: &str) -> String {
    content
        .lines()
        .take_while(|line| !line.starts_with(EXAMPLES_HEADING))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

pub fn format_user_prompt(intent: &str, inventory: &InventorySummary) -> String {
    let mut counts = String::new();
    for (kind, count) in &inventory.type_counts {
        counts.push_str(&format!("- {count} {kind}(s)\n"));
    }
    format!(
        "User intent: {intent}\n\nFound {} files:\n{counts}\nCreate a plan to accomplish the user's request using the available tools.",
        inventory.total_files
    )
}

/// Full user message: prompt, tool schema and the response-shape reminder.
pub fn format_planning_request(
    intent: &str,
    inventory: &InventorySummary,
    tools: &ToolSchema,
) -> Result<String, serde_json::Error> {
    let schema = serde_json::to_string_pretty(tools)?;
    Ok(format!(
        "{}\n\nAvailable tools:\n{schema}\n\n{RESPONSE_FORMAT_REMINDER}",
        format_user_prompt(intent, inventory)
    ))
}
