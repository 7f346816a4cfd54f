use crate::config::PlannerSettings;
use crate::orchestration::manifest::InventorySummary;
use crate::orchestration::planner::{Planner, PlannerError};
use crate::orchestration::tool_schema::ToolSchema;
use crate::planner::prompt::{format_planning_request, load_system_prompt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Planner backed by an Ollama-compatible `/api/chat` endpoint.
pub struct OllamaPlanner {
    agent: ureq::Agent,
    base_url: String,
    model: String,
    temperature: f64,
    system_prompt: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

impl OllamaPlanner {
    pub fn new(settings: &PlannerSettings) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .build();
        Self {
            agent,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            system_prompt: load_system_prompt(settings.prompt_template.as_deref()),
        }
    }

    fn chat(&self, user_prompt: String) -> Result<String, PlannerError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": self.system_prompt},
                {"role": "user", "content": user_prompt},
            ],
            "stream": false,
            "format": plan_response_schema(),
            "options": {"temperature": self.temperature},
        });
        let response = self
            .agent
            .post(&url)
            .send_json(body)
            .map_err(|e| PlannerError::Request(e.to_string()))?;
        let chat = response
            .into_json::<ChatResponse>()
            .map_err(|e| PlannerError::InvalidResponse(e.to_string()))?;
        Ok(chat.message.map(|message| message.content).unwrap_or_default())
    }
}

impl Planner for OllamaPlanner {
    fn plan(
        &self,
        intent: &str,
        inventory: &InventorySummary,
        tools: &ToolSchema,
    ) -> Result<Value, PlannerError> {
        let request = format_planning_request(intent, inventory, tools)
            .map_err(|e| PlannerError::Request(e.to_string()))?;
        tracing::info!(model = %self.model, tools = tools.tools.len(), "requesting plan");
        let content = self.chat(request)?;
        parse_plan_content(&content)
    }
}

/// JSON schema passed as the chat `format`, constraining the model's reply.
pub fn plan_response_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "plan": {
                "type": "object",
                "properties": {
                    "summary": {"type": "string"},
                    "steps": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "tool": {"type": "string"},
                                "params": {"type": "object"}
                            },
                            "required": ["tool", "params"]
                        }
                    }
                },
                "required": ["summary", "steps"]
            }
        },
        "required": ["plan"]
    })
}

/// Parses a model reply as JSON, tolerating a surrounding Markdown code fence.
pub fn parse_plan_content(content: &str) -> Result<Value, PlannerError> {
    let trimmed = content.trim();
    let body = if trimmed.starts_with("```") {
        let mut lines = trimmed.lines().skip(1).collect::<Vec<_>>();
        if lines.last().is_some_and(|line| line.trim() == "```") {
            lines.pop();
        }
        lines.join("\n")
    } else {
        trimmed.to_string()
    };
    serde_json::from_str(&body).map_err(|e| {
        let preview = body.chars().take(200).collect::<String>();
        PlannerError::InvalidResponse(format!("{e}; content: {preview}"))
    })
}
