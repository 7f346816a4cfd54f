//! Declarative tool descriptions forwarded to the planner. The engine never
//! interprets these beyond serializing them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const IMAGE_PIPELINE_TOOL: &str = "IMAGE_PIPELINE";
pub const DOC_ANALYSIS_TOOL: &str = "DOC_ANALYSIS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub tools: Vec<ToolSpec>,
}

impl ToolSchema {
    pub fn tool(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|tool| tool.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub params: BTreeMap<String, ParamSpec>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.params.insert(name.into(), spec);
        self
    }

    pub fn required_params(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Value>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn new(kind: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        Self {
            kind: kind.into(),
            items: None,
            description: description.into(),
            required,
            allowed: None,
            default: None,
        }
    }

    pub fn string_list(description: impl Into<String>, required: bool) -> Self {
        Self {
            items: Some(json!({"type": "string"})),
            ..Self::new("array", description, required)
        }
    }

    pub fn one_of(mut self, allowed: &[&str], default: &str) -> Self {
        self.allowed = Some(allowed.iter().map(|v| v.to_string()).collect());
        self.default = Some(Value::String(default.to_string()));
        self
    }
}

/// Descriptions for the two tools every deployment ships with. Configured
/// tools carrying one of these names inherit the description when they do
/// not supply their own.
pub fn builtin_tool_spec(name: &str) -> Option<ToolSpec> {
    match name {
        IMAGE_PIPELINE_TOOL => Some(
            ToolSpec::new(
                IMAGE_PIPELINE_TOOL,
                "Process images through image pipelines (cleanup, enhancement, style transfer, etc.)",
            )
            .param(
                "purpose",
                ParamSpec::new(
                    "string",
                    "What to do with the images (e.g., 'dealership-ready car photos', 'product enhancement')",
                    true,
                ),
            )
            .param(
                "style",
                ParamSpec::new(
                    "string",
                    "Style preferences (e.g., 'bright, neutral background', 'premium look')",
                    false,
                ),
            )
            .param(
                "input_paths",
                ParamSpec::string_list("List of image file paths from inputs/", true),
            ),
        ),
        DOC_ANALYSIS_TOOL => Some(
            ToolSpec::new(
                DOC_ANALYSIS_TOOL,
                "Analyze documents (summarize, search, compile by subject, Q&A)",
            )
            .param(
                "query",
                ParamSpec::new("string", "What to analyze or find in the documents", true),
            )
            .param(
                "input_paths",
                ParamSpec::string_list("List of document file paths from inputs/", true),
            )
            .param(
                "output_kind",
                ParamSpec::new("string", "Type of output to generate", false)
                    .one_of(&["summary", "qa", "clustered_report"], "summary"),
            ),
        ),
        _ => None,
    }
}
