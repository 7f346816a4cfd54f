//! Tool dispatch table: tool identifier to implementation.
//!
//! The table is built explicitly and handed to the job manager; there is no
//! process-wide registry. Lookups of unregistered identifiers yield
//! [`UnknownTool`], which the step loop records on the step instead of
//! propagating.

use crate::orchestration::error::OrchestratorError;
use crate::orchestration::manifest::OUTPUT_CATEGORY_MISC;
use crate::orchestration::manifest_store::ManifestStore;
use crate::orchestration::tool_schema::{ToolSchema, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a tool receives besides its parameters. `manifests` is the same store
/// the engine writes through, so incremental writes from a tool are
/// serialized with the engine's own.
pub struct ToolContext<'a> {
    pub job_id: &'a str,
    pub step_index: usize,
    pub manifests: &'a ManifestStore,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    #[serde(default)]
    pub outputs: Vec<String>,
}

impl ToolOutput {
    pub fn new(outputs: Vec<String>) -> Self {
        Self { outputs }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid parameter `{param}`: {reason}")]
    InvalidParams { param: String, reason: String },
    #[error("tool timed out after {seconds}s")]
    Timeout { seconds: u64 },
    #[error("manifest update failed: {0}")]
    Store(#[from] OrchestratorError),
    #[error("{0}")]
    Failed(String),
}

pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    /// Manifest `outputs` bucket that receives this tool's produced paths.
    fn output_category(&self) -> &str {
        OUTPUT_CATEGORY_MISC
    }

    fn execute(
        &self,
        context: &ToolContext<'_>,
        params: &Map<String, Value>,
    ) -> Result<ToolOutput, ToolError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown tool `{tool}`")]
pub struct UnknownTool {
    pub tool: String,
}

#[derive(Clone, Default)]
pub struct ToolDispatchTable {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolDispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers under the tool's own spec name, replacing any previous entry.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_shared(Arc::new(tool));
    }

    pub fn register_shared(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.spec().name;
        tracing::debug!(tool = %name, "registered tool");
        self.tools.insert(name, tool);
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(tool);
        self
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Tool>, UnknownTool> {
        self.tools.get(name).cloned().ok_or_else(|| UnknownTool {
            tool: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Schema of exactly the registered tools, in name order.
    pub fn tool_schema(&self) -> ToolSchema {
        ToolSchema {
            tools: self.tools.values().map(|tool| tool.spec()).collect(),
        }
    }
}

impl std::fmt::Debug for ToolDispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatchTable")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}
