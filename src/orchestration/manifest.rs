use crate::orchestration::plan_validator::Plan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub const OUTPUT_CATEGORY_IMAGES: &str = "images";
pub const OUTPUT_CATEGORY_DOCS: &str = "docs";
pub const OUTPUT_CATEGORY_MISC: &str = "misc";
pub const DEFAULT_OUTPUT_CATEGORIES: [&str; 3] = [
    OUTPUT_CATEGORY_IMAGES,
    OUTPUT_CATEGORY_DOCS,
    OUTPUT_CATEGORY_MISC,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Pending, JobStatus::Failed)
                | (JobStatus::Pending, JobStatus::Cancelled)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
                | (JobStatus::Running, JobStatus::Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Failed)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Counts captured when the job is created. Never rewritten afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySummary {
    #[serde(default)]
    pub total_files: u64,
    #[serde(default)]
    pub type_counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub tool: String,
    pub status: StepStatus,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl StepRecord {
    pub fn new(name: impl Into<String>, tool: impl Into<String>, inputs: Vec<String>) -> Self {
        Self {
            name: name.into(),
            tool: tool.into(),
            status: StepStatus::Pending,
            inputs,
            outputs: Vec::new(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Moves the step to `next`, stamping `started_at` on the first entry into
    /// `running` and `completed_at` on the first entry into a terminal status.
    pub fn apply_status(&mut self, next: StepStatus, now: DateTime<Utc>) {
        self.status = next;
        if next == StepStatus::Running && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if next.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
    }
}

/// Partial update applied by `ManifestStore::update_step`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepUpdate {
    pub status: Option<StepStatus>,
    pub outputs: Option<Vec<String>>,
    pub error: Option<String>,
}

impl StepUpdate {
    pub fn status(status: StepStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn completed(outputs: Vec<String>) -> Self {
        Self {
            status: Some(StepStatus::Completed),
            outputs: Some(outputs),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(StepStatus::Failed),
            outputs: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub job_id: String,
    pub intent: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub inventory: InventorySummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(default)]
    pub steps: Vec<StepRecord>,
    #[serde(default)]
    pub outputs: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl Manifest {
    pub fn new(
        job_id: impl Into<String>,
        intent: impl Into<String>,
        inventory: InventorySummary,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            intent: intent.into(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            inventory,
            plan: None,
            steps: Vec::new(),
            outputs: DEFAULT_OUTPUT_CATEGORIES
                .iter()
                .map(|category| (category.to_string(), Vec::new()))
                .collect(),
            errors: Vec::new(),
        }
    }

    /// Returns true when the path was not already recorded under `category`.
    pub fn add_output(&mut self, category: &str, path: &str) -> bool {
        let entries = self.outputs.entry(category.to_string()).or_default();
        if entries.iter().any(|existing| existing == path) {
            return false;
        }
        entries.push(path.to_string());
        true
    }

    pub fn failed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| step.status == StepStatus::Failed)
            .count()
    }
}

/// Reads the `input_paths` parameter the planner attaches to a step.
pub fn step_inputs_from_params(params: &Map<String, Value>) -> Vec<String> {
    params
        .get("input_paths")
        .and_then(Value::as_array)
        .map(|paths| {
            paths
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
