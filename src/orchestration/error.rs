use crate::orchestration::manifest::JobStatus;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("job `{job_id}` not found")]
    NotFound { job_id: String },
    #[error("job `{job_id}` is `{status}`; operation requires {expected}")]
    InvalidState {
        job_id: String,
        status: JobStatus,
        expected: String,
    },
    #[error("planning failed for job `{job_id}`: {reason}")]
    PlanningFailure { job_id: String, reason: String },
    #[error("manifest for job `{job_id}` already exists")]
    ManifestExists { job_id: String },
    #[error("step index {step_index} out of range for job `{job_id}` ({step_count} steps)")]
    StepIndexOutOfRange {
        job_id: String,
        step_index: usize,
        step_count: usize,
    },
    #[error("invalid job id `{job_id}`: {reason}")]
    InvalidJobId { job_id: String, reason: String },
    #[error("failed to allocate job id: {0}")]
    IdAllocation(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("json error at {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

