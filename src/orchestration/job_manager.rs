//! Job lifecycle: id allocation, status transitions and the execution loop.
//!
//! The manifest store is the record of truth. The in-memory index only tracks
//! which jobs this manager knows about and carries their cancellation flags.

use crate::orchestration::error::OrchestratorError;
use crate::orchestration::manifest::{InventorySummary, JobStatus, Manifest};
use crate::orchestration::manifest_store::ManifestStore;
use crate::orchestration::plan_validator::{validate_plan, Plan};
use crate::orchestration::planner::Planner;
use crate::orchestration::step_execution::{execute_step, StepExecutionContext};
use crate::orchestration::tool_dispatch::ToolDispatchTable;
use crate::shared::ids::{generate_job_id, validate_job_id};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

pub const JOB_ID_ALLOCATION_ATTEMPTS: usize = 8;

#[derive(Debug, Default)]
struct ActiveJob {
    running: AtomicBool,
    cancel_requested: AtomicBool,
}

pub struct JobManager {
    store: Arc<ManifestStore>,
    planner: Arc<dyn Planner>,
    tools: ToolDispatchTable,
    active: Mutex<HashMap<String, Arc<ActiveJob>>>,
}

impl JobManager {
    pub fn new(
        store: Arc<ManifestStore>,
        planner: Arc<dyn Planner>,
        tools: ToolDispatchTable,
    ) -> Self {
        Self {
            store,
            planner,
            tools,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &ManifestStore {
        &self.store
    }

    pub fn create_job(
        &self,
        intent: &str,
        inventory: InventorySummary,
    ) -> Result<String, OrchestratorError> {
        for _ in 0..JOB_ID_ALLOCATION_ATTEMPTS {
            let job_id = generate_job_id(Utc::now()).map_err(OrchestratorError::IdAllocation)?;
            match self.store.create(&job_id, intent, inventory.clone()) {
                Ok(_) => {
                    self.active_index()
                        .insert(job_id.clone(), Arc::new(ActiveJob::default()));
                    tracing::info!(
                        job_id = %job_id,
                        total_files = inventory.total_files,
                        "job created"
                    );
                    return Ok(job_id);
                }
                Err(OrchestratorError::ManifestExists { job_id }) => {
                    tracing::debug!(job_id = %job_id, "job id collision; retrying");
                }
                Err(err) => return Err(err),
            }
        }
        Err(OrchestratorError::IdAllocation(format!(
            "no free job id after {JOB_ID_ALLOCATION_ATTEMPTS} attempts"
        )))
    }

    /// Moves a pending job to running and executes it on the calling thread.
    /// Returns the terminal manifest.
    pub fn start_job(&self, job_id: &str) -> Result<Manifest, OrchestratorError> {
        self.begin(job_id)?;
        self.execute(job_id)
    }

    /// Same checks and `running` transition as [`start_job`](Self::start_job),
    /// done synchronously; execution then continues on a dedicated thread.
    pub fn spawn_job(
        self: &Arc<Self>,
        job_id: &str,
    ) -> Result<JoinHandle<Result<Manifest, OrchestratorError>>, OrchestratorError> {
        self.begin(job_id)?;
        let manager = Arc::clone(self);
        let owned_id = job_id.to_string();
        thread::Builder::new()
            .name(format!("job-{job_id}"))
            .spawn(move || manager.execute(&owned_id))
            .map_err(|source| {
                let err = OrchestratorError::Io {
                    path: self.store.job_dir(job_id).display().to_string(),
                    source,
                };
                self.fail_job(job_id, &err);
                err
            })
    }

    /// Cancels a pending or running job. A step already in flight finishes;
    /// the loop stops at the next step boundary.
    pub fn cancel_job(&self, job_id: &str) -> Result<Manifest, OrchestratorError> {
        self.ensure_known(job_id)?;
        let manifest = self.store.transition_status(
            job_id,
            &[JobStatus::Pending, JobStatus::Running],
            JobStatus::Cancelled,
        )?;

        let mut index = self.active_index();
        if let Some(entry) = index.get(job_id).cloned() {
            entry.cancel_requested.store(true, Ordering::SeqCst);
            if !entry.running.load(Ordering::SeqCst) {
                index.remove(job_id);
            }
        }
        drop(index);

        tracing::info!(job_id, "job cancelled");
        Ok(manifest)
    }

    pub fn get_job(&self, job_id: &str) -> Result<Manifest, OrchestratorError> {
        self.ensure_known(job_id)?;
        self.store.load(job_id)
    }

    pub fn list_jobs(&self) -> Result<Vec<Manifest>, OrchestratorError> {
        self.store.list()
    }

    /// Whether this manager is tracking the job as created or running.
    pub fn is_active(&self, job_id: &str) -> bool {
        self.active_index().contains_key(job_id)
    }

    fn begin(&self, job_id: &str) -> Result<(), OrchestratorError> {
        self.ensure_known(job_id)?;
        self.store
            .transition_status(job_id, &[JobStatus::Pending], JobStatus::Running)?;
        let entry = Arc::clone(self.active_index().entry(job_id.to_string()).or_default());
        entry.running.store(true, Ordering::SeqCst);
        tracing::info!(job_id, "job started");
        Ok(())
    }

    fn execute(&self, job_id: &str) -> Result<Manifest, OrchestratorError> {
        let result = self.run(job_id);
        if let Err(err) = &result {
            tracing::error!(job_id, error = %err, "job failed");
            self.fail_job(job_id, err);
        }
        self.active_index().remove(job_id);
        result
    }

    fn run(&self, job_id: &str) -> Result<Manifest, OrchestratorError> {
        let manifest = self.store.load(job_id)?;
        let plan = self.plan(&manifest)?;
        self.store.mutate(job_id, |manifest| {
            manifest.plan = Some(plan.clone());
            Ok(())
        })?;
        tracing::info!(job_id, steps = plan.steps.len(), summary = %plan.summary, "plan attached");

        let context = StepExecutionContext {
            store: &self.store,
            tools: &self.tools,
        };
        for (offset, planned) in plan.steps.iter().enumerate() {
            if self.cancellation_observed(job_id)? {
                tracing::info!(
                    job_id,
                    remaining = plan.steps.len() - offset,
                    "cancellation observed; stopping at step boundary"
                );
                return self.store.load(job_id);
            }
            let outcome = execute_step(&context, job_id, offset, planned)?;
            tracing::debug!(
                job_id,
                step_index = outcome.step_index(),
                completed = outcome.is_completed(),
                "step finished"
            );
        }

        match self
            .store
            .transition_status(job_id, &[JobStatus::Running], JobStatus::Completed)
        {
            Ok(manifest) => {
                tracing::info!(
                    job_id,
                    steps = manifest.steps.len(),
                    failed_steps = manifest.failed_steps(),
                    "job completed"
                );
                Ok(manifest)
            }
            Err(OrchestratorError::InvalidState { status, .. }) => {
                tracing::info!(job_id, %status, "job left running before completion");
                self.store.load(job_id)
            }
            Err(err) => Err(err),
        }
    }

    fn plan(&self, manifest: &Manifest) -> Result<Plan, OrchestratorError> {
        let planning_failure = |reason: String| OrchestratorError::PlanningFailure {
            job_id: manifest.job_id.clone(),
            reason,
        };
        let schema = self.tools.tool_schema();
        let raw = self
            .planner
            .plan(&manifest.intent, &manifest.inventory, &schema)
            .map_err(|err| planning_failure(err.to_string()))?;
        validate_plan(&raw).map_err(|err| planning_failure(err.to_string()))
    }

    fn cancellation_observed(&self, job_id: &str) -> Result<bool, OrchestratorError> {
        let flagged = self
            .active_index()
            .get(job_id)
            .is_some_and(|entry| entry.cancel_requested.load(Ordering::SeqCst));
        if flagged {
            return Ok(true);
        }
        Ok(self.store.load(job_id)?.status == JobStatus::Cancelled)
    }

    /// Best effort: the failure being recorded may itself be a broken store.
    fn fail_job(&self, job_id: &str, err: &OrchestratorError) {
        let message = match err {
            OrchestratorError::PlanningFailure { reason, .. } => format!("Planning failed: {reason}"),
            other => other.to_string(),
        };
        let recorded = self.store.mutate(job_id, |manifest| {
            manifest.errors.push(message.clone());
            if manifest.status == JobStatus::Running {
                manifest.status = JobStatus::Failed;
            }
            Ok(())
        });
        if let Err(record_err) = recorded {
            tracing::error!(job_id, error = %record_err, "could not record job failure");
        }
    }

    /// Malformed ids never name a job, so they report `NotFound` too.
    fn ensure_known(&self, job_id: &str) -> Result<(), OrchestratorError> {
        if validate_job_id(job_id).is_ok()
            && (self.is_active(job_id) || self.store.exists(job_id))
        {
            return Ok(());
        }
        Err(OrchestratorError::NotFound {
            job_id: job_id.to_string(),
        })
    }

    fn active_index(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<ActiveJob>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
