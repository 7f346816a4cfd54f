//! File-backed manifest store: `<outputs_dir>/<job_id>/manifest.json`.
//!
//! Every write goes through [`atomic_write_file`], so readers never observe a
//! half-written manifest. Read-modify-write helpers hold a per-job lock for
//! the whole cycle; tools that receive the store while the engine drives the
//! same job therefore cannot lose each other's updates. Locks are per job id,
//! so different jobs never contend.

use crate::orchestration::error::OrchestratorError;
use crate::orchestration::manifest::{
    InventorySummary, JobStatus, Manifest, StepRecord, StepUpdate,
};
use crate::shared::fs_atomic::atomic_write_file;
use crate::shared::ids::validate_job_id;
use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Debug)]
pub struct ManifestStore {
    outputs_dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ManifestStore {
    pub fn new(outputs_dir: impl Into<PathBuf>) -> Self {
        Self {
            outputs_dir: outputs_dir.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn outputs_dir(&self) -> &Path {
        &self.outputs_dir
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.outputs_dir.join(job_id)
    }

    pub fn manifest_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(MANIFEST_FILE_NAME)
    }

    pub fn exists(&self, job_id: &str) -> bool {
        self.manifest_path(job_id).is_file()
    }

    pub fn create(
        &self,
        job_id: &str,
        intent: &str,
        inventory: InventorySummary,
    ) -> Result<Manifest, OrchestratorError> {
        check_job_id(job_id)?;
        let lock = self.job_lock(job_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if self.exists(job_id) {
            return Err(OrchestratorError::ManifestExists {
                job_id: job_id.to_string(),
            });
        }
        let manifest = Manifest::new(job_id, intent, inventory, Utc::now());
        self.write(&manifest)?;
        tracing::debug!(job_id, "created manifest");
        Ok(manifest)
    }

    pub fn load(&self, job_id: &str) -> Result<Manifest, OrchestratorError> {
        check_job_id(job_id)?;
        let path = self.manifest_path(job_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(OrchestratorError::NotFound {
                    job_id: job_id.to_string(),
                })
            }
            Err(err) => return Err(io_error(&path, err)),
        };
        serde_json::from_str(&raw).map_err(|err| json_error(&path, err))
    }

    /// Full overwrite. Refreshes `updated_at` on the caller's copy.
    pub fn save(&self, manifest: &mut Manifest) -> Result<(), OrchestratorError> {
        check_job_id(&manifest.job_id)?;
        let lock = self.job_lock(&manifest.job_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        manifest.updated_at = Utc::now();
        self.write(manifest)
    }

    /// Runs `apply` against the current manifest under the job lock and
    /// persists the result. `apply` must not call back into this store for
    /// the same job. When `apply` fails nothing is written.
    pub fn mutate<T>(
        &self,
        job_id: &str,
        apply: impl FnOnce(&mut Manifest) -> Result<T, OrchestratorError>,
    ) -> Result<T, OrchestratorError> {
        check_job_id(job_id)?;
        let lock = self.job_lock(job_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut manifest = self.load(job_id)?;
        let value = apply(&mut manifest)?;
        manifest.updated_at = Utc::now();
        self.write(&manifest)?;
        Ok(value)
    }

    pub fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
    ) -> Result<Manifest, OrchestratorError> {
        self.mutate(job_id, |manifest| {
            manifest.status = status;
            Ok(manifest.clone())
        })
    }

    /// Moves the job to `next` only when its current status is one of
    /// `allowed_from`; otherwise fails with `InvalidState` and writes nothing.
    pub fn transition_status(
        &self,
        job_id: &str,
        allowed_from: &[JobStatus],
        next: JobStatus,
    ) -> Result<Manifest, OrchestratorError> {
        self.mutate(job_id, |manifest| {
            if !allowed_from.contains(&manifest.status) || !manifest.status.can_transition_to(next)
            {
                return Err(OrchestratorError::InvalidState {
                    job_id: manifest.job_id.clone(),
                    status: manifest.status,
                    expected: describe_statuses(allowed_from),
                });
            }
            manifest.status = next;
            Ok(manifest.clone())
        })
    }

    /// Appends `step` and returns its index with the stored copy. A step that
    /// arrives already terminal is stamped as such, and its error (if any)
    /// joins the job-level error list.
    pub fn append_step(
        &self,
        job_id: &str,
        mut step: StepRecord,
    ) -> Result<(usize, StepRecord), OrchestratorError> {
        self.mutate(job_id, |manifest| {
            let now = Utc::now();
            let status = step.status;
            step.apply_status(status, now);
            if let Some(error) = &step.error {
                manifest.errors.push(error.clone());
            }
            manifest.steps.push(step.clone());
            Ok((manifest.steps.len() - 1, step))
        })
    }

    pub fn update_step(
        &self,
        job_id: &str,
        step_index: usize,
        update: StepUpdate,
    ) -> Result<StepRecord, OrchestratorError> {
        self.mutate(job_id, |manifest| {
            let step = step_mut(manifest, step_index)?;
            apply_step_update(step, update.clone());
            let step = step.clone();
            if let Some(error) = update.error {
                manifest.errors.push(error);
            }
            Ok(step)
        })
    }

    /// Marks the step completed and files each output under `category`.
    pub fn complete_step(
        &self,
        job_id: &str,
        step_index: usize,
        outputs: Vec<String>,
        category: &str,
    ) -> Result<StepRecord, OrchestratorError> {
        self.mutate(job_id, |manifest| {
            let step = step_mut(manifest, step_index)?;
            apply_step_update(step, StepUpdate::completed(outputs.clone()));
            let step = step.clone();
            for path in &outputs {
                manifest.add_output(category, path);
            }
            Ok(step)
        })
    }

    /// Returns whether the path was newly recorded. Re-adding an existing
    /// `(category, path)` pair leaves the manifest file untouched.
    pub fn add_output(
        &self,
        job_id: &str,
        category: &str,
        path: &str,
    ) -> Result<bool, OrchestratorError> {
        check_job_id(job_id)?;
        let lock = self.job_lock(job_id);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut manifest = self.load(job_id)?;
        if !manifest.add_output(category, path) {
            return Ok(false);
        }
        manifest.updated_at = Utc::now();
        self.write(&manifest)?;
        Ok(true)
    }

    /// All manifests under the outputs dir, ordered by job id. Directories
    /// without a manifest are skipped.
    pub fn list(&self) -> Result<Vec<Manifest>, OrchestratorError> {
        let entries = match fs::read_dir(&self.outputs_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(io_error(&self.outputs_dir, err)),
        };

        let mut job_ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| io_error(&self.outputs_dir, err))?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_job_id(&name).is_err() || !self.exists(&name) {
                continue;
            }
            job_ids.push(name);
        }
        job_ids.sort();

        job_ids.iter().map(|job_id| self.load(job_id)).collect()
    }

    fn job_lock(&self, job_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(job_id.to_string()).or_default())
    }

    fn write(&self, manifest: &Manifest) -> Result<(), OrchestratorError> {
        let dir = self.job_dir(&manifest.job_id);
        fs::create_dir_all(&dir).map_err(|err| io_error(&dir, err))?;
        let path = self.manifest_path(&manifest.job_id);
        let body = serde_json::to_vec_pretty(manifest).map_err(|err| json_error(&path, err))?;
        atomic_write_file(&path, &body).map_err(|err| io_error(&path, err))
    }
}

fn apply_step_update(step: &mut StepRecord, update: StepUpdate) {
    if let Some(status) = update.status {
        step.apply_status(status, Utc::now());
    }
    if let Some(outputs) = update.outputs {
        step.outputs = outputs;
    }
    if let Some(error) = update.error {
        step.error = Some(error);
    }
}

fn step_mut(manifest: &mut Manifest, step_index: usize) -> Result<&mut StepRecord, OrchestratorError> {
    let step_count = manifest.steps.len();
    let job_id = manifest.job_id.clone();
    manifest
        .steps
        .get_mut(step_index)
        .ok_or(OrchestratorError::StepIndexOutOfRange {
            job_id,
            step_index,
            step_count,
        })
}

fn describe_statuses(statuses: &[JobStatus]) -> String {
    statuses
        .iter()
        .map(|status| format!("`{status}`"))
        .collect::<Vec<_>>()
        .join(" or ")
}

fn check_job_id(job_id: &str) -> Result<(), OrchestratorError> {
    validate_job_id(job_id).map_err(|reason| OrchestratorError::InvalidJobId {
        job_id: job_id.to_string(),
        reason,
    })
}

fn io_error(path: &Path, source: std::io::Error) -> OrchestratorError {
    OrchestratorError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn json_error(path: &Path, source: serde_json::Error) -> OrchestratorError {
    OrchestratorError::Json {
        path: path.display().to_string(),
        source,
    }
}

