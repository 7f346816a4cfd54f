use jobsmith::orchestration::manifest::{StepStatus, OUTPUT_CATEGORY_DOCS};
use jobsmith::orchestration::{
    InventorySummary, JobManager, JobStatus, ManifestStore, OrchestratorError, Planner,
    PlannerError, Tool, ToolContext, ToolDispatchTable, ToolError, ToolOutput, ToolSchema,
    ToolSpec,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

struct ScriptedPlanner {
    response: Result<Value, String>,
    seen: Mutex<Vec<(String, u64, Vec<String>)>>,
}

impl ScriptedPlanner {
    fn returning(response: Value) -> Self {
        Self {
            response: Ok(response),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn failing(reason: &str) -> Self {
        Self {
            response: Err(reason.to_string()),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl Planner for ScriptedPlanner {
    fn plan(
        &self,
        intent: &str,
        inventory: &InventorySummary,
        tools: &ToolSchema,
    ) -> Result<Value, PlannerError> {
        self.seen.lock().expect("seen lock").push((
            intent.to_string(),
            inventory.total_files,
            tools.tools.iter().map(|tool| tool.name.clone()).collect(),
        ));
        self.response.clone().map_err(PlannerError::Request)
    }
}

struct DocTool;

impl Tool for DocTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("DOC_ANALYSIS", "Analyze documents")
    }

    fn output_category(&self) -> &str {
        OUTPUT_CATEGORY_DOCS
    }

    fn execute(
        &self,
        context: &ToolContext<'_>,
        _params: &Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::new(vec![format!(
            "outputs/{}/summary.md",
            context.job_id
        )]))
    }
}

struct BrokenTool;

impl Tool for BrokenTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("IMAGE_PIPELINE", "Process images")
    }

    fn execute(
        &self,
        _context: &ToolContext<'_>,
        _params: &Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        Err(ToolError::Failed("image backend unavailable".to_string()))
    }
}

struct FullDiskTool;

impl Tool for FullDiskTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("FLAKY", "Writes to scratch space")
    }

    fn execute(
        &self,
        _context: &ToolContext<'_>,
        _params: &Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        Err(ToolError::Store(OrchestratorError::Io {
            path: "/scratch/out.png".to_string(),
            source: std::io::Error::other("disk full"),
        }))
    }
}

struct ManifestClobberTool;

impl Tool for ManifestClobberTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("CLOBBER", "Overwrites the job manifest")
    }

    fn execute(
        &self,
        context: &ToolContext<'_>,
        _params: &Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        fs::write(context.manifests.manifest_path(context.job_id), "{ not json")
            .map_err(|err| ToolError::Failed(err.to_string()))?;
        Ok(ToolOutput::new(vec!["out/clobbered.txt".to_string()]))
    }
}

struct GatedTool {
    started: Mutex<Sender<usize>>,
    release: Mutex<Receiver<()>>,
}

impl Tool for GatedTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec::new("SLOW", "Waits until released")
    }

    fn execute(
        &self,
        context: &ToolContext<'_>,
        _params: &Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        self.started
            .lock()
            .expect("started lock")
            .send(context.step_index)
            .expect("signal start");
        self.release
            .lock()
            .expect("release lock")
            .recv_timeout(Duration::from_secs(10))
            .expect("release");
        Ok(ToolOutput::new(vec!["out/slow.txt".to_string()]))
    }
}

fn two_documents() -> InventorySummary {
    InventorySummary {
        total_files: 2,
        type_counts: BTreeMap::from([("document".to_string(), 2)]),
    }
}

fn manager(
    root: &std::path::Path,
    planner: Arc<ScriptedPlanner>,
    tools: ToolDispatchTable,
) -> JobManager {
    JobManager::new(Arc::new(ManifestStore::new(root)), planner, tools)
}

#[test]
fn job_manager_runs_single_step_document_plan_to_completion() {
    let temp = tempdir().expect("tempdir");
    let planner = Arc::new(ScriptedPlanner::returning(json!({
        "plan": {
            "summary": "Summarize both reports",
            "steps": [{"tool": "DOC_ANALYSIS", "params": {"query": "summary", "input_paths": ["a.pdf", "b.pdf"]}}]
        }
    })));
    let manager = manager(
        temp.path(),
        Arc::clone(&planner),
        ToolDispatchTable::new().with_tool(DocTool),
    );

    let job_id = manager
        .create_job("summarize the reports", two_documents())
        .expect("create");
    assert!(manager.is_active(&job_id));
    assert_eq!(manager.get_job(&job_id).expect("get").status, JobStatus::Pending);

    let manifest = manager.start_job(&job_id).expect("start");
    assert_eq!(manifest.status, JobStatus::Completed);
    assert_eq!(manifest.steps.len(), 1);
    let step = &manifest.steps[0];
    assert_eq!(step.status, StepStatus::Completed);
    assert_eq!(step.name, "step_0_doc_analysis");
    assert_eq!(step.inputs, vec!["a.pdf".to_string(), "b.pdf".to_string()]);
    assert!(step.started_at.is_some() && step.completed_at.is_some());
    assert_eq!(manifest.outputs["docs"].len(), 1);
    assert!(manifest.errors.is_empty());
    assert_eq!(
        manifest.plan.as_ref().map(|plan| plan.summary.as_str()),
        Some("Summarize both reports")
    );
    assert!(!manager.is_active(&job_id));

    let seen = planner.seen.lock().expect("seen lock");
    assert_eq!(
        seen.as_slice(),
        &[(
            "summarize the reports".to_string(),
            2,
            vec!["DOC_ANALYSIS".to_string()]
        )]
    );
}

#[test]
fn job_manager_records_unknown_tool_and_keeps_going() {
    let temp = tempdir().expect("tempdir");
    let planner = Arc::new(ScriptedPlanner::returning(json!({
        "plan": {
            "summary": "two steps",
            "steps": [
                {"tool": "DOC_ANALYSIS", "params": {}},
                {"tool": "VIDEO_PIPELINE", "params": {}}
            ]
        }
    })));
    let manager = manager(temp.path(), planner, ToolDispatchTable::new().with_tool(DocTool));
    let job_id = manager.create_job("do both", two_documents()).expect("create");

    let manifest = manager.start_job(&job_id).expect("start");
    assert_eq!(manifest.status, JobStatus::Completed);
    assert_eq!(manifest.steps.len(), 2);
    assert_eq!(manifest.steps[0].status, StepStatus::Completed);
    assert_eq!(manifest.steps[1].status, StepStatus::Failed);
    assert_eq!(manifest.steps[1].name, "step_1");
    assert_eq!(
        manifest.steps[1].error.as_deref(),
        Some("Unknown tool: VIDEO_PIPELINE")
    );
    assert_eq!(manifest.errors.len(), 1);
}

#[test]
fn job_manager_completes_with_errors_matching_failed_steps() {
    let temp = tempdir().expect("tempdir");
    let planner = Arc::new(ScriptedPlanner::returning(json!({
        "plan": {
            "steps": [
                {"tool": "IMAGE_PIPELINE"},
                {"tool": "DOC_ANALYSIS"},
                {"tool": "MISSING"},
                {"tool": "IMAGE_PIPELINE"}
            ]
        }
    })));
    let tools = ToolDispatchTable::new()
        .with_tool(DocTool)
        .with_tool(BrokenTool);
    let manager = manager(temp.path(), planner, tools);
    let job_id = manager.create_job("mixed", two_documents()).expect("create");

    let manifest = manager.start_job(&job_id).expect("start");
    assert_eq!(manifest.status, JobStatus::Completed);
    assert_eq!(manifest.failed_steps(), 3);
    assert_eq!(manifest.errors.len(), manifest.failed_steps());
    assert_eq!(manifest.errors[0], "image backend unavailable");
    assert_eq!(manifest.steps[1].status, StepStatus::Completed);
}

#[test]
fn job_manager_keeps_tool_io_errors_on_the_step() {
    let temp = tempdir().expect("tempdir");
    let planner = Arc::new(ScriptedPlanner::returning(json!({
        "plan": {"steps": [{"tool": "FLAKY"}, {"tool": "DOC_ANALYSIS"}]}
    })));
    let tools = ToolDispatchTable::new()
        .with_tool(FullDiskTool)
        .with_tool(DocTool);
    let manager = manager(temp.path(), planner, tools);
    let job_id = manager.create_job("flaky disk", two_documents()).expect("create");

    let manifest = manager.start_job(&job_id).expect("start");
    assert_eq!(manifest.status, JobStatus::Completed);
    assert_eq!(manifest.steps.len(), 2);
    assert_eq!(manifest.steps[0].status, StepStatus::Failed);
    assert!(manifest.steps[0].completed_at.is_some());
    assert!(manifest.steps[0]
        .error
        .as_deref()
        .expect("step error")
        .contains("disk full"));
    assert_eq!(manifest.steps[1].status, StepStatus::Completed);
    assert_eq!(manifest.failed_steps(), 1);
    assert_eq!(manifest.errors.len(), manifest.failed_steps());
    assert!(!manager.is_active(&job_id));
}

#[test]
fn job_manager_surfaces_unreadable_manifest_during_steps() {
    let temp = tempdir().expect("tempdir");
    let planner = Arc::new(ScriptedPlanner::returning(json!({
        "plan": {"steps": [{"tool": "CLOBBER"}, {"tool": "CLOBBER"}]}
    })));
    let manager = manager(
        temp.path(),
        planner,
        ToolDispatchTable::new().with_tool(ManifestClobberTool),
    );
    let job_id = manager.create_job("clobber", two_documents()).expect("create");

    let err = manager.start_job(&job_id).expect_err("manifest unreadable");
    assert!(matches!(err, OrchestratorError::Json { .. }));
    assert!(!manager.is_active(&job_id));
    assert!(matches!(
        manager.get_job(&job_id),
        Err(OrchestratorError::Json { .. })
    ));
}

#[test]
fn job_manager_fails_padded_tool_ids_as_unknown() {
    let temp = tempdir().expect("tempdir");
    let planner = Arc::new(ScriptedPlanner::returning(json!({
        "plan": {"steps": [{"tool": " DOC_ANALYSIS "}]}
    })));
    let manager = manager(temp.path(), planner, ToolDispatchTable::new().with_tool(DocTool));
    let job_id = manager.create_job("padded", two_documents()).expect("create");

    let manifest = manager.start_job(&job_id).expect("start");
    assert_eq!(manifest.status, JobStatus::Completed);
    assert_eq!(manifest.steps[0].status, StepStatus::Failed);
    assert_eq!(manifest.steps[0].tool, " DOC_ANALYSIS ");
    assert_eq!(
        manifest.steps[0].error.as_deref(),
        Some("Unknown tool:  DOC_ANALYSIS ")
    );
}

#[test]
fn job_manager_marks_job_failed_when_planner_raises() {
    let temp = tempdir().expect("tempdir");
    let planner = Arc::new(ScriptedPlanner::failing("connection refused"));
    let manager = manager(temp.path(), planner, ToolDispatchTable::new().with_tool(DocTool));
    let job_id = manager.create_job("anything", two_documents()).expect("create");

    let err = manager.start_job(&job_id).expect_err("planning fails");
    assert!(matches!(err, OrchestratorError::PlanningFailure { .. }));

    let manifest = manager.get_job(&job_id).expect("get");
    assert_eq!(manifest.status, JobStatus::Failed);
    assert!(manifest.steps.is_empty());
    assert_eq!(manifest.errors.len(), 1);
    assert!(manifest.errors[0].contains("connection refused"));
}

#[test]
fn job_manager_treats_missing_plan_object_as_planning_failure() {
    let temp = tempdir().expect("tempdir");
    let planner = Arc::new(ScriptedPlanner::returning(json!({"steps": []})));
    let manager = manager(temp.path(), planner, ToolDispatchTable::new());
    let job_id = manager.create_job("anything", two_documents()).expect("create");

    let err = manager.start_job(&job_id).expect_err("no plan");
    assert!(matches!(err, OrchestratorError::PlanningFailure { .. }));
    let manifest = manager.get_job(&job_id).expect("get");
    assert_eq!(manifest.status, JobStatus::Failed);
    assert!(manifest.plan.is_none());
}

#[test]
fn job_manager_cancel_stops_at_next_step_boundary() {
    let temp = tempdir().expect("tempdir");
    let (started_tx, started_rx) = channel();
    let (release_tx, release_rx) = channel();
    let planner = Arc::new(ScriptedPlanner::returning(json!({
        "plan": {"summary": "slow", "steps": [{"tool": "SLOW"}, {"tool": "SLOW"}]}
    })));
    let tools = ToolDispatchTable::new().with_tool(GatedTool {
        started: Mutex::new(started_tx),
        release: Mutex::new(release_rx),
    });
    let manager = Arc::new(manager(temp.path(), planner, tools));
    let job_id = manager.create_job("slow work", two_documents()).expect("create");

    let handle = manager.spawn_job(&job_id).expect("spawn");
    let step_index = started_rx
        .recv_timeout(Duration::from_secs(10))
        .expect("first step started");
    assert_eq!(step_index, 0);
    assert_eq!(
        manager.get_job(&job_id).expect("get").status,
        JobStatus::Running
    );

    let cancelled = manager.cancel_job(&job_id).expect("cancel");
    assert_eq!(cancelled.status, JobStatus::Cancelled);
    release_tx.send(()).expect("release first step");

    let manifest = handle.join().expect("join").expect("execution result");
    assert_eq!(manifest.status, JobStatus::Cancelled);
    assert_eq!(manifest.steps.len(), 1);
    assert_eq!(manifest.steps[0].status, StepStatus::Completed);
    assert!(started_rx.try_recv().is_err());

    let err = manager.cancel_job(&job_id).expect_err("already cancelled");
    assert!(matches!(err, OrchestratorError::InvalidState { .. }));
}

#[test]
fn job_manager_rejects_start_of_non_pending_job_without_writing() {
    let temp = tempdir().expect("tempdir");
    let planner = Arc::new(ScriptedPlanner::returning(json!({"plan": {"steps": []}})));
    let manager = manager(temp.path(), planner, ToolDispatchTable::new());
    let job_id = manager.create_job("nothing", two_documents()).expect("create");

    let finished = manager.start_job(&job_id).expect("first start");
    assert_eq!(finished.status, JobStatus::Completed);
    assert!(finished.steps.is_empty());

    let path = manager.store().manifest_path(&job_id);
    let before = fs::read(&path).expect("read before");
    let err = manager.start_job(&job_id).expect_err("second start");
    match err {
        OrchestratorError::InvalidState { status, .. } => assert_eq!(status, JobStatus::Completed),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fs::read(&path).expect("read after"), before);
}

#[test]
fn job_manager_cancelled_pending_job_cannot_start() {
    let temp = tempdir().expect("tempdir");
    let planner = Arc::new(ScriptedPlanner::returning(json!({"plan": {"steps": []}})));
    let manager = manager(temp.path(), Arc::clone(&planner), ToolDispatchTable::new());
    let job_id = manager.create_job("never", two_documents()).expect("create");

    manager.cancel_job(&job_id).expect("cancel pending");
    assert!(!manager.is_active(&job_id));
    let err = manager.start_job(&job_id).expect_err("start cancelled");
    assert!(matches!(err, OrchestratorError::InvalidState { .. }));
    assert!(planner.seen.lock().expect("seen lock").is_empty());
}

#[test]
fn job_manager_reports_unknown_jobs_as_not_found() {
    let temp = tempdir().expect("tempdir");
    let planner = Arc::new(ScriptedPlanner::returning(json!({"plan": {}})));
    let manager = manager(temp.path(), planner, ToolDispatchTable::new());

    for job_id in ["20260101-000000-000000", "a b", "../escape", ""] {
        for result in [
            manager.start_job(job_id),
            manager.cancel_job(job_id),
            manager.get_job(job_id),
        ] {
            assert!(matches!(result, Err(OrchestratorError::NotFound { .. })));
        }
    }
}

#[test]
fn job_manager_sees_jobs_created_by_another_manager() {
    let temp = tempdir().expect("tempdir");
    let planner = Arc::new(ScriptedPlanner::returning(json!({"plan": {"steps": []}})));
    let first = manager(temp.path(), Arc::clone(&planner), ToolDispatchTable::new());
    let job_id = first.create_job("shared", two_documents()).expect("create");

    let second = manager(temp.path(), planner, ToolDispatchTable::new());
    assert!(!second.is_active(&job_id));
    let manifest = second.start_job(&job_id).expect("start from store");
    assert_eq!(manifest.status, JobStatus::Completed);
    assert_eq!(second.list_jobs().expect("list").len(), 1);
}
