//! Tool variant backed by an external program.
//!
//! The program runs in the job's output dir, receives a [`ToolRequest`] as
//! JSON on stdin and must print `{"outputs": [...]}` on stdout. Only the
//! engine writes the manifest, from that reply.

use crate::config::ToolSettings;
use crate::orchestration::manifest_store::ManifestStore;
use crate::orchestration::tool_dispatch::{Tool, ToolContext, ToolError, ToolOutput};
use crate::orchestration::tool_schema::{builtin_tool_spec, ToolSpec};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::{BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Serialize)]
pub struct ToolRequest<'a> {
    pub job_id: &'a str,
    pub step_index: usize,
    pub params: &'a Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct CommandTool {
    spec: ToolSpec,
    command: String,
    args: Vec<String>,
    category: String,
    timeout: Duration,
}

impl CommandTool {
    pub fn new(
        spec: ToolSpec,
        command: impl Into<String>,
        args: Vec<String>,
        category: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            spec,
            command: command.into(),
            args,
            category: category.into(),
            timeout,
        }
    }

    /// Configured description and params win; otherwise a built-in spec of the
    /// same name fills them in.
    pub fn from_settings(settings: &ToolSettings) -> Self {
        let builtin = builtin_tool_spec(&settings.name);
        let description = settings
            .description
            .clone()
            .or_else(|| builtin.as_ref().map(|spec| spec.description.clone()))
            .unwrap_or_else(|| format!("Runs `{}`", settings.command));
        let params = settings
            .params
            .clone()
            .or_else(|| builtin.map(|spec| spec.params))
            .unwrap_or_default();
        let spec = ToolSpec {
            name: settings.name.clone(),
            description,
            params,
        };
        Self::new(
            spec,
            settings.command.clone(),
            settings.args.clone(),
            settings.category.clone(),
            Duration::from_secs(settings.effective_timeout_seconds()),
        )
    }

    fn check_required_params(&self, params: &Map<String, Value>) -> Result<(), ToolError> {
        for name in self.spec.required_params() {
            if params.get(name).map_or(true, Value::is_null) {
                return Err(ToolError::InvalidParams {
                    param: name.to_string(),
                    reason: "required parameter is missing".to_string(),
                });
            }
        }
        Ok(())
    }

    fn run(&self, manifests: &ManifestStore, request: &ToolRequest<'_>) -> Result<String, ToolError> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| ToolError::Failed(format!("failed to encode tool request: {e}")))?;

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .current_dir(manifests.job_dir(request.job_id))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::Failed(format!("failed to spawn `{}`: {e}", self.command)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::Failed("missing stdout pipe".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ToolError::Failed("missing stderr pipe".to_string()))?;
        let stdout_reader = thread::spawn(move || {
            let mut buf = String::new();
            let _ = BufReader::new(stdout).read_to_string(&mut buf);
            buf
        });
        let stderr_reader = thread::spawn(move || {
            let mut buf = String::new();
            let _ = BufReader::new(stderr).read_to_string(&mut buf);
            buf
        });

        if let Some(mut stdin) = child.stdin.take() {
            // A program that ignores stdin may exit before reading it.
            if let Err(err) = stdin.write_all(&payload) {
                tracing::debug!(tool = %self.spec.name, error = %err, "tool stdin closed early");
            }
        }

        let start = Instant::now();
        let exit_status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() > self.timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        let _ = stdout_reader.join();
                        let _ = stderr_reader.join();
                        return Err(ToolError::Timeout {
                            seconds: self.timeout.as_secs(),
                        });
                    }
                    thread::sleep(Duration::from_millis(10));
                }
                Err(err) => {
                    return Err(ToolError::Failed(format!(
                        "failed to wait for `{}`: {err}",
                        self.command
                    )))
                }
            }
        };

        let stdout = stdout_reader.join().unwrap_or_default();
        let stderr = stderr_reader.join().unwrap_or_default();
        if !exit_status.success() {
            return Err(ToolError::Failed(format!(
                "`{}` exited with status {}: {}",
                self.command,
                exit_status.code().unwrap_or(-1),
                stderr.trim()
            )));
        }
        Ok(stdout)
    }
}

impl Tool for CommandTool {
    fn spec(&self) -> ToolSpec {
        self.spec.clone()
    }

    fn output_category(&self) -> &str {
        &self.category
    }

    fn execute(
        &self,
        context: &ToolContext<'_>,
        params: &Map<String, Value>,
    ) -> Result<ToolOutput, ToolError> {
        self.check_required_params(params)?;
        let request = ToolRequest {
            job_id: context.job_id,
            step_index: context.step_index,
            params,
        };
        tracing::debug!(
            job_id = context.job_id,
            step_index = context.step_index,
            tool = %self.spec.name,
            command = %self.command,
            "running tool command"
        );
        let stdout = self.run(context.manifests, &request)?;
        serde_json::from_str::<ToolOutput>(stdout.trim()).map_err(|e| {
            ToolError::Failed(format!(
                "`{}` printed invalid output: {e}",
                self.command
            ))
        })
    }
}
