use crate::config::{default_global_config_path, load_settings, Settings};
use crate::inventory::InventoryScanner;
use crate::orchestration::{JobManager, Manifest, ManifestStore};
use crate::planner::OllamaPlanner;
use crate::shared::logging::init_tracing;
use crate::tools::dispatch_table_from_settings;
use std::path::PathBuf;
use std::sync::Arc;

pub fn help_text() -> String {
    [
        "usage: jobsmith [--config <path>] <command>",
        "",
        "Commands:",
        "  inventory                 scan inputs/ and print file counts",
        "  job create <intent>       create a pending job from the current inputs",
        "  job start <job_id>        run a pending job to completion",
        "  job run <intent>          create and run a job",
        "  job show <job_id>         print the job manifest",
        "  job cancel <job_id>       cancel a pending or running job",
        "  job list                  list known jobs",
    ]
    .join("\n")
}

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    let (config_path, args) = split_global_options(args)?;
    if args.is_empty() || matches!(args[0].as_str(), "help" | "--help" | "-h") {
        return Ok(help_text());
    }

    let config_path = match config_path {
        Some(path) => path,
        None => default_global_config_path().map_err(|e| e.to_string())?,
    };
    let settings = load_settings(&config_path).map_err(|e| e.to_string())?;
    init_tracing(&settings.logging.level, settings.logging.format);

    match args[0].as_str() {
        "inventory" => cmd_inventory(&settings, &args[1..]),
        "job" => cmd_job(&settings, &args[1..]),
        other => Err(format!("unknown command `{other}`")),
    }
}

fn split_global_options(args: Vec<String>) -> Result<(Option<PathBuf>, Vec<String>), String> {
    let mut config_path = None;
    let mut rest = Vec::with_capacity(args.len());
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if rest.is_empty() && arg == "--config" {
            let value = iter
                .next()
                .ok_or_else(|| "usage: --config <path>".to_string())?;
            config_path = Some(PathBuf::from(value));
            continue;
        }
        rest.push(arg);
    }
    Ok((config_path, rest))
}

fn cmd_inventory(settings: &Settings, args: &[String]) -> Result<String, String> {
    if !args.is_empty() {
        return Err("usage: inventory".to_string());
    }
    let snapshot = scanner(settings).scan().map_err(|e| e.to_string())?;
    let mut lines = vec![
        "inventory scanned".to_string(),
        format!("total_files={}", snapshot.total_files),
        format!("total_size_bytes={}", snapshot.total_size_bytes),
    ];
    for (kind, count) in &snapshot.type_counts {
        lines.push(format!("{kind}={count}"));
    }
    Ok(lines.join("\n"))
}

fn cmd_job(settings: &Settings, args: &[String]) -> Result<String, String> {
    if args.is_empty() {
        return Err("usage: job <create|start|run|show|cancel|list> ...".to_string());
    }

    match args[0].as_str() {
        "create" => {
            let intent = intent_arg(&args[1..], "usage: job create <intent>")?;
            let manager = job_manager(settings);
            let job_id = create_job(settings, &manager, &intent)?;
            Ok(format!("job created\njob_id={job_id}"))
        }
        "start" => {
            if args.len() != 2 {
                return Err("usage: job start <job_id>".to_string());
            }
            let manager = job_manager(settings);
            let manifest = manager.start_job(&args[1]).map_err(|e| e.to_string())?;
            Ok(format_job_summary(&manifest))
        }
        "run" => {
            let intent = intent_arg(&args[1..], "usage: job run <intent>")?;
            let manager = job_manager(settings);
            let job_id = create_job(settings, &manager, &intent)?;
            let manifest = manager.start_job(&job_id).map_err(|e| e.to_string())?;
            Ok(format_job_summary(&manifest))
        }
        "show" => {
            if args.len() != 2 {
                return Err("usage: job show <job_id>".to_string());
            }
            let manifest = job_manager(settings)
                .get_job(&args[1])
                .map_err(|e| e.to_string())?;
            serde_json::to_string_pretty(&manifest)
                .map_err(|e| format!("failed to encode manifest: {e}"))
        }
        "cancel" => {
            if args.len() != 2 {
                return Err("usage: job cancel <job_id>".to_string());
            }
            let manifest = job_manager(settings)
                .cancel_job(&args[1])
                .map_err(|e| e.to_string())?;
            Ok(format!(
                "job cancelled\njob_id={}\nstatus={}",
                manifest.job_id, manifest.status
            ))
        }
        "list" => {
            if args.len() != 1 {
                return Err("usage: job list".to_string());
            }
            let manifests = job_manager(settings)
                .list_jobs()
                .map_err(|e| e.to_string())?;
            if manifests.is_empty() {
                return Ok("no jobs".to_string());
            }
            Ok(manifests
                .iter()
                .map(|m| format!("{}\t{}\t{}", m.job_id, m.status, m.intent))
                .collect::<Vec<_>>()
                .join("\n"))
        }
        other => Err(format!("unknown job command `{other}`")),
    }
}

fn intent_arg(args: &[String], usage: &str) -> Result<String, String> {
    let intent = args.join(" ");
    if intent.trim().is_empty() {
        return Err(usage.to_string());
    }
    Ok(intent.trim().to_string())
}

fn scanner(settings: &Settings) -> InventoryScanner {
    InventoryScanner::new(settings.inputs_dir(), settings.runtime_dir())
}

fn job_manager(settings: &Settings) -> JobManager {
    JobManager::new(
        Arc::new(ManifestStore::new(settings.outputs_dir())),
        Arc::new(OllamaPlanner::new(&settings.planner)),
        dispatch_table_from_settings(&settings.tools),
    )
}

fn create_job(settings: &Settings, manager: &JobManager, intent: &str) -> Result<String, String> {
    let snapshot = scanner(settings).scan().map_err(|e| e.to_string())?;
    manager
        .create_job(intent, snapshot.summary())
        .map_err(|e| e.to_string())
}

pub fn format_job_summary(manifest: &Manifest) -> String {
    let mut lines = vec![
        format!("job_id={}", manifest.job_id),
        format!("status={}", manifest.status),
        format!("steps={}", manifest.steps.len()),
        format!("failed_steps={}", manifest.failed_steps()),
    ];
    for (category, paths) in &manifest.outputs {
        if !paths.is_empty() {
            lines.push(format!("outputs.{category}={}", paths.join(",")));
        }
    }
    for error in &manifest.errors {
        lines.push(format!("error={error}"));
    }
    lines.join("\n")
}
