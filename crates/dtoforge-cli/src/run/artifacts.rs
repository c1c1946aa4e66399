use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use dtoforge_core::Record;
use dtoforge_generate::{GenerateOptions, GenerationReport};

use super::{RunError, RunResult};

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub run_dir: PathBuf,
    pub manifest: PathBuf,
    pub root_type: String,
    pub settings: Option<PathBuf>,
    pub options: GenerateOptions,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub manifest: String,
    pub root_type: String,
    pub settings: Option<String>,
    pub options: GenerateOptions,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub instances_path: PathBuf,
    pub report_path: PathBuf,
    pub logs_path: PathBuf,
}

pub fn start_run(ctx: &RunContext) -> RunResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx
        .run_dir
        .join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let config_path = root.join("config.json");
    let logs_path = root.join("logs.ndjson");

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        manifest: ctx.manifest.display().to_string(),
        root_type: ctx.root_type.clone(),
        settings: ctx.settings.as_ref().map(|path| path.display().to_string()),
        options: ctx.options.clone(),
        git: collect_git_info(),
    };

    write_json(&config_path, &config)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&logs_path)?;

    Ok(RunPaths {
        instances_path: root.join("instances.json"),
        report_path: root.join("report.json"),
        logs_path,
        root,
    })
}

/// Write generated instances as a JSON array, also to `out_path` if given.
pub fn write_instances(
    paths: &RunPaths,
    instances: &[Record],
    out_path: Option<&Path>,
) -> RunResult<()> {
    let document: Vec<JsonValue> = instances.iter().map(Record::to_json).collect();
    write_json(&paths.instances_path, &document)?;

    if let Some(out_path) = out_path {
        if let Some(parent) = out_path.parent()
            && !parent.as_os_str().is_empty()
        {
            create_dir_all(parent)?;
        }
        write_json(out_path, &document)?;
    }

    Ok(())
}

pub fn write_report(paths: &RunPaths, report: &GenerationReport) -> RunResult<()> {
    write_json(&paths.report_path, report)
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> RunResult<()> {
    let file = OpenOptions::new().create(true).truncate(true).write(true).open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RunError::from)
}
