mod run;
mod settings;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use dtoforge_core::{Error as CoreError, load_manifest_file, manifest_json_schema};
use dtoforge_generate::{BuildSession, GenerateOptions, GenerationEngine, GenerationError};
use run::{RunContext, init_logging, start_run, write_instances, write_report};
use settings::Settings;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("run error: {0}")]
    Run(#[from] run::RunError),
    #[error("settings error: {0}")]
    Settings(#[from] settings::SettingsError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("{0}")]
    Generation(#[from] GenerationError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "dtoforge", version, about = "Rule-driven DTO instance generator")]
struct Cli {
    /// Emit console logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate instances of a root type into a new run directory.
    Generate(GenerateArgs),
    /// Compile the composition for a root type and print its report.
    Check(TargetArgs),
    /// Print the JSON Schema of the type manifest.
    Schema(SchemaArgs),
}

#[derive(Args, Debug)]
struct TargetArgs {
    /// Type manifest (JSON).
    #[arg(long)]
    manifest: PathBuf,
    /// Root type to generate.
    #[arg(long = "type", value_name = "TYPE")]
    root_type: String,
    /// Settings file (TOML).
    #[arg(long)]
    settings: Option<PathBuf>,
    /// Rule group(s) to include, in addition to the settings file's.
    #[arg(long, value_name = "GROUP")]
    group: Vec<String>,
    /// Generate fields without rules from their declared type.
    #[arg(long, default_value_t = false)]
    generate_all: bool,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    target: TargetArgs,
    /// Number of instances.
    #[arg(long)]
    count: Option<usize>,
    /// Base seed for a reproducible run.
    #[arg(long)]
    seed: Option<u64>,
    /// Keep generating after field failures and report them together.
    #[arg(long, default_value_t = false)]
    collect_errors: bool,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// Optional extra output path for instances.json.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Write the schema here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args, cli.json_logs),
        Command::Check(args) => run_check(args, cli.json_logs),
        Command::Schema(args) => run_schema(args),
    }
}

/// Options from the settings file, overridden by command-line flags.
fn resolve_options(settings: &Settings, target: &TargetArgs) -> GenerateOptions {
    let mut options = settings.options.clone().unwrap_or_default();
    if target.generate_all {
        options.generate_all_known_types = true;
    }
    options
}

fn load_settings(target: &TargetArgs) -> Result<Settings, CliError> {
    Ok(match &target.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    })
}

fn prepare_session(
    target: &TargetArgs,
    settings: &Settings,
    options: GenerateOptions,
) -> Result<BuildSession, CliError> {
    let registry = load_manifest_file(&target.manifest)?;
    tracing::info!(
        event = "manifest_loaded",
        path = %target.manifest.display(),
        types = registry.type_names().count()
    );
    let mut session = BuildSession::new(registry).with_options(options);
    settings.apply_global()?;
    settings.apply(&mut session, &target.root_type)?;
    if !target.group.is_empty() {
        session.include_groups(target.group.iter().cloned());
    }
    Ok(session)
}

fn log_structural(err: &GenerationError) {
    if let GenerationError::Structural(report) = err {
        for issue in &report.errors {
            tracing::error!(
                event = "structural_issue",
                code = %issue.code,
                path = %issue.path,
                message = %issue.message
            );
        }
    }
}

fn run_generate(args: GenerateArgs, json_logs: bool) -> Result<(), CliError> {
    let settings = load_settings(&args.target)?;
    let mut options = resolve_options(&settings, &args.target);
    if let Some(count) = args.count {
        options.count = count;
    }
    if args.seed.is_some() {
        options.seed = args.seed;
    }
    if args.collect_errors {
        options.collect_field_errors = true;
    }

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        run_dir: args.run_dir.clone(),
        manifest: args.target.manifest.clone(),
        root_type: args.target.root_type.clone(),
        settings: args.target.settings.clone(),
        options: options.clone(),
    };
    let run_paths = start_run(&run_ctx)?;
    init_logging(json_logs, Some(&run_paths.logs_path))?;

    tracing::info!(event = "run_started", run_id = %run_id, root_type = %args.target.root_type);
    let timer = Instant::now();

    let mut session = prepare_session(&args.target, &settings, options.clone())?;
    let result = GenerationEngine::new(options)
        .run(&mut session, &args.target.root_type)
        .inspect_err(log_structural)?;

    write_instances(&run_paths, &result.instances, args.out.as_deref())?;
    tracing::info!(event = "instances_written", path = %run_paths.instances_path.display());
    write_report(&run_paths, &result.report)?;
    tracing::info!(event = "report_written", path = %run_paths.report_path.display());

    for failure in &result.report.failures {
        tracing::warn!(event = "field_failure", path = %failure.path, message = %failure.message);
    }

    tracing::info!(
        event = "run_finished",
        status = "success",
        instances = result.report.instances_generated,
        duration_ms = timer.elapsed().as_millis() as u64
    );
    println!("{}", run_paths.root.display());

    Ok(())
}

fn run_check(args: TargetArgs, json_logs: bool) -> Result<(), CliError> {
    init_logging(json_logs, None)?;
    let settings = load_settings(&args)?;
    let options = resolve_options(&settings, &args);
    let mut session = prepare_session(&args, &settings, options)?;
    let (_, report) = session
        .compile_with_report(&args.root_type)
        .inspect_err(log_structural)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_schema(args: SchemaArgs) -> Result<(), CliError> {
    let schema = serde_json::to_string_pretty(&manifest_json_schema())?;
    match args.out {
        Some(path) => std::fs::write(path, schema)?,
        None => println!("{schema}"),
    }
    Ok(())
}
