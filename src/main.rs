use anyhow::{Context, Result};
use ci_runner::cli::commands::{HistoryCommand, PlanCommand, RunCommand, ValidateCommand};
use ci_runner::cli::output::*;
use ci_runner::cli::{Cli, Command};
use ci_runner::core::config::WorkflowConfig;
use ci_runner::execution::{ExecutionEvent, WorkflowEngine};
use ci_runner::host::{HostRunner, HostSettings};
use ci_runner::persistence::{InMemoryPersistence, PersistenceBackend, RunSummary};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_workflow(cmd, cli.stream).await?,
        Command::Plan(cmd) => plan_workflow(cmd)?,
        Command::Validate(cmd) => validate_workflow(cmd)?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(
        ci_runner::persistence::SqliteRunStore::with_default_path().await?,
    ))
}

#[cfg(not(feature = "sqlite"))]
async fn open_history() -> Result<Arc<dyn PersistenceBackend>> {
    warn!("Built without the sqlite feature; run history is not kept");
    Ok(Arc::new(InMemoryPersistence::new()))
}

async fn run_workflow(cmd: &RunCommand, stream: bool) -> Result<()> {
    let workflow = cmd.event.load_workflow()?;
    let mut settings = HostSettings::new()
        .with_repository(cmd.repository.clone())
        .keep_workspaces(cmd.keep_workspaces);
    if let Some(root) = &cmd.workspace {
        settings = settings.with_workspace_root(root.clone());
    }
    let runner = HostRunner::new(settings);

    let mut event = cmd.event.to_event(runner.settings().repository.as_deref());
    if event.sha.is_none() {
        event.sha = runner.head_revision().await;
        match &event.sha {
            Some(sha) => info!("Using {} at {}", cmd.repository, sha),
            None => warn!("Could not resolve HEAD of {}; running without a revision", cmd.repository),
        }
    }

    let mut engine = WorkflowEngine::new(runner);
    if let Some(minutes) = cmd.timeout_minutes {
        engine = engine.with_timeout_override(Duration::from_secs(minutes * 60));
    }

    let Some(plan) = engine.plan(&workflow, &event) else {
        println!(
            "{} {} on '{}' does not trigger {}; nothing to run",
            INFO,
            event.kind,
            event.branch,
            style(&workflow.name).bold()
        );
        return Ok(());
    };

    // Set up persistence
    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        open_history().await?
    };

    let progress = create_progress_bar(plan.instances.len());
    let bar = progress.clone();
    engine.add_event_handler(move |event| {
        match &event {
            ExecutionEvent::StepOutput { .. } if !stream => return,
            ExecutionEvent::StepOutput { output, .. } => {
                bar.println(format_execution_event(&event));
                bar.println(format_output(output, 20));
                return;
            }
            ExecutionEvent::InstanceFinished { .. } => bar.inc(1),
            ExecutionEvent::StepStarted { instance, step, .. } => {
                bar.set_message(format!("{}: {}", instance, step));
            }
            _ => {}
        }
        bar.println(format_execution_event(&event));
    });

    let handle = engine.start_plan(&workflow, plan);

    let interrupt = handle.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            interrupt.cancel();
        }
    });

    let report = handle.wait().await?;
    progress.finish_and_clear();

    let summary = RunSummary::from_report(&report);
    store.save_run(&summary).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n{}", format_run_report(&report));
        if !cmd.no_history {
            println!(
                "\n{} Run saved to history (ID: {})",
                INFO,
                style(&summary.run_id.to_string()[..8]).dim()
            );
        }
    }

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}

fn plan_workflow(cmd: &PlanCommand) -> Result<()> {
    let workflow = cmd.event.load_workflow()?;
    let event = cmd.event.to_event(None);
    let engine = WorkflowEngine::new(HostRunner::new(HostSettings::new()));

    match engine.plan(&workflow, &event) {
        Some(plan) if cmd.json => println!("{}", serde_json::to_string_pretty(&plan)?),
        Some(plan) => println!("{}", format_plan(&plan)),
        None if cmd.json => println!("null"),
        None => println!(
            "{} {} on '{}' does not trigger {}",
            INFO,
            event.kind,
            event.branch,
            style(&workflow.name).bold()
        ),
    }

    Ok(())
}

fn validate_workflow(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating workflow...", INFO);

    let result = WorkflowConfig::from_file(&cmd.file).and_then(|config| {
        config.to_workflow()?;
        Ok(config)
    });

    match result {
        Ok(config) => {
            println!("{} Workflow is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            println!("  Jobs: {}", style(config.jobs.len()).cyan());
            for (id, job) in &config.jobs {
                let combinations = job
                    .matrix()?
                    .map(|m| m.combinations().len())
                    .unwrap_or(1);
                println!(
                    "    {} ({} steps, {} instance(s))",
                    style(id).bold(),
                    job.steps.len(),
                    combinations
                );
            }

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    }
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_history().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) if cmd.json => println!("{}", serde_json::to_string_pretty(&summary)?),
            Some(summary) => print_run_details(&summary),
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let runs = match &cmd.workflow {
        Some(workflow) => {
            let mut runs = store.list_runs(workflow).await?;
            runs.truncate(cmd.limit);
            runs
        }
        None => store.recent_runs(cmd.limit).await?,
    };

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary) {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Workflow: {}", style(&summary.workflow).bold());
    println!("  Event: {} on {}", summary.event, style(&summary.branch).cyan());
    if let Some(sha) = &summary.sha {
        println!("  Revision: {}", style(sha).dim());
    }
    if let Some(group) = &summary.group {
        println!("  Concurrency group: {}", style(group).cyan());
    }
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(completed) = summary.completed_at {
        println!("  Completed: {}", style(completed.to_rfc3339()).dim());
        if let Ok(duration) = completed.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Instances: {} total, {} succeeded, {} failed, {} cancelled",
        summary.total_instances,
        style(summary.succeeded_instances).green(),
        style(summary.failed_instances).red(),
        style(summary.cancelled_instances).yellow()
    );
}
