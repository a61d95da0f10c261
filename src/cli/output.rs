//! CLI output formatting

use crate::{
    core::{InstanceReport, InstanceStatus, RunInstance, RunStatus, StepAction, StepState},
    execution::{ExecutionEvent, RunPlan, RunReport},
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static STOP: Emoji<'_, '_> = Emoji("🛑 ", "x ");
pub static CLOCK: Emoji<'_, '_> = Emoji("⏰ ", "t ");

/// Create a progress bar over run instances
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    if let Ok(template) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress.set_style(template.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Terminal width, 80 when it cannot be determined
pub fn terminal_width() -> usize {
    term_size::dimensions_stdout().map(|(w, _)| w).unwrap_or(80)
}

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    match state {
        StepState::Pending => style("PENDING").dim().to_string(),
        StepState::Running { .. } => style("RUNNING").yellow().to_string(),
        StepState::Succeeded { .. } => style("SUCCEEDED").green().to_string(),
        StepState::Failed { .. } => style("FAILED").red().to_string(),
        StepState::TimedOut { .. } => style("TIMED OUT").red().to_string(),
        StepState::Cancelled { .. } => style("CANCELLED").yellow().to_string(),
        StepState::Skipped { .. } => style("SKIPPED").dim().to_string(),
    }
}

/// Format an instance status for display
pub fn format_instance_status(status: InstanceStatus) -> String {
    match status {
        InstanceStatus::Pending => style("PENDING").dim().to_string(),
        InstanceStatus::Running => style("RUNNING").yellow().to_string(),
        InstanceStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        InstanceStatus::Failed => style("FAILED").red().to_string(),
        InstanceStatus::TimedOut => style("TIMED OUT").red().to_string(),
        InstanceStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Pending => style("PENDING").dim().to_string(),
        RunStatus::Running => style("RUNNING").yellow().to_string(),
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

fn instance_icon(status: InstanceStatus) -> &'static Emoji<'static, 'static> {
    match status {
        InstanceStatus::Succeeded => &CHECK,
        InstanceStatus::Failed => &CROSS,
        InstanceStatus::TimedOut => &CLOCK,
        InstanceStatus::Cancelled => &STOP,
        _ => &SPINNER,
    }
}

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Format run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Cancelled => STOP,
        RunStatus::Running => SPINNER,
        RunStatus::Pending => INFO,
    };

    format!(
        "{} {} - {} - {} on {} - {} ({}/{} instances)",
        status_icon,
        style(short_id(&summary.run_id)).dim(),
        style(&summary.workflow).bold(),
        summary.event,
        style(&summary.branch).cyan(),
        format_status(summary.status),
        summary.succeeded_instances,
        summary.total_instances,
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            workflow,
            group,
            instances,
        } => format!(
            "{} Starting {} ({}) with {} instance(s){}",
            ROCKET,
            style(workflow).bold(),
            style(short_id(run_id)).dim(),
            instances,
            group
                .as_ref()
                .map(|g| format!(" in group {}", style(g).cyan()))
                .unwrap_or_default()
        ),
        ExecutionEvent::RunSuperseded {
            run_id,
            superseded_by,
            group,
        } => format!(
            "{} Run {} in group {} cancelled by {}",
            WARN,
            style(short_id(run_id)).dim(),
            style(group).cyan(),
            style(short_id(superseded_by)).dim()
        ),
        ExecutionEvent::InstanceStarted { instance, .. } => {
            format!("{} {}", SPINNER, style(instance).cyan())
        }
        ExecutionEvent::StepStarted {
            instance,
            step,
            index,
            total,
            ..
        } => format!(
            "  [{}] [{}/{}] {}",
            style(instance).dim(),
            index + 1,
            total,
            step
        ),
        ExecutionEvent::StepOutput {
            instance, step, output, ..
        } => format!(
            "{} Output from {} / {}:\n{}",
            INFO,
            style(instance).dim(),
            style(step).dim(),
            output
        ),
        ExecutionEvent::StepFinished {
            instance,
            step,
            state,
            ..
        } => match state {
            StepState::Failed { error, .. } => format!(
                "  [{}] {} {}: {}",
                style(instance).dim(),
                CROSS,
                style(step).red(),
                style(error).dim()
            ),
            other => format!(
                "  [{}] {} {}",
                style(instance).dim(),
                step,
                format_step_state(other)
            ),
        },
        ExecutionEvent::InstanceFinished {
            instance, status, ..
        } => format!(
            "{} {} {}",
            instance_icon(*status),
            style(instance).bold(),
            format_instance_status(*status)
        ),
        ExecutionEvent::RunCompleted { run_id, status } => format!(
            "{} Run ({}) {}",
            INFO,
            style(short_id(run_id)).dim(),
            format_status(*status)
        ),
    }
}

/// One line per instance, with the failing step when there is one
pub fn format_instance_report(report: &InstanceReport) -> String {
    let mut line = format!(
        "{} {} {}",
        instance_icon(report.status),
        style(&report.label).bold(),
        format_instance_status(report.status)
    );
    if let Some(duration) = report.duration() {
        line.push_str(&format!(" {}", style(format_duration(duration)).dim()));
    }

    let failing = report.steps.iter().find(|s| {
        matches!(
            s.state,
            StepState::Failed { .. } | StepState::TimedOut { .. } | StepState::Cancelled { .. }
        )
    });
    match (failing, &report.error) {
        (Some(step), _) => {
            let detail = match &step.state {
                StepState::Failed { error, .. } => error.clone(),
                other => format_step_state(other),
            };
            line.push_str(&format!("\n    at '{}': {}", step.name, style(detail).dim()));
        }
        (None, Some(error)) => line.push_str(&format!("\n    {}", style(error).dim())),
        _ => {}
    }
    line
}

/// Multi-line report of a finished run
pub fn format_run_report(report: &RunReport) -> String {
    let mut lines = vec![format!(
        "{} {} ({}) {} in {}",
        if report.is_success() { CHECK } else { CROSS },
        style(&report.workflow).bold(),
        style(short_id(&report.run_id)).dim(),
        format_status(report.status),
        format_duration(report.duration())
    )];
    for instance in &report.instances {
        lines.push(format!("  {}", format_instance_report(instance)));
    }
    lines.join("\n")
}

fn format_action(action: &StepAction) -> String {
    match action {
        StepAction::Run { script } => script.lines().next().unwrap_or_default().to_string(),
        StepAction::Checkout { reference } => format!("uses {}", reference),
    }
}

/// Planned instance with its steps
pub fn format_planned_instance(instance: &RunInstance) -> String {
    let mut lines = vec![format!(
        "  {} on {} (timeout {})",
        style(&instance.label).bold(),
        style(&instance.runs_on).cyan(),
        format_duration(instance.timeout)
    )];
    for step in &instance.steps {
        lines.push(format!(
            "    {}. {} {}",
            step.index + 1,
            step.name,
            style(format_action(&step.action)).dim()
        ));
    }
    lines.join("\n")
}

/// Plan of a triggering event
pub fn format_plan(plan: &RunPlan) -> String {
    let mut lines = vec![
        format!(
            "{} {} on '{}' triggers {}",
            CHECK,
            plan.event.kind,
            plan.event.branch,
            style(&plan.workflow).bold()
        ),
        format!(
            "  Concurrency group: {}",
            plan.group
                .as_deref()
                .map(|g| style(g).cyan().to_string())
                .unwrap_or_else(|| style("none").dim().to_string())
        ),
        format!("  Instances: {}", style(plan.instances.len()).cyan()),
    ];
    for instance in &plan.instances {
        lines.push(format_planned_instance(instance));
    }
    lines.join("\n")
}

/// Format step output with truncation
///
/// Keeps at most `max_lines` lines and cuts each to the terminal width.
pub fn format_output(output: &str, max_lines: usize) -> String {
    truncate_output(output, max_lines, terminal_width())
}

fn truncate_output(output: &str, max_lines: usize, width: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();
    let clip = |line: &str| -> String {
        if line.chars().count() > width {
            let mut clipped: String = line.chars().take(width.saturating_sub(1)).collect();
            clipped.push('…');
            clipped
        } else {
            line.to_string()
        }
    };

    let shown: Vec<String> = lines.iter().take(max_lines).map(|l| clip(l)).collect();
    if lines.len() <= max_lines {
        shown.join("\n")
    } else {
        format!(
            "{}\n{}... ({} more lines)",
            shown.join("\n"),
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
