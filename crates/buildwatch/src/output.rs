//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one line per job.

use std::io::{self, IsTerminal, Write};

use chrono::DateTime;
use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use buildwatch_core::{Builds, Job};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Build tree ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct JobRow {
    #[tabled(rename = "Build")]
    build: String,
    #[tabled(rename = "Job")]
    job: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Since")]
    since: String,
    #[tabled(rename = "Responsible")]
    responsible: String,
}

impl JobRow {
    fn new(build: &str, job: &Job, color: bool) -> Self {
        let state = job_state(job);
        let state = match (color, state) {
            (false, _) => state.to_owned(),
            (true, "broken") => state.red().bold().to_string(),
            (true, "fixed") => state.green().to_string(),
            (true, _) => state.dimmed().to_string(),
        };
        Self {
            build: build.to_owned(),
            job: job.name.clone(),
            state,
            since: job
                .latest_event()
                .map_or_else(|| "-".into(), |e| format_timestamp(e.timestamp)),
            responsible: job.responsible().into_iter().collect::<Vec<_>>().join(", "),
        }
    }
}

/// `broken`, `fixed`, or `unknown` for a job with no events.
fn job_state(job: &Job) -> &'static str {
    if job.is_broken() {
        "broken"
    } else if job.has_events() {
        "fixed"
    } else {
        "unknown"
    }
}

/// Milliseconds since the epoch as UTC wall-clock time.
pub fn format_timestamp(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms).map_or_else(
        || ms.to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

/// Render the whole build tree in the chosen format.
pub fn render_builds(
    format: OutputFormat,
    builds: &Builds,
    color: bool,
) -> Result<String, CliError> {
    let jobs = builds
        .builds
        .values()
        .flat_map(|b| b.jobs.values().map(move |job| (b.name.as_str(), job)));

    match format {
        OutputFormat::Table => {
            if builds.is_empty() {
                return Ok("No builds tracked.".into());
            }
            let rows: Vec<JobRow> = jobs.map(|(b, job)| JobRow::new(b, job, color)).collect();
            Ok(render_table(&rows))
        }
        OutputFormat::Json => render_json(builds, false),
        OutputFormat::JsonCompact => render_json(builds, true),
        OutputFormat::Yaml => render_yaml(builds),
        OutputFormat::Plain => Ok(jobs
            .map(|(b, job)| format!("{b}/{}\t{}", job.name, job_state(job)))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table and plain rendering use `text_fn`, since single-item views don't
/// use `Tabled` derive.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    text_fn: impl Fn(&T) -> Result<String, CliError>,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table | OutputFormat::Plain => text_fn(data),
        OutputFormat::Json => render_json(data, false),
        OutputFormat::JsonCompact => render_json(data, true),
        OutputFormat::Yaml => render_yaml(data),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_json<T: serde::Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(rendered)
}

fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_yaml::to_string(data)?)
}
