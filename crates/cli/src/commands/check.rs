use std::path::PathBuf;

use anyhow::{Context, Result};
use pahole_core::config::Job;
use pahole_core::services::analysis::{LayoutTool, ObjectFailure, Runner};
use pahole_core::services::backends::Pahole;
use pahole_core::services::classify::Mode;
use pahole_core::services::enumerate::enumerate_objects;
use pahole_core::services::report::{write_reports, ReportFiles};
use tracing::{debug, error, info};

use crate::validate_config_path;

/// Inputs for one check run.
#[derive(Debug, Clone)]
pub struct CheckOptions {
    pub config: PathBuf,
    pub lazy: bool,
    /// Explicit pahole executable; falls back to `PAHOLE_BIN`, then PATH.
    pub pahole: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl CheckOptions {
    pub fn new(config: impl Into<PathBuf>) -> Self {
        Self { config: config.into(), lazy: false, pahole: None, output_dir: PathBuf::from(".") }
    }
}

/// How a completed run should be reported to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Clean,
    /// Structures that should be re-packed were found.
    ProblemsFound,
    /// At least one object file could not be analyzed.
    ExecutionFailed,
}

impl CheckStatus {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Clean => 0,
            Self::ProblemsFound => 1,
            Self::ExecutionFailed => 2,
        }
    }
}

/// Outcome of a check run.
#[derive(Debug, Clone)]
pub struct CheckSummary {
    pub objects: usize,
    pub structures: usize,
    pub packable: usize,
    pub packable_names: Vec<String>,
    pub failures: Vec<ObjectFailure>,
    pub warnings: usize,
    pub report_files: Option<ReportFiles>,
}

impl CheckSummary {
    pub fn status(&self) -> CheckStatus {
        if !self.failures.is_empty() {
            CheckStatus::ExecutionFailed
        } else if self.packable > 0 {
            CheckStatus::ProblemsFound
        } else {
            CheckStatus::Clean
        }
    }
}

/// Run pahole over every configured object file and write the dumps.
pub fn check_command(options: &CheckOptions) -> Result<CheckSummary> {
    let tool = Pahole::resolve(options.pahole.clone());
    check_with_tool(options, &tool)
}

/// Same as [`check_command`], with the layout tool supplied by the caller.
pub fn check_with_tool(options: &CheckOptions, tool: &dyn LayoutTool) -> Result<CheckSummary> {
    let config_path = validate_config_path(&options.config)?;
    let job = Job::load(&config_path)
        .with_context(|| format!("Invalid configuration '{}'", config_path.display()))?;
    debug!(groups = job.groups.len(), ignore = job.ignore.len(), "loaded configuration");

    let version = tool
        .version()
        .with_context(|| format!("Failed to run `{} --version`", tool.name()))?;
    info!("using {version}");

    let objects = enumerate_objects(&job).context("Failed to resolve object files")?;
    let mode = Mode::from_lazy(options.lazy);
    info!("checking {} object file(s) ({} mode)", objects.len(), mode.as_str());

    let runner = Runner { job: &job, tool, mode };
    let report = runner.run(&objects);
    let report_files =
        write_reports(&report, &options.output_dir).context("Failed to write reports")?;

    let summary = CheckSummary {
        objects: report.objects_processed,
        structures: report.all.len(),
        packable: report.packable_count(),
        packable_names: report.packable_names(),
        failures: report.failures.clone(),
        warnings: report.warnings.len(),
        report_files,
    };
    log_summary(&summary)?;
    Ok(summary)
}

fn log_summary(summary: &CheckSummary) -> Result<()> {
    info!(
        "{} structure(s) in {} object file(s), {} parse warning(s)",
        summary.structures, summary.objects, summary.warnings
    );
    if let Some(files) = &summary.report_files {
        error!(
            "The following elements should be re-packed (check {})\n{}",
            files.packable.display(),
            serde_json::to_string_pretty(&summary.packable_names)?
        );
    }
    if !summary.failures.is_empty() {
        error!("execution failed for {} object file(s):", summary.failures.len());
        for failure in &summary.failures {
            error!("    |_ {}: {}", failure.object, failure.message);
        }
    }
    if summary.status() == CheckStatus::Clean {
        info!(":) success");
    }
    Ok(())
}
