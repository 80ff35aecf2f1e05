use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::Job;
use crate::model::{ObjectFile, ParseWarning, StructureRecord};
use crate::services::classify::{classify_records, ClassificationResult, Mode};
use crate::services::parser::{attach_hints, parse_layout, parse_packable, ParsedLayout};
use crate::services::report::AnalysisReport;

/// Raw text captured from the layout tool for one object file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub object: ObjectFile,
    /// Full layout dump.
    pub layout: String,
    /// Packable listing; only requested in lazy mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packable: Option<String>,
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Object file not found at {0}")]
    MissingObject(PathBuf),
    #[error("Failed to run `{tool}`: {message}")]
    ToolUnavailable { tool: String, message: String },
    #[error("`{tool}` exited with {status} for {object}: {stderr}")]
    ToolFailed { tool: String, object: PathBuf, status: String, stderr: String },
    #[error("`{tool}` produced no output for {object}")]
    EmptyOutput { tool: String, object: PathBuf },
    #[error("No structure layouts could be parsed from the output for {0}")]
    Unparseable(PathBuf),
}

/// Trait implemented by structure-layout tools (e.g., pahole).
pub trait LayoutTool: Send + Sync {
    /// Verify the tool can be executed and return its version string.
    fn version(&self) -> Result<String, AnalysisError>;
    fn analyze(&self, object: &ObjectFile, mode: Mode) -> Result<ToolOutput, AnalysisError>;
    fn name(&self) -> &'static str;
}

/// An object the tool could not analyze; the batch continues without it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFailure {
    pub object: ObjectFile,
    pub message: String,
}

/// Everything learned from one object file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectAnalysis {
    pub object: ObjectFile,
    pub results: Vec<ClassificationResult>,
    pub warnings: Vec<ParseWarning>,
}

impl ObjectAnalysis {
    pub fn packable_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_packable()).count()
    }
}

/// Keep the first record for each `(name, object)` identity.
pub fn dedupe_records(records: Vec<StructureRecord>) -> Vec<StructureRecord> {
    let mut kept: Vec<StructureRecord> = Vec::with_capacity(records.len());
    for record in records {
        if kept.iter().any(|k| k.identity() == record.identity()) {
            debug!(
                structure = %record.name,
                object = %record.source_object,
                "dropping duplicate block"
            );
            continue;
        }
        kept.push(record);
    }
    kept
}

/// Drives invoke → parse → filter → classify over a batch of objects.
pub struct Runner<'a> {
    pub job: &'a Job,
    pub tool: &'a dyn LayoutTool,
    pub mode: Mode,
}

impl<'a> Runner<'a> {
    /// Process one object file.
    pub fn process(&self, object: &ObjectFile) -> Result<ObjectAnalysis, AnalysisError> {
        let output = self.tool.analyze(object, self.mode)?;
        let ParsedLayout { mut records, warnings } = parse_layout(object, &output.layout);
        if records.is_empty() {
            return Err(AnalysisError::Unparseable(object.path.clone()));
        }
        if let Some(listing) = &output.packable {
            attach_hints(&mut records, &parse_packable(listing));
        }

        let records = dedupe_records(records);
        let warnings =
            warnings.into_iter().filter(|w| !self.job.ignore.is_ignored(&w.structure)).collect();
        let results = classify_records(records, &self.job.ignore, self.mode);
        Ok(ObjectAnalysis { object: object.clone(), results, warnings })
    }

    /// Process every object in order. One object's failure never aborts the batch.
    pub fn run(&self, objects: &[ObjectFile]) -> AnalysisReport {
        let mut report = AnalysisReport::new(self.job.name.clone(), self.mode);
        for object in objects {
            match self.process(object) {
                Ok(analysis) => {
                    let packable = analysis.packable_count();
                    if packable > 0 {
                        error!(packable, " # {object}");
                    } else {
                        info!("   {object}");
                    }
                    report.record(analysis);
                }
                Err(err) => {
                    warn!(object = %object, "analysis failed: {err}");
                    report.record_failure(object.clone(), &err);
                }
            }
        }
        report
    }
}
