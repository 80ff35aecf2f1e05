use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use crate::model::ObjectFile;
use crate::services::analysis::{AnalysisError, LayoutTool, ToolOutput};
use crate::services::classify::Mode;

/// Arguments for the full layout dump, including anonymous aggregates.
const LAYOUT_ARGS: [&str; 2] = ["-a", "-A"];
/// Arguments for the listing of aggregates that shrink when reordered.
const PACKABLE_ARGS: [&str; 3] = ["-a", "-A", "--packable"];

/// `pahole`-backed layout tool that shells out once or twice per object.
#[derive(Debug, Clone)]
pub struct Pahole {
    pub path: PathBuf,
}

impl Pahole {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use an explicit path if given, else `PAHOLE_BIN`, else `pahole` on PATH.
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        Self::new(explicit.unwrap_or_else(resolve_pahole_path))
    }

    fn tool_name(&self) -> String {
        self.path.display().to_string()
    }

    fn run(&self, args: &[&str], object: &Path) -> Result<String, AnalysisError> {
        debug!("running {} {} {}", self.path.display(), args.join(" "), object.display());
        let output = Command::new(&self.path).args(args).arg(object).output().map_err(|e| {
            AnalysisError::ToolUnavailable { tool: self.tool_name(), message: e.to_string() }
        })?;
        if !output.status.success() {
            return Err(AnalysisError::ToolFailed {
                tool: self.tool_name(),
                object: object.to_path_buf(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

impl Default for Pahole {
    fn default() -> Self {
        Self::resolve(None)
    }
}

impl LayoutTool for Pahole {
    fn version(&self) -> Result<String, AnalysisError> {
        let output = Command::new(&self.path).arg("--version").output().map_err(|e| {
            AnalysisError::ToolUnavailable {
                tool: self.tool_name(),
                message: format!("{e}; make sure `pahole` is in your PATH"),
            }
        })?;
        if !output.status.success() {
            return Err(AnalysisError::ToolUnavailable {
                tool: self.tool_name(),
                message: format!("--version exited with {}", output.status),
            });
        }
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            Err(AnalysisError::ToolUnavailable {
                tool: self.tool_name(),
                message: "--version produced no output".to_string(),
            })
        } else {
            Ok(stdout)
        }
    }

    fn analyze(&self, object: &ObjectFile, mode: Mode) -> Result<ToolOutput, AnalysisError> {
        if !object.path.is_file() {
            return Err(AnalysisError::MissingObject(object.path.clone()));
        }

        let packable = match mode {
            Mode::Lazy => Some(self.run(&PACKABLE_ARGS, &object.path)?),
            Mode::Strict => None,
        };
        let layout = self.run(&LAYOUT_ARGS, &object.path)?;
        if layout.trim().is_empty() {
            return Err(AnalysisError::EmptyOutput {
                tool: self.tool_name(),
                object: object.path.clone(),
            });
        }

        Ok(ToolOutput { object: object.clone(), layout, packable })
    }

    fn name(&self) -> &'static str {
        "pahole"
    }
}

fn resolve_pahole_path() -> PathBuf {
    std::env::var_os("PAHOLE_BIN").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("pahole"))
}
