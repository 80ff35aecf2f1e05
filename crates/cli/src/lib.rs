use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

pub mod commands;

/// Accepted configuration file extensions.
const CONFIG_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// Check that `path` names an existing configuration file with a supported extension.
pub fn validate_config_path(path: &Path) -> Result<PathBuf> {
    if !path.is_file() {
        return Err(anyhow!("'{}' not found / not a file", path.display()));
    }
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_lowercase();
    if !CONFIG_EXTENSIONS.contains(&ext.as_str()) {
        return Err(anyhow!(
            "unsupported file '{}': expected a '.json' (or '.yaml') file",
            path.display()
        ));
    }
    Ok(path.to_path_buf())
}

/// Log verbosity accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Verbosity {
    Critical,
    Error,
    #[value(alias = "warn")]
    Warning,
    #[default]
    Info,
    Debug,
    Trace,
}

impl Verbosity {
    /// Directive understood by `EnvFilter`.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Critical | Self::Error => "error",
            Self::Warning => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Install the global subscriber; `RUST_LOG` takes precedence over `verbosity`.
pub fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.as_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
