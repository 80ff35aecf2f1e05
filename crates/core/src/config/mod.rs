//! Configuration model for one analysis job.
//!
//! The file on disk (`Config`) is deserialized with serde and then validated
//! once into an immutable [`Job`], which every other component borrows.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::classify::IgnorePatterns;

/// One set of source globs plus the file names to exclude from it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PathGroup {
    /// Glob patterns, relative to the configuration file's directory.
    #[serde(default)]
    pub source: Vec<String>,
    /// Exact file names removed from the resolved set.
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl PathGroup {
    pub fn new(source: Vec<String>) -> Self {
        Self { source, blacklist: Vec::new() }
    }

    pub fn with_blacklist(mut self, blacklist: Vec<String>) -> Self {
        self.blacklist = blacklist;
        self
    }
}

/// Serializable configuration file.
///
/// ```json
/// { "paths": [ { "source": ["obj/*.o"], "blacklist": ["skip.o"] } ],
///   "ignore": ["^struct _IO_"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: Vec<PathGroup>,
    /// Regular expressions matched against structure names.
    #[serde(default)]
    pub ignore: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse JSON configuration {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to parse YAML configuration {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Configuration requires a non-empty 'paths' list")]
    NoPaths,
    #[error("Path group {index} requires a non-empty 'source' list")]
    EmptySources { index: usize },
    #[error("Failed to compile '{pattern}' as regular expression: {source}")]
    InvalidIgnore {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("Invalid glob '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("Path group {index}: no object files found for {patterns:?}")]
    NoObjects { index: usize, patterns: Vec<String> },
}

impl Config {
    /// Parse a configuration body; YAML is used for `.yaml`/`.yml` paths, JSON otherwise.
    pub fn parse(path: &Path, body: &str) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_lowercase();
        if matches!(ext.as_str(), "yaml" | "yml") {
            serde_yaml::from_str(body)
                .map_err(|source| ConfigError::Yaml { path: path.to_path_buf(), source })
        } else {
            serde_json::from_str(body)
                .map_err(|source| ConfigError::Json { path: path.to_path_buf(), source })
        }
    }

    /// Check required fields and compile ignore patterns.
    pub fn validate(
        self,
        name: impl Into<String>,
        base_dir: impl Into<PathBuf>,
    ) -> Result<Job, ConfigError> {
        if self.paths.is_empty() {
            return Err(ConfigError::NoPaths);
        }
        if let Some(index) = self.paths.iter().position(|g| g.source.is_empty()) {
            return Err(ConfigError::EmptySources { index });
        }
        let ignore = IgnorePatterns::compile(&self.ignore)?;
        Ok(Job { name: name.into(), base_dir: base_dir.into(), groups: self.paths, ignore })
    }
}

/// A validated, immutable analysis job.
#[derive(Debug, Clone)]
pub struct Job {
    /// Configuration file stem; prefixes the report file names.
    pub name: String,
    /// Directory relative globs are resolved against.
    pub base_dir: PathBuf,
    pub groups: Vec<PathGroup>,
    pub ignore: IgnorePatterns,
}

impl Job {
    /// Read, parse and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let body = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config = Config::parse(path, &body)?;
        config.validate(job_name(path), base_dir_of(path))
    }

    /// All blacklisted file names across every path group.
    pub fn blacklist(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().flat_map(|g| g.blacklist.iter().map(String::as_str))
    }
}

/// Report prefix derived from the configuration file name.
pub fn job_name(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("pahole").to_string()
}

fn base_dir_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
