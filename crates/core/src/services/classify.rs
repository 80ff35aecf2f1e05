use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::model::StructureRecord;

/// Advisory the tool prints next to byte holes that reordering could close.
///
/// Bit holes are deliberately not matched: the tool reports them for unnamed
/// bit-field members where nothing can be done.
fn try_to_pack_marker() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(r"bytes? hole, try to pack").expect("try-to-pack marker regex is valid")
    })
}

/// True when `text` contains a byte-hole "try to pack" advisory.
pub fn has_try_to_pack(text: &str) -> bool {
    try_to_pack_marker().is_match(text)
}

/// Compiled ignore patterns, matched at the start of a structure's name.
#[derive(Debug, Clone, Default)]
pub struct IgnorePatterns {
    patterns: Vec<Regex>,
}

impl IgnorePatterns {
    pub fn compile<S: AsRef<str>>(sources: &[S]) -> Result<Self, ConfigError> {
        let patterns = sources
            .iter()
            .map(|source| {
                let source = source.as_ref();
                Regex::new(&format!("^(?:{source})")).map_err(|err| ConfigError::InvalidIgnore {
                    pattern: source.to_string(),
                    source: err,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// No qualifier stripping: `struct Foo` is matched as-is.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(name))
    }

    /// Drop every record whose name matches a pattern.
    pub fn filter(&self, records: Vec<StructureRecord>) -> Vec<StructureRecord> {
        records.into_iter().filter(|r| !self.is_ignored(&r.name)).collect()
    }
}

/// Classification strategy, chosen once per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Trust the tool's own packable listing: flag only structures that shrink.
    Lazy,
    /// Flag every structure with a "try to pack" advisory, even if it would not shrink.
    #[default]
    Strict,
}

impl Mode {
    pub fn from_lazy(lazy: bool) -> Self {
        if lazy {
            Self::Lazy
        } else {
            Self::Strict
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lazy => "lazy",
            Self::Strict => "strict",
        }
    }

    pub fn classify(&self, record: &StructureRecord) -> Verdict {
        let packable = match self {
            Self::Lazy => record.packing_hint.as_ref().is_some_and(|hint| hint.shrinks()),
            Self::Strict => has_try_to_pack(&record.raw),
        };
        if packable {
            Verdict::Packable
        } else {
            Verdict::Optimal
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Optimal,
    Packable,
}

/// A record together with its verdict and the tool output it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub record: StructureRecord,
    pub verdict: Verdict,
    pub fragment: String,
}

impl ClassificationResult {
    pub fn is_packable(&self) -> bool {
        self.verdict == Verdict::Packable
    }
}

/// Filter by name, then classify every surviving record.
pub fn classify_records(
    records: Vec<StructureRecord>,
    ignore: &IgnorePatterns,
    mode: Mode,
) -> Vec<ClassificationResult> {
    ignore
        .filter(records)
        .into_iter()
        .map(|record| {
            let verdict = mode.classify(&record);
            let mut fragment = record.raw.clone();
            if let (Mode::Lazy, Some(hint)) = (mode, &record.packing_hint) {
                fragment.push('\n');
                fragment.push_str(&hint.raw);
            }
            ClassificationResult { record, verdict, fragment }
        })
        .collect()
}
