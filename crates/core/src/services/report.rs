use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use thiserror::Error;
use tracing::info;

use crate::model::{AggregateKind, ObjectFile, ParseWarning, StructureRecord};
use crate::services::analysis::{AnalysisError, ObjectAnalysis, ObjectFailure};
use crate::services::classify::{ClassificationResult, Mode};

#[derive(Debug, Error)]
pub enum ReportWriteError {
    #[error("Failed to create report directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Results accumulated over a whole run, in processing order.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// Configuration name; prefixes the dump file names.
    pub name: String,
    pub mode: Mode,
    pub all: Vec<ClassificationResult>,
    pub packable: Vec<ClassificationResult>,
    pub failures: Vec<ObjectFailure>,
    pub warnings: Vec<ParseWarning>,
    pub objects_processed: usize,
}

impl AnalysisReport {
    pub fn new(name: impl Into<String>, mode: Mode) -> Self {
        Self {
            name: name.into(),
            mode,
            all: Vec::new(),
            packable: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
            objects_processed: 0,
        }
    }

    pub fn record(&mut self, analysis: ObjectAnalysis) {
        self.objects_processed += 1;
        self.warnings.extend(analysis.warnings);
        for result in analysis.results {
            if result.is_packable() {
                self.packable.push(result.clone());
            }
            self.all.push(result);
        }
    }

    pub fn record_failure(&mut self, object: ObjectFile, error: &AnalysisError) {
        self.objects_processed += 1;
        self.failures.push(ObjectFailure { object, message: error.to_string() });
    }

    pub fn packable_count(&self) -> usize {
        self.packable.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Sorted, unique names of packable structures.
    pub fn packable_names(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self.packable.iter().map(|r| r.record.name.as_str()).collect();
        names.into_iter().map(str::to_string).collect()
    }
}

/// Locations of the two dump files for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFiles {
    pub all: PathBuf,
    pub packable: PathBuf,
}

impl ReportFiles {
    pub fn new(out_dir: &Path, name: &str) -> Self {
        Self {
            all: out_dir.join(format!("{name}_dump_all.h")),
            packable: out_dir.join(format!("{name}_dump_packable.h")),
        }
    }
}

/// Write both dumps into `out_dir`, but only when something is packable.
///
/// Returns `None` when nothing was written.
pub fn write_reports(
    report: &AnalysisReport,
    out_dir: &Path,
) -> Result<Option<ReportFiles>, ReportWriteError> {
    if report.packable_count() == 0 {
        return Ok(None);
    }

    fs::create_dir_all(out_dir)
        .map_err(|source| ReportWriteError::CreateDir { path: out_dir.to_path_buf(), source })?;
    let files = ReportFiles::new(out_dir, &report.name);

    let all = render_dump(report, report.all.iter(), false);
    fs::write(&files.all, all)
        .map_err(|source| ReportWriteError::Write { path: files.all.clone(), source })?;
    let packable = render_dump(report, report.packable.iter(), true);
    fs::write(&files.packable, packable)
        .map_err(|source| ReportWriteError::Write { path: files.packable.clone(), source })?;

    info!("wrote {} and {}", files.all.display(), files.packable.display());
    Ok(Some(files))
}

/// One rendered block: a layout and every object it was found in.
struct Entry<'a> {
    result: &'a ClassificationResult,
    objects: Vec<&'a ObjectFile>,
}

fn same_layout(a: &ClassificationResult, b: &ClassificationResult) -> bool {
    a.verdict == b.verdict
        && a.record.name == b.record.name
        && a.record.kind == b.record.kind
        && a.record.total_size == b.record.total_size
        && a.record.members == b.record.members
}

fn group<'a>(results: impl Iterator<Item = &'a ClassificationResult>) -> Vec<Entry<'a>> {
    let mut entries: Vec<Entry<'a>> = Vec::new();
    for result in results {
        match entries.iter_mut().find(|e| same_layout(e.result, result)) {
            Some(entry) => entry.objects.push(&result.record.source_object),
            None => entries.push(Entry { result, objects: vec![&result.record.source_object] }),
        }
    }
    entries
}

/// Render a dump file. With `include_raw`, each entry is followed by the tool
/// output it came from, fenced with `#if 0` so the file stays valid C.
pub fn render_dump<'a>(
    report: &AnalysisReport,
    results: impl Iterator<Item = &'a ClassificationResult>,
    include_raw: bool,
) -> String {
    let entries = group(results);
    let mut blocks = Vec::with_capacity(entries.len() + 1);
    blocks.push(format!(
        "/*\n * Generated by run-pahole for '{}' ({} mode) at {}\n * {} layout(s)\n */",
        report.name,
        report.mode.as_str(),
        Utc::now().to_rfc3339(),
        entries.len()
    ));

    for entry in &entries {
        let mut block = render_header(entry);
        block.push_str(&render_declaration(&entry.result.record));
        if include_raw {
            block.push_str("\n#if 0\n");
            block.push_str(entry.result.fragment.trim_end());
            block.push_str("\n#endif");
        }
        blocks.push(block);
    }

    let mut out = blocks.join("\n\n");
    out.push('\n');
    out
}

fn render_header(entry: &Entry<'_>) -> String {
    let record = &entry.result.record;
    let mut header = String::from("/*\n");
    header.push_str(&format!(" * {}\n", record.name));
    header.push_str(&format!(
        " * size: {}, members: {}, padding: {}\n",
        record.total_size,
        record.members.len(),
        record.padding_bytes
    ));
    if let Some(hint) = &record.packing_hint {
        header.push_str(&format!(
            " * packable: {} -> {} bytes (saves {})\n",
            hint.size_now, hint.size_packed, hint.saved
        ));
    }
    for warning in &record.warnings {
        header.push_str(&format!(" * warning: {warning}\n"));
    }
    header.push_str(" * used in\n");
    for object in &entry.objects {
        header.push_str(&format!(" *   {object}\n"));
    }
    header.push_str(" */\n");
    header
}

/// Rebuild a C declaration from the parsed members, with layout comments.
pub fn render_declaration(record: &StructureRecord) -> String {
    let keyword = record.kind.keyword();
    let opening = match (&record.typedef_name, &record.tag) {
        (Some(_), Some(tag)) => format!("typedef {keyword} {tag} {{\n"),
        (Some(_), None) => format!("typedef {keyword} {{\n"),
        (None, Some(tag)) => format!("{keyword} {tag} {{\n"),
        (None, None) => format!("{keyword} {{\n"),
    };

    let mut out = opening;
    let mut cursor = 0;
    for member in &record.members {
        if record.kind != AggregateKind::Union && member.offset > cursor {
            out.push_str(&format!("\n\t/* XXX {} bytes hole */\n\n", member.offset - cursor));
        }
        let offset = match member.bit_field {
            Some(bits) => format!("{}:{}", member.offset, bits.bit_offset),
            None => member.offset.to_string(),
        };
        out.push_str(&format!(
            "\t{}; /* offset: {}, size: {} */\n",
            member.declaration, offset, member.size
        ));
        cursor = cursor.max(member.end());
    }
    if record.kind != AggregateKind::Union && record.total_size > cursor {
        out.push_str(&format!("\n\t/* XXX {} bytes tail padding */\n", record.total_size - cursor));
    }
    out.push_str(&format!(
        "\n\t/* size: {}, padding: {} */\n",
        record.total_size, record.padding_bytes
    ));

    match &record.typedef_name {
        Some(name) => out.push_str(&format!("}} {name};")),
        None => out.push_str("};"),
    }
    out
}
