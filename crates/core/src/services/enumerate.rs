use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::{ConfigError, Job, PathGroup};
use crate::model::ObjectFile;

/// Directories never descended into when expanding globs.
const SKIPPED_DIRS: [&str; 3] = [".git", ".svn", ".vs"];

/// Resolve every path group of `job` into a sorted, deduplicated object list.
///
/// A file whose name is blacklisted by any group is excluded, even when
/// another group's glob matches it.
pub fn enumerate_objects(job: &Job) -> Result<Vec<ObjectFile>, ConfigError> {
    let blacklist: BTreeSet<&str> = job.blacklist().collect();
    let mut objects = BTreeSet::new();

    for (index, group) in job.groups.iter().enumerate() {
        if group.source.is_empty() {
            return Err(ConfigError::EmptySources { index });
        }
        let resolved = resolve_group(&job.base_dir, group)?;
        let (skipped, kept): (Vec<_>, Vec<_>) = resolved.into_iter().partition(|path| {
            path.file_name().and_then(|n| n.to_str()).is_some_and(|n| blacklist.contains(n))
        });
        if !skipped.is_empty() {
            debug!(group = index, count = skipped.len(), "skipping blacklisted paths: {skipped:?}");
        }
        if kept.is_empty() {
            return Err(ConfigError::NoObjects { index, patterns: group.source.clone() });
        }
        debug!(group = index, count = kept.len(), "resolved object files");
        objects.extend(kept);
    }

    Ok(objects.into_iter().map(ObjectFile::new).collect())
}

/// Expand one group's globs relative to `base_dir`, without blacklist filtering.
pub fn resolve_group(base_dir: &Path, group: &PathGroup) -> Result<BTreeSet<PathBuf>, ConfigError> {
    let mut paths = BTreeSet::new();
    for pattern in &group.source {
        debug!("expanding {pattern}");
        paths.extend(expand_pattern(base_dir, pattern)?);
    }
    Ok(paths)
}

/// Expand a single glob pattern into matching files.
///
/// Only `pattern` is glob syntax; `base_dir` is matched literally.
pub fn expand_pattern(base_dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, ConfigError> {
    let (base, relative) = split_base(base_dir, pattern);
    let relative_str = to_slash(&relative);

    if !has_glob_meta(&relative_str) {
        let full = base.join(&relative);
        return Ok(if full.is_file() { vec![full] } else { Vec::new() });
    }

    let glob = match to_slash(&base).trim_end_matches('/') {
        "" if base.as_os_str().is_empty() => relative_str.clone(),
        base_str => format!("{}/{relative_str}", globset::escape(base_str)),
    };
    let matcher = GlobBuilder::new(&glob)
        .literal_separator(true)
        .build()
        .map_err(|source| ConfigError::InvalidGlob { pattern: pattern.to_string(), source })?
        .compile_matcher();

    let prefix = literal_prefix(&relative);
    let root = base.join(&prefix);
    let walk_root = if root.as_os_str().is_empty() { PathBuf::from(".") } else { root.clone() };
    if !walk_root.is_dir() {
        return Ok(Vec::new());
    }

    let mut walker = WalkDir::new(&walk_root).follow_links(true).sort_by_file_name();
    if !relative_str.contains("**") {
        walker = walker.max_depth(relative.components().count() - prefix.components().count());
    }

    let mut matches = Vec::new();
    for entry in walker.into_iter().filter_entry(|e| !is_skipped_dir(e.path())) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("failed to read entry under {}: {err}", walk_root.display());
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = if root.as_os_str().is_empty() {
            entry.path().strip_prefix(".").unwrap_or(entry.path()).to_path_buf()
        } else {
            entry.into_path()
        };
        if matcher.is_match(to_slash(&path)) {
            matches.push(path);
        }
    }
    Ok(matches)
}

/// Split `base_dir` joined with `pattern` into a literal directory and the
/// normalized pattern below it. Leading `..` in the pattern are folded into
/// the base. Absolute patterns ignore the base.
fn split_base(base_dir: &Path, pattern: &str) -> (PathBuf, PathBuf) {
    let relative = normalize(Path::new(pattern));
    if relative.is_absolute() {
        return (PathBuf::new(), relative);
    }
    let mut base = normalize(base_dir);
    let mut components = relative.components().peekable();
    while components.peek() == Some(&Component::ParentDir) {
        match base.components().next_back() {
            Some(Component::Normal(_)) => {
                base.pop();
            }
            Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
            _ => base.push(".."),
        }
        components.next();
    }
    (base, components.collect())
}

/// Lexically normalize a path: drop `.` and fold `..` where possible.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn has_glob_meta(s: &str) -> bool {
    s.contains(['*', '?', '[', '{'])
}

/// Leading components of `path` that contain no glob metacharacters.
fn literal_prefix(path: &Path) -> PathBuf {
    let mut prefix = PathBuf::new();
    for component in path.components() {
        if has_glob_meta(&component.as_os_str().to_string_lossy()) {
            break;
        }
        prefix.push(component.as_os_str());
    }
    prefix
}

fn is_skipped_dir(path: &Path) -> bool {
    path.file_name().and_then(|n| n.to_str()).is_some_and(|n| SKIPPED_DIRS.contains(&n))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_parent_and_current_components() {
        assert_eq!(normalize(Path::new("a/./b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize(Path::new("./obj/*.o")), PathBuf::from("obj/*.o"));
        assert_eq!(normalize(Path::new("../build/x.o")), PathBuf::from("../build/x.o"));
        assert_eq!(normalize(Path::new("/../x")), PathBuf::from("/x"));
    }

    #[test]
    fn split_base_folds_leading_parent_components() {
        assert_eq!(
            split_base(Path::new("fw/cfg"), "../obj/*.o"),
            (PathBuf::from("fw"), PathBuf::from("obj/*.o"))
        );
        assert_eq!(
            split_base(Path::new("."), "./obj/*.o"),
            (PathBuf::new(), PathBuf::from("obj/*.o"))
        );
        assert_eq!(
            split_base(Path::new("cfg"), "/abs/*.o"),
            (PathBuf::new(), PathBuf::from("/abs/*.o"))
        );
    }

    #[test]
    fn literal_prefix_stops_at_first_glob_component() {
        assert_eq!(literal_prefix(Path::new("build/obj/*.o")), PathBuf::from("build/obj"));
        assert_eq!(literal_prefix(Path::new("build/**/x.o")), PathBuf::from("build"));
        assert_eq!(literal_prefix(Path::new("*.o")), PathBuf::new());
    }
}
