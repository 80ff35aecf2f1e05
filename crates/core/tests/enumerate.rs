use std::fs;
use std::path::Path;

use pahole_core::config::{Config, ConfigError, Job, PathGroup};
use pahole_core::model::ObjectFile;
use pahole_core::services::enumerate::{enumerate_objects, expand_pattern};
use tempfile::tempdir;

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"\x7fELF").unwrap();
}

fn job(root: &Path, groups: Vec<PathGroup>) -> Job {
    Config { paths: groups, ignore: vec![] }.validate("test", root).expect("valid config")
}

fn file_names(objects: &[ObjectFile]) -> Vec<String> {
    objects.iter().map(|o| o.file_name().unwrap().to_string()).collect()
}

#[test]
fn globs_resolve_relative_to_base_dir_and_sort() {
    let temp = tempdir().unwrap();
    for name in ["obj/c.o", "obj/a.o", "obj/b.o", "obj/readme.txt", "obj/sub/d.o"] {
        touch(temp.path(), name);
    }
    let job = job(temp.path(), vec![PathGroup::new(vec!["obj/*.o".into()])]);

    let objects = enumerate_objects(&job).expect("enumerate");
    assert_eq!(file_names(&objects), vec!["a.o", "b.o", "c.o"]);
    assert!(objects.iter().all(|o| o.path.starts_with(temp.path())));
}

#[test]
fn double_star_descends_into_subdirectories() {
    let temp = tempdir().unwrap();
    touch(temp.path(), "build/x.o");
    touch(temp.path(), "build/deep/er/y.o");
    let job = job(temp.path(), vec![PathGroup::new(vec!["build/**/*.o".into()])]);

    let objects = enumerate_objects(&job).expect("enumerate");
    assert_eq!(file_names(&objects), vec!["y.o", "x.o"]);
}

#[test]
fn enumeration_is_deterministic() {
    let temp = tempdir().unwrap();
    for name in ["a/2.o", "a/1.o", "b/3.o", "b/0.o"] {
        touch(temp.path(), name);
    }
    let job = job(
        temp.path(),
        vec![PathGroup::new(vec!["b/*.o".into()]), PathGroup::new(vec!["a/*.o".into()])],
    );

    let first = enumerate_objects(&job).expect("first");
    let second = enumerate_objects(&job).expect("second");
    assert_eq!(first, second);
    let mut sorted = first.clone();
    sorted.sort();
    assert_eq!(first, sorted);
}

#[test]
fn blacklist_excludes_file_names_across_groups() {
    let temp = tempdir().unwrap();
    for name in ["obj/a.o", "obj/skip.o", "lib/skip.o", "lib/l.o"] {
        touch(temp.path(), name);
    }
    let job = job(
        temp.path(),
        vec![
            PathGroup::new(vec!["obj/*.o".into()]).with_blacklist(vec!["skip.o".into()]),
            PathGroup::new(vec!["lib/*.o".into(), "obj/*.o".into()]),
        ],
    );

    let objects = enumerate_objects(&job).expect("enumerate");
    assert_eq!(file_names(&objects), vec!["l.o", "a.o"]);
    assert!(objects.iter().all(|o| o.file_name() != Some("skip.o")));
}

#[test]
fn overlapping_globs_are_deduplicated() {
    let temp = tempdir().unwrap();
    touch(temp.path(), "obj/a.o");
    let job = job(temp.path(), vec![PathGroup::new(vec!["obj/*.o".into(), "obj/a.o".into()])]);
    assert_eq!(enumerate_objects(&job).expect("enumerate").len(), 1);
}

#[test]
fn version_control_directories_are_skipped() {
    let temp = tempdir().unwrap();
    touch(temp.path(), "tree/.git/objects/x.o");
    touch(temp.path(), "tree/real.o");
    let matches = expand_pattern(temp.path(), "tree/**/*.o").expect("expand");
    assert_eq!(matches.len(), 1);
    assert!(matches[0].ends_with("tree/real.o"));
}

#[test]
fn group_without_matches_is_a_configuration_error() {
    let temp = tempdir().unwrap();
    touch(temp.path(), "obj/only.o");
    let job = job(
        temp.path(),
        vec![PathGroup::new(vec!["obj/*.o".into()]).with_blacklist(vec!["only.o".into()])],
    );
    let err = enumerate_objects(&job).unwrap_err();
    assert!(matches!(err, ConfigError::NoObjects { index: 0, .. }), "unexpected error: {err}");
}

#[test]
fn invalid_glob_is_reported() {
    let temp = tempdir().unwrap();
    let err = expand_pattern(temp.path(), "obj/[*.o").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidGlob { .. }), "unexpected error: {err}");
}

#[test]
fn glob_characters_in_the_config_directory_are_literal() {
    let temp = tempdir().unwrap();
    let base = temp.path().join("fw[v2]");
    touch(&base, "obj/a.o");
    touch(temp.path(), "fwv/obj/decoy.o");
    let job = job(&base, vec![PathGroup::new(vec!["obj/*.o".into()])]);

    let objects = enumerate_objects(&job).expect("enumerate");
    assert_eq!(file_names(&objects), vec!["a.o"]);
    assert!(objects[0].path.starts_with(&base));
}

#[test]
fn parent_components_resolve_against_the_config_directory() {
    let temp = tempdir().unwrap();
    touch(temp.path(), "build/a.o");
    let config_dir = temp.path().join("cfg");
    fs::create_dir_all(&config_dir).unwrap();

    let matches = expand_pattern(&config_dir, "../build/*.o").expect("expand");
    assert_eq!(matches, vec![temp.path().join("build/a.o")]);
}

#[test]
fn single_star_does_not_descend() {
    let temp = tempdir().unwrap();
    touch(temp.path(), "obj/a.o");
    touch(temp.path(), "obj/nested/b.o");
    let matches = expand_pattern(temp.path(), "obj/*.o").expect("expand");
    assert_eq!(matches, vec![temp.path().join("obj/a.o")]);
}
