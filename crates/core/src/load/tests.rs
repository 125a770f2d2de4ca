use super::*;

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Error;

fn temp_dir(suffix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be monotonic")
        .as_nanos();
    std::env::temp_dir().join(format!("copy-check-core-{suffix}-{nanos}"))
}

fn write(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

#[test]
fn each_child_of_a_root_is_one_submission() -> Result<()> {
    let root = temp_dir("load_layout");
    write(&root.join("alice/main.c"), b"int main() { return 0; }\n")?;
    write(&root.join("alice/src/util.h"), b"int util(void);\n")?;
    write(&root.join("bob.c"), b"int bob;\n")?;
    write(&root.join(".hidden/x.c"), b"int hidden;\n")?;
    write(&root.join("carol/logo.png"), b"\x89PNG\0\0")?;
    write(&root.join("erin/a.c"), b"int erin;\n")?;
    write(&root.join("erin/node_modules/dep.c"), b"int dep;\n")?;
    write(&root.join("erin/.gitignore"), b"gen.c\n")?;
    write(&root.join("erin/gen.c"), b"int generated;\n")?;

    let outcome = load_submissions(&[root.clone()], &LoadOptions::default())?;
    let store = outcome.result;
    let ids: Vec<&str> = store.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec!["alice", "bob", "erin"]);

    let alice = store.by_id("alice").unwrap();
    let names: Vec<&str> = alice.sources().iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["main.c", "src/util.h"]);
    assert_eq!(store.by_id("bob").unwrap().sources()[0].name, "bob.c");
    assert_eq!(store.by_id("erin").unwrap().sources().len(), 1);

    assert_eq!(outcome.stats.entries, 4);
    assert_eq!(outcome.stats.submissions, 3);
    assert_eq!(outcome.stats.skipped_hidden, 1);
    assert_eq!(outcome.stats.skipped_binary, 1);
    assert_eq!(outcome.stats.skipped_empty, 1);
    assert_eq!(outcome.stats.files, 4);

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn identical_entries_keep_the_first() -> Result<()> {
    let root = temp_dir("load_duplicates");
    write(&root.join("ann/main.c"), b"int same;\n")?;
    write(&root.join("zed/main.c"), b"int same;\n")?;
    write(&root.join("max/main.c"), b"int other;\n")?;

    let outcome = load_submissions(&[root.clone()], &LoadOptions::default())?;
    let ids: Vec<&str> = outcome.result.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec!["ann", "max"]);
    assert_eq!(outcome.stats.skipped_duplicate, 1);

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn oversized_files_are_skipped() -> Result<()> {
    let root = temp_dir("load_large");
    write(&root.join("big/main.c"), &[b'x'; 64])?;
    write(&root.join("big/small.c"), b"int s;")?;

    let options = LoadOptions {
        max_file_size: Some(16),
        ..LoadOptions::default()
    };
    let outcome = load_submissions(&[root.clone()], &options)?;
    let big = outcome.result.by_id("big").unwrap();
    assert_eq!(big.sources().len(), 1);
    assert_eq!(big.sources()[0].name, "small.c");
    assert_eq!(outcome.stats.skipped_too_large, 1);

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn clashing_ids_are_an_error() -> Result<()> {
    let root = temp_dir("load_clash");
    write(&root.join("x.c"), b"int a;")?;
    write(&root.join("x.h"), b"int b;")?;

    let err = load_submissions(&[root.clone()], &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, Error::DuplicateSubmission(id) if id == "x"));

    fs::remove_dir_all(&root)?;
    Ok(())
}

#[test]
fn several_roots_are_merged_in_id_order() -> Result<()> {
    let first = temp_dir("load_root_a");
    let second = temp_dir("load_root_b");
    write(&first.join("mia.c"), b"int mia;")?;
    write(&second.join("leo.c"), b"int leo;")?;

    let outcome = load_submissions(&[first.clone(), second.clone()], &LoadOptions::default())?;
    let ids: Vec<&str> = outcome.result.iter().map(|s| s.id()).collect();
    assert_eq!(ids, vec!["leo", "mia"]);

    fs::remove_dir_all(&first)?;
    fs::remove_dir_all(&second)?;
    Ok(())
}

#[test]
fn missing_roots_are_io_errors() {
    let err = load_submissions(&[temp_dir("load_missing")], &LoadOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}
