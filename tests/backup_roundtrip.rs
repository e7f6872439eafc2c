use std::fs;
use std::path::Path;

use daybook_lib::backup::{export_archive, import_archive};
use daybook_lib::paths::DATA_DIR_NAME;
use tempfile::tempdir;

fn build_sample_tree(root: &Path) {
    fs::create_dir_all(root.join("2026-02-08")).unwrap();
    fs::write(
        root.join("2026-02-08/raw_telemetry.json"),
        r#"{"metrics": {"flow_score_estimate": 62.5, "total_keystrokes": 5120}}"#,
    )
    .unwrap();
    fs::write(
        root.join("2026-02-08/daily_summary.md"),
        "# A productive day\n",
    )
    .unwrap();
    fs::create_dir_all(root.join("notes/archive/2026-02-09")).unwrap();
    fs::write(
        root.join("notes/archive/2026-02-09/raw_telemetry.json"),
        r#"{"metrics": {"flow_score_estimate": 81, "total_keystrokes": 9000}}"#,
    )
    .unwrap();
    fs::write(root.join("user.json"), r#"{"name": "Ada"}"#).unwrap();
    fs::write(root.join("tasks.json"), r#"{"groups": [], "tasks": []}"#).unwrap();
    // An empty directory must survive the round trip too.
    fs::create_dir_all(root.join("notes/inbox")).unwrap();
}

fn collect_files(root: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.unwrap();
        if entry.file_type().is_file() {
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .into_owned();
            files.push((relative, fs::read(entry.path()).unwrap()));
        }
    }
    files.sort();
    files
}

#[test]
fn export_then_import_reproduces_the_tree_byte_for_byte() {
    let source_home = tempdir().unwrap();
    let source_root = source_home.path().join(DATA_DIR_NAME);
    build_sample_tree(&source_root);

    let staging = tempdir().unwrap();
    let archive = staging.path().join("daybook_backup.zip");
    let receipt = export_archive(&source_root, &archive).unwrap();
    assert!(receipt.size > 0);
    assert_eq!(receipt.size, fs::metadata(&archive).unwrap().len());

    let target_home = tempdir().unwrap();
    import_archive(&archive, target_home.path()).unwrap();

    let restored_root = target_home.path().join(DATA_DIR_NAME);
    assert_eq!(collect_files(&source_root), collect_files(&restored_root));
    assert!(restored_root.join("notes/inbox").is_dir());
}

#[test]
fn import_overwrites_files_at_the_same_relative_path() {
    let source_home = tempdir().unwrap();
    let source_root = source_home.path().join(DATA_DIR_NAME);
    build_sample_tree(&source_root);

    let staging = tempdir().unwrap();
    let archive = staging.path().join("backup.zip");
    export_archive(&source_root, &archive).unwrap();

    let target_home = tempdir().unwrap();
    let stale = target_home.path().join(DATA_DIR_NAME).join("user.json");
    fs::create_dir_all(stale.parent().unwrap()).unwrap();
    fs::write(&stale, r#"{"name": "Stale"}"#).unwrap();
    // A file the archive does not know about is left alone.
    let untouched = target_home.path().join(DATA_DIR_NAME).join("scratch.txt");
    fs::write(&untouched, "keep me").unwrap();

    import_archive(&archive, target_home.path()).unwrap();

    assert_eq!(fs::read(&stale).unwrap(), fs::read(source_root.join("user.json")).unwrap());
    assert_eq!(fs::read(&untouched).unwrap(), b"keep me");
}

#[test]
fn missing_archive_surfaces_a_read_error() {
    let dir = tempdir().unwrap();
    let err = import_archive(&dir.path().join("nope.zip"), dir.path())
        .expect_err("missing archive must fail");
    assert_eq!(err.code(), "IO/NotFound");
}

#[test]
fn garbage_archive_is_rejected_not_extracted() {
    let dir = tempdir().unwrap();
    let archive = dir.path().join("not_a_zip.zip");
    fs::write(&archive, "this is not a zip archive").unwrap();

    let err = import_archive(&archive, dir.path()).expect_err("garbage must fail");
    assert!(err.code().starts_with("ARCHIVE/"));
}
