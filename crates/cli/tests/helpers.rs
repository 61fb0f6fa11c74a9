use std::fs;

use perfscan::{canonicalize_or_current, load_program, sha256_file};
use perfscan_core::ir::ProgramBuilder;
use tempfile::tempdir;

#[test]
fn canonicalize_or_current_resolves_existing_paths() {
    let tmp = tempdir().expect("tempdir");
    let nested = tmp.path().join("nested");
    fs::create_dir_all(&nested).expect("create nested");

    let result = canonicalize_or_current(&nested.to_string_lossy()).expect("canonicalize nested");
    assert_eq!(result, nested.canonicalize().expect("canonicalize nested dir"));
}

#[test]
fn canonicalize_or_current_anchors_missing_paths_at_cwd() {
    let cwd = std::env::current_dir().expect("cwd");
    let result = canonicalize_or_current("no-such-dump.json").expect("anchored path");
    assert_eq!(result, cwd.join("no-such-dump.json"));
}

#[test]
fn sha256_file_hashes_contents() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("abc.txt");
    fs::write(&path, "abc").expect("write file");
    assert_eq!(
        sha256_file(&path).expect("hash"),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );

    let err = sha256_file(&tmp.path().join("missing")).expect_err("missing file");
    assert!(err.to_string().contains("Failed to open file for hashing"));
}

#[test]
fn load_program_reads_a_json_dump() {
    let tmp = tempdir().expect("tempdir");
    let mut b = ProgramBuilder::new();
    let void = b.void();
    let f = b.function("main", void, vec![]);
    let entry = b.block(f, "entry");
    b.ret(entry, None);
    let path = tmp.path().join("main.json");
    let bytes = serde_json::to_vec(&b.into_dump()).expect("serialize dump");
    fs::write(&path, bytes).expect("write dump");

    let (program, loops) = load_program(&path).expect("load dump");
    assert!(program.function_by_name("main").is_some());
    assert!(loops.is_empty());

    fs::write(&path, "[]").expect("overwrite dump");
    let err = load_program(&path).expect_err("not a dump");
    assert!(
        err.to_string().contains("Failed to parse program dump JSON"),
        "unexpected error: {err}"
    );
}
