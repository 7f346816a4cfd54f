use jobsmith::shared::fs_atomic::atomic_write_file;
use std::fs;

#[test]
fn shared_fs_atomic_replaces_content_without_leaving_temp_files() {
    let temp = tempfile::tempdir().expect("tempdir");
    let target = temp.path().join("nested/output.json");

    fs::create_dir_all(target.parent().expect("parent")).expect("mkdir");
    atomic_write_file(&target, b"first").expect("write first");
    assert_eq!(fs::read_to_string(&target).expect("read first"), "first");

    atomic_write_file(&target, b"second").expect("write second");
    assert_eq!(fs::read_to_string(&target).expect("read second"), "second");

    let entries = fs::read_dir(target.parent().expect("parent"))
        .expect("list dir")
        .map(|entry| entry.expect("entry").file_name())
        .collect::<Vec<_>>();
    assert_eq!(entries, vec![std::ffi::OsString::from("output.json")]);
}

#[test]
fn shared_fs_atomic_fails_when_parent_is_missing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let target = temp.path().join("missing/output.json");
    assert!(atomic_write_file(&target, b"x").is_err());
    assert!(!target.exists());
}
