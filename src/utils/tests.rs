use super::*;

#[test]
fn ensure_dir_creates_and_returns() {
    let tmp = tempfile::tempdir().unwrap();
    let new_dir = tmp.path().join("subdir");
    let result = ensure_dir(&new_dir).unwrap();
    assert_eq!(result, new_dir);
    assert!(new_dir.exists());
}

#[test]
fn atomic_write_creates_file() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.json");
    atomic_write(&path, "{}").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
}

#[test]
fn atomic_write_overwrites() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.json");
    atomic_write(&path, "first").unwrap();
    atomic_write(&path, "second").unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
}

#[test]
fn atomic_write_creates_missing_parent() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("nested").join("config.json");
    atomic_write(&path, "x").unwrap();
    assert!(path.exists());
}

#[test]
fn truncate_for_log_short_text_untouched() {
    assert_eq!(truncate_for_log("hello", 10), "hello");
}

#[test]
fn truncate_for_log_respects_char_boundary() {
    // "é" is two bytes; cutting at 1 must not split it
    let out = truncate_for_log("éééé", 3);
    assert_eq!(out, "é...");
}
