use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::tempdir;

fn bin() -> String {
    env!("CARGO_BIN_EXE_jdelta").to_string()
}

#[test]
fn cli_diff_apply_roundtrip() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old.bin");
    let new = dir.path().join("new.bin");
    let patch = dir.path().join("patch.jd");
    let output = dir.path().join("output.bin");

    std::fs::write(&old, b"abcde12345abcde12345").unwrap();
    std::fs::write(&new, b"abcdeXXXXXabcde12345!").unwrap();

    let st = Command::new(bin())
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .arg(&patch)
        .status()
        .unwrap();
    assert!(st.success());

    let st = Command::new(bin())
        .arg("apply")
        .arg(&old)
        .arg(&patch)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), std::fs::read(&new).unwrap());
}

#[test]
fn cli_refuses_existing_output_without_force() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old");
    let new = dir.path().join("new");
    let patch = dir.path().join("patch");
    std::fs::write(&old, b"0123456789").unwrap();
    std::fs::write(&new, b"0123x56789").unwrap();
    std::fs::write(&patch, b"keep me").unwrap();

    let out = Command::new(bin())
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .arg(&patch)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("--force"));
    assert_eq!(std::fs::read(&patch).unwrap(), b"keep me");

    let st = Command::new(bin())
        .arg("--force")
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .arg(&patch)
        .status()
        .unwrap();
    assert!(st.success());
    assert_ne!(std::fs::read(&patch).unwrap(), b"keep me");
}

#[test]
fn cli_streams_new_from_stdin_and_patch_to_stdout() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old");
    let new_data = b"The quick brown fox jumps over the lazy cat";
    std::fs::write(&old, b"The quick brown fox jumps over the lazy dog").unwrap();

    let mut child = Command::new(bin())
        .arg("diff")
        .arg(&old)
        .arg("-")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(new_data).unwrap();
    let out = child.wait_with_output().unwrap();
    assert!(out.status.success());

    let rebuilt = jdelta::apply(&std::fs::read(&old).unwrap(), &out.stdout).unwrap();
    assert_eq!(rebuilt, new_data);
}

#[test]
fn cli_apply_with_old_from_stdin() {
    let dir = tempdir().unwrap();
    let old_data: Vec<u8> = (0..50_000u32).map(|i| (i * 7 % 253) as u8).collect();
    let mut new_data = old_data.clone();
    new_data[25_000] ^= 0x55;
    let patch = dir.path().join("patch");
    let output = dir.path().join("out");
    std::fs::write(
        &patch,
        jdelta::diff(&old_data, &new_data, &jdelta::Config::default()).unwrap(),
    )
    .unwrap();

    let mut child = Command::new(bin())
        .arg("apply")
        .arg("-")
        .arg(&patch)
        .arg(&output)
        .stdin(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(&old_data).unwrap();
    assert!(child.wait().unwrap().success());
    assert_eq!(std::fs::read(&output).unwrap(), new_data);
}

#[test]
fn cli_rejects_two_stdin_inputs() {
    let out = Command::new(bin())
        .args(["diff", "-", "-"])
        .stdin(Stdio::null())
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
}

#[test]
fn cli_corrupt_patch_leaves_no_output() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old");
    let patch = dir.path().join("patch");
    let output = dir.path().join("out");
    std::fs::write(&old, b"abcdefgh").unwrap();
    let mut bytes = jdelta::diff(b"abcdefgh", b"abcdXYgh", &jdelta::Config::default()).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&patch, bytes).unwrap();

    let out = Command::new(bin())
        .arg("apply")
        .arg(&old)
        .arg(&patch)
        .arg(&output)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("checksum"));
    assert!(!output.exists());
}

#[test]
fn cli_json_stats() {
    let dir = tempdir().unwrap();
    let old = dir.path().join("old");
    let new = dir.path().join("new");
    let patch = dir.path().join("patch");
    std::fs::write(&old, b"hello old world").unwrap();
    std::fs::write(&new, b"hello new world").unwrap();

    let out = Command::new(bin())
        .arg("--json")
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .arg(&patch)
        .output()
        .unwrap();
    assert!(out.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(stats["command"], "diff");
    assert_eq!(stats["new_size"], 15);
    assert_eq!(stats["patch_size"], std::fs::metadata(&patch).unwrap().len());
}

#[test]
fn cli_inspect_lists_patch() {
    let dir = tempdir().unwrap();
    let patch = dir.path().join("patch");
    std::fs::write(
        &patch,
        jdelta::diff(b"ABCDEFGHIJ", b"ABCXYZGHIJ", &jdelta::Config::default()).unwrap(),
    )
    .unwrap();

    let out = Command::new(bin()).arg("inspect").arg(&patch).output().unwrap();
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    assert!(text.contains("INSERT"));
    assert!(text.contains("instructions: 3"));
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("DEFAULT_SEARCH_WINDOW"));
}
