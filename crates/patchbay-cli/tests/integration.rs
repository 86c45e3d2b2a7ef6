//! Integration tests for patchbay-cli.
//!
//! Tests invoke the `patchbay` binary against unit descriptions and scripts
//! written to temporary directories.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Helper to get the path to the `patchbay` binary built by cargo.
fn patchbay_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_patchbay"))
}

const FAN_IN_UNIT: &str = r#"
name = "submix"
parallel_paths = 2
output_pads = 1
input_pads = 4
aggregate = "async"
ownership = "input"
"#;

const GROW_SCRIPT: &str = r#"
[[steps]]
op = "pads"
role = "input"
count = 6

[[steps]]
op = "parallel_paths"
count = 3
"#;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

// ---------------------------------------------------------------------------
// `patchbay inspect`
// ---------------------------------------------------------------------------

#[test]
fn cli_inspect_shows_shape() {
    let dir = TempDir::new().unwrap();
    let unit = write(dir.path(), "submix.toml", FAN_IN_UNIT);

    let output = patchbay_bin()
        .args(["inspect", arg(&unit), "--channels"])
        .output()
        .expect("failed to run patchbay inspect");
    assert!(output.status.success(), "patchbay inspect failed");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("async/input-owned"), "got: {stdout}");
    assert!(stdout.contains("2 paths, 1 output pads, 4 input pads"));
    assert!(stdout.contains("Ranges:      8"));
    assert!(stdout.contains("alias of 4 ranges"));
}

#[test]
fn cli_inspect_json_is_parseable() {
    let dir = TempDir::new().unwrap();
    let unit = write(dir.path(), "submix.toml", FAN_IN_UNIT);

    let output = patchbay_bin()
        .args(["inspect", arg(&unit), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["name"], "submix");
    assert_eq!(json["topology"]["parallel_paths"], 2);
    assert_eq!(json["topology"]["aggregate"], "async");
    assert_eq!(json["topology"]["channels"].as_array().unwrap().len(), 10);
}

#[test]
fn cli_inspect_missing_unit_fails() {
    let output = patchbay_bin()
        .args(["inspect", "nonexistent_unit_12345"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unit not found"), "got: {stderr}");
}

// ---------------------------------------------------------------------------
// `patchbay run`
// ---------------------------------------------------------------------------

#[test]
fn cli_run_reports_each_step() {
    let dir = TempDir::new().unwrap();
    let unit = write(dir.path(), "submix.toml", FAN_IN_UNIT);
    let script = write(dir.path(), "grow.toml", GROW_SCRIPT);

    let output = patchbay_bin()
        .args(["run", arg(&unit), arg(&script), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let steps = json.as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0]["op"], "pads");
    assert_eq!(steps[0]["report"]["created_channels"], 4);
    assert_eq!(steps[0]["report"]["realiased_channels"], 2);
    assert_eq!(steps[1]["op"], "parallel_paths");
}

#[test]
fn cli_run_saves_result() {
    let dir = TempDir::new().unwrap();
    let unit = write(dir.path(), "submix.toml", FAN_IN_UNIT);
    let script = write(dir.path(), "grow.toml", GROW_SCRIPT);
    let saved = dir.path().join("out").join("grown.toml");

    let output = patchbay_bin()
        .args(["run", arg(&unit), arg(&script), "--save", arg(&saved)])
        .output()
        .unwrap();
    assert!(output.status.success());

    let content = std::fs::read_to_string(&saved).unwrap();
    assert!(content.contains("parallel_paths = 3"), "got: {content}");
    assert!(content.contains("input_pads = 6"), "got: {content}");
}

// ---------------------------------------------------------------------------
// `patchbay check`
// ---------------------------------------------------------------------------

#[test]
fn cli_check_passes_valid_script() {
    let dir = TempDir::new().unwrap();
    let unit = write(dir.path(), "submix.toml", FAN_IN_UNIT);
    let script = write(dir.path(), "grow.toml", GROW_SCRIPT);

    let output = patchbay_bin()
        .args(["check", arg(&unit), arg(&script)])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("step 1 (parallel_paths): ok"));
    assert!(stdout.contains("submix: all invariants hold"));
}

#[test]
fn cli_check_rejects_invalid_flags() {
    let dir = TempDir::new().unwrap();
    let unit = write(
        dir.path(),
        "bad.toml",
        "name = \"bad\"\naggregate = \"async\"\nownership = \"both\"\n",
    );

    let output = patchbay_bin()
        .args(["check", arg(&unit)])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("cannot be combined"), "got: {stderr}");
}
