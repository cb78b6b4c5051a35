//! Integration tests for the archsim CLI.

use archsim_cli as _;
use archsim_core as _;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tracing as _;
use tracing_subscriber as _;

fn binary_path() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.join("archsim")
}

fn create_temp_file(dir: &std::path::Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

const PROGRAM: &str = "\
0 4 11 22 33 44
10 2 aa bb
10 0
";

#[test]
fn check_reports_entry_and_units() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image = create_temp_file(temp_dir.path(), "prog.img", PROGRAM);

    let output = Command::new(binary_path())
        .args(["check", image.to_str().unwrap(), "--addr-bits", "8"])
        .output()
        .expect("failed to run archsim");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("entry:         0x10"));
    assert!(stdout.contains("units written: 6"));
    assert!(stdout.contains("max address:   0xff"));
}

#[test]
fn dump_prints_requested_range() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image = create_temp_file(temp_dir.path(), "prog.img", PROGRAM);

    let output = Command::new(binary_path())
        .args([
            "dump",
            image.to_str().unwrap(),
            "--addr-bits",
            "8",
            "--from",
            "0",
            "--to",
            "0x11",
        ])
        .output()
        .expect("failed to run archsim");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(
        stdout,
        "entry: 0x10\n\
         MEMORY DUMP\n\
         -----------\n\
         00 11 22 33 44 00 00 00 00\n\
         08 00 00 00 00 00 00 00 00\n\
         10 aa bb\n"
    );
}

#[test]
fn lite_dump_marks_out_of_range() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image = create_temp_file(temp_dir.path(), "prog.img", "0 2 1 2 0");

    let output = Command::new(binary_path())
        .args([
            "dump",
            image.to_str().unwrap(),
            "--addr-bits",
            "4",
            "--max-addr",
            "2",
            "--to",
            "5",
            "--lite",
        ])
        .output()
        .expect("failed to run archsim");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout, "entry: 0x0\n 01/ 02/ 00/ XXXXXX\n");
}

#[test]
fn malformed_image_fails_with_message() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image = create_temp_file(temp_dir.path(), "bad.img", "0 3 1 2");

    let output = Command::new(binary_path())
        .args(["check", image.to_str().unwrap()])
        .output()
        .expect("failed to run archsim");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("error: "));
    assert!(stderr.contains("announces 3 unit(s) but only 2 follow"));
}

#[test]
fn record_past_max_address_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    let image = create_temp_file(temp_dir.path(), "wide.img", "e 4 1 2 3 4 0");

    let status = Command::new(binary_path())
        .args(["check", image.to_str().unwrap(), "--addr-bits", "4"])
        .status()
        .expect("failed to run archsim");

    assert_eq!(status.code(), Some(1));
}

#[test]
fn missing_image_file_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("missing.img");

    let output = Command::new(binary_path())
        .args(["dump", missing.to_str().unwrap()])
        .output()
        .expect("failed to run archsim");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8(output.stderr).unwrap().contains("error: "));
}

#[test]
fn help_exits_successfully() {
    let output = Command::new(binary_path())
        .arg("--help")
        .output()
        .expect("failed to run archsim");

    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)
        .unwrap()
        .starts_with("Usage: archsim"));
}

#[test]
fn unknown_command_fails() {
    let status = Command::new(binary_path())
        .arg("assemble")
        .status()
        .expect("failed to run archsim");

    assert_eq!(status.code(), Some(1));
}
