use std::io::Write;
use std::process::{Command, Stdio};

fn run(args: &[&str], stdin: &str) -> std::process::Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_wgscan"))
        .args(["--backend", "host"])
        .args(args)
        .env_remove("WGSCAN_BLOCK_SIZE")
        .env_remove("WGSCAN_BACKEND")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();
    // The child may exit before reading everything.
    let _ = child.stdin.take().unwrap().write_all(stdin.as_bytes());
    child.wait_with_output().unwrap()
}

#[test]
fn test_scan_from_stdin() {
    let output = run(&["--block-size", "2", "scan"], "5\n1 2 3 4 5\n");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "1.000 3.000 6.000 10.000 15.000\n"
    );
}

#[test]
fn test_scan_to_file() {
    let path = std::env::temp_dir().join(format!("wgscan-cli-{}.txt", std::process::id()));
    let output = run(
        &["scan", "-o", path.to_str().unwrap()],
        "3 0.5 0.25 0.125",
    );
    assert!(output.status.success());
    let written = std::fs::read_to_string(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(written, "0.500 0.750 0.875\n");
}

#[test]
fn test_convolve_from_stdin() {
    let output = run(&["convolve"], "2 1\n1 2\n3 4\n2\n");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8(output.stdout).unwrap(),
        "2.000 4.000\n6.000 8.000\n"
    );
}

#[test]
fn test_bad_input_reports_code() {
    let output = run(&["scan"], "3 1 2");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("invalid input"), "{stderr}");
    assert!(stderr.contains(": -1000"), "{stderr}");
}

#[test]
fn test_zero_block_size_rejected() {
    let output = run(&["--block-size", "0", "scan"], "1 1");
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains(": -30"), "{stderr}");
}

#[test]
fn test_block_size_one_rejected() {
    let output = run(&["--block-size", "1", "scan"], "4 1 2 3 4");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains(": -30"), "{stderr}");
}

#[test]
fn test_even_mask_rejected() {
    let output = run(&["convolve"], "2 2\n1 2\n3 4\n1 1\n1 1\n");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains(": -30"), "{stderr}");
}
