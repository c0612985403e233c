//! End-to-end tests for the bufsync binary.
//!
//! Each test starts `bufsync serve-memory` on a random port and drives it with
//! separate `bufsync` invocations, the way a plugin host would.

use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

const BIN: &str = env!("CARGO_BIN_EXE_bufsync");

/// Start an in-memory host and return it with the port it printed.
async fn start_memory_host() -> (Child, u16) {
    let mut child = Command::new(BIN)
        .arg("serve-memory")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to start bufsync serve-memory");

    let stdout = child.stdout.take().expect("stdout is piped");
    let mut lines = BufReader::new(stdout).lines();
    let port = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(line) = lines.next_line().await.unwrap() {
            if let Some(port) = line.strip_prefix("BUFSYNC_PORT=") {
                return port.trim().parse::<u16>().unwrap();
            }
        }
        panic!("serve-memory exited without printing a port");
    })
    .await
    .expect("Timed out waiting for BUFSYNC_PORT");

    (child, port)
}

async fn run(port: u16, args: &[&str]) -> std::process::Output {
    Command::new(BIN)
        .arg("--port")
        .arg(port.to_string())
        .args(args)
        .stderr(Stdio::piped())
        .output()
        .await
        .expect("Failed to run bufsync")
}

fn json_stdout(output: &std::process::Output) -> Value {
    assert!(
        output.status.success(),
        "bufsync failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[tokio::test]
async fn test_open_assign_dump_roundtrip() {
    let (_host, port) = start_memory_host().await;
    let temp_dir = TempDir::new().unwrap();
    let input = temp_dir.path().join("input.txt");
    std::fs::write(&input, b"first\r\nsecond\r\n").unwrap();

    let identity = json_stdout(&run(port, &["open", "notes with spaces.txt"]).await);
    let bufnr = identity["bufnr"].as_u64().unwrap();
    assert_eq!(identity["tabpagenr"], 1);

    let assigned = json_stdout(&run(port, &["assign", input.to_str().unwrap()]).await);
    assert_eq!(assigned["bufnr"], bufnr);
    assert_eq!(assigned["lines"], 2);
    assert_eq!(assigned["format"], "dos");

    let output = run(port, &["dump"]).await;
    assert!(output.status.success());
    assert_eq!(output.stdout, b"first\r\nsecond\r\n");
}

#[tokio::test]
async fn test_assign_unknown_option_fails() {
    let (_host, port) = start_memory_host().await;
    let output = run(port, &["assign", "++bin", "missing.txt"]).await;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("++bin"));
}

#[tokio::test]
async fn test_connect_without_host_fails() {
    // Nothing listens on port 1
    let output = run(1, &["concrete"]).await;
    assert!(!output.status.success());
}
