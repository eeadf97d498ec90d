//! Exercises the compiled `ulogd` binary directly: argument parsing, a real
//! client round trip, and shutdown via `SIGTERM`.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::Duration;

use assert_cmd::prelude::*;
use ulog_client::ProxyFile;
use ulog_test_support::wait_for;

#[test]
fn help_exits_successfully() {
    let mut cmd = Command::cargo_bin("ulogd").unwrap();
    let output = cmd.arg("--help").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Local logging off-load daemon"));
}

#[test]
fn rejects_unknown_flags() {
    let mut cmd = Command::cargo_bin("ulogd").unwrap();
    let output = cmd.arg("--not-a-real-flag").output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn end_to_end_via_spawned_binary() {
    let dir = tempfile::tempdir().unwrap();
    let sock = dir.path().join("t.sock");
    let log_path = dir.path().join("out.log");

    let mut child = Command::cargo_bin("ulogd")
        .unwrap()
        .arg("--socket-file")
        .arg(&sock)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    assert!(wait_for(|| sock.exists(), Duration::from_secs(2)));

    let mut proxy = ProxyFile::open(&log_path, &sock, Duration::from_secs(1)).unwrap();
    proxy.write(b"from the cli test\n").unwrap();
    proxy.close().unwrap();

    assert!(wait_for(
        || std::fs::read_to_string(&log_path)
            .map(|s| s.contains("from the cli test"))
            .unwrap_or(false),
        Duration::from_secs(2),
    ));

    // SAFETY: `kill` with a valid pid and signal has no preconditions.
    unsafe {
        libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
    }
    let status = child.wait().unwrap();
    assert!(status.success());

    let mut stderr = String::new();
    child
        .stderr
        .take()
        .unwrap()
        .read_to_string(&mut stderr)
        .unwrap();
    assert!(!stderr.contains("panic"));
}
