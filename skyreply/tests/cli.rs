//! CLI tests for setup failures.
//!
//! Spawns the binary in a temp directory and checks that bad configuration,
//! arguments or credentials exit with the invalid code before any network
//! or backend call.

use std::fs;
use std::process::Command;

use skyreply::exit_codes;

fn skyreply(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_skyreply"));
    cmd.current_dir(dir)
        .env_remove("BSKY_HANDLE")
        .env_remove("BSKY_APP_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn invalid_config_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(temp.path().join("skyreply.toml"), "[timeline]\nlimit = 0\n").expect("write config");

    let output = skyreply(temp.path())
        .arg("reply")
        .output()
        .expect("run skyreply");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("timeline.limit"));
}

#[test]
fn out_of_range_limit_flag_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");

    let status = skyreply(temp.path())
        .args(["reply", "--limit", "500"])
        .status()
        .expect("run skyreply");

    assert_eq!(status.code(), Some(exit_codes::INVALID));
}

#[test]
fn missing_credentials_exit_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = skyreply(temp.path())
        .args(["post", "--text", "hello"])
        .output()
        .expect("run skyreply");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("BSKY_HANDLE"));
}

#[test]
fn missing_env_file_exits_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");

    let status = skyreply(temp.path())
        .args(["--env-file", "nope.env", "menu"])
        .status()
        .expect("run skyreply");

    assert_eq!(status.code(), Some(exit_codes::INVALID));
}
