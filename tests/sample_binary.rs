// tests/sample_binary.rs

//! Drives the `remdisp-sample` binary under a pty against the mock backend.

use rexpect::session::spawn_command;
use std::process::Command;

const TIMEOUT_MS: Option<u64> = Some(10_000);

fn sample_command() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_remdisp-sample"));
    cmd.env("REMDISP_BACKEND", "mock")
        .env("RUST_LOG", "info")
        .env_remove("REMDISP_CONFIG");
    cmd
}

#[test]
fn it_should_run_the_sample_script_to_completion() {
    let mut p = spawn_command(sample_command(), TIMEOUT_MS).expect("spawn remdisp-sample");

    p.exp_string("Backend: mock").unwrap();
    p.exp_string("Opened /dev/dri/card1").unwrap();
    p.exp_string("Mode changed handler: 1280x800@60Hz 32bpp")
        .unwrap();
    p.exp_string("Got update sync").unwrap();
    p.exp_string("Update coming async").unwrap();
    p.exp_string(
        "Sample finished: 1 mode change(s), 50 sync update(s), 50 pending, 50 rects grabbed",
    )
    .unwrap();
    p.exp_eof().unwrap();
}

#[test]
fn it_should_apply_a_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("remdisp.json");
    std::fs::write(
        &path,
        r#"{ "sample": { "update_iterations": 4, "ready_timeout_ms": 2000 } }"#,
    )
    .unwrap();

    let mut cmd = sample_command();
    cmd.env("REMDISP_CONFIG", &path);
    let mut p = spawn_command(cmd, TIMEOUT_MS).expect("spawn remdisp-sample");

    p.exp_string(
        "Sample finished: 1 mode change(s), 2 sync update(s), 2 pending, 2 rects grabbed",
    )
    .unwrap();
    p.exp_eof().unwrap();
}

#[test]
fn it_should_fail_on_an_unopenable_device() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("remdisp.json");
    std::fs::write(&path, r#"{ "device": { "index": 9 } }"#).unwrap();

    let mut cmd = sample_command();
    cmd.env("REMDISP_CONFIG", &path);
    let mut p = spawn_command(cmd, TIMEOUT_MS).expect("spawn remdisp-sample");

    p.exp_string("Failed to open device 9").unwrap();
    p.exp_eof().unwrap();
}
