// tests/admin_binaries.rs

//! Runs the admin binaries against a fake sysfs tree.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn run_remove(sysfs_root: &Path, config_dir: &Path) -> Output {
    let config = config_dir.join("remdisp.json");
    fs::write(
        &config,
        serde_json::json!({ "device": { "sysfs_root": sysfs_root } }).to_string(),
    )
    .unwrap();

    Command::new(env!("CARGO_BIN_EXE_remove-virtual-devices"))
        .env("REMDISP_CONFIG", &config)
        .env("RUST_LOG", "info")
        .output()
        .unwrap()
}

fn fake_sysfs(count: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("version"), "1.14.4\n").unwrap();
    fs::write(dir.path().join("count"), count).unwrap();
    fs::write(dir.path().join("remove_all"), "").unwrap();
    dir
}

#[test]
fn it_should_report_the_device_count_it_removed() {
    let sysfs = fake_sysfs("2\n");
    let config_dir = tempfile::tempdir().unwrap();

    let output = run_remove(sysfs.path(), config_dir.path());
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "{}", stderr);
    assert!(stderr.contains("Removed all devices (2 before)"));
    assert_eq!(fs::read_to_string(sysfs.path().join("remove_all")).unwrap(), "1");
}

#[test]
fn it_should_warn_instead_of_reporting_zero_for_an_unreadable_count() {
    let sysfs = fake_sysfs("lots");
    let config_dir = tempfile::tempdir().unwrap();

    let output = run_remove(sysfs.path(), config_dir.path());
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "{}", stderr);
    assert!(stderr.contains("Could not read the device count before removal"));
    assert!(!stderr.contains("0 before"));
}

#[test]
fn it_should_fail_when_the_module_is_not_installed() {
    let sysfs = tempfile::tempdir().unwrap();
    let config_dir = tempfile::tempdir().unwrap();

    let output = run_remove(sysfs.path(), config_dir.path());

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Kernel module evdi not installed"));
}
