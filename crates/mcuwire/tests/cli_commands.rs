#![cfg(all(unix, feature = "cli"))]

use std::process::Command;

fn mcuwire() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mcuwire"));
    cmd.env_remove("MCUWIRE_PORT")
        .env_remove("MCUWIRE_BAUD")
        .env_remove("MCUWIRE_TIMEOUT");
    cmd
}

fn missing_port() -> String {
    format!(
        "/tmp/mcuwire-missing-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    )
}

#[test]
fn version_prints_package_version() {
    let output = mcuwire().arg("version").output().expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("mcuwire {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn extended_version_reports_frame_version() {
    let output = mcuwire()
        .args(["version", "--extended"])
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("frame_version: 0x02"));
    assert!(stdout.contains("max_payload: 240"));
    assert!(stdout.contains(&format!("target_arch: {}", std::env::consts::ARCH)));
    assert!(stdout.contains("profile: "));
}

#[test]
fn hello_on_missing_port_is_a_transport_error() {
    let output = mcuwire()
        .args(["--log-level", "error", "hello", "--port"])
        .arg(missing_port())
        .output()
        .expect("hello should run");

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("connect failed"), "{stderr}");
}

#[test]
fn port_can_come_from_environment() {
    let output = mcuwire()
        .env("MCUWIRE_PORT", missing_port())
        .args(["--log-level", "error", "heartbeat"])
        .output()
        .expect("heartbeat should run");

    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn device_commands_require_a_port() {
    let output = mcuwire().arg("hello").output().expect("hello should run");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn invalid_timeout_is_a_usage_error() {
    let output = mcuwire()
        .args(["hello", "--port", "/dev/null", "--timeout", "soon"])
        .output()
        .expect("hello should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn unknown_value_type_is_rejected() {
    let output = mcuwire()
        .args(["read", "0x100", "--type", "u64", "--port", "/dev/null"])
        .output()
        .expect("read should run");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn ports_json_is_an_array() {
    let output = mcuwire()
        .args(["--format", "json", "ports"])
        .output()
        .expect("ports should run");

    // Hosts without a usable serial subsystem report a transport error.
    if !output.status.success() {
        assert_eq!(output.status.code(), Some(3));
        return;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("ports should emit json");
    assert!(payload.is_array());
}
