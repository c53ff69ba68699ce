use std::process::Command;

#[test]
fn prints_version() {
    let exe = env!("CARGO_BIN_EXE_noor-tui");
    let output = Command::new(exe)
        .arg("--version")
        .output()
        .expect("run noor-tui --version");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    assert!(
        stdout.contains(env!("CARGO_PKG_VERSION")),
        "stdout was: {}",
        stdout.trim()
    );
}

#[test]
fn prints_help() {
    let exe = env!("CARGO_BIN_EXE_noor-tui");
    let output = Command::new(exe)
        .arg("--help")
        .output()
        .expect("run noor-tui --help");
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout utf8");
    assert!(stdout.contains("noor-tui"));
    assert!(stdout.contains("--version"));
}
