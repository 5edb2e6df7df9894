//! Sessions with stdin redirected from a pipe.
//!
//! Without a terminal on stdin the editor runs without raw mode and warns
//! once; commands still execute.

#![cfg(unix)]

use std::io::Write;
use std::process::{Command, Stdio};

#[test]
fn piped_input_runs_without_raw_mode() {
    let device = std::env::temp_dir().join(format!("iotool-piped-{}", std::process::id()));
    std::fs::write(&device, vec![0u8; 64 * 1024]).expect("create scratch device");

    let mut child = Command::new(env!("CARGO_BIN_EXE_iotool"))
        .env("IOTOOL_PORT_IO", "0")
        .env("IOTOOL_MEM_DEVICE", &device)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn iotool");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(b"iowb 0x40 0x7\niorb 0x40\n\nquit\n")
        .expect("write commands");
    let output = child.wait_with_output().expect("wait");
    let _ = std::fs::remove_file(&device);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "{stderr}");
    assert_eq!(
        stderr
            .matches("Warning: Failed to enable raw terminal mode: stdin is not a terminal")
            .count(),
        1,
        "{stderr}"
    );
    assert!(stdout.contains("Write byte 0x07 to address 0x40"), "{stdout}");
    assert!(stdout.contains("0x07\n"), "{stdout}");
    assert!(stdout.contains("Exiting IO Access Tool. Goodbye!"), "{stdout}");
}
