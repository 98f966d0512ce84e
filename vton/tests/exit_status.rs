use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn vton(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_vton"))
        .current_dir(dir)
        .env_remove("HUGGINGFACE_TOKEN")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .unwrap()
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[test]
fn empty_token_stops_before_any_run() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".env"), "HUGGINGFACE_TOKEN=\"\"\n").unwrap();
    fs::write(dir.path().join("p.jpg"), b"person").unwrap();
    fs::write(dir.path().join("g.jpg"), b"garment").unwrap();

    let output = vton(
        dir.path(),
        &[
            "--env-file",
            ".env",
            "run",
            "--person",
            "p.jpg",
            "--garment",
            "g.jpg",
            "--description",
            "Gucci upper",
        ],
    );

    assert_eq!(output.status.code(), Some(1));
    let stderr = text(&output.stderr);
    assert!(stderr.contains("Please set your Hugging Face token!"), "{stderr}");
    assert!(stderr.contains("HUGGINGFACE_TOKEN=your_token_here"), "{stderr}");
    assert!(!dir.path().join("results").exists());
}

#[test]
fn missing_credential_file_and_variable_stop_the_menu() {
    let dir = tempfile::tempdir().unwrap();

    let output = vton(dir.path(), &["--env-file", "absent.env", "menu"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(text(&output.stderr).contains("Please set your Hugging Face token!"));
    assert!(!text(&output.stdout).contains("Enter your choice"));
}

#[test]
fn check_passes_with_a_token_in_the_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".env"), "HUGGINGFACE_TOKEN=hf_abcdefghijklmnop\n").unwrap();

    let output = vton(dir.path(), &["check"]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = text(&output.stdout);
    assert!(stdout.contains("HUGGINGFACE_TOKEN found, starts with: hf_abcdefg..."), "{stdout}");
    assert!(!stdout.contains("hf_abcdefghijklmnop"));
}

#[test]
fn check_fails_without_a_token() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(".env"), "# no token yet\n").unwrap();

    let output = vton(dir.path(), &["check"]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = text(&output.stdout);
    assert!(stdout.contains("HUGGINGFACE_TOKEN not found"), "{stdout}");
    assert!(stdout.contains("Please set your Hugging Face token!"));
}
