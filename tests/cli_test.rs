use std::process::Command;
use tempfile::TempDir;

fn hsbc_assist(dir: &std::path::Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hsbc-assist"));
    cmd.current_dir(dir);
    cmd
}

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();

    let output = hsbc_assist(temp_dir.path())
        .arg("init")
        .output()
        .expect("Failed to run init command");
    assert!(output.status.success());

    let config_path = temp_dir.path().join(".hsbc-assist/settings.toml");
    assert!(config_path.exists());

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("version = 1"));
    assert!(content.contains("[chunking]"));
    assert!(content.contains("[refinitiv]"));

    // A second init without --force refuses to overwrite
    let again = hsbc_assist(temp_dir.path()).arg("init").output().unwrap();
    assert!(!again.status.success());
    let stderr = String::from_utf8(again.stderr).unwrap();
    assert!(stderr.contains("Error:"));
}

#[test]
fn test_config_command_reads_workspace_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_dir = temp_dir.path().join(".hsbc-assist");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("settings.toml"),
        "version = 2\n[chunking]\nchunk_size = 900\nchunk_overlap = 90\n",
    )
    .unwrap();

    // Settings are found from a nested working directory
    let nested = temp_dir.path().join("reports").join("2026");
    std::fs::create_dir_all(&nested).unwrap();

    let output = hsbc_assist(&nested).arg("config").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("version = 2"));
    assert!(stdout.contains("chunk_size = 900"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.toml");
    std::fs::write(&path, "[chunking]\nchunk_size = 10\nchunk_overlap = 10\n").unwrap();

    let output = hsbc_assist(temp_dir.path())
        .args(["--config", path.to_str().unwrap(), "config"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("chunk_overlap"));
}

#[test]
fn test_chunks_command_runs_offline() {
    let temp_dir = TempDir::new().unwrap();
    let doc = temp_dir.path().join("faq.txt");
    std::fs::write(&doc, "Paragraph one. Paragraph two. Paragraph three.").unwrap();

    let output = hsbc_assist(temp_dir.path())
        .args(["chunks", "faq.txt", "--chunk-size", "20", "--chunk-overlap", "5"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("3 chunk(s) (size 20, overlap 5)"));
    assert!(stdout.contains("Paragraph two."));
}
