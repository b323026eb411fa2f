use std::process::Command;
use tempfile::TempDir;

fn ragqa(dir: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_ragqa"));
    command.current_dir(dir).env_remove("RAGQA_CONFIG");
    command
}

#[test]
fn test_init_command() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let output = ragqa(temp_path)
        .arg("init")
        .output()
        .expect("Failed to run init command");
    assert!(output.status.success());

    let config_path = temp_path.join(".ragqa/settings.toml");
    assert!(config_path.exists());

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("version = 1"));
    assert!(content.contains("[server]"));
    assert!(content.contains("[chunking]"));

    // A second init without --force refuses to overwrite
    let output = ragqa(temp_path).arg("init").output().unwrap();
    assert!(!output.status.success());

    let output = ragqa(temp_path).args(["init", "--force"]).output().unwrap();
    assert!(output.status.success());
}

#[test]
fn test_config_from_subdirectory_uses_workspace_store() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();

    let output = ragqa(&root).arg("init").output().unwrap();
    assert!(output.status.success());

    let nested = root.join("sub").join("dir");
    std::fs::create_dir_all(&nested).unwrap();

    let output = ragqa(&nested)
        .arg("config")
        .output()
        .expect("Failed to run config command");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let data_dir = root.join(".ragqa").join("data");
    assert!(stdout.contains(&format!("data_dir = \"{}\"", data_dir.display())));
    assert!(!stdout.contains("sub/dir"));
}

#[test]
fn test_config_command_with_custom_file() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let config_path = temp_path.join("custom.toml");
    std::fs::write(
        &config_path,
        r#"
version = 2
[chunking]
chunk_size = 640
"#,
    )
    .unwrap();

    let output = ragqa(temp_path)
        .arg("config")
        .arg("--config")
        .arg(&config_path)
        .output()
        .expect("Failed to run config command");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("version = 2"));
    assert!(stdout.contains("chunk_size = 640"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let config_path = temp_path.join("bad.toml");
    std::fs::write(
        &config_path,
        "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n",
    )
    .unwrap();

    let output = ragqa(temp_path)
        .args(["config", "--config"])
        .arg(&config_path)
        .output()
        .unwrap();
    assert!(!output.status.success());

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("invalid configuration"));
}

#[test]
fn test_stats_and_clear_without_store() {
    let temp_dir = TempDir::new().unwrap();
    let temp_path = temp_dir.path();

    let output = ragqa(temp_path)
        .args(["stats", "--json"])
        .output()
        .expect("Failed to run stats command");
    assert!(output.status.success());

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["document_count"], 0);
    assert_eq!(stats["status"], "empty");

    let output = ragqa(temp_path).arg("clear").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Nothing to clear"));
}
