use ragqa::Settings;
use ragqa::config::LlmProviderKind;
use std::env;
use tempfile::TempDir;

// Env mutation is process-wide, so every override case lives in one test.
#[test]
fn test_env_overrides_file_and_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("settings.toml");
    std::fs::write(
        &config_path,
        r#"
[llm]
provider = "openai"
model = "gpt-4o-mini"

[query]
default_top_k = 4
"#,
    )
    .unwrap();

    unsafe {
        // Double underscore separates nested levels
        env::set_var("RAGQA_LLM__MODEL", "mistral");
        env::set_var("RAGQA_QUERY__DEFAULT_TOP_K", "5");
        env::set_var("RAGQA_CHUNKING__CHUNK_SIZE", "800");
    }

    let settings = Settings::load_from(&config_path);

    unsafe {
        env::remove_var("RAGQA_LLM__MODEL");
        env::remove_var("RAGQA_QUERY__DEFAULT_TOP_K");
        env::remove_var("RAGQA_CHUNKING__CHUNK_SIZE");
    }

    let settings = settings.unwrap();
    // File value survives where no env var is set
    assert_eq!(settings.llm.provider, LlmProviderKind::Openai);
    // Env beats file
    assert_eq!(settings.llm.model, "mistral");
    assert_eq!(settings.query.default_top_k, 5);
    // Env beats defaults
    assert_eq!(settings.chunking.chunk_size, 800);
    assert_eq!(settings.chunking.chunk_overlap, 200);
    assert!(settings.validate().is_ok());
}
