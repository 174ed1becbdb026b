//! Integration tests for the configuration system

use crate::integration::test_utils::with_isolated_env;
use quizforge::config::{ConfigLoader, ProviderType, QuizforgeConfig};
use quizforge::parser::QuestionFormat;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn defaults_apply_without_any_files() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("workspace");
    std::fs::create_dir_all(&workspace).unwrap();

    let config = with_isolated_env(&temp_dir, &[], || ConfigLoader::load(&workspace).unwrap());

    assert_eq!(config.provider.provider_type, ProviderType::OpenAI);
    assert_eq!(config.provider.model, "gpt-3.5-turbo");
    assert_eq!(config.generation.max_tries, 10);
    assert_eq!(config.generation.workers, 2);
    assert_eq!(config.presets.len(), 2);
    assert_eq!(config.storage.store_path, PathBuf::from(".quizforge/store"));
    assert!(config.validate().is_ok());
}

#[test]
fn workspace_file_overrides_global_file() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("workspace");
    std::fs::create_dir_all(workspace.join("config")).unwrap();

    let global_dir = temp_dir.path().join("xdg").join("quizforge");
    std::fs::create_dir_all(&global_dir).unwrap();
    std::fs::write(
        global_dir.join("config.toml"),
        r#"
[provider]
model = "gpt-4o-mini"
api_key = "global-key"

[generation]
max_tries = 4
workers = 3
"#,
    )
    .unwrap();
    std::fs::write(
        workspace.join("config").join("config.toml"),
        r#"
[generation]
max_tries = 6
"#,
    )
    .unwrap();

    let config = with_isolated_env(&temp_dir, &[], || ConfigLoader::load(&workspace).unwrap());

    assert_eq!(config.provider.model, "gpt-4o-mini");
    assert_eq!(config.provider.api_key.as_deref(), Some("global-key"));
    assert_eq!(config.generation.max_tries, 6);
    assert_eq!(config.generation.workers, 3);
}

#[test]
fn environment_specific_file_and_env_vars_win() {
    let temp_dir = TempDir::new().unwrap();
    let workspace = temp_dir.path().join("workspace");
    std::fs::create_dir_all(workspace.join("config")).unwrap();
    std::fs::write(
        workspace.join("config").join("config.toml"),
        "[generation]\nmax_tries = 6\nretry_delay_ms = 100\n",
    )
    .unwrap();
    std::fs::write(
        workspace.join("config").join("staging.toml"),
        "[generation]\nretry_delay_ms = 500\n",
    )
    .unwrap();

    let config = with_isolated_env(
        &temp_dir,
        &[
            ("QUIZFORGE_ENV", "staging"),
            ("QUIZFORGE__PROVIDER__API_KEY", "env-key"),
            ("QUIZFORGE__GENERATION__MAX_TRIES", "2"),
        ],
        || ConfigLoader::load(&workspace).unwrap(),
    );

    assert_eq!(config.generation.retry_delay_ms, 500);
    assert_eq!(config.generation.max_tries, 2);
    assert_eq!(config.provider.api_key.as_deref(), Some("env-key"));
}

#[test]
fn explicit_file_with_custom_presets() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("quizforge.toml");
    std::fs::write(
        &config_file,
        r#"
[provider]
provider_type = "azure"
model = "quiz-deployment"
endpoint = "https://example.openai.azure.com"

[[presets]]
name = "Short GIFT"
primer = "You write quiz questions."
instructions = "Write {{numofquestions}} questions."
format = "gift"

[[presets]]
name = "Short XML"
primer = "You write quiz questions."
instructions = "Write {{numofquestions}} questions as XML."
format = "xml"
"#,
    )
    .unwrap();

    let config: QuizforgeConfig = with_isolated_env(&temp_dir, &[], || {
        ConfigLoader::load_from_file(&config_file).unwrap()
    });

    assert_eq!(config.provider.provider_type, ProviderType::Azure);
    assert_eq!(config.presets.len(), 2);
    assert_eq!(config.presets[1].format, QuestionFormat::Xml);
    assert!(config.presets[0].example.is_empty());
    assert!(config.validate().is_ok());
}

#[test]
fn invalid_values_are_all_reported() {
    let temp_dir = TempDir::new().unwrap();
    let config_file = temp_dir.path().join("bad.toml");
    std::fs::write(
        &config_file,
        r#"
[provider]
provider_type = "azure"
model = ""

[generation]
max_tries = 0
workers = 0
"#,
    )
    .unwrap();

    let config = with_isolated_env(&temp_dir, &[], || {
        ConfigLoader::load_from_file(&config_file).unwrap()
    });
    let errors = config.validate().unwrap_err();

    assert!(errors.len() >= 3);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let result = ConfigLoader::load_from_file(&temp_dir.path().join("absent.toml"));
    assert!(result.is_err());
}
