//! Shared test utilities for integration tests
//!
//! Provides a scripted model provider, store setup and environment isolation
//! so each test runs against its own sled database and config directories.

use async_trait::async_trait;
use quizforge::error::ApiError;
use quizforge::generation::{GenerationJob, GenerationSettings};
use quizforge::parser::QuestionFormat;
use quizforge::prompt::PromptParameters;
use quizforge::provider::{
    ChatMessage, CompletionOptions, CompletionResponse, LlmClient, ModelProviderClient,
    TokenUsage,
};
use quizforge::store::{open_database, NewJob, SledJobStore, SledQuestionStore};
use quizforge::types::{CategoryId, UserId};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const RED_PLANET: &str = "::Planets:: Which planet is known as the red planet? {=Mars ~Venus ~Jupiter ~Saturn}";
pub const LARGEST_OCEAN: &str = "::Oceans:: Which is the largest ocean? {=Pacific ~Atlantic ~Indian}";
pub const FASTEST_ANIMAL: &str = "::Animals:: Which is the fastest land animal? {=Cheetah ~Horse ~Lion}";

/// Join GIFT blocks the way a model separates them.
pub fn gift_response(blocks: &[&str]) -> String {
    blocks.join("\n\n")
}

/// Replays a fixed list of responses; `Err` entries fail the call.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<String, String>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<Vec<ChatMessage>> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelProviderClient for ScriptedProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        self.prompts.lock().unwrap().push(messages);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err("script exhausted".to_string()));
        match next {
            Ok(content) => Ok(CompletionResponse {
                content,
                model: "scripted".to_string(),
                usage: TokenUsage::default(),
                finish_reason: Some("stop".to_string()),
            }),
            Err(msg) => Err(ApiError::ProviderRequestFailed(msg)),
        }
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// A sled database in a temp dir with both stores opened on it.
pub struct TestStores {
    pub dir: TempDir,
    pub jobs: Arc<SledJobStore>,
    pub questions: Arc<SledQuestionStore>,
}

impl TestStores {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = open_database(dir.path().join("store")).unwrap();
        Self {
            jobs: SledJobStore::shared(db.clone()).unwrap(),
            questions: SledQuestionStore::shared(db).unwrap(),
            dir,
        }
    }

    pub fn generation_job(
        &self,
        provider: Arc<ScriptedProvider>,
        settings: GenerationSettings,
    ) -> GenerationJob {
        GenerationJob::new(
            self.jobs.clone(),
            self.questions.clone(),
            LlmClient::new(provider, CompletionOptions::default()),
            settings,
        )
    }
}

pub fn new_job(count: u32, max_tries: u32) -> NewJob {
    NewJob {
        category_id: CategoryId(7),
        user_id: UserId(42),
        format: QuestionFormat::Gift,
        questions_requested: count,
        add_identifier: false,
        max_tries,
        prompt: PromptParameters {
            primer: "You write multiple choice quiz questions.".to_string(),
            instructions: "Write {{numofquestions}} questions in GIFT format, in {{language}}."
                .to_string(),
            example: String::new(),
            story: "Mars is the fourth planet from the sun.".to_string(),
            language: "English".to_string(),
        },
    }
}

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: Mutex<()> = Mutex::new(());

struct EnvState {
    home: Option<String>,
    xdg_config_home: Option<String>,
    quizforge_env: Option<String>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            home: std::env::var("HOME").ok(),
            xdg_config_home: std::env::var("XDG_CONFIG_HOME").ok(),
            quizforge_env: std::env::var("QUIZFORGE_ENV").ok(),
        }
    }

    fn restore(self) {
        restore_var("HOME", self.home);
        restore_var("XDG_CONFIG_HOME", self.xdg_config_home);
        restore_var("QUIZFORGE_ENV", self.quizforge_env);
    }
}

fn restore_var(key: &str, value: Option<String>) {
    match value {
        Some(v) => std::env::set_var(key, v),
        None => std::env::remove_var(key),
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir`.
///
/// Extra variables in `vars` are set for the duration and removed afterwards.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let config_home = test_dir.path().join("xdg");
    let home = test_dir.path().join("home");
    std::fs::create_dir_all(&config_home).unwrap();
    std::fs::create_dir_all(&home).unwrap();
    std::env::set_var("HOME", &home);
    std::env::set_var("XDG_CONFIG_HOME", &config_home);
    std::env::remove_var("QUIZFORGE_ENV");
    for (key, value) in vars {
        std::env::set_var(key, value);
    }

    let result = f();

    for (key, _) in vars {
        std::env::remove_var(key);
    }
    env_state.restore();

    result
}
