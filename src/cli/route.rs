//! CLI route: single route table and run context. Dispatches to domain services and presentation.

use crate::api::{QuizApi, SubmissionRequest};
use crate::config::{ConfigLoader, QuizforgeConfig};
use crate::error::ApiError;
use crate::generation::GenerationJob;
use crate::provider::{LlmClient, ProviderFactory};
use crate::queue::{DeferredQueue, GenerationQueue, TaskQueue};
use crate::store::{open_database, SledJobStore, SledQuestionStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::cli::command_name;
use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_job, format_job_list, format_presets, format_question_list, format_submitted,
};

/// Runtime context for CLI execution: workspace, loaded config and stores.
pub struct RunContext {
    workspace_root: PathBuf,
    config: QuizforgeConfig,
    jobs: Arc<SledJobStore>,
    questions: Arc<SledQuestionStore>,
    runtime: tokio::runtime::Runtime,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };

        config.validate().map_err(|errors| {
            let error_msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            ApiError::ConfigError(format!(
                "Configuration validation failed:\n{}",
                error_msgs.join("\n")
            ))
        })?;

        let store_path = config.storage.resolve_store_path(&workspace_root);
        std::fs::create_dir_all(&store_path)
            .map_err(|e| ApiError::StorageError(crate::error::StorageError::IoError(e)))?;
        let db = open_database(&store_path)?;
        let jobs = SledJobStore::shared(db.clone())?;
        let questions = SledQuestionStore::shared(db)?;

        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| ApiError::ConfigError(format!("Failed to create async runtime: {}", e)))?;

        Ok(Self {
            workspace_root,
            config,
            jobs,
            questions,
            runtime,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn config(&self) -> &QuizforgeConfig {
        &self.config
    }

    /// Execute a CLI command via the single route table.
    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        let started = Instant::now();
        let result = self.execute_inner(command);
        info!(
            command = command_name(command),
            ok = result.is_ok(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Command finished"
        );
        result
    }

    fn execute_inner(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Submit {
                category,
                user,
                story_file,
                preset,
                count,
                format,
                language,
                add_identifier,
                wait,
            } => {
                let story = std::fs::read_to_string(story_file).map_err(|e| {
                    ApiError::InvalidSubmission(format!(
                        "cannot read {}: {}",
                        story_file.display(),
                        e
                    ))
                })?;
                let request = SubmissionRequest {
                    category_id: *category,
                    user_id: *user,
                    story,
                    preset: preset.clone(),
                    format: *format,
                    question_count: *count,
                    language: language.clone(),
                    add_identifier: *add_identifier,
                    ..SubmissionRequest::default()
                };
                if *wait {
                    self.submit_and_wait(request)
                } else {
                    let api = self.api(Arc::new(DeferredQueue));
                    let job_id = self.runtime.block_on(api.submit(request))?;
                    Ok(format_submitted(&api.job(job_id)?))
                }
            }
            Commands::Work { timeout_secs } => self.work(timeout_secs.map(Duration::from_secs)),
            Commands::Status { job_id, format } => {
                let api = self.api(Arc::new(DeferredQueue));
                format_job(&api.job(*job_id)?, format)
            }
            Commands::Jobs { format } => {
                let api = self.api(Arc::new(DeferredQueue));
                format_job_list(&api.list_jobs()?, format)
            }
            Commands::Questions {
                job,
                category,
                format,
            } => {
                let api = self.api(Arc::new(DeferredQueue));
                let questions = match (job, category) {
                    (Some(job_id), _) => api.questions_for_job(*job_id)?,
                    (None, Some(category_id)) => api.questions_in_category(*category_id)?,
                    (None, None) => {
                        return Err(ApiError::InvalidSubmission(
                            "either --job or --category is required".to_string(),
                        ))
                    }
                };
                format_question_list(&questions, format)
            }
            Commands::Presets => Ok(format_presets(&self.config.presets)),
        }
    }

    fn api(&self, queue: Arc<dyn TaskQueue>) -> QuizApi {
        QuizApi::new(
            self.jobs.clone(),
            self.questions.clone(),
            queue,
            self.config.presets.clone(),
            self.config.generation.clone(),
        )
    }

    fn generation_job(&self) -> Result<Arc<GenerationJob>, ApiError> {
        let provider = ProviderFactory::from_config(&self.config.provider)?;
        let llm = LlmClient::new(provider, self.config.provider.default_options.clone());
        Ok(Arc::new(GenerationJob::new(
            self.jobs.clone(),
            self.questions.clone(),
            llm,
            self.config.generation.clone(),
        )))
    }

    fn submit_and_wait(&self, request: SubmissionRequest) -> Result<String, ApiError> {
        let queue = Arc::new(GenerationQueue::new(self.generation_job()?));
        let api = self.api(queue.clone());
        let job_id = self.runtime.block_on(async {
            queue.start()?;
            let job_id = api.submit(request).await?;
            let waited = queue.wait_for_completion(None).await;
            queue.stop().await?;
            waited.map(|_| job_id)
        })?;
        format_job(&api.job(job_id)?, "text")
    }

    fn work(&self, timeout: Option<Duration>) -> Result<String, ApiError> {
        let queue = GenerationQueue::new(self.generation_job()?);
        let stats = self.runtime.block_on(async {
            queue.start()?;
            let recovered = queue.recover_pending(self.jobs.as_ref()).await;
            let waited = match recovered {
                Ok(_) => queue.wait_for_completion(timeout).await,
                Err(e) => Err(e),
            };
            queue.stop().await?;
            waited.map(|_| queue.stats())
        })?;

        let processed = stats.succeeded + stats.failed + stats.skipped + stats.errored;
        if processed == 0 {
            return Ok("No pending jobs.".to_string());
        }
        Ok(format!(
            "Processed {} job(s): {} succeeded, {} failed, {} skipped, {} aborted",
            processed, stats.succeeded, stats.failed, stats.skipped, stats.errored
        ))
    }
}
