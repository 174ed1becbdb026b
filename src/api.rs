//! Submission and query API
//!
//! `QuizApi` is the surface callers use: it validates a submission, writes a
//! pending `JobRecord`, hands the id to the task queue and returns at once. The
//! rest are read-only lookups over the job and question stores.

use crate::error::ApiError;
use crate::generation::GenerationSettings;
use crate::parser::QuestionFormat;
use crate::prompt::{find_preset, Preset, PromptParameters};
use crate::queue::TaskQueue;
use crate::store::{JobRecord, JobStore, NewJob, PersistedQuestion, QuestionStore};
use crate::types::{CategoryId, JobId, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// A request to generate questions from a piece of text.
///
/// Prompt fields left as `None` come from the selected preset (or the first
/// configured preset when none is named).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub category_id: CategoryId,
    pub user_id: UserId,
    pub story: String,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub primer: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default)]
    pub format: Option<QuestionFormat>,
    #[serde(default)]
    pub question_count: Option<u32>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub add_identifier: bool,
}

/// Quiz generation service
pub struct QuizApi {
    jobs: Arc<dyn JobStore>,
    questions: Arc<dyn QuestionStore>,
    queue: Arc<dyn TaskQueue>,
    presets: Vec<Preset>,
    settings: GenerationSettings,
}

impl QuizApi {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        questions: Arc<dyn QuestionStore>,
        queue: Arc<dyn TaskQueue>,
        presets: Vec<Preset>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            jobs,
            questions,
            queue,
            presets,
            settings,
        }
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    /// Validate and record a submission, then queue it. Does not wait for generation.
    pub async fn submit(&self, request: SubmissionRequest) -> Result<JobId, ApiError> {
        let new_job = self.build_job(request)?;
        let record = self.jobs.create(new_job)?;
        info!(
            job_id = %record.id,
            category_id = %record.category_id,
            user_id = %record.user_id,
            format = %record.format,
            questions_requested = record.questions_requested,
            "Submitted generation job"
        );
        self.queue.enqueue(record.id).await?;
        Ok(record.id)
    }

    /// Resolve preset and defaults into the record fields.
    pub fn build_job(&self, request: SubmissionRequest) -> Result<NewJob, ApiError> {
        if request.story.trim().is_empty() {
            return Err(ApiError::InvalidSubmission(
                "source text cannot be empty".to_string(),
            ));
        }

        let preset = match &request.preset {
            Some(selector) => Some(
                find_preset(&self.presets, selector)
                    .ok_or_else(|| ApiError::PresetNotFound(selector.clone()))?,
            ),
            None => self.presets.first(),
        };

        let primer = request
            .primer
            .or_else(|| preset.map(|p| p.primer.clone()))
            .unwrap_or_default();
        let instructions = request
            .instructions
            .or_else(|| preset.map(|p| p.instructions.clone()))
            .unwrap_or_default();
        let example = request
            .example
            .or_else(|| preset.map(|p| p.example.clone()))
            .unwrap_or_default();
        if primer.trim().is_empty() || instructions.trim().is_empty() {
            return Err(ApiError::InvalidSubmission(
                "primer and instructions are required (no preset configured)".to_string(),
            ));
        }

        let format = request
            .format
            .or_else(|| preset.map(|p| p.format))
            .unwrap_or(QuestionFormat::Gift);

        let questions_requested = request
            .question_count
            .unwrap_or(self.settings.default_question_count);
        if questions_requested == 0 {
            return Err(ApiError::InvalidSubmission(
                "number of questions must be greater than zero".to_string(),
            ));
        }
        if self.settings.max_tries == 0 {
            return Err(ApiError::ConfigError(
                "generation.max_tries must be greater than zero".to_string(),
            ));
        }

        let language = request
            .language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.settings.default_language.clone());

        Ok(NewJob {
            category_id: request.category_id,
            user_id: request.user_id,
            format,
            questions_requested,
            add_identifier: request.add_identifier,
            max_tries: self.settings.max_tries,
            prompt: PromptParameters {
                primer,
                instructions,
                example,
                story: request.story,
                language,
            },
        })
    }

    pub fn job(&self, id: JobId) -> Result<JobRecord, ApiError> {
        self.jobs.get(id)?.ok_or(ApiError::JobNotFound(id))
    }

    pub fn list_jobs(&self) -> Result<Vec<JobRecord>, ApiError> {
        Ok(self.jobs.list()?)
    }

    pub fn questions_for_job(&self, id: JobId) -> Result<Vec<PersistedQuestion>, ApiError> {
        self.job(id)?;
        Ok(self.questions.list_by_job(id)?)
    }

    pub fn questions_in_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<PersistedQuestion>, ApiError> {
        Ok(self.questions.list_by_category(category_id)?)
    }
}
