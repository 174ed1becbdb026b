//! Generation job: the generate-validate-persist retry loop.
//!
//! One `run` handles one `JobRecord`. Each attempt asks the model for the whole
//! batch, parses it with the parser for the record's format, and persists it only
//! if every question in it is valid. Anything short of that discards the attempt
//! and the loop tries again until `max_tries` is spent.

use crate::error::{ApiError, StorageError};
use crate::parser::{ParseOutcome, ParserRegistry, Rejection};
use crate::provider::LlmClient;
use crate::store::{JobRecord, JobStatus, JobStore, QuestionStore};
use crate::types::{now_millis, JobId, QuestionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Generation settings, passed in at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// Attempts per job, stamped onto each record at submission
    pub max_tries: u32,
    /// Queue workers
    pub workers: usize,
    /// Pause between a rejected attempt and the next one
    pub retry_delay_ms: u64,
    /// Questions requested when a submission does not say
    pub default_question_count: u32,
    pub default_language: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tries: 10,
            workers: 2,
            retry_delay_ms: 0,
            default_question_count: 5,
            default_language: crate::prompt::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl GenerationSettings {
    pub fn retry_delay(&self) -> Option<Duration> {
        (self.retry_delay_ms > 0).then(|| Duration::from_millis(self.retry_delay_ms))
    }
}

/// How a run ended. Attempt failures never surface as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded { tries: u32, questions: Vec<QuestionId> },
    Failed { tries: u32 },
    /// The record no longer exists; nothing was written.
    MissingRecord,
    /// The record already carried an outcome; nothing was written.
    AlreadyTerminal { status: JobStatus },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded { .. })
    }
}

/// Runs generation jobs against shared stores and one LLM client.
pub struct GenerationJob {
    jobs: Arc<dyn JobStore>,
    questions: Arc<dyn QuestionStore>,
    llm: LlmClient,
    parsers: ParserRegistry,
    settings: GenerationSettings,
}

impl GenerationJob {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        questions: Arc<dyn QuestionStore>,
        llm: LlmClient,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            jobs,
            questions,
            llm,
            parsers: ParserRegistry::default(),
            settings,
        }
    }

    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Drive the record for `job_id` to a terminal state.
    ///
    /// Errors only when the job record itself cannot be read or written. A
    /// record deleted while the job runs ends it as `MissingRecord`.
    pub async fn run(&self, job_id: JobId) -> Result<JobOutcome, ApiError> {
        let Some(record) = self.jobs.get(job_id)? else {
            warn!(job_id = %job_id, "Job record not found, dropping job");
            return Ok(JobOutcome::MissingRecord);
        };

        if record.is_finalized() {
            info!(job_id = %job_id, status = %record.status(), "Job already finished, skipping");
            return Ok(JobOutcome::AlreadyTerminal {
                status: record.status(),
            });
        }

        match self.drive(record).await {
            Err(ApiError::StorageError(StorageError::JobNotFound(_))) => {
                warn!(job_id = %job_id, "Job record deleted mid-run, stopping");
                Ok(JobOutcome::MissingRecord)
            }
            other => other,
        }
    }

    async fn drive(&self, mut record: JobRecord) -> Result<JobOutcome, ApiError> {
        let job_id = record.id;
        if record.tries_so_far > 0 {
            info!(
                job_id = %job_id,
                tries_so_far = record.tries_so_far,
                max_tries = record.max_tries,
                "Resuming interrupted job"
            );
            if let Some(outcome) = self.adopt_saved_batch(&mut record)? {
                return Ok(outcome);
            }
        }

        while record.tries_so_far < record.max_tries {
            record.tries_so_far += 1;
            let attempt = record.tries_so_far;
            self.write(&mut record)?;
            debug!(job_id = %job_id, attempt, max_tries = record.max_tries, "Starting attempt");

            let outcome = self.attempt(&mut record).await?;
            let rejection = match outcome {
                ParseOutcome::Accepted(drafts) => {
                    let now = now_millis();
                    let mut finished = record.clone();
                    finished.success = Some(true);
                    finished.last_modified_at_ms = now;
                    match self.questions.commit_batch(&drafts, &finished, now) {
                        Ok(saved) => {
                            info!(
                                job_id = %job_id,
                                attempt,
                                questions = saved.len(),
                                "Questions created"
                            );
                            return Ok(JobOutcome::Succeeded {
                                tries: attempt,
                                questions: saved.into_iter().map(|q| q.id).collect(),
                            });
                        }
                        Err(err @ StorageError::JobNotFound(_)) => return Err(err.into()),
                        Err(err) => Rejection::PersistenceFailure(err.to_string()),
                    }
                }
                ParseOutcome::Rejected(rejection) => rejection,
            };

            warn!(
                job_id = %job_id,
                attempt,
                max_tries = record.max_tries,
                reason = %rejection,
                "Attempt rejected"
            );

            // A store that failed after writing must not get a second batch.
            if matches!(rejection, Rejection::PersistenceFailure(_)) {
                if let Some(outcome) = self.adopt_saved_batch(&mut record)? {
                    return Ok(outcome);
                }
            }

            if record.tries_so_far < record.max_tries {
                if let Some(delay) = self.settings.retry_delay() {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        record.success = Some(false);
        self.write(&mut record)?;
        warn!(job_id = %job_id, tries = record.tries_so_far, "Giving up, no questions created");
        Ok(JobOutcome::Failed {
            tries: record.tries_so_far,
        })
    }

    /// One LLM call plus parse. The raw response is written before parsing.
    async fn attempt(&self, record: &mut JobRecord) -> Result<ParseOutcome, ApiError> {
        match self
            .llm
            .generate(&record.prompt, record.questions_requested)
            .await
        {
            Ok(response) => {
                record.last_raw_response = response.text.clone();
                self.write(record)?;
                let parser = self.parsers.get(record.format);
                Ok(parser.parse(&response, record.questions_requested as usize))
            }
            Err(err) => {
                record.last_raw_response.clear();
                self.write(record)?;
                Ok(ParseOutcome::Rejected(Rejection::ProviderFailure(
                    err.to_string(),
                )))
            }
        }
    }

    /// Finalize a record whose questions are already in the bank.
    fn adopt_saved_batch(&self, record: &mut JobRecord) -> Result<Option<JobOutcome>, ApiError> {
        let saved = self.questions.list_by_job(record.id)?;
        if saved.is_empty() {
            return Ok(None);
        }
        record.success = Some(true);
        self.write(record)?;
        info!(
            job_id = %record.id,
            questions = saved.len(),
            "Questions already saved, marking job succeeded"
        );
        Ok(Some(JobOutcome::Succeeded {
            tries: record.tries_so_far,
            questions: saved.into_iter().map(|q| q.id).collect(),
        }))
    }

    fn write(&self, record: &mut JobRecord) -> Result<(), ApiError> {
        record.last_modified_at_ms = now_millis();
        self.jobs.update(record)?;
        Ok(())
    }
}
