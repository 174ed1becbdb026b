//! Job record and question stores
//!
//! `JobStore` keeps one `JobRecord` per generation request; the generation job
//! is its only writer once the record exists. `QuestionStore` is the question
//! bank: it accepts a whole batch of drafts or nothing.

pub mod persistence;

pub use persistence::{open_database, SledJobStore, SledQuestionStore};

use crate::error::StorageError;
use crate::parser::QuestionFormat;
use crate::prompt::PromptParameters;
use crate::question::{tagged_name, AnswerOption, QuestionDraft, QuestionType, TextFormat};
use crate::types::{CategoryId, JobId, QuestionId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Persistent state of one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub category_id: CategoryId,
    pub user_id: UserId,
    pub format: QuestionFormat,
    pub questions_requested: u32,
    pub add_identifier: bool,
    pub max_tries: u32,
    pub tries_so_far: u32,
    #[serde(default)]
    pub last_raw_response: String,
    /// `None` while pending.
    pub success: Option<bool>,
    pub prompt: PromptParameters,
    pub created_at_ms: u64,
    pub last_modified_at_ms: u64,
}

/// Derived view of a record's progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != JobStatus::Pending
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JobRecord {
    /// An exhausted record whose final write never landed still counts as failed.
    pub fn status(&self) -> JobStatus {
        match self.success {
            Some(true) => JobStatus::Succeeded,
            Some(false) => JobStatus::Failed,
            None if self.tries_so_far >= self.max_tries => JobStatus::Failed,
            None => JobStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Whether the outcome has been written (as opposed to derived).
    pub fn is_finalized(&self) -> bool {
        self.success.is_some()
    }

    pub fn remaining_tries(&self) -> u32 {
        self.max_tries.saturating_sub(self.tries_so_far)
    }
}

/// Fields supplied at submission; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJob {
    pub category_id: CategoryId,
    pub user_id: UserId,
    pub format: QuestionFormat,
    pub questions_requested: u32,
    pub add_identifier: bool,
    pub max_tries: u32,
    pub prompt: PromptParameters,
}

impl NewJob {
    pub fn into_record(self, id: JobId, now_ms: u64) -> JobRecord {
        JobRecord {
            id,
            category_id: self.category_id,
            user_id: self.user_id,
            format: self.format,
            questions_requested: self.questions_requested,
            add_identifier: self.add_identifier,
            max_tries: self.max_tries,
            tries_so_far: 0,
            last_raw_response: String::new(),
            success: None,
            prompt: self.prompt,
            created_at_ms: now_ms,
            last_modified_at_ms: now_ms,
        }
    }
}

/// Job record store interface
pub trait JobStore: Send + Sync {
    /// Assign an id and write a fresh pending record.
    fn create(&self, job: NewJob) -> Result<JobRecord, StorageError>;

    fn get(&self, id: JobId) -> Result<Option<JobRecord>, StorageError>;

    /// Overwrite an existing record. Fails with `JobNotFound` if it is gone.
    fn update(&self, record: &JobRecord) -> Result<(), StorageError>;

    /// Remove a record. Returns whether it existed.
    fn delete(&self, id: JobId) -> Result<bool, StorageError>;

    /// All records, oldest first.
    fn list(&self) -> Result<Vec<JobRecord>, StorageError>;

    /// Records whose outcome has not been written yet.
    fn list_pending(&self) -> Result<Vec<JobRecord>, StorageError> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| !r.is_finalized())
            .collect())
    }
}

/// Who and where an accepted batch is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistContext {
    pub category_id: CategoryId,
    pub user_id: UserId,
    pub job_id: JobId,
    pub add_identifier: bool,
    pub now_ms: u64,
}

impl PersistContext {
    pub fn for_job(record: &JobRecord, now_ms: u64) -> Self {
        Self {
            category_id: record.category_id,
            user_id: record.user_id,
            job_id: record.id,
            add_identifier: record.add_identifier,
            now_ms,
        }
    }
}

/// A question as stored in the question bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedQuestion {
    pub id: QuestionId,
    pub category_id: CategoryId,
    pub name: String,
    pub question_text: String,
    pub question_text_format: TextFormat,
    pub question_type: QuestionType,
    pub answers: Vec<AnswerOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub general_feedback: Option<String>,
    pub created_by: UserId,
    pub modified_by: UserId,
    pub created_at_ms: u64,
    pub modified_at_ms: u64,
    pub job_id: JobId,
}

impl PersistedQuestion {
    pub fn from_draft(id: QuestionId, draft: &QuestionDraft, ctx: &PersistContext) -> Self {
        Self {
            id,
            category_id: ctx.category_id,
            name: tagged_name(&draft.name, ctx.add_identifier),
            question_text: draft.display_text.clone(),
            question_text_format: TextFormat::Html,
            question_type: draft.question_type,
            answers: draft.answers.clone(),
            general_feedback: draft.general_feedback.clone(),
            created_by: ctx.user_id,
            modified_by: ctx.user_id,
            created_at_ms: ctx.now_ms,
            modified_at_ms: ctx.now_ms,
            job_id: ctx.job_id,
        }
    }
}

/// Question bank interface
pub trait QuestionStore: Send + Sync {
    /// Validate every draft, then write all of them atomically.
    ///
    /// On error nothing has been written.
    fn persist_batch(
        &self,
        drafts: &[QuestionDraft],
        ctx: &PersistContext,
    ) -> Result<Vec<PersistedQuestion>, StorageError>;

    /// Persist `drafts` for `record` and store `record` itself, already marked
    /// succeeded, in one atomic write.
    ///
    /// Fails with `JobNotFound` and writes nothing when the record is gone.
    fn commit_batch(
        &self,
        drafts: &[QuestionDraft],
        record: &JobRecord,
        now_ms: u64,
    ) -> Result<Vec<PersistedQuestion>, StorageError>;

    fn get(&self, id: QuestionId) -> Result<Option<PersistedQuestion>, StorageError>;

    fn list_by_job(&self, job_id: JobId) -> Result<Vec<PersistedQuestion>, StorageError>;

    fn list_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<PersistedQuestion>, StorageError>;
}
