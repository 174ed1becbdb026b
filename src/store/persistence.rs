//! Sled-backed job record and question stores

use crate::error::StorageError;
use crate::question::QuestionDraft;
use crate::store::{
    JobRecord, JobStore, NewJob, PersistContext, PersistedQuestion, QuestionStore,
};
use crate::types::{now_millis, CategoryId, JobId, QuestionId};
use sled::transaction::{abort, TransactionError, TransactionResult};
use sled::{Db, Transactional, Tree};
use std::io;
use std::path::Path;
use std::sync::Arc;

const TREE_JOBS: &str = "jobs";
const TREE_QUESTIONS: &str = "questions";

// Key prefixes inside the questions tree. Index entries have empty values.
const QUESTION_PREFIX: u8 = b'q';
const JOB_INDEX_PREFIX: u8 = b'j';
const CATEGORY_INDEX_PREFIX: u8 = b'c';

/// Open (or create) the sled database at `path`.
pub fn open_database<P: AsRef<Path>>(path: P) -> Result<Db, StorageError> {
    sled::open(path.as_ref()).map_err(|e| {
        StorageError::IoError(io::Error::new(
            io::ErrorKind::Other,
            format!(
                "Failed to open sled database at {}: {}",
                path.as_ref().display(),
                e
            ),
        ))
    })
}

/// Sled-based implementation of JobStore
#[derive(Clone)]
pub struct SledJobStore {
    db: Db,
    jobs: Tree,
}

impl SledJobStore {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        let jobs = db.open_tree(TREE_JOBS).map_err(to_storage_io)?;
        Ok(Self { db, jobs })
    }

    pub fn shared(db: Db) -> Result<Arc<Self>, StorageError> {
        Ok(Arc::new(Self::new(db)?))
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.jobs.flush().map_err(to_storage_io)?;
        Ok(())
    }

    fn put(&self, record: &JobRecord) -> Result<(), StorageError> {
        let value = serde_json::to_vec(record).map_err(to_storage_data)?;
        self.jobs
            .insert(record.id.to_key(), value)
            .map_err(to_storage_io)?;
        Ok(())
    }
}

impl JobStore for SledJobStore {
    fn create(&self, job: NewJob) -> Result<JobRecord, StorageError> {
        // generate_id starts at 0; job ids start at 1.
        let id = JobId(self.db.generate_id().map_err(to_storage_io)? + 1);
        let record = job.into_record(id, now_millis());
        self.put(&record)?;
        Ok(record)
    }

    fn get(&self, id: JobId) -> Result<Option<JobRecord>, StorageError> {
        let Some(raw) = self.jobs.get(id.to_key()).map_err(to_storage_io)? else {
            return Ok(None);
        };
        let record = serde_json::from_slice(&raw).map_err(to_storage_data)?;
        Ok(Some(record))
    }

    fn update(&self, record: &JobRecord) -> Result<(), StorageError> {
        let key = record.id.to_key();
        let value = serde_json::to_vec(record).map_err(to_storage_data)?;
        let result: TransactionResult<(), StorageError> = self.jobs.transaction(|jobs| {
            if jobs.get(key)?.is_none() {
                return abort(StorageError::JobNotFound(record.id));
            }
            jobs.insert(&key[..], value.as_slice())?;
            Ok(())
        });
        result.map_err(from_transaction)
    }

    fn delete(&self, id: JobId) -> Result<bool, StorageError> {
        let key = id.to_key();
        let result: TransactionResult<bool, StorageError> =
            self.jobs.transaction(|jobs| Ok(jobs.remove(&key[..])?.is_some()));
        result.map_err(from_transaction)
    }

    fn list(&self) -> Result<Vec<JobRecord>, StorageError> {
        let mut out = Vec::new();
        for result in self.jobs.iter() {
            let (_, value) = result.map_err(to_storage_io)?;
            let record: JobRecord = serde_json::from_slice(&value).map_err(to_storage_data)?;
            out.push(record);
        }
        Ok(out)
    }
}

/// Sled-based implementation of QuestionStore
///
/// Questions and their job/category index entries live in one tree. The jobs
/// tree is opened too, so a job's batch and its success flag commit in one
/// transaction.
#[derive(Clone)]
pub struct SledQuestionStore {
    db: Db,
    questions: Tree,
    jobs: Tree,
}

/// Serialized question and index entries for one batch.
type BatchEntries = Vec<(Vec<u8>, Vec<u8>)>;

impl SledQuestionStore {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        let questions = db.open_tree(TREE_QUESTIONS).map_err(to_storage_io)?;
        let jobs = db.open_tree(TREE_JOBS).map_err(to_storage_io)?;
        Ok(Self { db, questions, jobs })
    }

    pub fn shared(db: Db) -> Result<Arc<Self>, StorageError> {
        Ok(Arc::new(Self::new(db)?))
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.questions.flush().map_err(to_storage_io)?;
        Ok(())
    }

    /// Validate every draft, then assign ids and serialize. Writes nothing.
    fn prepare(
        &self,
        drafts: &[QuestionDraft],
        ctx: &PersistContext,
    ) -> Result<(Vec<PersistedQuestion>, BatchEntries), StorageError> {
        for (index, draft) in drafts.iter().enumerate() {
            draft.validate().map_err(|reason| {
                StorageError::InvalidQuestion(format!("question {}: {}", index + 1, reason))
            })?;
        }

        let mut persisted = Vec::with_capacity(drafts.len());
        let mut entries = Vec::with_capacity(drafts.len() * 3);
        for draft in drafts {
            let id = QuestionId(self.db.generate_id().map_err(to_storage_io)? + 1);
            let question = PersistedQuestion::from_draft(id, draft, ctx);
            let value = serde_json::to_vec(&question).map_err(to_storage_data)?;

            entries.push((question_key(id).to_vec(), value));
            entries.push((job_index_key(ctx.job_id, Some(id)), Vec::new()));
            entries.push((category_index_key(ctx.category_id, Some(id)), Vec::new()));
            persisted.push(question);
        }
        Ok((persisted, entries))
    }

    /// Resolve index entries under `prefix` to questions, in id order.
    fn list_indexed(&self, prefix: &[u8]) -> Result<Vec<PersistedQuestion>, StorageError> {
        let mut out = Vec::new();
        for result in self.questions.scan_prefix(prefix) {
            let (key, _) = result.map_err(to_storage_io)?;
            let Some(id) = QuestionId::from_key(&key[prefix.len()..]) else {
                continue;
            };
            match self.get(id)? {
                Some(question) => out.push(question),
                None => return Err(StorageError::QuestionNotFound(id)),
            }
        }
        Ok(out)
    }
}

impl QuestionStore for SledQuestionStore {
    fn persist_batch(
        &self,
        drafts: &[QuestionDraft],
        ctx: &PersistContext,
    ) -> Result<Vec<PersistedQuestion>, StorageError> {
        let (persisted, entries) = self.prepare(drafts, ctx)?;
        let mut batch = sled::Batch::default();
        for (key, value) in entries {
            batch.insert(key, value);
        }
        self.questions.apply_batch(batch).map_err(to_storage_io)?;
        Ok(persisted)
    }

    fn commit_batch(
        &self,
        drafts: &[QuestionDraft],
        record: &JobRecord,
        now_ms: u64,
    ) -> Result<Vec<PersistedQuestion>, StorageError> {
        let ctx = PersistContext::for_job(record, now_ms);
        let (persisted, entries) = self.prepare(drafts, &ctx)?;
        let job_key = record.id.to_key();
        let job_value = serde_json::to_vec(record).map_err(to_storage_data)?;

        let result: TransactionResult<(), StorageError> =
            (&self.questions, &self.jobs).transaction(|(questions, jobs)| {
                if jobs.get(job_key)?.is_none() {
                    return abort(StorageError::JobNotFound(record.id));
                }
                for (key, value) in &entries {
                    questions.insert(key.as_slice(), value.as_slice())?;
                }
                jobs.insert(&job_key[..], job_value.as_slice())?;
                Ok(())
            });
        result.map_err(from_transaction)?;
        Ok(persisted)
    }

    fn get(&self, id: QuestionId) -> Result<Option<PersistedQuestion>, StorageError> {
        let Some(raw) = self.questions.get(question_key(id)).map_err(to_storage_io)? else {
            return Ok(None);
        };
        let question = serde_json::from_slice(&raw).map_err(to_storage_data)?;
        Ok(Some(question))
    }

    fn list_by_job(&self, job_id: JobId) -> Result<Vec<PersistedQuestion>, StorageError> {
        self.list_indexed(&job_index_key(job_id, None))
    }

    fn list_by_category(
        &self,
        category_id: CategoryId,
    ) -> Result<Vec<PersistedQuestion>, StorageError> {
        self.list_indexed(&category_index_key(category_id, None))
    }
}

fn question_key(id: QuestionId) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = QUESTION_PREFIX;
    key[1..].copy_from_slice(&id.to_key());
    key
}

fn index_key(prefix: u8, owner: [u8; 8], id: Option<QuestionId>) -> Vec<u8> {
    let mut key = Vec::with_capacity(17);
    key.push(prefix);
    key.extend_from_slice(&owner);
    if let Some(id) = id {
        key.extend_from_slice(&id.to_key());
    }
    key
}

fn job_index_key(job_id: JobId, id: Option<QuestionId>) -> Vec<u8> {
    index_key(JOB_INDEX_PREFIX, job_id.to_key(), id)
}

fn category_index_key(category_id: CategoryId, id: Option<QuestionId>) -> Vec<u8> {
    index_key(CATEGORY_INDEX_PREFIX, category_id.to_key(), id)
}

fn to_storage_io(err: sled::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}

fn from_transaction(err: TransactionError<StorageError>) -> StorageError {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => to_storage_io(err),
    }
}

fn to_storage_data(err: serde_json::Error) -> StorageError {
    StorageError::IoError(io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
}
