//! Durability of job records and questions across database reopen

use crate::integration::test_utils::new_job;
use quizforge::question::{AnswerOption, QuestionDraft, QuestionType, TextFormat};
use quizforge::store::{
    open_database, JobStore, PersistContext, QuestionStore, SledJobStore, SledQuestionStore,
};
use quizforge::types::{CategoryId, JobId, UserId};
use tempfile::TempDir;

fn draft(name: &str, correct: bool) -> QuestionDraft {
    QuestionDraft {
        name: name.to_string(),
        display_text: format!("<p>{}?</p>", name),
        text_format: TextFormat::Html,
        question_type: QuestionType::MultipleChoice,
        answers: vec![
            AnswerOption::new("right", if correct { 100.0 } else { 0.0 }),
            AnswerOption::new("wrong", 0.0),
        ],
        general_feedback: None,
    }
}

fn ctx(job_id: JobId) -> PersistContext {
    PersistContext {
        category_id: CategoryId(5),
        user_id: UserId(8),
        job_id,
        add_identifier: false,
        now_ms: 1_700_000_000_000,
    }
}

#[test]
fn records_and_questions_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("store");

    let (job_id, question_id) = {
        let db = open_database(&path).unwrap();
        let jobs = SledJobStore::new(db.clone()).unwrap();
        let questions = SledQuestionStore::new(db).unwrap();

        let mut record = jobs.create(new_job(1, 5)).unwrap();
        record.tries_so_far = 2;
        record.last_raw_response = "raw".to_string();
        jobs.update(&record).unwrap();
        let saved = questions
            .persist_batch(&[draft("Kept", true)], &ctx(record.id))
            .unwrap();
        jobs.flush().unwrap();
        questions.flush().unwrap();
        (record.id, saved[0].id)
    };

    let db = open_database(&path).unwrap();
    let jobs = SledJobStore::new(db.clone()).unwrap();
    let questions = SledQuestionStore::new(db).unwrap();

    let record = jobs.get(job_id).unwrap().unwrap();
    assert_eq!(record.tries_so_far, 2);
    assert_eq!(record.last_raw_response, "raw");
    assert_eq!(record.success, None);
    assert_eq!(jobs.list_pending().unwrap().len(), 1);

    let question = questions.get(question_id).unwrap().unwrap();
    assert_eq!(question.name, "Kept");
    assert_eq!(question.created_at_ms, 1_700_000_000_000);

    // Ids keep increasing after reopen.
    let next = jobs.create(new_job(1, 5)).unwrap();
    assert!(next.id > job_id);
}

#[test]
fn batch_with_one_invalid_draft_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let db = open_database(dir.path()).unwrap();
    let questions = SledQuestionStore::new(db).unwrap();

    let result = questions.persist_batch(
        &[draft("Good", true), draft("No correct answer", false)],
        &ctx(JobId(1)),
    );

    assert!(result.is_err());
    assert!(questions.list_by_job(JobId(1)).unwrap().is_empty());
    assert!(questions.list_by_category(CategoryId(5)).unwrap().is_empty());
}
