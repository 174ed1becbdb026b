//! Submission through the API, processed by the in-process queue

use crate::integration::test_utils::{
    gift_response, ScriptedProvider, TestStores, LARGEST_OCEAN, RED_PLANET,
};
use quizforge::api::{QuizApi, SubmissionRequest};
use quizforge::error::ApiError;
use quizforge::generation::GenerationSettings;
use quizforge::parser::QuestionFormat;
use quizforge::prompt::default_presets;
use quizforge::queue::{DeferredQueue, GenerationQueue};
use quizforge::store::JobStatus;
use quizforge::types::{CategoryId, UserId};
use std::sync::Arc;
use std::time::Duration;

fn request(story: &str) -> SubmissionRequest {
    SubmissionRequest {
        category_id: CategoryId(3),
        user_id: UserId(9),
        story: story.to_string(),
        question_count: Some(2),
        ..SubmissionRequest::default()
    }
}

#[tokio::test]
async fn submitted_job_is_generated_by_queue() {
    let stores = TestStores::new();
    let provider = Arc::new(ScriptedProvider::new(vec![Ok(gift_response(&[
        RED_PLANET,
        LARGEST_OCEAN,
    ]))]));
    let job = Arc::new(stores.generation_job(provider.clone(), GenerationSettings::default()));
    let queue = Arc::new(GenerationQueue::new(job));
    let api = QuizApi::new(
        stores.jobs.clone(),
        stores.questions.clone(),
        queue.clone(),
        default_presets(),
        GenerationSettings::default(),
    );

    queue.start().unwrap();
    let job_id = api.submit(request("The planets and oceans.")).await.unwrap();
    queue
        .wait_for_completion(Some(Duration::from_secs(10)))
        .await
        .unwrap();
    queue.stop().await.unwrap();

    let record = api.job(job_id).unwrap();
    assert_eq!(record.status(), JobStatus::Succeeded);
    assert_eq!(record.format, QuestionFormat::Gift);
    assert_eq!(record.max_tries, 10);
    assert_eq!(api.questions_for_job(job_id).unwrap().len(), 2);
    assert_eq!(api.questions_in_category(CategoryId(3)).unwrap().len(), 2);

    // The first preset's instructions reached the model with the count filled in.
    let user_message = &provider.prompts()[0][1].content;
    assert!(!user_message.contains("{{numofquestions}}"));
    assert!(user_message.contains("The planets and oceans."));
}

#[tokio::test]
async fn deferred_submission_stays_pending() {
    let stores = TestStores::new();
    let api = QuizApi::new(
        stores.jobs.clone(),
        stores.questions.clone(),
        Arc::new(DeferredQueue),
        default_presets(),
        GenerationSettings::default(),
    );

    let job_id = api
        .submit(SubmissionRequest {
            preset: Some("2".to_string()),
            ..request("Some text")
        })
        .await
        .unwrap();

    let record = api.job(job_id).unwrap();
    assert_eq!(record.status(), JobStatus::Pending);
    assert_eq!(record.tries_so_far, 0);
    assert_eq!(record.format, QuestionFormat::Xml);
    assert!(api.questions_for_job(job_id).unwrap().is_empty());
}

#[tokio::test]
async fn invalid_submissions_create_no_record() {
    let stores = TestStores::new();
    let api = QuizApi::new(
        stores.jobs.clone(),
        stores.questions.clone(),
        Arc::new(DeferredQueue),
        default_presets(),
        GenerationSettings::default(),
    );

    let empty = api.submit(request("   ")).await;
    assert!(matches!(empty, Err(ApiError::InvalidSubmission(_))));

    let unknown = api
        .submit(SubmissionRequest {
            preset: Some("no such preset".to_string()),
            ..request("text")
        })
        .await;
    assert!(matches!(unknown, Err(ApiError::PresetNotFound(_))));

    assert!(api.list_jobs().unwrap().is_empty());
}
