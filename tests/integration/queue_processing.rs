//! Queue workers, restart recovery and concurrent jobs

use crate::integration::test_utils::{new_job, ScriptedProvider, TestStores, RED_PLANET};
use quizforge::generation::GenerationSettings;
use quizforge::queue::{GenerationQueue, TaskQueue};
use quizforge::store::{JobStatus, JobStore, QuestionStore};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn interrupted_jobs_resume_after_restart() {
    let stores = TestStores::new();

    // A record left behind mid-run by a previous process.
    let mut interrupted = stores.jobs.create(new_job(1, 3)).unwrap();
    interrupted.tries_so_far = 2;
    interrupted.last_raw_response = "partial".to_string();
    stores.jobs.update(&interrupted).unwrap();
    let fresh = stores.jobs.create(new_job(1, 3)).unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![
        Ok(RED_PLANET.to_string()),
        Ok(RED_PLANET.to_string()),
    ]));
    let job = Arc::new(stores.generation_job(provider.clone(), GenerationSettings::default()));
    let queue = GenerationQueue::new(job);

    queue.start().unwrap();
    assert_eq!(queue.recover_pending(stores.jobs.as_ref()).await.unwrap(), 2);
    queue
        .wait_for_completion(Some(Duration::from_secs(10)))
        .await
        .unwrap();
    queue.stop().await.unwrap();

    let resumed = stores.jobs.get(interrupted.id).unwrap().unwrap();
    assert_eq!(resumed.status(), JobStatus::Succeeded);
    assert_eq!(resumed.tries_so_far, 3);
    let fresh = stores.jobs.get(fresh.id).unwrap().unwrap();
    assert_eq!(fresh.status(), JobStatus::Succeeded);
    assert_eq!(fresh.tries_so_far, 1);
    assert_eq!(provider.calls(), 2);
    assert!(stores.jobs.list_pending().unwrap().is_empty());
}

#[tokio::test]
async fn many_jobs_across_workers_each_finish_once() {
    let stores = TestStores::new();
    let count = 12;
    let provider = Arc::new(ScriptedProvider::new(
        (0..count).map(|_| Ok(RED_PLANET.to_string())).collect(),
    ));
    let settings = GenerationSettings {
        workers: 4,
        ..GenerationSettings::default()
    };
    let job = Arc::new(stores.generation_job(provider.clone(), settings));
    let queue = GenerationQueue::new(job);

    queue.start().unwrap();
    let mut ids = Vec::new();
    for _ in 0..count {
        let record = stores.jobs.create(new_job(1, 1)).unwrap();
        queue.enqueue(record.id).await.unwrap();
        // Duplicate delivery must not run a job twice.
        queue.enqueue(record.id).await.unwrap();
        ids.push(record.id);
    }
    queue
        .wait_for_completion(Some(Duration::from_secs(20)))
        .await
        .unwrap();
    queue.stop().await.unwrap();

    assert_eq!(provider.calls(), count);
    for id in ids {
        let record = stores.jobs.get(id).unwrap().unwrap();
        assert_eq!(record.success, Some(true));
        assert_eq!(stores.questions.list_by_job(id).unwrap().len(), 1);
    }
    let stats = queue.stats();
    assert_eq!(stats.succeeded, count);
    assert_eq!(stats.processing, 0);
    assert!(!queue.is_running());
}

#[tokio::test]
async fn finished_jobs_are_not_rerun() {
    let stores = TestStores::new();
    let mut done = stores.jobs.create(new_job(1, 3)).unwrap();
    done.tries_so_far = 1;
    done.success = Some(false);
    stores.jobs.update(&done).unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![Ok(RED_PLANET.to_string())]));
    let job = Arc::new(stores.generation_job(provider.clone(), GenerationSettings::default()));
    let queue = GenerationQueue::new(job);

    queue.start().unwrap();
    queue.enqueue(done.id).await.unwrap();
    queue
        .wait_for_completion(Some(Duration::from_secs(10)))
        .await
        .unwrap();
    queue.stop().await.unwrap();

    assert_eq!(provider.calls(), 0);
    assert_eq!(queue.stats().skipped, 1);
    assert_eq!(stores.jobs.get(done.id).unwrap().unwrap(), done);
}
