//! Property-based tests for all-or-nothing batches and bounded retries

use async_trait::async_trait;
use proptest::prelude::*;
use quizforge::error::ApiError;
use quizforge::generation::{GenerationJob, GenerationSettings, JobOutcome};
use quizforge::parser::{GiftParser, ParseOutcome, QuestionFormat, Rejection, ResponseParser};
use quizforge::prompt::PromptParameters;
use quizforge::provider::{
    ChatMessage, CompletionOptions, CompletionResponse, LlmClient, LlmResponse,
    ModelProviderClient, TokenUsage,
};
use quizforge::store::{
    open_database, JobStore, NewJob, QuestionStore, SledJobStore, SledQuestionStore,
};
use quizforge::types::{CategoryId, UserId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

fn block(i: usize) -> String {
    format!("::Q{i}:: Question number {i}? {{=right{i} ~wrong{i} ~other{i}}}")
}

fn response(blocks: usize) -> String {
    (0..blocks).map(block).collect::<Vec<_>>().join("\n\n")
}

/// Answers every call with the same text.
struct FixedProvider {
    text: String,
    calls: AtomicUsize,
}

#[async_trait]
impl ModelProviderClient for FixedProvider {
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(CompletionResponse {
            content: self.text.clone(),
            model: "fixed".to_string(),
            usage: TokenUsage::default(),
            finish_reason: None,
        })
    }

    fn provider_name(&self) -> &str {
        "fixed"
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

/// Test that a GIFT response is accepted only when its block count matches
#[test]
fn test_gift_accepts_only_exact_count() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(1usize..8, 1usize..8), |(found, expected)| {
            let outcome = GiftParser::new().parse(&LlmResponse::new(response(found)), expected);
            if found == expected {
                prop_assert_eq!(outcome.drafts().map(|d| d.len()), Some(expected));
            } else {
                prop_assert_eq!(
                    outcome,
                    ParseOutcome::Rejected(Rejection::BlockCountMismatch { expected, found })
                );
            }
            Ok(())
        })
        .unwrap();
}

/// Test that one broken block anywhere rejects the whole batch
#[test]
fn test_single_malformed_block_rejects_batch() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(2usize..8).prop_flat_map(|n| (Just(n), 0..n)), |(n, broken)| {
            let blocks: Vec<String> = (0..n)
                .map(|i| {
                    if i == broken {
                        format!("::Q{i}:: Question without answers")
                    } else {
                        block(i)
                    }
                })
                .collect();
            let outcome = GiftParser::new().parse(&LlmResponse::new(blocks.join("\n\n")), n);
            match outcome {
                ParseOutcome::Rejected(Rejection::MalformedQuestion { index, .. }) => {
                    prop_assert_eq!(index, broken)
                }
                other => prop_assert!(false, "unexpected outcome: {:?}", other),
            }
            Ok(())
        })
        .unwrap();
}

/// Test that tries stay within max_tries and questions exist only on success
#[test]
fn test_tries_bounded_and_persistence_all_or_nothing() {
    let mut runner = proptest::test_runner::TestRunner::new(proptest::test_runner::Config {
        cases: 24,
        ..proptest::test_runner::Config::default()
    });
    let rt = tokio::runtime::Runtime::new().unwrap();

    runner
        .run(
            &(1u32..6, 1usize..5, 1usize..5),
            |(max_tries, requested, produced)| {
                let dir = TempDir::new().unwrap();
                let db = open_database(dir.path()).unwrap();
                let jobs = SledJobStore::shared(db.clone()).unwrap();
                let questions = SledQuestionStore::shared(db).unwrap();
                let provider = Arc::new(FixedProvider {
                    text: response(produced),
                    calls: AtomicUsize::new(0),
                });
                let job = GenerationJob::new(
                    jobs.clone(),
                    questions.clone(),
                    LlmClient::new(provider.clone(), CompletionOptions::default()),
                    GenerationSettings::default(),
                );
                let record = jobs
                    .create(NewJob {
                        category_id: CategoryId(1),
                        user_id: UserId(1),
                        format: QuestionFormat::Gift,
                        questions_requested: requested as u32,
                        add_identifier: false,
                        max_tries,
                        prompt: PromptParameters {
                            primer: "p".to_string(),
                            instructions: "i".to_string(),
                            example: String::new(),
                            story: "s".to_string(),
                            language: "English".to_string(),
                        },
                    })
                    .unwrap();

                let outcome = rt.block_on(job.run(record.id)).unwrap();
                let stored = jobs.get(record.id).unwrap().unwrap();
                let persisted = questions.list_by_job(record.id).unwrap().len();

                prop_assert!(stored.tries_so_far <= max_tries);
                prop_assert!(stored.success.is_some());
                if requested == produced {
                    prop_assert!(matches!(outcome, JobOutcome::Succeeded { tries: 1, .. }), "expected Succeeded {{ tries: 1 }}, got {:?}", outcome);
                    prop_assert_eq!(persisted, requested);
                } else {
                    prop_assert_eq!(outcome, JobOutcome::Failed { tries: max_tries });
                    prop_assert_eq!(stored.tries_so_far, max_tries);
                    prop_assert_eq!(persisted, 0);
                    prop_assert_eq!(provider.calls.load(Ordering::SeqCst), max_tries as usize);
                }
                Ok(())
            },
        )
        .unwrap();
}
