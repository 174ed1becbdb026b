//! Quizforge: LLM-backed quiz question generation
//!
//! Turns a free text into multiple choice questions by prompting a chat
//! completion model, validating its GIFT or XML answer, and importing the
//! questions into a category all at once. Failed attempts are retried up to a
//! per-job limit, and each job's progress is kept in a durable record.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod question;
pub mod queue;
pub mod store;
pub mod types;
