//! Integration tests for quiz question generation

mod api_workflow;
mod config_integration;
mod job_store;
mod queue_processing;
mod test_utils;
